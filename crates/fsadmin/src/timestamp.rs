use chrono::NaiveDateTime;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::ops::Deref;

/// Layout the manager uses for timestamps, e.g. `2020-01-03 18:03:21`.
pub const TIMESTAMP_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

const TIMESTAMP_LAYOUT_FRACTIONAL: &str = "%Y-%m-%d %H:%M:%S%.f";

/// A timestamp as reported in subvolume and snapshot info replies.
///
/// Some replies carry microseconds (`2020-09-11 17:40:12.035792`); both forms
/// are accepted. Display always uses the whole-second layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeStamp(pub NaiveDateTime);

impl TimeStamp {
    /// Parse the manager's textual layout.
    pub fn parse(s: &str) -> Result<Self, chrono::ParseError> {
        NaiveDateTime::parse_from_str(s, TIMESTAMP_LAYOUT)
            .or_else(|_| NaiveDateTime::parse_from_str(s, TIMESTAMP_LAYOUT_FRACTIONAL))
            .map(TimeStamp)
    }
}

impl Deref for TimeStamp {
    type Target = NaiveDateTime;

    fn deref(&self) -> &NaiveDateTime {
        &self.0
    }
}

impl fmt::Display for TimeStamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTAMP_LAYOUT))
    }
}

impl Serialize for TimeStamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeStamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TimeStamp::parse(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_timestamp_unmarshal_valid() {
        let ts: TimeStamp = serde_json::from_str(r#""2020-01-03 18:03:21""#).unwrap();
        assert_eq!(ts.year(), 2020);
        assert_eq!(ts.month(), 1);
        assert_eq!(ts.day(), 3);
    }

    #[test]
    fn test_timestamp_unmarshal_fractional() {
        let ts: TimeStamp = serde_json::from_str(r#""2020-09-11 17:40:12.035792""#).unwrap();
        assert_eq!(ts.to_string(), "2020-09-11 17:40:12");
    }

    #[test]
    fn test_timestamp_unmarshal_bad_type() {
        assert!(serde_json::from_str::<TimeStamp>(r#"["2020-01-03 18:03:21"]"#).is_err());
    }

    #[test]
    fn test_timestamp_unmarshal_bad_value() {
        assert!(serde_json::from_str::<TimeStamp>(r#""just another manic monday""#).is_err());
    }

    #[test]
    fn test_timestamp_string() {
        let s = "2020-11-06 11:33:56";
        let ts = TimeStamp::parse(s).unwrap();
        assert_eq!(ts.to_string(), s);
        assert_eq!(serde_json::to_string(&ts).unwrap(), format!("\"{}\"", s));
    }
}
