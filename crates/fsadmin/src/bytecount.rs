use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// A size in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ByteCount(pub u64);

impl ByteCount {
    /// 1 KiB.
    pub const KIB: ByteCount = ByteCount(1024);
    /// 1 MiB.
    pub const MIB: ByteCount = ByteCount(1024 * 1024);
    /// 1 GiB.
    pub const GIB: ByteCount = ByteCount(1024 * 1024 * 1024);
    /// 1 TiB.
    pub const TIB: ByteCount = ByteCount(1024 * 1024 * 1024 * 1024);

    /// `n` gibibytes, saturating at `u64::MAX`.
    pub const fn gib(n: u64) -> Self {
        ByteCount(n.saturating_mul(Self::GIB.0))
    }

    /// `n` mebibytes, saturating at `u64::MAX`.
    pub const fn mib(n: u64) -> Self {
        ByteCount(n.saturating_mul(Self::MIB.0))
    }

    /// The raw byte count.
    pub const fn bytes(self) -> u64 {
        self.0
    }

    /// True for a zero size.
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl From<u64> for ByteCount {
    fn from(v: u64) -> Self {
        ByteCount(v)
    }
}

impl fmt::Display for ByteCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A quota value: either a byte limit or no limit at all.
///
/// The manager reports an unlimited quota as the string `"infinite"` and a
/// limited one as a bare integer; resize requests take the same two forms as
/// text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaSize {
    /// A byte limit.
    Bytes(ByteCount),
    /// No limit.
    Infinite,
}

const INFINITE: &str = "infinite";

impl QuotaSize {
    /// The text form used in resize commands.
    pub fn resize_value(&self) -> String {
        match self {
            QuotaSize::Bytes(b) => b.0.to_string(),
            QuotaSize::Infinite => INFINITE.to_string(),
        }
    }

    /// The byte limit, if any.
    pub fn limit(&self) -> Option<ByteCount> {
        match self {
            QuotaSize::Bytes(b) => Some(*b),
            QuotaSize::Infinite => None,
        }
    }
}

impl From<ByteCount> for QuotaSize {
    fn from(b: ByteCount) -> Self {
        QuotaSize::Bytes(b)
    }
}

impl fmt::Display for QuotaSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.resize_value())
    }
}

impl Serialize for QuotaSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            QuotaSize::Bytes(b) => serializer.serialize_u64(b.0),
            QuotaSize::Infinite => serializer.serialize_str(INFINITE),
        }
    }
}

struct QuotaSizeVisitor;

impl<'de> Visitor<'de> for QuotaSizeVisitor {
    type Value = QuotaSize;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a byte count or the string \"infinite\"")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<QuotaSize, E> {
        Ok(QuotaSize::Bytes(ByteCount(v)))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<QuotaSize, E> {
        u64::try_from(v)
            .map(|v| QuotaSize::Bytes(ByteCount(v)))
            .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<QuotaSize, E> {
        if v == INFINITE {
            Ok(QuotaSize::Infinite)
        } else {
            Err(E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

impl<'de> Deserialize<'de> for QuotaSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(QuotaSizeVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_count_units() {
        assert_eq!(ByteCount::gib(20).bytes(), 20 * 1024 * 1024 * 1024);
        assert_eq!(ByteCount::mib(1), ByteCount::MIB);
        assert_eq!(ByteCount::TIB.bytes(), 1024 * ByteCount::GIB.bytes());
        assert!(ByteCount::default().is_zero());
    }

    #[test]
    fn test_byte_count_units_saturate() {
        assert_eq!(ByteCount::gib(u64::MAX), ByteCount(u64::MAX));
        assert_eq!(ByteCount::mib(1 << 50), ByteCount(u64::MAX));
        assert_eq!(ByteCount::gib((1 << 34) - 1).bytes(), ((1u64 << 34) - 1) << 30);
    }

    #[test]
    fn test_quota_resize_value() {
        assert_eq!(QuotaSize::Bytes(ByteCount::gib(30)).resize_value(), "32212254720");
        assert_eq!(QuotaSize::Infinite.resize_value(), "infinite");
    }

    #[test]
    fn test_quota_deserialize_forms() {
        let q: QuotaSize = serde_json::from_str("444444").unwrap();
        assert_eq!(q, QuotaSize::Bytes(ByteCount(444444)));
        assert_eq!(q.limit(), Some(ByteCount(444444)));
        let q: QuotaSize = serde_json::from_str("\"infinite\"").unwrap();
        assert_eq!(q, QuotaSize::Infinite);
        assert_eq!(q.limit(), None);
    }

    #[test]
    fn test_quota_deserialize_rejects_garbage() {
        assert!(serde_json::from_str::<QuotaSize>("\"fishy\"").is_err());
        assert!(serde_json::from_str::<QuotaSize>("true").is_err());
        assert!(serde_json::from_str::<QuotaSize>("-5").is_err());
    }

    #[test]
    fn test_quota_serialize_matches_wire() {
        assert_eq!(serde_json::to_string(&QuotaSize::Infinite).unwrap(), "\"infinite\"");
        assert_eq!(
            serde_json::to_string(&QuotaSize::Bytes(ByteCount(7))).unwrap(),
            "7"
        );
    }
}
