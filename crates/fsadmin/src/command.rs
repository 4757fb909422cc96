//! Command descriptors.
//!
//! A [`Command`] is the envelope sent to the cluster manager: a JSON object
//! whose `prefix` names the remote operation and whose `format` asks for a
//! structured reply. Everything else is operation specific. Helpers here encode
//! the omission rules the manager expects: optional values are left out when
//! unset, zero sizes and modes are left out unless forced, and modes travel as
//! octal text.

use crate::bytecount::ByteCount;
use crate::error::{AdminError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Output format requested from the manager.
pub const FORMAT_JSON: &str = "json";

/// A unix permission mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mode(pub u32);

impl Mode {
    /// Octal text form, as taken by the manager (`0o750` → `"750"`).
    pub fn octal(self) -> String {
        format!("{:o}", self.0)
    }

    /// Permission bits only, dropping the file type bits.
    pub fn permissions(self) -> Mode {
        Mode(self.0 & 0o7777)
    }
}

impl From<u32> for Mode {
    fn from(v: u32) -> Self {
        Mode(v)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:o}", self.0)
    }
}

/// Convert a mode to the octal text the manager takes.
///
/// A zero mode yields `None` (omit the field) unless `force` is set.
pub fn mode_string(mode: Mode, force: bool) -> Option<String> {
    if force || mode.0 != 0 {
        Some(mode.octal())
    } else {
        None
    }
}

/// An administrative command envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    fields: Map<String, Value>,
}

impl Command {
    /// Start a command for the remote operation `prefix`.
    pub fn new(prefix: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("prefix".into(), Value::from(prefix));
        fields.insert("format".into(), Value::from(FORMAT_JSON));
        Self { fields }
    }

    /// Set a field unconditionally.
    pub fn arg(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Set a field only when a value is present.
    pub fn opt_arg<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.arg(key, v),
            None => self,
        }
    }

    /// Set a string field only when it is non-empty.
    pub fn non_empty(self, key: &str, value: &str) -> Self {
        if value.is_empty() {
            self
        } else {
            self.arg(key, value)
        }
    }

    /// Set a boolean field only when it is true.
    pub fn flag(self, key: &str, on: bool) -> Self {
        if on {
            self.arg(key, true)
        } else {
            self
        }
    }

    /// Set `group_name` for a named group; the default group is implied by
    /// omitting the field.
    pub fn group(self, group: Option<&str>) -> Self {
        self.opt_arg("group_name", group.filter(|g| !g.is_empty()))
    }

    /// Set a mode field as octal text. Zero is omitted unless `force`.
    pub fn mode(self, key: &str, mode: Mode, force: bool) -> Self {
        self.opt_arg(key, mode_string(mode, force))
    }

    /// Set a byte count field as an integer number of bytes. Zero is omitted
    /// unless `force`, in which case it is sent as the JSON number `0`, not
    /// as text like a forced [`mode`](Self::mode).
    pub fn size(self, key: &str, size: ByteCount, force: bool) -> Self {
        if force || !size.is_zero() {
            self.arg(key, size.bytes())
        } else {
            self
        }
    }

    /// Merge a set of boolean flags.
    pub fn flags(self, set: &impl FlagSet) -> Self {
        set.flags()
            .into_iter()
            .fold(self, |cmd, (key, on)| cmd.flag(key, on))
    }

    /// The remote operation this command names.
    pub fn prefix(&self) -> &str {
        self.fields
            .get("prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// A field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// True when the field is present.
    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Serialize the envelope.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(&self.fields).map_err(AdminError::Encode)
    }

    /// The envelope as a JSON value.
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// A group of optional boolean switches accepted by a command.
pub trait FlagSet {
    /// Flag names with their values.
    fn flags(&self) -> Vec<(&'static str, bool)>;
}

/// The `force` switch accepted by most remove commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommonRmFlags {
    /// Ignore a missing target.
    pub force: bool,
}

impl FlagSet for CommonRmFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![("force", self.force)]
    }
}

/// Switches accepted by subvolume removal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubVolRmFlags {
    /// Ignore a missing target.
    pub force: bool,
    /// Keep the subvolume's snapshots after removing its data.
    pub retain_snapshots: bool,
}

impl FlagSet for SubVolRmFlags {
    fn flags(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("force", self.force),
            ("retain_snapshots", self.retain_snapshots),
        ]
    }
}
