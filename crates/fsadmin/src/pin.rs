//! Metadata server pinning for subvolumes and subvolume groups.

use crate::admin::FsAdmin;
use crate::command::Command;
use crate::error::Result;
use crate::executor::CommandExecutor;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Pinning policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinType {
    /// Pin to a single rank.
    Export,
    /// Spread immediate children across ranks.
    Distributed,
    /// Pin descendants to random ranks with the given probability.
    Random,
}

impl PinType {
    /// Name used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            PinType::Export => "export",
            PinType::Distributed => "distributed",
            PinType::Random => "random",
        }
    }
}

impl fmt::Display for PinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Pin a subvolume in the default group. The setting is validated by the
    /// manager, which answers `-EINVAL` for out of range values.
    pub fn pin_subvolume(
        &self,
        volume: &str,
        subvolume: &str,
        pin_type: PinType,
        setting: &str,
    ) -> Result<String> {
        let cmd = Command::new("fs subvolume pin")
            .arg("vol_name", volume)
            .arg("sub_name", subvolume)
            .arg("pin_type", pin_type.as_str())
            .arg("pin_setting", setting);
        self.mgr(&cmd).no_status().text()
    }

    /// Pin a subvolume group.
    pub fn pin_subvolume_group(
        &self,
        volume: &str,
        group: &str,
        pin_type: PinType,
        setting: &str,
    ) -> Result<String> {
        let cmd = Command::new("fs subvolumegroup pin")
            .arg("vol_name", volume)
            .arg("group_name", group)
            .arg("pin_type", pin_type.as_str())
            .arg("pin_setting", setting);
        self.mgr(&cmd).no_status().text()
    }
}
