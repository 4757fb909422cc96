//! Subvolume snapshots.

use crate::admin::{check_empty, extract_path, parse_list_names, FsAdmin};
use crate::bytecount::ByteCount;
use crate::command::{Command, CommonRmFlags};
use crate::error::{AdminError, Result};
use crate::executor::CommandExecutor;
use crate::response::Response;
use crate::timestamp::TimeStamp;
use serde::{Deserialize, Serialize};

/// Informational values about a subvolume snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubVolumeSnapshotInfo {
    pub created_at: TimeStamp,
    #[serde(default)]
    pub data_pool: String,
    #[serde(default)]
    pub has_pending_clones: String,
    #[serde(default)]
    pub protected: String,
    #[serde(default)]
    pub size: ByteCount,
}

impl SubVolumeSnapshotInfo {
    /// Whether the manager reports the snapshot as protected. Managers that
    /// protect snapshots implicitly omit the field; a missing field is
    /// reported as `false`.
    pub fn is_protected(&self) -> Result<bool> {
        yes_no("protected", &self.protected)
    }

    /// Whether clones from this snapshot are still running.
    pub fn has_pending_clones(&self) -> Result<bool> {
        yes_no("has_pending_clones", &self.has_pending_clones)
    }
}

fn yes_no(field: &'static str, value: &str) -> Result<bool> {
    match value {
        "yes" => Ok(true),
        "no" | "" => Ok(false),
        other => Err(AdminError::UnexpectedValue {
            field,
            value: other.to_string(),
        }),
    }
}

/// Parse a `fs subvolume snapshot info` reply.
pub fn parse_snapshot_info(res: Response) -> Result<SubVolumeSnapshotInfo> {
    res.no_status().decode()
}

fn snapshot_command(
    prefix: &str,
    volume: &str,
    group: Option<&str>,
    subvolume: &str,
    name: &str,
) -> Command {
    Command::new(prefix)
        .arg("vol_name", volume)
        .group(group)
        .arg("sub_name", subvolume)
        .arg("snap_name", name)
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Snapshot a subvolume.
    pub fn create_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<()> {
        let cmd = snapshot_command("fs subvolume snapshot create", volume, group, subvolume, name);
        check_empty(self.mgr(&cmd))
    }

    /// Remove a subvolume snapshot.
    pub fn remove_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<()> {
        self.rm_subvolume_snapshot(volume, group, subvolume, name, CommonRmFlags::default())
    }

    /// Remove a subvolume snapshot, ignoring a missing one.
    pub fn force_remove_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<()> {
        self.rm_subvolume_snapshot(volume, group, subvolume, name, CommonRmFlags { force: true })
    }

    fn rm_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
        flags: CommonRmFlags,
    ) -> Result<()> {
        let cmd = snapshot_command("fs subvolume snapshot rm", volume, group, subvolume, name)
            .flags(&flags);
        check_empty(self.mgr(&cmd))
    }

    /// List the snapshots of a subvolume.
    pub fn list_subvolume_snapshots(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
    ) -> Result<Vec<String>> {
        let cmd = Command::new("fs subvolume snapshot ls")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", subvolume);
        parse_list_names(self.mgr(&cmd))
    }

    /// Informational values about a snapshot.
    pub fn subvolume_snapshot_info(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<SubVolumeSnapshotInfo> {
        let cmd = snapshot_command("fs subvolume snapshot info", volume, group, subvolume, name);
        parse_snapshot_info(self.mgr(&cmd))
    }

    /// Protect a snapshot so it can be cloned on managers that require it.
    pub fn protect_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<()> {
        let cmd = snapshot_command("fs subvolume snapshot protect", volume, group, subvolume, name);
        check_empty(self.mgr(&cmd))
    }

    /// Unprotect a snapshot.
    pub fn unprotect_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<()> {
        let cmd =
            snapshot_command("fs subvolume snapshot unprotect", volume, group, subvolume, name);
        check_empty(self.mgr(&cmd))
    }

    /// Path of a snapshot relative to the file system root.
    pub fn subvolume_snapshot_path(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        name: &str,
    ) -> Result<String> {
        let cmd = snapshot_command("fs subvolume snapshot getpath", volume, group, subvolume, name);
        extract_path(self.mgr(&cmd))
    }
}
