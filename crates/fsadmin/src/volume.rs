use crate::admin::{check_empty, parse_list_names, FsAdmin};
use crate::command::Command;
use crate::error::{AdminError, Result};
use crate::executor::CommandExecutor;
use crate::response::Response;
use serde::{Deserialize, Serialize};

const DUMP_OK_PREFIX: &str = "dumped fsmap epoch";

const INVALID_TEXTUAL_RESPONSE: &str =
    "this manager version returns a non-parsable volume status response";

/// A volume name paired with its file system id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeIdent {
    pub name: String,
    pub id: i64,
}

#[derive(Deserialize)]
struct MdsMap {
    fs_name: String,
}

#[derive(Deserialize)]
struct DumpedFileSystem {
    id: i64,
    mdsmap: MdsMap,
}

#[derive(Deserialize)]
struct FsDump {
    #[serde(default)]
    filesystems: Vec<DumpedFileSystem>,
}

/// Pool usage reported by `fs status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumePool {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub pool_type: String,
    #[serde(rename = "avail")]
    pub available: u64,
    pub used: u64,
}

/// Volume status as reported by `fs status`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolumeStatus {
    #[serde(default)]
    pub mds_version: serde_json::Value,
    #[serde(default)]
    pub pools: Vec<VolumePool>,
}

impl VolumeStatus {
    /// Bytes used across all pools.
    pub fn used_bytes(&self) -> u64 {
        self.pools.iter().map(|p| p.used).sum()
    }
}

/// Usage of a single pool as reported by `fs volume info`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    #[serde(rename = "avail")]
    pub available: u64,
    pub name: String,
    pub used: u64,
}

/// Data and metadata pools of a volume.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PoolsInfo {
    #[serde(rename = "metadata", default)]
    pub metadata_pool: Vec<PoolInfo>,
    #[serde(rename = "data", default)]
    pub data_pool: Vec<PoolInfo>,
}

/// Volume details as reported by `fs volume info`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VolInfo {
    #[serde(default)]
    pub mon_addrs: Vec<String>,
    #[serde(rename = "pending_subvolume_deletions", default)]
    pub pending_subvol_dels: u64,
    #[serde(default)]
    pub pools: PoolsInfo,
    #[serde(default)]
    pub used_size: u64,
}

/// Parse a `fs dump` reply into volume idents. The manager attaches a fixed
/// status line to successful dumps.
pub fn parse_dump_to_idents(res: Response) -> Result<Vec<VolumeIdent>> {
    let dump: FsDump = res.filter_status_prefix(DUMP_OK_PREFIX).no_status().decode()?;
    Ok(dump
        .filesystems
        .into_iter()
        .map(|fs| VolumeIdent {
            name: fs.mdsmap.fs_name,
            id: fs.id,
        })
        .collect())
}

/// Parse a `fs status` reply. Old managers answer in plain text even when JSON
/// is requested; that is reported as not implemented.
pub fn parse_volume_status(res: Response) -> Result<VolumeStatus> {
    let res = res.no_status();
    if res.ok() && res.body().starts_with(b"ceph") {
        return Err(AdminError::NotImplemented {
            status: INVALID_TEXTUAL_RESPONSE.to_string(),
        });
    }
    res.decode()
}

/// Parse a `fs volume info` reply.
pub fn parse_volume_info(res: Response) -> Result<VolInfo> {
    res.no_status().decode()
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// List the volumes of the cluster.
    pub fn list_volumes(&self) -> Result<Vec<String>> {
        parse_list_names(self.mgr(&Command::new("fs volume ls")))
    }

    /// Create a volume with default pools.
    pub fn create_volume(&self, name: &str) -> Result<()> {
        check_empty(self.mgr(&Command::new("fs volume create").arg("name", name)))
    }

    /// Remove a volume and its pools. The manager refuses unless
    /// `mon_allow_pool_delete` is enabled.
    pub fn remove_volume(&self, name: &str) -> Result<()> {
        let cmd = Command::new("fs volume rm")
            .arg("vol_name", name)
            .arg("yes-i-really-mean-it", "--yes-i-really-mean-it");
        check_empty(self.mgr(&cmd))
    }

    /// List volume names with their ids.
    pub fn enumerate_volumes(&self) -> Result<Vec<VolumeIdent>> {
        parse_dump_to_idents(self.mon(&Command::new("fs dump")))
    }

    /// Pool and daemon status of a volume.
    pub fn volume_status(&self, name: &str) -> Result<VolumeStatus> {
        parse_volume_status(self.mgr(&Command::new("fs status").arg("fs", name)))
    }

    /// Details of a volume: monitors, pools and pending deletions.
    pub fn fetch_volume_info(&self, name: &str) -> Result<VolInfo> {
        parse_volume_info(self.mgr(&Command::new("fs volume info").arg("vol_name", name)))
    }
}
