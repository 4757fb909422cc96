//! Cross-site snapshot mirroring.
//!
//! Mirroring needs the manager's `mirroring` module (see
//! [`FsAdmin::enable_mirroring_module`]). Peering is established by creating a
//! bootstrap token on the secondary site and importing it on the primary.

use crate::admin::{check_empty, FsAdmin};
use crate::command::Command;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::info;

/// Identifier of a mirroring peer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerUuid(pub String);

impl PeerUuid {
    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerUuid {
    fn from(s: &str) -> Self {
        PeerUuid(s.to_string())
    }
}

impl fmt::Display for PeerUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a mirroring daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DaemonId(pub u64);

/// Peering token created on one site and imported on the other. Opaque: it
/// is passed back to the manager unmodified.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BootstrapToken(String);

impl BootstrapToken {
    /// Wrap a token received out of band.
    pub fn new(token: impl Into<String>) -> Self {
        BootstrapToken(token.into())
    }

    /// The token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens embed credentials for the remote site.
impl fmt::Debug for BootstrapToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BootstrapToken({} bytes)", self.0.len())
    }
}

#[derive(Deserialize)]
struct BootstrapTokenReply {
    token: BootstrapToken,
}

/// The remote side of a peer as seen by a mirroring daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRemote {
    pub client_name: String,
    pub cluster_name: String,
    pub fs_name: String,
}

/// Sync counters of a peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStats {
    pub failure_count: u64,
    pub recovery_count: u64,
}

/// A peer as reported by a mirroring daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub uuid: PeerUuid,
    pub remote: PeerRemote,
    #[serde(default)]
    pub stats: PeerStats,
}

/// A mirrored file system as reported by a mirroring daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FsMirrorStatus {
    pub filesystem_id: i64,
    pub name: String,
    pub directory_count: i64,
    #[serde(default)]
    pub peers: Vec<PeerStatus>,
}

/// Status of one mirroring daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub daemon_id: DaemonId,
    #[serde(default)]
    pub filesystems: Vec<FsMirrorStatus>,
}

/// A configured peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub client_name: String,
    pub site_name: String,
    pub fs_name: String,
    #[serde(default)]
    pub mon_host: String,
}

/// Configured peers keyed by id.
pub type PeerList = BTreeMap<PeerUuid, PeerInfo>;

/// Parse a `fs snapshot mirror daemon status` reply.
pub fn parse_daemon_status(res: Response) -> Result<Vec<DaemonStatus>> {
    res.no_status().decode()
}

/// Parse a `fs snapshot mirror peer_list` reply. A file system without peers
/// may answer with an empty body.
pub fn parse_peer_list(res: Response) -> Result<PeerList> {
    let mut peers = PeerList::new();
    res.no_status().unmarshal(&mut peers).end()?;
    Ok(peers)
}

/// Snapshot mirroring commands, bound to an admin handle.
pub struct SnapshotMirror<'a, E> {
    fsa: &'a FsAdmin<E>,
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Snapshot mirroring commands.
    pub fn snapshot_mirror(&self) -> SnapshotMirror<'_, E> {
        SnapshotMirror { fsa: self }
    }
}

impl<'a, E: CommandExecutor> SnapshotMirror<'a, E> {
    fn fs_command(prefix: &str, fs_name: &str) -> Command {
        Command::new(prefix).arg("fs_name", fs_name)
    }

    /// Enable snapshot mirroring for a file system.
    pub fn enable(&self, fs_name: &str) -> Result<()> {
        check_empty(self.fsa.mgr(&Self::fs_command("fs snapshot mirror enable", fs_name)))
    }

    /// Disable snapshot mirroring for a file system.
    pub fn disable(&self, fs_name: &str) -> Result<()> {
        check_empty(self.fsa.mgr(&Self::fs_command("fs snapshot mirror disable", fs_name)))
    }

    /// Mirror snapshots of a directory.
    pub fn add(&self, fs_name: &str, path: &str) -> Result<()> {
        let cmd = Self::fs_command("fs snapshot mirror add", fs_name).arg("path", path);
        check_empty(self.fsa.mgr(&cmd))
    }

    /// Stop mirroring a directory.
    pub fn remove(&self, fs_name: &str, path: &str) -> Result<()> {
        let cmd = Self::fs_command("fs snapshot mirror remove", fs_name).arg("path", path);
        check_empty(self.fsa.mgr(&cmd))
    }

    /// Create a token the other site imports to peer with this one.
    pub fn create_peer_bootstrap_token(
        &self,
        fs_name: &str,
        client: &str,
        site: &str,
    ) -> Result<BootstrapToken> {
        let cmd = Self::fs_command("fs snapshot mirror peer_bootstrap create", fs_name)
            .arg("client_name", client)
            .non_empty("site_name", site);
        let reply: BootstrapTokenReply = self.fsa.mgr(&cmd).no_status().decode()?;
        info!(fs = fs_name, client, site, "created peer bootstrap token");
        Ok(reply.token)
    }

    /// Peer with the site that created `token`.
    pub fn import_peer_bootstrap_token(&self, fs_name: &str, token: &BootstrapToken) -> Result<()> {
        let cmd = Self::fs_command("fs snapshot mirror peer_bootstrap import", fs_name)
            .arg("token", token.as_str());
        check_empty(self.fsa.mgr(&cmd))?;
        info!(fs = fs_name, "imported peer bootstrap token");
        Ok(())
    }

    /// Add a peer by cluster spec (`client@cluster`). The remote file system
    /// defaults to the local name.
    pub fn peer_add(
        &self,
        fs_name: &str,
        remote_cluster_spec: &str,
        remote_fs_name: Option<&str>,
    ) -> Result<()> {
        let cmd = Self::fs_command("fs snapshot mirror peer_add", fs_name)
            .arg("remote_cluster_spec", remote_cluster_spec)
            .opt_arg("remote_fs_name", remote_fs_name.filter(|n| !n.is_empty()));
        check_empty(self.fsa.mgr(&cmd))?;
        info!(fs = fs_name, remote = remote_cluster_spec, "added mirror peer");
        Ok(())
    }

    /// Remove a peer.
    pub fn peer_remove(&self, fs_name: &str, uuid: &PeerUuid) -> Result<()> {
        let cmd = Self::fs_command("fs snapshot mirror peer_remove", fs_name)
            .arg("peer_uuid", uuid.as_str());
        check_empty(self.fsa.mgr(&cmd))?;
        info!(fs = fs_name, peer = %uuid, "removed mirror peer");
        Ok(())
    }

    /// Configured peers of a file system.
    pub fn peer_list(&self, fs_name: &str) -> Result<PeerList> {
        parse_peer_list(self.fsa.mgr(&Self::fs_command("fs snapshot mirror peer_list", fs_name)))
    }

    /// Status of the mirroring daemons serving a file system.
    pub fn daemon_status(&self, fs_name: &str) -> Result<Vec<DaemonStatus>> {
        parse_daemon_status(
            self.fsa
                .mgr(&Self::fs_command("fs snapshot mirror daemon status", fs_name)),
        )
    }
}

/// One peer of a mirrored file system, as seen by one daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSummary {
    pub daemon_id: DaemonId,
    pub uuid: PeerUuid,
    pub remote: PeerRemote,
    pub stats: PeerStats,
    /// The configured descriptor, when the peer list knows this peer.
    pub info: Option<PeerInfo>,
}

/// Mirroring state of one file system across all daemons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorSummary {
    pub fs_name: String,
    /// Daemons that report the file system.
    pub daemons: Vec<DaemonId>,
    /// Largest mirrored directory count reported by any daemon.
    pub directory_count: i64,
    pub peers: Vec<PeerSummary>,
    /// Configured peers that no daemon reports.
    pub unseen_peers: Vec<PeerUuid>,
}

impl MirrorSummary {
    /// Flatten daemon status for `fs_name` and join it with the peer list.
    pub fn from_status(fs_name: &str, daemons: &[DaemonStatus], peers: &PeerList) -> Self {
        let mut summary = MirrorSummary {
            fs_name: fs_name.to_string(),
            ..MirrorSummary::default()
        };
        for daemon in daemons {
            for fs in daemon.filesystems.iter().filter(|fs| fs.name == fs_name) {
                if !summary.daemons.contains(&daemon.daemon_id) {
                    summary.daemons.push(daemon.daemon_id);
                }
                summary.directory_count = summary.directory_count.max(fs.directory_count);
                summary.peers.extend(fs.peers.iter().map(|p| PeerSummary {
                    daemon_id: daemon.daemon_id,
                    uuid: p.uuid.clone(),
                    remote: p.remote.clone(),
                    stats: p.stats,
                    info: peers.get(&p.uuid).cloned(),
                }));
            }
        }
        summary.unseen_peers = peers
            .keys()
            .filter(|uuid| !summary.peers.iter().any(|p| &p.uuid == *uuid))
            .cloned()
            .collect();
        summary
    }

    /// Total sync failures across peers.
    pub fn failure_count(&self) -> u64 {
        self.peers.iter().map(|p| p.stats.failure_count).sum()
    }
}
