use crate::bytecount::{ByteCount, QuotaSize};
use crate::clone::{parse_clone_status, CloneOptions};
use crate::command::{Mode, SubVolRmFlags};
use crate::config::AdminConfig;
use crate::executor::{ExecError, ReplayExecutor, Reply, TracingExecutor};
use crate::mgr_module::parse_module_info;
use crate::mirror::{parse_daemon_status, parse_peer_list, PeerUuid};
use crate::quiesce::{parse_quiesce, FsQuiesceOptions};
use crate::response::Response;
use crate::snapshot::parse_snapshot_info;
use crate::subvolume::{parse_resize_result, parse_subvolume_info, SubVolumeOptions};
use crate::volume::{parse_dump_to_idents, parse_volume_info, parse_volume_status};
use crate::{admin::parse_list_names, FsAdmin};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser)]
#[command(name = "fsadmin")]
#[command(about = "File system administration command planner and reply decoder", long_about = None)]
pub struct Cli {
    #[arg(short, long, env = "FSADMIN_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(short, long)]
    pub volume: Option<String>,

    #[arg(short, long)]
    pub group: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the envelopes an operation would send, without a cluster.
    Plan {
        #[command(subcommand)]
        op: PlanOp,
    },
    /// Run a reply parser over a captured reply.
    Decode {
        kind: ReplyKind,
        #[arg(short, long)]
        body: PathBuf,
        #[arg(short, long, default_value = "")]
        status: String,
        #[arg(long, allow_hyphen_values = true)]
        code: Option<i32>,
    },
}

#[derive(Subcommand, Clone)]
pub enum PlanOp {
    VolumeLs,
    VolumeCreate {
        name: String,
    },
    VolumeRm {
        name: String,
    },
    SubvolumeCreate {
        name: String,
        #[arg(long)]
        size: Option<u64>,
        #[arg(long, value_parser = parse_mode)]
        mode: Option<u32>,
        #[arg(long)]
        uid: Option<u32>,
        #[arg(long)]
        gid: Option<u32>,
        #[arg(long)]
        pool_layout: Option<String>,
        #[arg(long)]
        namespace_isolated: bool,
        #[arg(long)]
        force: bool,
    },
    SubvolumeRm {
        name: String,
        #[arg(long)]
        force: bool,
        #[arg(long)]
        retain_snapshots: bool,
    },
    Resize {
        name: String,
        #[arg(value_parser = parse_quota)]
        size: QuotaSize,
        #[arg(long)]
        no_shrink: bool,
    },
    SnapshotCreate {
        subvolume: String,
        snapshot: String,
    },
    Clone {
        subvolume: String,
        snapshot: String,
        target: String,
        #[arg(long)]
        target_group: Option<String>,
        #[arg(long)]
        pool_layout: Option<String>,
    },
    CloneStatus {
        clone: String,
    },
    CloneCancel {
        clone: String,
    },
    MirrorEnable {
        fs_name: String,
    },
    MirrorAdd {
        fs_name: String,
        path: String,
    },
    BootstrapCreate {
        fs_name: String,
        site: String,
        #[arg(long)]
        client: Option<String>,
    },
    PeerRemove {
        fs_name: String,
        uuid: String,
    },
    DaemonStatus {
        fs_name: String,
    },
    Quiesce {
        subvolumes: Vec<String>,
        #[arg(long)]
        set_id: Option<String>,
        #[arg(long)]
        timeout: Option<f64>,
        #[arg(long)]
        expiration: Option<f64>,
        #[arg(long)]
        release: bool,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReplyKind {
    Names,
    Dump,
    VolumeStatus,
    VolumeInfo,
    SubvolumeInfo,
    SnapshotInfo,
    Resize,
    CloneStatus,
    DaemonStatus,
    PeerList,
    Quiesce,
    Modules,
}

fn parse_mode(s: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(s.trim_start_matches("0o"), 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))
}

fn parse_quota(s: &str) -> std::result::Result<QuotaSize, String> {
    if s == "infinite" {
        return Ok(QuotaSize::Infinite);
    }
    s.parse::<u64>()
        .map(|n| QuotaSize::Bytes(ByteCount(n)))
        .map_err(|e| format!("invalid size {s:?}: {e}"))
}

impl Cli {
    pub fn load_config(&self) -> Result<AdminConfig> {
        match &self.config {
            Some(path) => AdminConfig::from_file(path),
            None => Ok(AdminConfig::default()),
        }
    }

    pub fn run(self, config: &AdminConfig) -> Result<()> {
        match &self.command {
            Command::Plan { op } => {
                for line in self.plan(config, op)? {
                    println!("{}", line);
                }
                Ok(())
            }
            Command::Decode {
                kind,
                body,
                status,
                code,
            } => {
                let body = std::fs::read(body)?;
                let reply = Reply {
                    body,
                    status: status.clone(),
                    error: code.map(ExecError::Code),
                };
                println!("{}", decode_reply(*kind, reply)?);
                Ok(())
            }
        }
    }

    /// Run `op` against a recording executor and render each envelope it
    /// sent as one JSON line.
    pub fn plan(&self, config: &AdminConfig, op: &PlanOp) -> Result<Vec<String>> {
        let exec = ReplayExecutor::new();
        if config.trace_commands {
            let fsa = FsAdmin::new(TracingExecutor::new(&exec));
            self.dispatch(config, &fsa, op);
        } else {
            let fsa = FsAdmin::new(&exec);
            self.dispatch(config, &fsa, op);
        }
        exec.take_recorded()
            .into_iter()
            .map(|rec| serde_json::to_string(&rec).map_err(anyhow::Error::from))
            .collect()
    }

    fn dispatch<E: crate::CommandExecutor>(&self, config: &AdminConfig, fsa: &FsAdmin<E>, op: &PlanOp) {
        let volume = config.volume_or_default(self.volume.as_deref());
        let group = config.group_or_default(self.group.as_deref());

        // Replies are empty, so operations that expect a payload report an
        // error after their envelope has been recorded.
        let outcome = match op {
            PlanOp::VolumeLs => fsa.list_volumes().map(drop),
            PlanOp::VolumeCreate { name } => fsa.create_volume(name),
            PlanOp::VolumeRm { name } => fsa.remove_volume(name),
            PlanOp::SubvolumeCreate {
                name,
                size,
                mode,
                uid,
                gid,
                pool_layout,
                namespace_isolated,
                force,
            } => {
                let opts = SubVolumeOptions {
                    size: size.map(ByteCount),
                    uid: *uid,
                    gid: *gid,
                    mode: mode.map(Mode),
                    pool_layout: pool_layout.clone(),
                    namespace_isolated: *namespace_isolated,
                    force: *force,
                };
                fsa.create_subvolume(volume, group, name, Some(&opts))
            }
            PlanOp::SubvolumeRm {
                name,
                force,
                retain_snapshots,
            } => {
                let flags = SubVolRmFlags {
                    force: *force,
                    retain_snapshots: *retain_snapshots,
                };
                fsa.remove_subvolume_with_flags(volume, group, name, flags)
            }
            PlanOp::Resize {
                name,
                size,
                no_shrink,
            } => fsa
                .resize_subvolume(volume, group, name, *size, *no_shrink)
                .map(drop),
            PlanOp::SnapshotCreate {
                subvolume,
                snapshot,
            } => fsa.create_subvolume_snapshot(volume, group, subvolume, snapshot),
            PlanOp::Clone {
                subvolume,
                snapshot,
                target,
                target_group,
                pool_layout,
            } => {
                let opts = CloneOptions {
                    target_group: target_group.clone(),
                    pool_layout: pool_layout.clone(),
                };
                fsa.clone_subvolume_snapshot(volume, group, subvolume, snapshot, target, Some(&opts))
            }
            PlanOp::CloneStatus { clone } => fsa.clone_status(volume, group, clone).map(drop),
            PlanOp::CloneCancel { clone } => fsa.cancel_clone(volume, group, clone),
            PlanOp::MirrorEnable { fs_name } => fsa
                .enable_mirroring_module(false)
                .and_then(|()| fsa.snapshot_mirror().enable(fs_name)),
            PlanOp::MirrorAdd { fs_name, path } => fsa.snapshot_mirror().add(fs_name, path),
            PlanOp::BootstrapCreate {
                fs_name,
                site,
                client,
            } => {
                let client = client.as_deref().unwrap_or(config.mirror_client.as_str());
                fsa.snapshot_mirror()
                    .create_peer_bootstrap_token(fs_name, client, site)
                    .map(drop)
            }
            PlanOp::PeerRemove { fs_name, uuid } => fsa
                .snapshot_mirror()
                .peer_remove(fs_name, &PeerUuid::from(uuid.as_str())),
            PlanOp::DaemonStatus { fs_name } => {
                fsa.snapshot_mirror().daemon_status(fs_name).map(drop)
            }
            PlanOp::Quiesce {
                subvolumes,
                set_id,
                timeout,
                expiration,
                release,
            } => {
                let opts = FsQuiesceOptions {
                    timeout: *timeout,
                    expiration: *expiration,
                    release: *release,
                    ..FsQuiesceOptions::default()
                };
                let members: Vec<&str> = subvolumes.iter().map(String::as_str).collect();
                fsa.fs_quiesce(volume, group, &members, set_id.as_deref(), Some(&opts))
                    .map(drop)
            }
        };
        if let Err(err) = outcome {
            debug!(error = %err, "dry-run reply not accepted");
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Run the parser for `kind` over `reply` and render the result as JSON.
pub fn decode_reply(kind: ReplyKind, reply: Reply) -> Result<String> {
    let res = Response::from(reply);
    match kind {
        ReplyKind::Names => pretty(&parse_list_names(res)?),
        ReplyKind::Dump => pretty(&parse_dump_to_idents(res)?),
        ReplyKind::VolumeStatus => pretty(&parse_volume_status(res)?),
        ReplyKind::VolumeInfo => pretty(&parse_volume_info(res)?),
        ReplyKind::SubvolumeInfo => pretty(&parse_subvolume_info(res)?),
        ReplyKind::SnapshotInfo => pretty(&parse_snapshot_info(res)?),
        ReplyKind::Resize => pretty(&parse_resize_result(res)?),
        ReplyKind::CloneStatus => {
            let status = parse_clone_status(res)?;
            pretty(&serde_json::json!({
                "state": status.state.name(),
                "source": status.source,
                "progress": status.state.progress(),
                "failure": status.state.failure(),
            }))
        }
        ReplyKind::DaemonStatus => pretty(&parse_daemon_status(res)?),
        ReplyKind::PeerList => pretty(&parse_peer_list(res)?),
        ReplyKind::Quiesce => pretty(&parse_quiesce(res)?),
        ReplyKind::Modules => pretty(&parse_module_info(res)?),
    }
}
