#![warn(missing_docs)]

//! Administrative command layer for distributed file system volumes: subvolume
//! lifecycle, snapshot clones, quiesce sets and cross-site snapshot mirroring,
//! spoken as JSON envelopes to the cluster manager.

pub mod admin;
pub mod bytecount;
pub mod cli;
pub mod clone;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod metadata;
pub mod mgr_module;
pub mod mirror;
pub mod pin;
pub mod quiesce;
pub mod response;
pub mod snapshot;
pub mod subvolume;
pub mod subvolumegroup;
pub mod timestamp;
pub mod volume;

pub use admin::FsAdmin;
pub use bytecount::{ByteCount, QuotaSize};
pub use clone::{CloneOptions, CloneRequest, CloneState, CloneStatus, CloneTracker};
pub use command::{Command, Mode};
pub use config::AdminConfig;
pub use error::{AdminError, ErrorKind, Result};
pub use executor::{CommandExecutor, ExecError, ReplayExecutor, Reply, TracingExecutor};
pub use mirror::{BootstrapToken, MirrorSummary, PeerUuid, SnapshotMirror};
pub use response::Response;
pub use subvolume::SubVolumeOptions;
pub use subvolumegroup::SubVolumeGroupOptions;
