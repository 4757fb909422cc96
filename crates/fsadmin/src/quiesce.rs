//! Quiesce sets: pausing I/O on a group of subvolumes, e.g. for a consistent
//! multi-subvolume snapshot. Only recent managers implement this; older ones
//! answer with [`AdminError::NotImplemented`](crate::AdminError::NotImplemented).

use crate::admin::FsAdmin;
use crate::command::Command;
use crate::error::Result;
use crate::executor::CommandExecutor;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Optional values for a quiesce request. Unset values use the manager's
/// defaults; boolean switches are sent only when set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FsQuiesceOptions {
    /// Seconds to reach the quiesced state before the set times out.
    pub timeout: Option<f64>,
    /// Seconds the set stays quiesced before it expires.
    pub expiration: Option<f64>,
    /// Seconds to block waiting for the set to settle.
    pub await_for: Option<f64>,
    pub await_quiesce: bool,
    /// Only act if the set is still at this version.
    pub if_version: Option<u64>,
    pub include: bool,
    pub exclude: bool,
    pub reset: bool,
    pub release: bool,
    pub query: bool,
    pub all: bool,
    pub cancel: bool,
}

/// State of a set or a member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuiesceState {
    pub name: String,
    #[serde(default)]
    pub age: f64,
}

/// A member of a quiesce set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuiesceMember {
    #[serde(default)]
    pub excluded: bool,
    #[serde(default)]
    pub state: QuiesceState,
}

/// One quiesce set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuiesceInfo {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub age_ref: f64,
    #[serde(default)]
    pub state: QuiesceState,
    #[serde(default)]
    pub timeout: f64,
    #[serde(default)]
    pub expiration: f64,
    #[serde(default)]
    pub members: BTreeMap<String, QuiesceMember>,
}

/// Reply to a quiesce request, covering every set it touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuiesceInfoMulti {
    #[serde(default)]
    pub epoch: u64,
    #[serde(default)]
    pub set_version: u64,
    #[serde(default)]
    pub sets: BTreeMap<String, QuiesceInfo>,
}

/// Parse a `fs quiesce` reply.
pub fn parse_quiesce(res: Response) -> Result<QuiesceInfoMulti> {
    res.no_status().decode()
}

fn member_name(group: Option<&str>, subvolume: &str) -> String {
    match group.filter(|g| !g.is_empty()) {
        Some(group) => format!("{group}/{subvolume}"),
        None => subvolume.to_string(),
    }
}

fn quiesce_command(
    volume: &str,
    group: Option<&str>,
    subvolumes: &[&str],
    set_id: Option<&str>,
    o: &FsQuiesceOptions,
) -> Command {
    let members: Vec<String> = subvolumes.iter().map(|s| member_name(group, s)).collect();
    Command::new("fs quiesce")
        .arg("vol_name", volume)
        .arg("members", members)
        .opt_arg("set_id", set_id.filter(|s| !s.is_empty()))
        .opt_arg("timeout", o.timeout)
        .opt_arg("expiration", o.expiration)
        .opt_arg("await_for", o.await_for)
        .flag("await", o.await_quiesce)
        .opt_arg("if_version", o.if_version)
        .flag("include", o.include)
        .flag("exclude", o.exclude)
        .flag("reset", o.reset)
        .flag("release", o.release)
        .flag("query", o.query)
        .flag("all", o.all)
        .flag("cancel", o.cancel)
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Create, update or query a quiesce set over subvolumes of one group.
    pub fn fs_quiesce(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolumes: &[&str],
        set_id: Option<&str>,
        opts: Option<&FsQuiesceOptions>,
    ) -> Result<QuiesceInfoMulti> {
        let opts = opts.cloned().unwrap_or_default();
        parse_quiesce(self.mgr(&quiesce_command(volume, group, subvolumes, set_id, &opts)))
    }
}
