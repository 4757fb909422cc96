//! Snapshot clones and their lifecycle.
//!
//! A clone is materialized asynchronously by the manager. Its state moves
//! `pending → in-progress → {complete | failed | canceled}`, and `pending` may
//! jump straight to a terminal state. [`CloneTracker`] drives one clone
//! through that lifecycle, one request per call; the caller owns the poll
//! interval and any timeout.

use crate::admin::{check_empty, FsAdmin};
use crate::command::Command;
use crate::error::{AdminError, Result};
use crate::executor::CommandExecutor;
use crate::response::Response;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

/// Status suffix the manager uses when a snapshot must be protected before
/// it can be cloned.
pub const NOT_PROTECTED_SUFFIX: &str = "is not protected";

/// Optional values used when cloning a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneOptions {
    /// Group for the new subvolume. `None` places it in the default group.
    pub target_group: Option<String>,
    /// Data pool layout for the new subvolume.
    pub pool_layout: Option<String>,
}

/// Where a clone is copied from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneSource {
    pub volume: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub subvolume: String,
    pub snapshot: String,
}

/// Copy progress of a running clone, as reported by the manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneProgress {
    #[serde(rename = "percentage cloned")]
    pub percentage_cloned: String,
    #[serde(rename = "amount cloned")]
    pub amount_cloned: String,
    #[serde(rename = "files cloned")]
    pub files_cloned: String,
}

/// Why a clone failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloneFailure {
    pub errno: String,
    #[serde(alias = "error_msg")]
    pub errstr: String,
}

/// State of a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneState {
    /// Queued.
    Pending,
    /// Copying; newer managers attach a progress report.
    InProgress(Option<CloneProgress>),
    /// Done.
    Complete,
    /// Gave up; newer managers attach the reason.
    Failed(Option<CloneFailure>),
    /// Canceled before completion.
    Canceled,
}

impl CloneState {
    /// Wire name of the state.
    pub fn name(&self) -> &'static str {
        match self {
            CloneState::Pending => "pending",
            CloneState::InProgress(_) => "in-progress",
            CloneState::Complete => "complete",
            CloneState::Failed(_) => "failed",
            CloneState::Canceled => "canceled",
        }
    }

    /// True for states that admit no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CloneState::Complete | CloneState::Failed(_) | CloneState::Canceled
        )
    }

    fn rank(&self) -> u8 {
        match self {
            CloneState::Pending => 0,
            CloneState::InProgress(_) => 1,
            _ => 2,
        }
    }

    /// Whether a later observation of `next` is consistent with having seen
    /// `self`. Repeating the same state is always allowed.
    pub fn can_advance_to(&self, next: &CloneState) -> bool {
        if self.name() == next.name() {
            return true;
        }
        !self.is_terminal() && next.rank() > self.rank()
    }

    /// The failure record of a failed clone.
    pub fn failure(&self) -> Option<&CloneFailure> {
        match self {
            CloneState::Failed(f) => f.as_ref(),
            _ => None,
        }
    }

    /// The progress report of a running clone.
    pub fn progress(&self) -> Option<&CloneProgress> {
        match self {
            CloneState::InProgress(p) => p.as_ref(),
            _ => None,
        }
    }
}

impl fmt::Display for CloneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One observation of a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneStatus {
    pub state: CloneState,
    pub source: CloneSource,
}

#[derive(Deserialize)]
struct WireStatus {
    state: String,
    #[serde(default)]
    source: CloneSource,
    #[serde(default)]
    progress_report: Option<CloneProgress>,
    #[serde(default)]
    failure: Option<CloneFailure>,
}

#[derive(Deserialize)]
struct WireCloneStatus {
    status: WireStatus,
    #[serde(default)]
    failure: Option<CloneFailure>,
}

/// Parse a `fs clone status` reply.
///
/// The failure record is accepted both beside and inside the `status` object.
pub fn parse_clone_status(res: Response) -> Result<CloneStatus> {
    let wire: WireCloneStatus = res.no_status().decode()?;
    let WireStatus {
        state,
        source,
        progress_report,
        failure,
    } = wire.status;
    let state = match state.as_str() {
        "pending" => CloneState::Pending,
        "in-progress" => CloneState::InProgress(progress_report),
        "complete" => CloneState::Complete,
        "failed" => CloneState::Failed(failure.or(wire.failure)),
        "canceled" | "cancelled" => CloneState::Canceled,
        _ => {
            return Err(AdminError::UnexpectedValue {
                field: "clone state",
                value: state,
            })
        }
    };
    Ok(CloneStatus { state, source })
}

fn clone_command(
    prefix: &str,
    volume: &str,
    group: Option<&str>,
    clone: &str,
) -> Command {
    Command::new(prefix)
        .arg("vol_name", volume)
        .group(group)
        .arg("clone_name", clone)
}

fn is_not_protected(status: &str) -> bool {
    status.trim_end().ends_with(NOT_PROTECTED_SUFFIX)
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Clone a snapshot into a new subvolume.
    ///
    /// Managers that require protected snapshots answer with
    /// [`AdminError::NotProtected`]; [`CloneTracker::start`] handles that.
    pub fn clone_subvolume_snapshot(
        &self,
        volume: &str,
        group: Option<&str>,
        subvolume: &str,
        snapshot: &str,
        name: &str,
        opts: Option<&CloneOptions>,
    ) -> Result<()> {
        let opts = opts.cloned().unwrap_or_default();
        let cmd = Command::new("fs subvolume snapshot clone")
            .arg("vol_name", volume)
            .group(group)
            .arg("sub_name", subvolume)
            .arg("snap_name", snapshot)
            .arg("target_sub_name", name)
            .opt_arg(
                "target_group_name",
                opts.target_group.as_deref().filter(|g| !g.is_empty()),
            )
            .opt_arg(
                "pool_layout",
                opts.pool_layout.as_deref().filter(|p| !p.is_empty()),
            );
        let res = self.mgr(&cmd).map_err(|err| match err {
            AdminError::Remote { code, status } if is_not_protected(&status) => {
                AdminError::NotProtected { code, status }
            }
            other => other,
        });
        check_empty(res)
    }

    /// Status of a clone. `group` is the group the clone was created in.
    pub fn clone_status(&self, volume: &str, group: Option<&str>, clone: &str) -> Result<CloneStatus> {
        parse_clone_status(self.mgr(&clone_command("fs clone status", volume, group, clone)))
    }

    /// Stop populating a clone. The clone subvolume itself is left in place.
    pub fn cancel_clone(&self, volume: &str, group: Option<&str>, clone: &str) -> Result<()> {
        check_empty(self.mgr(&clone_command("fs clone cancel", volume, group, clone)))
    }
}

/// Everything needed to start a clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneRequest {
    pub volume: String,
    pub group: Option<String>,
    pub subvolume: String,
    pub snapshot: String,
    pub name: String,
    pub options: CloneOptions,
}

impl CloneRequest {
    /// Clone `subvolume@snapshot` of the default group into `name`.
    pub fn new(volume: &str, subvolume: &str, snapshot: &str, name: &str) -> Self {
        Self {
            volume: volume.to_string(),
            group: None,
            subvolume: subvolume.to_string(),
            snapshot: snapshot.to_string(),
            name: name.to_string(),
            options: CloneOptions::default(),
        }
    }

    /// Source group.
    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    /// Group of the new subvolume.
    pub fn target_group(mut self, group: &str) -> Self {
        self.options.target_group = Some(group.to_string());
        self
    }

    /// Pool layout of the new subvolume.
    pub fn pool_layout(mut self, layout: &str) -> Self {
        self.options.pool_layout = Some(layout.to_string());
        self
    }
}

/// Drives one clone from request to terminal state.
pub struct CloneTracker<'a, E> {
    fsa: &'a FsAdmin<E>,
    request: CloneRequest,
    protected_source: bool,
    last: Option<CloneState>,
}

impl<'a, E: CommandExecutor> CloneTracker<'a, E> {
    /// Request the clone. If the source snapshot must be protected first, it
    /// is protected and the clone retried once; the tracker remembers this so
    /// [`release_source`](Self::release_source) can undo it. If the retry
    /// fails the snapshot is unprotected again before the retry error is
    /// returned.
    pub fn start(fsa: &'a FsAdmin<E>, request: CloneRequest) -> Result<Self> {
        let mut tracker = Self {
            fsa,
            request,
            protected_source: false,
            last: None,
        };
        match tracker.request_clone() {
            Err(AdminError::NotProtected { status, .. }) => {
                info!(
                    clone = %tracker.request.name,
                    snapshot = %tracker.request.snapshot,
                    status = %status,
                    "protecting clone source snapshot"
                );
                let r = &tracker.request;
                fsa.protect_subvolume_snapshot(
                    &r.volume,
                    r.group.as_deref(),
                    &r.subvolume,
                    &r.snapshot,
                )?;
                tracker.protected_source = true;
                if let Err(err) = tracker.request_clone() {
                    if let Err(release_err) = tracker.release_source() {
                        warn!(
                            clone = %tracker.request.name,
                            snapshot = %tracker.request.snapshot,
                            error = %release_err,
                            "failed to unprotect clone source after retry failed"
                        );
                    }
                    return Err(err);
                }
            }
            other => other?,
        }
        info!(clone = %tracker.request.name, volume = %tracker.request.volume, "clone requested");
        Ok(tracker)
    }

    fn request_clone(&self) -> Result<()> {
        let r = &self.request;
        self.fsa.clone_subvolume_snapshot(
            &r.volume,
            r.group.as_deref(),
            &r.subvolume,
            &r.snapshot,
            &r.name,
            Some(&r.options),
        )
    }

    /// Name of the clone subvolume.
    pub fn clone_name(&self) -> &str {
        &self.request.name
    }

    /// The request this tracker was started with.
    pub fn request(&self) -> &CloneRequest {
        &self.request
    }

    /// Whether the source snapshot was protected by [`start`](Self::start)
    /// and not yet released.
    pub fn protected_source(&self) -> bool {
        self.protected_source
    }

    /// The state seen by the most recent poll.
    pub fn last_state(&self) -> Option<&CloneState> {
        self.last.as_ref()
    }

    /// Query the clone once and validate the observed transition.
    pub fn poll(&mut self) -> Result<CloneStatus> {
        let r = &self.request;
        let status = self.fsa.clone_status(
            &r.volume,
            r.options.target_group.as_deref(),
            &r.name,
        )?;
        if let Some(prev) = &self.last {
            if !prev.can_advance_to(&status.state) {
                return Err(AdminError::InvalidTransition {
                    clone: r.name.clone(),
                    from: prev.name().to_string(),
                    to: status.state.name().to_string(),
                });
            }
        }
        let changed = self
            .last
            .as_ref()
            .map_or(true, |prev| prev.name() != status.state.name());
        if changed {
            match status.state.failure() {
                Some(failure) => warn!(
                    clone = %r.name,
                    errno = %failure.errno,
                    error = %failure.errstr,
                    "clone failed"
                ),
                None => info!(clone = %r.name, state = %status.state, "clone state changed"),
            }
        }
        self.last = Some(status.state.clone());
        Ok(status)
    }

    /// Ask the manager to stop the clone. Refused locally once a terminal
    /// state has been observed. The clone subvolume is not removed.
    pub fn cancel(&self) -> Result<()> {
        if let Some(state) = self.last.as_ref().filter(|s| s.is_terminal()) {
            return Err(AdminError::CloneTerminal {
                clone: self.request.name.clone(),
                state: state.name().to_string(),
            });
        }
        let r = &self.request;
        self.fsa
            .cancel_clone(&r.volume, r.options.target_group.as_deref(), &r.name)?;
        info!(clone = %r.name, "clone cancel requested");
        Ok(())
    }

    /// Unprotect the source snapshot if [`start`](Self::start) protected it.
    /// Returns whether an unprotect command was sent.
    pub fn release_source(&mut self) -> Result<bool> {
        if !self.protected_source {
            return Ok(false);
        }
        let r = &self.request;
        self.fsa.unprotect_subvolume_snapshot(
            &r.volume,
            r.group.as_deref(),
            &r.subvolume,
            &r.snapshot,
        )?;
        self.protected_source = false;
        Ok(true)
    }
}
