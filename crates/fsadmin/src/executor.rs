//! The command executor seam.
//!
//! This crate never opens connections. It hands a serialized command envelope
//! to a [`CommandExecutor`] supplied by the surrounding cluster connection and
//! gets back a [`Reply`]. Wrappers in this module layer tracing or recording on
//! top of any executor.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, trace};

/// Failure reported by the executor in the error slot of a reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// No live connection is available.
    #[error("not connected")]
    NotConnected,
    /// The command could not be delivered or the reply not read.
    #[error("transport failure: {0}")]
    Io(String),
    /// The manager ran the command and returned a negative errno.
    #[error("manager returned error code {0}")]
    Code(i32),
}

/// The three-part reply to a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    /// Structured (JSON) body; often empty for mutating commands.
    pub body: Vec<u8>,
    /// Free-text status; empty on success unless informational.
    pub status: String,
    /// Executor or manager failure.
    pub error: Option<ExecError>,
}

impl Reply {
    /// An empty successful reply.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A successful reply carrying a body.
    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// A successful reply carrying only status text.
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// A reply for a command the manager rejected with `code`.
    pub fn failed(code: i32, status: impl Into<String>) -> Self {
        Self {
            body: Vec::new(),
            status: status.into(),
            error: Some(ExecError::Code(code)),
        }
    }

    /// A reply for a command that never reached the manager.
    pub fn transport(err: ExecError) -> Self {
        Self {
            error: Some(err),
            ..Self::default()
        }
    }
}

impl From<(Vec<u8>, String, Option<ExecError>)> for Reply {
    fn from((body, status, error): (Vec<u8>, String, Option<ExecError>)) -> Self {
        Self {
            body,
            status,
            error,
        }
    }
}

/// Executes JSON command envelopes against the cluster managers.
///
/// Implementations are expected to block until the reply is available. Whether
/// an executor can be shared between threads is up to the implementation; this
/// crate adds no locking of its own.
pub trait CommandExecutor {
    /// Send a command to the manager daemon.
    fn mgr_command(&self, envelope: &[u8]) -> Reply;

    /// Send a command to the monitors.
    fn mon_command(&self, envelope: &[u8]) -> Reply;
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for &E {
    fn mgr_command(&self, envelope: &[u8]) -> Reply {
        (**self).mgr_command(envelope)
    }

    fn mon_command(&self, envelope: &[u8]) -> Reply {
        (**self).mon_command(envelope)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Box<E> {
    fn mgr_command(&self, envelope: &[u8]) -> Reply {
        (**self).mgr_command(envelope)
    }

    fn mon_command(&self, envelope: &[u8]) -> Reply {
        (**self).mon_command(envelope)
    }
}

impl<E: CommandExecutor + ?Sized> CommandExecutor for Arc<E> {
    fn mgr_command(&self, envelope: &[u8]) -> Reply {
        (**self).mgr_command(envelope)
    }

    fn mon_command(&self, envelope: &[u8]) -> Reply {
        (**self).mon_command(envelope)
    }
}

/// Logs every envelope and reply passing through the wrapped executor.
pub struct TracingExecutor<E> {
    inner: E,
}

impl<E: CommandExecutor> TracingExecutor<E> {
    /// Wrap `inner`.
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    /// The wrapped executor.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Unwrap the inner executor.
    pub fn into_inner(self) -> E {
        self.inner
    }

    fn traced(daemon: Target, reply: Reply) -> Reply {
        trace!(daemon = ?daemon, out = %String::from_utf8_lossy(&reply.body), "command reply body");
        debug!(
            daemon = ?daemon,
            body_len = reply.body.len(),
            status = %reply.status,
            error = ?reply.error,
            "command replied"
        );
        reply
    }
}

impl<E: CommandExecutor> CommandExecutor for TracingExecutor<E> {
    fn mgr_command(&self, envelope: &[u8]) -> Reply {
        debug!(daemon = ?Target::Mgr, envelope = %String::from_utf8_lossy(envelope), "sending command");
        Self::traced(Target::Mgr, self.inner.mgr_command(envelope))
    }

    fn mon_command(&self, envelope: &[u8]) -> Reply {
        debug!(daemon = ?Target::Mon, envelope = %String::from_utf8_lossy(envelope), "sending command");
        Self::traced(Target::Mon, self.inner.mon_command(envelope))
    }
}

/// Which daemon a command was addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Manager daemon.
    Mgr,
    /// Monitors.
    Mon,
}

/// A command captured by a [`ReplayExecutor`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedCommand {
    /// Addressed daemon.
    pub target: Target,
    /// The envelope, parsed back into JSON. Non-JSON envelopes are kept as a
    /// JSON string.
    pub command: serde_json::Value,
}

impl RecordedCommand {
    /// The `prefix` discriminator of the recorded command.
    pub fn prefix(&self) -> Option<&str> {
        self.command.get("prefix").and_then(|p| p.as_str())
    }

    /// A string field of the recorded command.
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.command.get(key)
    }
}

/// Records every command and answers from a queue of scripted replies.
///
/// When the queue runs dry every further command gets an empty successful
/// reply, which makes the executor usable as a dry-run sink. Useful for tests,
/// fault injection and offline planning.
#[derive(Default)]
pub struct ReplayExecutor {
    replies: Mutex<VecDeque<Reply>>,
    recorded: Mutex<Vec<RecordedCommand>>,
}

impl ReplayExecutor {
    /// An executor with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// An executor that answers with `replies` in order.
    pub fn with_replies(replies: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            recorded: Mutex::new(Vec::new()),
        }
    }

    /// Queue one more reply.
    pub fn push(&self, reply: Reply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// All commands seen so far.
    pub fn recorded(&self) -> Vec<RecordedCommand> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Drain the recorded commands.
    pub fn take_recorded(&self) -> Vec<RecordedCommand> {
        std::mem::take(&mut *self.recorded.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Number of scripted replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn answer(&self, target: Target, envelope: &[u8]) -> Reply {
        let command = serde_json::from_slice(envelope).unwrap_or_else(|_| {
            serde_json::Value::String(String::from_utf8_lossy(envelope).into_owned())
        });
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedCommand { target, command });
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_default()
    }
}

impl CommandExecutor for ReplayExecutor {
    fn mgr_command(&self, envelope: &[u8]) -> Reply {
        self.answer(Target::Mgr, envelope)
    }

    fn mon_command(&self, envelope: &[u8]) -> Reply {
        self.answer(Target::Mon, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_answers_in_order_then_empty() {
        let exec = ReplayExecutor::with_replies(vec![
            Reply::with_body("[]"),
            Reply::failed(-2, "nope"),
        ]);
        assert_eq!(exec.pending_replies(), 2);

        let r1 = exec.mgr_command(br#"{"prefix":"fs volume ls"}"#);
        assert_eq!(r1.body, b"[]");
        let r2 = exec.mon_command(br#"{"prefix":"fs dump"}"#);
        assert_eq!(r2.error, Some(ExecError::Code(-2)));
        let r3 = exec.mgr_command(b"not json");
        assert_eq!(r3, Reply::empty());

        let rec = exec.recorded();
        assert_eq!(rec.len(), 3);
        assert_eq!(rec[0].target, Target::Mgr);
        assert_eq!(rec[0].prefix(), Some("fs volume ls"));
        assert_eq!(rec[1].target, Target::Mon);
        assert_eq!(rec[2].command, serde_json::json!("not json"));
    }

    #[test]
    fn test_take_recorded_drains() {
        let exec = ReplayExecutor::new();
        exec.mgr_command(br#"{"prefix":"a"}"#);
        assert_eq!(exec.take_recorded().len(), 1);
        assert!(exec.recorded().is_empty());
    }

    #[test]
    fn test_blanket_impls_forward() {
        let exec = Arc::new(ReplayExecutor::with_replies(vec![Reply::with_status("hi")]));
        let by_ref: &ReplayExecutor = &exec;
        let reply = by_ref.mgr_command(br#"{"prefix":"x"}"#);
        assert_eq!(reply.status, "hi");
        let boxed: Box<dyn CommandExecutor> = Box::new(ReplayExecutor::new());
        assert_eq!(boxed.mon_command(b"{}"), Reply::empty());
        assert_eq!(exec.recorded().len(), 1);
    }

    #[test]
    fn test_tracing_executor_is_transparent() {
        let traced = TracingExecutor::new(ReplayExecutor::with_replies(vec![Reply::failed(
            -22, "bad",
        )]));
        let reply = traced.mgr_command(br#"{"prefix":"fs subvolume pin"}"#);
        assert_eq!(reply, Reply::failed(-22, "bad"));
        assert_eq!(traced.into_inner().recorded().len(), 1);
    }
}
