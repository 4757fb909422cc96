//! Error types for the administrative command layer.

use crate::executor::ExecError;
use thiserror::Error;

/// `-EPERM` as reported by the cluster manager.
pub const EPERM: i32 = -1;
/// `-ENOENT` as reported by the cluster manager.
pub const ENOENT: i32 = -2;
/// `-EAGAIN` as reported by the cluster manager.
pub const EAGAIN: i32 = -11;
/// `-EEXIST` as reported by the cluster manager.
pub const EEXIST: i32 = -17;
/// `-EINVAL` as reported by the cluster manager.
pub const EINVAL: i32 = -22;
/// `-ENOTEMPTY` as reported by the cluster manager.
pub const ENOTEMPTY: i32 = -39;
/// `-EOPNOTSUPP` as reported by the cluster manager.
pub const EOPNOTSUPP: i32 = -95;

/// Coarse classification of an [`AdminError`].
///
/// Callers that only need to decide "retry, give up, or feature-detect" can
/// branch on this instead of matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The command executor could not deliver the command.
    Transport,
    /// The reply did not have the shape the operation expects.
    Protocol,
    /// The manager ran the command and reported a failure.
    Remote,
    /// The reply body could not be deserialized.
    Decode,
    /// The connected manager does not implement the operation.
    NotImplemented,
    /// The request was refused before anything was sent.
    Local,
}

/// Errors returned by administrative operations.
#[derive(Debug, Error)]
pub enum AdminError {
    /// The executor failed to dispatch the command.
    #[error("command dispatch failed: {0}")]
    Transport(ExecError),

    /// The manager returned an error code for the command.
    #[error("remote error {code}: {status:?}")]
    Remote {
        /// Negative errno reported by the manager.
        code: i32,
        /// Status text accompanying the failure.
        status: String,
    },

    /// The manager has no handler for the command.
    #[error("not implemented by the cluster manager: {status:?}")]
    NotImplemented {
        /// Status text or explanation accompanying the reply.
        status: String,
    },

    /// A clone was requested from a snapshot that must be protected first.
    #[error("snapshot is not protected: {status:?}")]
    NotProtected {
        /// Negative errno reported by the manager.
        code: i32,
        /// Status text accompanying the failure.
        status: String,
    },

    /// The reply carried a status where none was expected.
    #[error("response status not empty: {status:?}")]
    StatusNotEmpty {
        /// The unexpected status text.
        status: String,
    },

    /// The reply carried a body where none was expected.
    #[error("response body not empty ({} bytes)", body.len())]
    BodyNotEmpty {
        /// The unexpected body.
        body: Vec<u8>,
        /// Status text of the reply.
        status: String,
    },

    /// The reply had no body where a payload was required.
    #[error("response body empty")]
    BodyEmpty {
        /// Status text of the reply.
        status: String,
    },

    /// The reply body was not well-formed for the expected type.
    #[error("failed to decode response body: {source}")]
    Decode {
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
        /// The raw body, kept for diagnostics.
        body: Vec<u8>,
    },

    /// A decoded field held a value outside its known domain.
    #[error("unexpected {field} value in response: {value:?}")]
    UnexpectedValue {
        /// Name of the offending field.
        field: &'static str,
        /// The value as received.
        value: String,
    },

    /// A polled clone moved backwards or out of a terminal state.
    #[error("clone {clone} moved from {from} to {to}")]
    InvalidTransition {
        /// Clone name.
        clone: String,
        /// Previously observed state.
        from: String,
        /// Newly observed state.
        to: String,
    },

    /// Cancel was requested for a clone that already finished.
    #[error("clone {clone} already reached terminal state {state}")]
    CloneTerminal {
        /// Clone name.
        clone: String,
        /// The terminal state last observed.
        state: String,
    },

    /// The command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[source] serde_json::Error),
}

impl AdminError {
    /// Build the error for an executor failure, using the status text that
    /// accompanied it.
    pub fn from_exec(err: ExecError, status: &str) -> Self {
        match err {
            ExecError::Code(code)
                if code == EINVAL && status.starts_with(crate::response::NOT_IMPLEMENTED_PREFIX) =>
            {
                AdminError::NotImplemented {
                    status: status.to_string(),
                }
            }
            ExecError::Code(code) => AdminError::Remote {
                code,
                status: status.to_string(),
            },
            other => AdminError::Transport(other),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::Transport(_) => ErrorKind::Transport,
            AdminError::Remote { .. } | AdminError::NotProtected { .. } => ErrorKind::Remote,
            AdminError::NotImplemented { .. } => ErrorKind::NotImplemented,
            AdminError::StatusNotEmpty { .. }
            | AdminError::BodyNotEmpty { .. }
            | AdminError::BodyEmpty { .. }
            | AdminError::UnexpectedValue { .. }
            | AdminError::InvalidTransition { .. } => ErrorKind::Protocol,
            AdminError::Decode { .. } => ErrorKind::Decode,
            AdminError::CloneTerminal { .. } | AdminError::Encode(_) => ErrorKind::Local,
        }
    }

    /// The manager's negative errno, when the error carries one.
    pub fn error_code(&self) -> Option<i32> {
        match self {
            AdminError::Remote { code, .. } | AdminError::NotProtected { code, .. } => Some(*code),
            AdminError::NotImplemented { .. } => Some(EINVAL),
            _ => None,
        }
    }

    /// Status text attached to the error, if any.
    pub fn status(&self) -> Option<&str> {
        match self {
            AdminError::Remote { status, .. }
            | AdminError::NotImplemented { status }
            | AdminError::NotProtected { status, .. }
            | AdminError::StatusNotEmpty { status }
            | AdminError::BodyNotEmpty { status, .. }
            | AdminError::BodyEmpty { status } => Some(status),
            _ => None,
        }
    }

    /// The raw body that failed validation or decoding.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            AdminError::BodyNotEmpty { body, .. } | AdminError::Decode { body, .. } => Some(body),
            _ => None,
        }
    }

    /// True when the manager reported that the target does not exist.
    pub fn is_not_found(&self) -> bool {
        self.error_code() == Some(ENOENT)
    }

    /// True when the target already exists.
    pub fn is_already_exists(&self) -> bool {
        self.error_code() == Some(EEXIST)
    }

    /// True when the connected manager lacks the requested capability.
    pub fn is_not_implemented(&self) -> bool {
        self.kind() == ErrorKind::NotImplemented
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_code_maps_to_remote() {
        let err = AdminError::from_exec(ExecError::Code(ENOENT), "clone 'x' not found");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.error_code(), Some(-2));
        assert!(err.is_not_found());
        assert_eq!(err.status(), Some("clone 'x' not found"));
    }

    #[test]
    fn test_missing_handler_maps_to_not_implemented() {
        let err = AdminError::from_exec(
            ExecError::Code(EINVAL),
            "No handler found for 'fs quiesce'",
        );
        assert!(err.is_not_implemented());
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_einval_without_handler_text_is_remote() {
        let err = AdminError::from_exec(ExecError::Code(EINVAL), "invalid pin setting");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.error_code(), Some(EINVAL));
    }

    #[test]
    fn test_transport_errors_pass_through() {
        let err = AdminError::from_exec(ExecError::NotConnected, "ignored");
        assert!(matches!(err, AdminError::Transport(ExecError::NotConnected)));
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.error_code(), None);
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_protocol_errors_keep_diagnostics() {
        let err = AdminError::BodyNotEmpty {
            body: b"{\"x\":1}".to_vec(),
            status: String::new(),
        };
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.body(), Some(&b"{\"x\":1}"[..]));
        assert_eq!(err.to_string(), "response body not empty (7 bytes)");
    }
}
