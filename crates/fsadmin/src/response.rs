//! The response pipeline.
//!
//! A [`Response`] wraps one reply from the manager together with the first
//! error detected while processing it. Every operation takes the response by
//! value and returns it, and every operation is a no-op once an error is set,
//! so call sites read as a straight line:
//!
//! ```ignore
//! admin.mgr(&cmd).no_status().decode::<VolumeStatus>()
//! ```
//!
//! Operations are order sensitive: filters must run before the assertions
//! they are meant to relax.

use crate::error::{AdminError, Result};
use crate::executor::Reply;
use serde::de::DeserializeOwned;
use tracing::warn;

/// Status suffix the manager appends to commands scheduled for removal.
pub const DEPRECATED_SUFFIX: &str = "call is deprecated and will be removed in a future release";

/// Status prefix the manager uses when it has no handler for a command.
pub const NOT_IMPLEMENTED_PREFIX: &str = "No handler found";

/// A reply moving through validation.
#[derive(Debug)]
pub struct Response {
    body: Vec<u8>,
    status: String,
    err: Option<AdminError>,
}

impl Response {
    /// Wrap raw reply parts.
    pub fn new(body: Vec<u8>, status: String, err: Option<AdminError>) -> Self {
        Self { body, status, err }
    }

    /// A response that failed before any reply existed.
    pub fn failed(err: AdminError) -> Self {
        Self::new(Vec::new(), String::new(), Some(err))
    }

    /// True when no error has been recorded.
    pub fn ok(&self) -> bool {
        self.err.is_none()
    }

    /// The status text.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// The body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The recorded error, if any.
    pub fn error(&self) -> Option<&AdminError> {
        self.err.as_ref()
    }

    /// Finish processing: `Ok(())` or the recorded error.
    pub fn end(self) -> Result<()> {
        match self.err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Require an empty status. A deprecation notice counts as empty.
    pub fn no_status(self) -> Self {
        let r = self.filter_deprecated();
        if !r.ok() || r.status.is_empty() {
            return r;
        }
        let status = r.status.clone();
        Self {
            err: Some(AdminError::StatusNotEmpty { status }),
            ..r
        }
    }

    /// Require an empty body.
    pub fn no_body(self) -> Self {
        if !self.ok() || self.body.is_empty() {
            return self;
        }
        let err = AdminError::BodyNotEmpty {
            body: self.body.clone(),
            status: self.status.clone(),
        };
        Self {
            err: Some(err),
            ..self
        }
    }

    /// Require both an empty status and an empty body.
    pub fn no_data(self) -> Self {
        self.no_status().no_body()
    }

    /// Require a non-empty body.
    pub fn require_body(self) -> Self {
        if !self.ok() || !self.body.is_empty() {
            return self;
        }
        let status = self.status.clone();
        Self {
            err: Some(AdminError::BodyEmpty { status }),
            ..self
        }
    }

    /// Clear a deprecation notice from the status.
    pub fn filter_deprecated(self) -> Self {
        if !self.ok() || !self.status.ends_with(DEPRECATED_SUFFIX) {
            return self;
        }
        warn!(status = %self.status, "manager reported deprecated command");
        Self {
            status: String::new(),
            ..self
        }
    }

    /// Clear a status starting with `prefix`. Some commands report success
    /// with fixed informational text.
    pub fn filter_status_prefix(self, prefix: &str) -> Self {
        if !self.ok() || !self.status.starts_with(prefix) {
            return self;
        }
        Self {
            status: String::new(),
            ..self
        }
    }

    /// Clear a body starting with `prefix`.
    pub fn filter_body_prefix(self, prefix: &str) -> Self {
        if !self.ok() || !self.body.starts_with(prefix.as_bytes()) {
            return self;
        }
        Self {
            body: Vec::new(),
            ..self
        }
    }

    /// Deserialize the body into `target`.
    ///
    /// An empty body leaves `target` untouched. A malformed body records a
    /// decode error that keeps the raw bytes.
    pub fn unmarshal<T: DeserializeOwned>(self, target: &mut T) -> Self {
        if !self.ok() || self.body.is_empty() {
            return self;
        }
        match serde_json::from_slice(&self.body) {
            Ok(v) => {
                *target = v;
                self
            }
            Err(source) => {
                let body = self.body.clone();
                Self {
                    err: Some(AdminError::Decode { source, body }),
                    ..self
                }
            }
        }
    }

    /// Finish processing by deserializing a required body.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        let r = self.require_body();
        if let Some(err) = r.err {
            return Err(err);
        }
        serde_json::from_slice(&r.body).map_err(|source| AdminError::Decode {
            source,
            body: r.body,
        })
    }

    /// Finish processing by returning the body as trimmed text.
    pub fn text(self) -> Result<String> {
        if let Some(err) = self.err {
            return Err(err);
        }
        Ok(String::from_utf8_lossy(&self.body).trim().to_string())
    }

    /// Rewrite a recorded error. Used to give operation specific meaning to
    /// generic remote failures.
    pub fn map_err(self, f: impl FnOnce(AdminError) -> AdminError) -> Self {
        match self.err {
            None => self,
            Some(err) => Self {
                err: Some(f(err)),
                ..self
            },
        }
    }
}

impl From<Reply> for Response {
    fn from(reply: Reply) -> Self {
        let err = reply
            .error
            .map(|e| AdminError::from_exec(e, &reply.status));
        Self::new(reply.body, reply.status, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, EINVAL};
    use crate::executor::ExecError;
    use std::collections::HashMap;

    fn r1() -> Response {
        Response::from(Reply::with_body(r#"{"foo": "bar", "baz": 1}"#))
    }

    fn r2() -> Response {
        Response::from(Reply {
            body: Vec::new(),
            status: "System notice: disabled for maintenance".into(),
            error: Some(ExecError::Io("error one".into())),
        })
    }

    fn r3() -> Response {
        Response::from(Reply {
            body: br#"{"oof": "RAB", "baz": 8}"#.to_vec(),
            status: "reversed polarity detected".into(),
            error: None,
        })
    }

    #[test]
    fn test_ok() {
        assert!(r1().ok());
        assert!(!r2().ok());
        assert!(r3().ok());
    }

    #[test]
    fn test_status() {
        assert_eq!(r1().status(), "");
        assert_eq!(r2().status(), "System notice: disabled for maintenance");
        assert_eq!(r3().status(), "reversed polarity detected");
    }

    #[test]
    fn test_end() {
        assert!(r1().end().is_ok());
        let err = r2().end().unwrap_err();
        assert!(matches!(err, AdminError::Transport(ExecError::Io(ref m)) if m == "error one"));
    }

    #[test]
    fn test_no_status() {
        assert!(r1().no_status().ok());
        let x = r2().no_status();
        assert!(matches!(x.error(), Some(AdminError::Transport(_))));

        let x = r3().no_status();
        assert!(matches!(
            x.error(),
            Some(AdminError::StatusNotEmpty { status }) if status == "reversed polarity detected"
        ));
        assert_eq!(x.status(), "reversed polarity detected");
    }

    #[test]
    fn test_no_body() {
        let x = r1().no_body();
        assert!(matches!(x.error(), Some(AdminError::BodyNotEmpty { .. })));
        assert_eq!(x.status(), "");

        assert!(matches!(r2().no_body().error(), Some(AdminError::Transport(_))));
        assert!(Response::from(Reply::empty()).no_body().ok());
    }

    #[test]
    fn test_no_data() {
        let x = r1().no_data();
        assert!(matches!(x.error(), Some(AdminError::BodyNotEmpty { .. })));
        let x = r3().no_data();
        assert!(matches!(x.error(), Some(AdminError::StatusNotEmpty { .. })));
        assert!(Response::from(Reply::empty()).no_data().end().is_ok());
    }

    #[test]
    fn test_filter_deprecated() {
        assert_eq!(r1().filter_deprecated().status(), "");
        assert!(!r2().filter_deprecated().ok());

        let x = Response::from(Reply::with_status(
            "blorple call is deprecated and will be removed in a future release",
        ))
        .filter_deprecated();
        assert!(x.ok());
        assert_eq!(x.status(), "");
        assert!(x.end().is_ok());
    }

    #[test]
    fn test_no_status_accepts_deprecation_notice() {
        let x = Response::from(Reply::with_status(
            "fs subvolume ls call is deprecated and will be removed in a future release",
        ))
        .no_status();
        assert!(x.ok());
        assert_eq!(x.status(), "");
    }

    #[test]
    fn test_unmarshal() {
        let mut v: HashMap<String, serde_json::Value> = HashMap::new();
        assert!(r1().unmarshal(&mut v).ok());
        assert_eq!(v["foo"], "bar");

        let mut untouched: HashMap<String, serde_json::Value> = HashMap::new();
        assert!(!r2().unmarshal(&mut untouched).ok());
        assert!(untouched.is_empty());

        let x = Response::from(Reply::with_body("foo!")).unmarshal(&mut v);
        assert!(!x.ok());
        let err = x.end().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
        assert_eq!(err.body(), Some(&b"foo!"[..]));
    }

    #[test]
    fn test_unmarshal_empty_body_is_noop() {
        let mut v: Vec<u32> = vec![7];
        assert!(Response::from(Reply::empty()).unmarshal(&mut v).ok());
        assert_eq!(v, vec![7]);
    }

    #[test]
    fn test_decode_requires_body() {
        let err = Response::from(Reply::empty())
            .decode::<Vec<u32>>()
            .unwrap_err();
        assert!(matches!(err, AdminError::BodyEmpty { .. }));
        let v: Vec<u32> = Response::from(Reply::with_body("[1,2]")).decode().unwrap();
        assert_eq!(v, vec![1, 2]);
        let err = Response::from(Reply::with_body("[1,")).decode::<Vec<u32>>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_not_implemented() {
        let r = Response::from(Reply::failed(EINVAL, "No handler found for this function"));
        assert!(!r.ok());
        let err = r.end().unwrap_err();
        assert!(err.is_not_implemented());
        assert!(err.to_string().contains("not implemented"));
    }

    #[test]
    fn test_filter_body_prefix() {
        let r = Response::from(Reply::with_body("No way, no how")).filter_body_prefix("No way");
        assert!(r.ok());
        assert!(r.body().is_empty());
        assert!(r.no_body().end().is_ok());

        let r = Response::from(Reply::empty()).filter_body_prefix("No way");
        assert!(r.no_body().end().is_ok());

        let r = Response::from(Reply::with_body("No way, no how")).filter_body_prefix("No foolin");
        assert_eq!(r.body(), b"No way, no how");
        assert!(r.no_body().end().is_err());
    }

    #[test]
    fn test_filter_status_prefix() {
        let r = Response::from(Reply::with_status("dumped fsmap epoch 12"))
            .filter_status_prefix("dumped fsmap epoch");
        assert!(r.no_status().ok());
    }

    #[test]
    fn test_text_trims() {
        let s = Response::from(Reply::with_body("/volumes/_nogroup/a/uuid\n"))
            .no_status()
            .text()
            .unwrap();
        assert_eq!(s, "/volumes/_nogroup/a/uuid");
    }

    #[test]
    fn test_map_err_only_touches_errors() {
        let r = r1().map_err(|_| AdminError::BodyEmpty { status: String::new() });
        assert!(r.ok());
        let r = r2().map_err(|_| AdminError::BodyEmpty { status: String::new() });
        assert!(matches!(r.error(), Some(AdminError::BodyEmpty { .. })));
    }
}
