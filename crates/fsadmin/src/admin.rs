//! The administrative handle.

use crate::command::Command;
use crate::error::Result;
use crate::executor::{CommandExecutor, TracingExecutor};
use crate::response::Response;
use serde::Deserialize;
use tracing::debug;

/// Administers the file systems of one cluster through a command executor.
///
/// `FsAdmin` owns nothing but its executor handle. Pass `&conn` or an
/// `Arc` to share a connection; every method borrows it for the duration of a
/// single request.
pub struct FsAdmin<E> {
    conn: E,
}

impl<E: CommandExecutor> FsAdmin<E> {
    /// Build an admin handle over an existing connection.
    pub fn new(conn: E) -> Self {
        Self { conn }
    }

    /// The underlying executor.
    pub fn executor(&self) -> &E {
        &self.conn
    }

    /// Unwrap the executor.
    pub fn into_executor(self) -> E {
        self.conn
    }

    /// Send a command to the manager daemon.
    pub fn mgr(&self, cmd: &Command) -> Response {
        match cmd.to_json() {
            Ok(buf) => {
                debug!(prefix = cmd.prefix(), "dispatching mgr command");
                Response::from(self.conn.mgr_command(&buf))
            }
            Err(err) => Response::failed(err),
        }
    }

    /// Send a command to the monitors.
    pub fn mon(&self, cmd: &Command) -> Response {
        match cmd.to_json() {
            Ok(buf) => {
                debug!(prefix = cmd.prefix(), "dispatching mon command");
                Response::from(self.conn.mon_command(&buf))
            }
            Err(err) => Response::failed(err),
        }
    }

    /// Send a preformatted JSON buffer to the manager daemon.
    pub fn raw_mgr(&self, buf: &[u8]) -> Response {
        Response::from(self.conn.mgr_command(buf))
    }
}

impl<E: CommandExecutor> FsAdmin<TracingExecutor<E>> {
    /// Build an admin handle that logs every envelope and reply.
    pub fn traced(conn: E) -> Self {
        Self::new(TracingExecutor::new(conn))
    }
}

#[derive(Deserialize)]
struct NamedEntry {
    name: String,
}

/// Parse a list of `{"name": ...}` records into the names.
pub fn parse_list_names(res: Response) -> Result<Vec<String>> {
    let entries: Vec<NamedEntry> = res.no_status().decode()?;
    Ok(entries.into_iter().map(|e| e.name).collect())
}

/// Expect an empty reply.
pub fn check_empty(res: Response) -> Result<()> {
    res.no_data().end()
}

/// Extract a path reply. The manager answers path queries in plain text even
/// when JSON is requested.
pub fn extract_path(res: Response) -> Result<String> {
    res.no_status().require_body().text()
}
