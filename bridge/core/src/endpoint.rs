//! Endpoint Naming and Cleanup
//!
//! A server-role bridge owns the socket file it binds. [`EndpointGuard`]
//! removes that file exactly once, on normal exit, on signal, or on drop.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::BridgeConfig;
use crate::transport;

/// Prefix of generated endpoint names
pub const ENDPOINT_PREFIX: &str = "ipc_socket_";

/// A fresh, unique endpoint for a server that was not given one
///
/// Unix: `<socket_dir>/ipc_socket_<uuid>`. Windows: `\\.\pipe\ipc_socket_<uuid>`.
#[must_use]
pub fn default_endpoint(config: &BridgeConfig) -> String {
    let name = format!("{ENDPOINT_PREFIX}{}", uuid::Uuid::new_v4());

    #[cfg(windows)]
    {
        let _ = config;
        transport::named_pipe::pipe_path(&name)
    }

    #[cfg(not(windows))]
    {
        config.socket_dir.join(name).display().to_string()
    }
}

/// Removes a bound endpoint file when released or dropped
#[derive(Debug)]
pub struct EndpointGuard {
    path: PathBuf,
    owned: bool,
    released: AtomicBool,
}

impl EndpointGuard {
    /// Take ownership of the endpoint at `path`
    ///
    /// Only call after a successful bind. On platforms where endpoints are not
    /// files, the guard does nothing.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owned: transport::endpoint_is_file(),
            released: AtomicBool::new(false),
        }
    }

    /// Endpoint path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the endpoint file
    ///
    /// Idempotent. Returns `Ok(true)` if this call removed the file and
    /// `Ok(false)` if there was nothing to do. A file that is already gone
    /// counts as released.
    ///
    /// # Errors
    ///
    /// Returns the removal error; the guard is still marked released.
    pub fn release(&self) -> io::Result<bool> {
        if !self.owned || self.released.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Endpoint file removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Drop for EndpointGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove endpoint file");
        }
    }
}
