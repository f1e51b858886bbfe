//! Unix Socket Transport
//!
//! Listener and dialer for filesystem-addressed stream sockets.

use std::io;
use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::net::{UnixListener, UnixStream};

use super::peer_cred;
use super::traits::{BoxedConnection, Connection, Listener, TransportError};

impl Connection for UnixStream {
    fn peer_pid(&self) -> u32 {
        peer_cred::peer_pid(self)
    }
}

/// Accepts peers on a bound Unix socket
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl UnixSocketListener {
    /// Bind `path`, clearing a stale socket file left by a dead process
    ///
    /// If `mode` is set, the socket file's permissions are changed to it after
    /// bind.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if another process is serving the path,
    /// the path is occupied by something other than a socket, or bind or
    /// chmod fails.
    pub async fn bind(path: impl AsRef<Path>, mode: Option<u32>) -> Result<Self, TransportError> {
        let path = path.as_ref().to_path_buf();
        let endpoint = path.display().to_string();

        clear_stale_socket(&path)
            .await
            .map_err(|e| TransportError::bind(&endpoint, e))?;

        let listener = UnixListener::bind(&path).map_err(|e| TransportError::bind(&endpoint, e))?;

        if let Some(mode) = mode {
            let perms = std::fs::Permissions::from_mode(mode);
            if let Err(e) = tokio::fs::set_permissions(&path, perms).await {
                drop(listener);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(TransportError::bind(&endpoint, e));
            }
        }

        tracing::info!(path = %endpoint, mode = ?mode.map(|m| format!("{m:o}")), "Listening on Unix socket");
        Ok(Self { listener, path })
    }

    /// Path of the bound socket
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Listener for UnixSocketListener {
    async fn accept(&mut self) -> Result<BoxedConnection, TransportError> {
        let (stream, _addr) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::Accept)?;
        Ok(Box::new(stream))
    }
}

/// Connect to the socket at `path`
///
/// # Errors
///
/// Returns [`TransportError::Connect`] if nothing accepts on `path`.
pub async fn dial(path: impl AsRef<Path>) -> Result<BoxedConnection, TransportError> {
    let path = path.as_ref();
    let stream = UnixStream::connect(path)
        .await
        .map_err(|e| TransportError::connect(path.display().to_string(), e))?;
    tracing::info!(path = %path.display(), "Connected to Unix socket");
    Ok(Box::new(stream))
}

/// Remove a leftover socket file nobody is listening on
async fn clear_stale_socket(path: &Path) -> io::Result<()> {
    let meta = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    // Anything other than a socket is left for bind to reject
    if !meta.file_type().is_socket() {
        return Ok(());
    }

    match UnixStream::connect(path).await {
        Ok(_) => Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            "endpoint is already being served",
        )),
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            tracing::warn!(path = %path.display(), "Removing stale socket file");
            tokio::fs::remove_file(path).await
        }
        Err(_) => Ok(()),
    }
}
