//! Windows Named Pipe Transport
//!
//! A pipe server instance serves exactly one client, so the listener keeps
//! one unconnected instance ready and replaces it on every accept.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};

use super::traits::{BoxedConnection, Connection, Listener, TransportError};

/// Namespace prefix of local pipe names
pub const PIPE_PREFIX: &str = r"\\.\pipe\";

/// `ERROR_PIPE_BUSY`: every server instance is taken
const ERROR_PIPE_BUSY: i32 = 231;

const BUSY_RETRY_DELAY: Duration = Duration::from_millis(50);
const BUSY_RETRY_LIMIT: u32 = 100;

impl Connection for NamedPipeServer {}
impl Connection for NamedPipeClient {}

/// Expand a bare pipe name into a full pipe path
#[must_use]
pub fn pipe_path(name: &str) -> String {
    if name.starts_with(PIPE_PREFIX) {
        name.to_string()
    } else {
        format!("{PIPE_PREFIX}{name}")
    }
}

/// Accepts peers on a named pipe
#[derive(Debug)]
pub struct NamedPipeListener {
    name: String,
    next: NamedPipeServer,
}

impl NamedPipeListener {
    /// Create the first instance of pipe `name`
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Bind`] if the pipe already exists or cannot be
    /// created.
    pub fn bind(name: &str) -> Result<Self, TransportError> {
        let name = pipe_path(name);
        let next = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&name)
            .map_err(|e| TransportError::bind(&name, e))?;
        tracing::info!(pipe = %name, "Listening on named pipe");
        Ok(Self { name, next })
    }

    /// Full pipe path
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl Listener for NamedPipeListener {
    async fn accept(&mut self) -> Result<BoxedConnection, TransportError> {
        self.next.connect().await.map_err(TransportError::Accept)?;
        let fresh = ServerOptions::new()
            .create(&self.name)
            .map_err(TransportError::Accept)?;
        let connected = std::mem::replace(&mut self.next, fresh);
        Ok(Box::new(connected))
    }
}

/// Open pipe `name`, waiting briefly while all instances are busy
///
/// # Errors
///
/// Returns [`TransportError::Connect`] if the pipe does not exist or stays
/// busy.
pub async fn dial(name: &str) -> Result<BoxedConnection, TransportError> {
    let name = pipe_path(name);
    let mut attempts = 0;
    loop {
        match ClientOptions::new().open(&name) {
            Ok(client) => {
                tracing::info!(pipe = %name, "Connected to named pipe");
                return Ok(Box::new(client));
            }
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && attempts < BUSY_RETRY_LIMIT => {
                attempts += 1;
            }
            Err(e) => return Err(TransportError::connect(&name, e)),
        }
        tokio::time::sleep(BUSY_RETRY_DELAY).await;
    }
}
