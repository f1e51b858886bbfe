//! Transport Layer
//!
//! Local endpoints the relay serves or dials:
//!
//! - **Unix**: filesystem stream sockets (`unix_socket`)
//! - **Windows**: named pipes (`named_pipe`)
//!
//! The relay engine only sees [`Listener`] and [`Connection`]; [`listen`] and
//! [`dial`] pick the platform implementation.

mod traits;

#[cfg(unix)]
mod peer_cred;
#[cfg(unix)]
pub mod unix_socket;

#[cfg(windows)]
pub mod named_pipe;

pub use traits::{BoxedConnection, Connection, Listener, TransportError};

use crate::config::BridgeConfig;

/// Whether endpoints live in the filesystem and must be removed on shutdown
#[must_use]
pub const fn endpoint_is_file() -> bool {
    cfg!(unix)
}

/// Create a listener on `endpoint`
///
/// # Errors
///
/// Returns [`TransportError::Bind`] if the endpoint cannot be created, or
/// [`TransportError::Unsupported`] on platforms without local endpoints.
#[allow(clippy::unused_async)]
pub async fn listen(
    endpoint: &str,
    config: &BridgeConfig,
) -> Result<Box<dyn Listener>, TransportError> {
    #[cfg(unix)]
    {
        let listener = unix_socket::UnixSocketListener::bind(endpoint, config.socket_mode).await?;
        Ok(Box::new(listener))
    }

    #[cfg(windows)]
    {
        let _ = config;
        let listener = named_pipe::NamedPipeListener::bind(endpoint)?;
        Ok(Box::new(listener))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (endpoint, config);
        Err(TransportError::Unsupported)
    }
}

/// Connect to `endpoint`
///
/// # Errors
///
/// Returns [`TransportError::Connect`] if nothing accepts on `endpoint`, or
/// [`TransportError::Unsupported`] on platforms without local endpoints.
#[allow(clippy::unused_async)]
pub async fn dial(endpoint: &str) -> Result<BoxedConnection, TransportError> {
    #[cfg(unix)]
    {
        unix_socket::dial(endpoint).await
    }

    #[cfg(windows)]
    {
        named_pipe::dial(endpoint).await
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = endpoint;
        Err(TransportError::Unsupported)
    }
}
