//! Transport Traits
//!
//! The relay engine only sees two seams:
//! - [`Connection`]: one established byte stream to a peer
//! - [`Listener`]: a source of new connections
//!
//! Platform modules implement these for Unix domain sockets and Windows named
//! pipes.

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional byte stream to one peer
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin + 'static {
    /// Process id of the peer, 0 when the platform cannot tell
    fn peer_pid(&self) -> u32 {
        0
    }
}

/// Type-erased connection as stored by the relay
pub type BoxedConnection = Box<dyn Connection>;

/// Source of incoming connections
#[async_trait]
pub trait Listener: Send {
    /// Wait for the next peer
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Accept`] if the underlying accept fails. The
    /// relay treats this as fatal for the accept loop.
    async fn accept(&mut self) -> Result<BoxedConnection, TransportError>;
}

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be created
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// Endpoint path or pipe name
        endpoint: String,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Dialing the endpoint failed
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        /// Endpoint path or pipe name
        endpoint: String,
        /// Underlying cause
        #[source]
        source: io::Error,
    },

    /// Accepting a new peer failed
    #[error("accept failed: {0}")]
    Accept(#[source] io::Error),

    /// IO error from underlying transport
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// No local endpoint implementation exists for this platform
    #[error("local endpoints are not supported on this platform")]
    Unsupported,
}

impl TransportError {
    /// Bind failure for `endpoint`
    pub(crate) fn bind(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Bind {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Connect failure for `endpoint`
    pub(crate) fn connect(endpoint: impl Into<String>, source: io::Error) -> Self {
        Self::Connect {
            endpoint: endpoint.into(),
            source,
        }
    }

    /// Underlying I/O error kind, if any
    #[must_use]
    pub fn kind(&self) -> Option<io::ErrorKind> {
        match self {
            Self::Bind { source, .. } | Self::Connect { source, .. } => Some(source.kind()),
            Self::Accept(e) | Self::Io(e) => Some(e.kind()),
            Self::Unsupported => None,
        }
    }
}
