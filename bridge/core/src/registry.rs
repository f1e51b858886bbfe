//! Client Registry - Live Connection Bookkeeping
//!
//! Maps opaque client ids to the write side of their connections. The relay
//! engine owns one registry and shares it by `Arc` with the accept loop, the
//! per-connection readers and the command dispatcher.
//!
//! # Invariants
//!
//! - An id is registered exactly once, before any frame referencing it is
//!   emitted, and removed exactly once, by its reader when the read loop ends.
//! - The map lock is a synchronous mutex held only for the map operation
//!   itself. Lookups hand out a cloned [`ClientHandle`], so writes to the
//!   connection happen after the lock is released.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Notify;

use crate::transport::BoxedConnection;

/// Unique identifier for a peer connection
///
/// A random v4 UUID, never reused within a process lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ClientId(String);

impl ClientId {
    /// Generate a fresh client id
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The id as it appears on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ClientId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

/// Shared handle to a registered connection
///
/// Cloning is cheap. The write half sits behind an async lock so concurrent
/// writers to one connection are serialized.
#[derive(Clone)]
pub struct ClientHandle {
    id: ClientId,
    pid: u32,
    writer: Arc<tokio::sync::Mutex<WriteHalf<BoxedConnection>>>,
    close: Arc<Notify>,
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientHandle")
            .field("id", &self.id)
            .field("pid", &self.pid)
            .finish_non_exhaustive()
    }
}

impl ClientHandle {
    /// Split a connection into a handle for writers and the read half for its reader
    #[must_use]
    pub fn new(id: ClientId, pid: u32, conn: BoxedConnection) -> (Self, ReadHalf<BoxedConnection>) {
        let (read_half, write_half) = tokio::io::split(conn);
        let handle = Self {
            id,
            pid,
            writer: Arc::new(tokio::sync::Mutex::new(write_half)),
            close: Arc::new(Notify::new()),
        };
        (handle, read_half)
    }

    /// Client id
    #[must_use]
    pub fn id(&self) -> &ClientId {
        &self.id
    }

    /// Peer process id resolved at connect time (0 = unknown)
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Write all of `bytes` to the peer
    ///
    /// # Errors
    ///
    /// Returns the I/O error from the connection. The client stays registered;
    /// only its reader removes it.
    pub async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Close the connection
    ///
    /// Shuts down the write direction so the peer sees end-of-stream after any
    /// bytes already written, then tells the reader to stop. The reader's exit
    /// path releases the socket and reports the disconnect.
    pub async fn close(&self) {
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(client_id = %self.id, error = %e, "Shutdown after close request failed");
            }
        }
        self.close.notify_one();
    }

    /// Resolves once [`ClientHandle::close`] has been called
    ///
    /// A close requested before this is awaited is not lost.
    pub async fn closed(&self) {
        self.close.notified().await;
    }
}

/// Registry of live client connections
#[derive(Default)]
pub struct ClientRegistry {
    inner: Mutex<HashMap<ClientId, ClientHandle>>,
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .finish()
    }
}

impl ClientRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection under its id
    ///
    /// Returns false, leaving the existing entry untouched, if the id is
    /// already registered.
    #[must_use]
    pub fn register(&self, handle: ClientHandle) -> bool {
        let mut inner = self.inner.lock();
        if inner.contains_key(&handle.id) {
            tracing::warn!(client_id = %handle.id, "Refusing duplicate client registration");
            return false;
        }
        tracing::debug!(client_id = %handle.id, "Client registered");
        inner.insert(handle.id.clone(), handle);
        true
    }

    /// Find the connection for `id`
    #[must_use]
    pub fn lookup(&self, id: &str) -> Option<ClientHandle> {
        self.inner.lock().get(id).cloned()
    }

    /// Remove `id`, returning its handle if it was registered
    pub fn unregister(&self, id: &str) -> Option<ClientHandle> {
        let handle = self.inner.lock().remove(id);
        if handle.is_some() {
            tracing::debug!(client_id = %id, "Client unregistered");
        }
        handle
    }

    /// Number of live clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no clients are live
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Whether `id` is live
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.lock().contains_key(id)
    }

    /// Ids of all live clients
    #[must_use]
    pub fn ids(&self) -> Vec<ClientId> {
        self.inner.lock().keys().cloned().collect()
    }
}
