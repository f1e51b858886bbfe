//! Relay Engine
//!
//! Moves bytes between peer connections and the host controller.
//!
//! # Tasks
//!
//! - **accept**: server role only; attaches every accepted connection
//! - **reader**: one per connection; chunks become data frames, and its exit
//!   path alone unregisters the client and reports the disconnect
//! - **commands**: decodes input lines and writes their payloads to peers
//!
//! All frames go through one [`EventSink`], so per client the host always sees
//! connect, then data, then disconnect.

mod accept;
mod commands;
mod reader;

use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::BridgeConfig;
use crate::frame::Frame;
use crate::output::EventSink;
use crate::registry::{ClientHandle, ClientId, ClientRegistry};
use crate::transport::{BoxedConnection, Listener};

/// Which side of the endpoint this bridge is on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Bound the endpoint, relays for many peers
    Server,
    /// Dialed the endpoint, relays for one connection
    Client,
}

impl Role {
    /// What the other end of a connection is called in error frames
    #[must_use]
    pub fn peer_noun(self) -> &'static str {
        match self {
            Self::Server => "client",
            Self::Client => "server",
        }
    }
}

/// How a command frame picks its connection
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// Use the frame's `id` field
    ByFrameId,
    /// Always use this client, ignoring `id`
    Fixed(ClientId),
}

/// Shared relay state, cloned into every task
#[derive(Clone, Debug)]
pub struct Relay {
    registry: Arc<ClientRegistry>,
    sink: EventSink,
    role: Role,
    chunk_size: usize,
}

impl Relay {
    /// Create a relay with an empty registry
    #[must_use]
    pub fn new(role: Role, sink: EventSink, config: &BridgeConfig) -> Self {
        Self {
            registry: Arc::new(ClientRegistry::new()),
            sink,
            role,
            chunk_size: config.chunk_size.max(1),
        }
    }

    /// Live clients
    #[must_use]
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Role of this relay
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Register a new connection, report it, and start its reader
    ///
    /// The connect frame is queued before the reader exists, so no data frame
    /// for this id can precede it.
    pub async fn attach(&self, conn: BoxedConnection) -> (ClientId, JoinHandle<()>) {
        let pid = conn.peer_pid();
        let id = loop {
            let id = ClientId::new();
            if !self.registry.contains(id.as_str()) {
                break id;
            }
        };

        let (handle, read_half) = ClientHandle::new(id.clone(), pid, conn);
        let registered = self.registry.register(handle.clone());
        debug_assert!(registered, "fresh client id already registered");

        tracing::info!(
            client_id = %id,
            pid,
            role = ?self.role,
            active_clients = self.registry.len(),
            "Connection attached"
        );
        self.sink.emit(Frame::connected(id.as_str(), pid)).await;

        let span = tracing::info_span!("client", client_id = %id);
        let task = tokio::spawn(
            reader::read_loop(self.clone(), handle, read_half).instrument(span),
        );
        (id, task)
    }

    /// Read command lines from `input` until it ends
    pub async fn run_commands<R>(&self, input: R, route: &Route)
    where
        R: AsyncBufRead + Unpin,
    {
        commands::run_commands(self, input, route).await;
    }
}

/// Relay for every peer that connects to `listener`, taking commands from `input`
///
/// Returns when `input` ends. The accept loop is stopped; connections that are
/// still open are left to the caller's process exit.
pub async fn run_server<R>(
    listener: Box<dyn Listener>,
    input: R,
    sink: EventSink,
    config: &BridgeConfig,
) -> Relay
where
    R: AsyncBufRead + Unpin,
{
    let relay = Relay::new(Role::Server, sink, config);
    let accept = tokio::spawn(
        accept::accept_loop(relay.clone(), listener).instrument(tracing::info_span!("accept")),
    );

    relay.run_commands(input, &Route::ByFrameId).await;

    tracing::info!(active_clients = relay.registry.len(), "Input closed, stopping accept loop");
    accept.abort();
    relay
}

/// Relay for one dialed connection, taking commands from `input`
///
/// When `input` ends the connection is closed if still open, and this waits
/// for its reader so exactly one disconnect frame is emitted.
pub async fn run_client<R>(
    conn: BoxedConnection,
    input: R,
    sink: EventSink,
    config: &BridgeConfig,
) where
    R: AsyncBufRead + Unpin,
{
    let relay = Relay::new(Role::Client, sink, config);
    let (id, reader) = relay.attach(conn).await;

    relay.run_commands(input, &Route::Fixed(id.clone())).await;

    if let Some(handle) = relay.registry.lookup(id.as_str()) {
        tracing::info!(client_id = %id, "Input closed, closing connection");
        handle.close().await;
    }
    if let Err(e) = reader.await {
        tracing::error!(client_id = %id, error = %e, "Reader task failed");
    }
}
