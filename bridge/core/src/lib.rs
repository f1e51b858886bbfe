//! Bridge Core - Local Socket Relay for a Host Controller
//!
//! This crate relays bytes between peers on a local endpoint (a Unix domain
//! socket, or a named pipe on Windows) and a host process that speaks a
//! line-delimited JSON protocol. The host never touches the socket itself.
//!
//! # Architecture
//!
//! ```text
//!   peer A ──┐                                   ┌── stdin  (commands)
//!   peer B ──┼── Listener ── Relay ── EventSink ─┤
//!   peer C ──┘      │          │                 └── stdout (events)
//!                   │    ClientRegistry
//!                   │   id -> ClientHandle
//!              one reader task per connection
//! ```
//!
//! Upward, every read chunk becomes a data frame `{id, msg}`. Downward, every
//! command frame `{id, msg, disconnect?}` is decoded and written to the
//! matching connection.
//!
//! # Module Overview
//!
//! - [`config`]: Runtime configuration loaded from the environment
//! - [`endpoint`]: Default endpoint paths and the scoped endpoint file guard
//! - [`frame`]: The wire record and its line/base64 codec
//! - [`output`]: Ordered frame output to the host
//! - [`registry`]: Live mapping from client id to connection
//! - [`relay`]: Accept loop, per-connection readers, command dispatch
//! - [`transport`]: Platform listeners, dialing, peer credentials

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod endpoint;
pub mod frame;
pub mod output;
pub mod registry;
pub mod relay;
pub mod transport;

pub use config::{BridgeConfig, ConfigError};
pub use endpoint::{default_endpoint, EndpointGuard};
pub use frame::{Action, CodecError, Frame, PROTOCOL_VERSION};
pub use output::{EventSink, EventStream};
pub use registry::{ClientHandle, ClientId, ClientRegistry};
pub use relay::{run_client, run_server, Relay, Role, Route};
pub use transport::{BoxedConnection, Connection, Listener, TransportError};
