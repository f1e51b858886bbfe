//! ipc-bridge - Local Socket Relay
//!
//! Serves (or dials) a local endpoint and relays its traffic to the parent
//! process as JSON lines on stdout, taking commands as JSON lines on stdin.
//!
//! # Usage
//!
//! ```bash
//! # Server on a generated endpoint in the temp dir
//! ipc-bridge
//!
//! # Server on a given endpoint
//! ipc-bridge /tmp/my.sock
//! ipc-bridge --server /tmp/my.sock
//!
//! # Single connection to an existing endpoint
//! ipc-bridge --client /tmp/my.sock
//!
//! # Diagnostics on stderr
//! RUST_LOG=bridge_core=debug ipc-bridge
//! ```
//!
//! # Environment Variables
//!
//! - `IPC_BRIDGE_CHUNK_SIZE`: read chunk size in bytes (default 4096)
//! - `IPC_BRIDGE_SOCKET_DIR`: directory for generated endpoints
//! - `IPC_BRIDGE_SOCKET_MODE`: octal permissions for the socket file
//! - `RUST_LOG`: log filter (default `warn`), written to stderr
//!
//! # Exit Codes
//!
//! - 0: input closed or shutdown signal
//! - 1: endpoint could not be bound or dialed
//! - 2: invalid arguments
//!
//! # Signals
//!
//! - `SIGINT` / `SIGTERM` / `SIGHUP` (Ctrl+C on Windows): remove the endpoint
//!   file and exit 0

mod cli;

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use bridge_core::{
    default_endpoint, run_client, run_server, transport, BridgeConfig, EndpointGuard, EventSink,
    Frame,
};
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Cli, Mode};

const EXIT_OK: i32 = 0;
const EXIT_TRANSPORT: i32 = 1;
const EXIT_USAGE: i32 = 2;

#[tokio::main]
async fn main() {
    init_tracing();

    let (sink, events) = EventSink::channel();
    let _writer = events.spawn_writer(tokio::io::stdout());

    let code = run(&sink).await;
    sink.flush().await;
    // Readers may still be parked on open connections
    std::process::exit(code);
}

/// Logging goes to stderr; stdout carries only protocol frames
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn run(sink: &EventSink) -> i32 {
    let argv = std::env::args_os().map(|arg| arg.to_string_lossy().into_owned());
    let mode = match Cli::parse_argv(argv) {
        Ok(cli) => Mode::from_args(&cli.args).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string().trim().to_string()),
    };
    let mode = match mode {
        Ok(mode) => mode,
        Err(details) => {
            warn!(%details, "Rejecting command line");
            sink.error("Invalid argument", details).await;
            return EXIT_USAGE;
        }
    };

    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "Ignoring invalid configuration");
            sink.error("Invalid configuration", e).await;
            BridgeConfig::default()
        }
    };

    match mode {
        Mode::Server(endpoint) => {
            let endpoint = endpoint.unwrap_or_else(|| default_endpoint(&config));
            serve(sink, endpoint, &config).await
        }
        Mode::Client(endpoint) => connect(sink, endpoint, &config).await,
    }
}

async fn serve(sink: &EventSink, endpoint: String, config: &BridgeConfig) -> i32 {
    let signal = install_shutdown_signal();
    sink.emit(Frame::announce(&endpoint)).await;

    let listener = match transport::listen(&endpoint, config).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Failed to create listener");
            sink.error("Failed to create listener", e).await;
            return EXIT_TRANSPORT;
        }
    };

    let guard = Arc::new(EndpointGuard::new(&endpoint));
    spawn_shutdown_handler(signal, sink.clone(), Some(Arc::clone(&guard)));
    info!(endpoint = %endpoint, "Bridge serving");

    let input = BufReader::new(tokio::io::stdin());
    let relay = run_server(listener, input, sink.clone(), config).await;
    info!(active_clients = relay.registry().len(), "Bridge stopping");

    release_endpoint(&guard, sink).await;
    EXIT_OK
}

async fn connect(sink: &EventSink, endpoint: String, config: &BridgeConfig) -> i32 {
    let signal = install_shutdown_signal();
    sink.emit(Frame::announce(&endpoint)).await;

    let conn = match transport::dial(&endpoint).await {
        Ok(conn) => conn,
        Err(e) => {
            error!(endpoint = %endpoint, error = %e, "Failed to connect");
            sink.error("Failed to connect to socket", e).await;
            return EXIT_TRANSPORT;
        }
    };

    // The endpoint belongs to whoever bound it
    spawn_shutdown_handler(signal, sink.clone(), None);
    info!(endpoint = %endpoint, "Bridge connected");

    let input = BufReader::new(tokio::io::stdin());
    run_client(conn, input, sink.clone(), config).await;
    EXIT_OK
}

/// Remove the endpoint file, reporting a failure to the host
async fn release_endpoint(guard: &EndpointGuard, sink: &EventSink) {
    match guard.release() {
        Ok(true) => info!(path = %guard.path().display(), "Endpoint removed"),
        Ok(false) => {}
        Err(e) => {
            error!(path = %guard.path().display(), error = %e, "Failed to remove endpoint");
            sink.error("Failed to remove socket file", e).await;
        }
    }
}

/// Register the shutdown signals
///
/// Done before the endpoint exists so a signal can never find it without a
/// handler. Deliveries before the handler task starts are buffered.
fn install_shutdown_signal() -> Option<impl Future<Output = &'static str> + Send + 'static> {
    match shutdown_signal() {
        Ok(signal) => Some(signal),
        Err(e) => {
            warn!(error = %e, "Shutdown signals will not clean up the endpoint");
            None
        }
    }
}

fn spawn_shutdown_handler<F>(signal: Option<F>, sink: EventSink, guard: Option<Arc<EndpointGuard>>)
where
    F: Future<Output = &'static str> + Send + 'static,
{
    let Some(signal) = signal else {
        return;
    };
    tokio::spawn(async move {
        let signal = signal.await;
        info!(signal, "Shutdown signal received");

        if let Some(guard) = guard {
            release_endpoint(&guard, &sink).await;
        }
        sink.flush().await;
        std::process::exit(EXIT_OK);
    });
}

#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt =
        signal(SignalKind::interrupt()).context("Failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;
    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;

    Ok(async move {
        tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
            _ = hangup.recv() => "SIGHUP",
        }
    })
}

#[cfg(windows)]
fn shutdown_signal() -> Result<impl Future<Output = &'static str> + Send + 'static> {
    let mut ctrl_c =
        tokio::signal::windows::ctrl_c().context("Failed to install Ctrl+C handler")?;
    Ok(async move {
        ctrl_c.recv().await;
        "Ctrl+C"
    })
}
