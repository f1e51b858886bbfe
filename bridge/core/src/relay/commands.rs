//! Command dispatch: input lines to peer writes

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use super::{Relay, Route};
use crate::frame::Frame;
use crate::registry::ClientHandle;

/// Decode and dispatch input lines until end of input or a read error
pub(super) async fn run_commands<R>(relay: &Relay, mut input: R, route: &Route)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    loop {
        line.clear();
        match input.read_until(b'\n', &mut line).await {
            Ok(0) => {
                tracing::debug!("End of input");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::error!(error = %e, "Failed to read input");
                relay.sink.error("Error reading stdin", e).await;
                break;
            }
        }

        match Frame::from_line(&line) {
            Ok(frame) => dispatch(relay, frame, route).await,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed input line");
                relay.sink.error("Invalid JSON input", e.details()).await;
            }
        }
    }
}

/// Write one command's payload to its connection, then close it if asked
async fn dispatch(relay: &Relay, frame: Frame, route: &Route) {
    let Some(handle) = resolve(relay, &frame, route).await else {
        return;
    };
    let id = handle.id();

    let bytes = match frame.payload_bytes() {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(client_id = %id, error = %e, "Invalid payload in command");
            relay.sink.error("Invalid base64 message", e.details()).await;
            return;
        }
    };

    if !bytes.is_empty() {
        if let Err(e) = handle.write(&bytes).await {
            tracing::warn!(client_id = %id, error = %e, "Write to peer failed");
            relay
                .sink
                .error(format!("Write error to {} {id}", relay.role.peer_noun()), e)
                .await;
        }
    }

    if frame.disconnect {
        tracing::debug!(client_id = %id, "Disconnect requested");
        handle.close().await;
    }
}

/// Find the connection a command is for, reporting when there is none
async fn resolve(relay: &Relay, frame: &Frame, route: &Route) -> Option<ClientHandle> {
    match route {
        Route::ByFrameId => {
            let id = frame.id.as_deref().unwrap_or_default();
            let handle = relay.registry.lookup(id);
            if handle.is_none() {
                tracing::warn!(client_id = %id, "Command for unknown client");
                relay
                    .sink
                    .error("Client not found", format!("Client ID {id} not found"))
                    .await;
            }
            handle
        }
        Route::Fixed(id) => {
            let handle = relay.registry.lookup(id.as_str());
            if handle.is_none() {
                tracing::warn!(client_id = %id, "Command after connection closed");
                relay
                    .sink
                    .error(
                        format!("Write error to {} {id}", relay.role.peer_noun()),
                        "connection closed",
                    )
                    .await;
            }
            handle
        }
    }
}
