//! Per-connection reader task

use tokio::io::{AsyncReadExt, ReadHalf};

use super::Relay;
use crate::frame::Frame;
use crate::registry::ClientHandle;
use crate::transport::BoxedConnection;

/// Forward chunks from one connection until it ends or a close is requested
///
/// This is the only place a client is unregistered and its disconnect frame
/// emitted.
pub(super) async fn read_loop(
    relay: Relay,
    handle: ClientHandle,
    mut reader: ReadHalf<BoxedConnection>,
) {
    let id = handle.id().clone();
    let pid = handle.pid();
    let mut buf = vec![0u8; relay.chunk_size];

    loop {
        tokio::select! {
            biased;

            () = handle.closed() => {
                tracing::debug!("Close requested by controller");
                break;
            }

            result = reader.read(&mut buf) => match result {
                Ok(0) => {
                    tracing::debug!("Peer closed connection");
                    break;
                }
                Ok(n) => {
                    tracing::trace!(bytes = n, "Read from peer");
                    relay.sink.emit(Frame::data(id.as_str(), &buf[..n])).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Read error");
                    relay
                        .sink
                        .error(format!("Read error from {} {id}", relay.role.peer_noun()), e)
                        .await;
                    break;
                }
            }
        }
    }

    drop(reader);
    relay.registry.unregister(id.as_str());
    drop(handle);

    tracing::info!(
        pid,
        active_clients = relay.registry.len(),
        "Connection closed"
    );
    relay.sink.emit(Frame::disconnected(id.as_str(), pid)).await;
}
