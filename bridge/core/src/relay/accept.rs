//! Accept loop (server role)

use super::Relay;
use crate::transport::Listener;

/// Attach every accepted connection until accept fails
///
/// An accept error is reported once and ends the loop; the listener is not
/// restarted.
pub(super) async fn accept_loop(relay: Relay, mut listener: Box<dyn Listener>) {
    tracing::debug!("Accept loop started");
    loop {
        match listener.accept().await {
            Ok(conn) => {
                relay.attach(conn).await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Accept failed, no further connections will be accepted");
                relay.sink.error("Accept error", e).await;
                return;
            }
        }
    }
}
