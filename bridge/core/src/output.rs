//! Event Output
//!
//! Every task that reports to the host (accept loop, connection readers,
//! command dispatcher, lifecycle) holds a cloned [`EventSink`]. Frames funnel
//! through one ordered channel into a single writer, so lines never interleave
//! and per-client ordering is the order in which frames were emitted.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::frame::Frame;

/// Capacity of the frame channel between producers and the writer
pub const OUTPUT_CHANNEL_CAPACITY: usize = 256;

enum Outbound {
    Frame(Frame),
    Flush(oneshot::Sender<()>),
}

/// Producer side of the host output stream
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::Sender<Outbound>,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frame(frame) => f.debug_tuple("Frame").field(frame).finish(),
            Self::Flush(_) => f.write_str("Flush"),
        }
    }
}

impl EventSink {
    /// Create a sink and the stream that drains it
    #[must_use]
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);
        (Self { tx }, EventStream { rx })
    }

    /// Queue a frame for output
    ///
    /// Dropped silently once the writer is gone, which only happens while the
    /// process is exiting.
    pub async fn emit(&self, frame: Frame) {
        if self.tx.send(Outbound::Frame(frame)).await.is_err() {
            tracing::debug!("Output stream closed, dropping frame");
        }
    }

    /// Queue an error frame
    pub async fn error(&self, error: impl Into<String>, details: impl std::fmt::Display) {
        self.emit(Frame::error(error, details)).await;
    }

    /// Wait until every frame emitted before this call has been written
    pub async fn flush(&self) {
        let (ack_tx, ack_rx) = oneshot::channel();
        if self.tx.send(Outbound::Flush(ack_tx)).await.is_ok() {
            let _ = ack_rx.await;
        }
    }
}

/// Consumer side of the host output stream
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<Outbound>,
}

impl EventStream {
    /// Receive the next frame, acknowledging any flush requests on the way
    ///
    /// Returns `None` once every sink has been dropped.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.rx.recv().await? {
                Outbound::Frame(frame) => return Some(frame),
                Outbound::Flush(ack) => {
                    let _ = ack.send(());
                }
            }
        }
    }

    /// Write frames as lines to `writer` until every sink is dropped
    ///
    /// # Errors
    ///
    /// Returns the first I/O error from `writer`; the host is gone at that point.
    pub async fn write_to<W>(mut self, mut writer: W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(outbound) = self.rx.recv().await {
            match outbound {
                Outbound::Frame(frame) => {
                    let line = frame.to_line().unwrap_or_else(|e| {
                        tracing::error!(error = %e, "Failed to serialize frame");
                        Frame::error("JSON marshal error", e.details())
                            .to_line()
                            .unwrap_or_default()
                    });
                    writer.write_all(line.as_bytes()).await?;
                    writer.write_all(b"\n").await?;
                    writer.flush().await?;
                }
                Outbound::Flush(ack) => {
                    writer.flush().await?;
                    let _ = ack.send(());
                }
            }
        }
        writer.flush().await
    }

    /// Spawn [`EventStream::write_to`] as a background task
    pub fn spawn_writer<W>(self, writer: W) -> JoinHandle<io::Result<()>>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(async move {
            let result = self.write_to(writer).await;
            if let Err(e) = &result {
                tracing::error!(error = %e, "Output writer failed");
            }
            result
        })
    }
}
