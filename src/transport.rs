//! Streaming client responses
//!
//! A relayed read hands the HTTP server a [`ResponseBody`] and keeps the
//! paired [`ResponseWriter`]. The writer exposes the two capabilities the
//! relay needs from the connection:
//!
//! - flush: [`ResponseWriter::flush`] resolves once the server has sent the
//!   status line and headers and started waiting for body bytes
//! - disconnect notification: [`ResponseWriter::disconnect_signal`] fires
//!   once the server drops the body, which it does when the client
//!   connection goes away

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Default number of chunks buffered between the copy task and the server
pub const DEFAULT_RESPONSE_BUFFER: usize = 16;

type Chunk = io::Result<Bytes>;

/// The client is no longer connected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("client disconnected")]
pub struct Disconnected;

/// Create a connected writer/body pair buffering up to `capacity` chunks
pub fn response_channel(capacity: usize) -> (ResponseWriter, ResponseBody) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (flushed_tx, flushed_rx) = oneshot::channel();

    let writer = ResponseWriter {
        tx,
        flushed: Some(flushed_rx),
        committed: false,
    };
    let body = ResponseBody {
        rx,
        flushed: Some(flushed_tx),
    };
    (writer, body)
}

// ─────────────────────────────────────────────────────────────────
// Body (server side)
// ─────────────────────────────────────────────────────────────────

/// Response body stream consumed by the HTTP server
pub struct ResponseBody {
    rx: mpsc::Receiver<Chunk>,
    flushed: Option<oneshot::Sender<()>>,
}

impl Stream for ResponseBody {
    type Item = Chunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // First poll: the server has the head and now wants body bytes
        if let Some(flushed) = self.flushed.take() {
            let _ = flushed.send(());
        }
        self.rx.poll_recv(cx)
    }
}

// ─────────────────────────────────────────────────────────────────
// Writer (relay side)
// ─────────────────────────────────────────────────────────────────

/// Relay-side handle for feeding a streaming response
pub struct ResponseWriter {
    tx: mpsc::Sender<Chunk>,
    flushed: Option<oneshot::Receiver<()>>,
    committed: bool,
}

impl ResponseWriter {
    /// Wait until the status line and headers have been flushed to the client
    pub async fn flush(&mut self) -> Result<(), Disconnected> {
        if let Some(flushed) = self.flushed.take() {
            self.committed = flushed.await.is_ok();
        }
        if self.committed {
            Ok(())
        } else {
            Err(Disconnected)
        }
    }

    /// Whether the status line is already on the wire, making any later
    /// status write a no-op
    pub fn headers_committed(&self) -> bool {
        self.committed
    }

    /// Send a chunk of body bytes
    pub async fn write(&self, chunk: Bytes) -> Result<(), Disconnected> {
        self.tx.send(Ok(chunk)).await.map_err(|_| Disconnected)
    }

    /// Terminate the body with an error so the client sees a broken stream
    /// rather than a clean end
    pub async fn abort(&self, err: io::Error) {
        let _ = self.tx.send(Err(err)).await;
    }

    /// Resolves once the client is gone
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// One-shot notification of client disconnect, usable independently of
    /// the writer
    pub fn disconnect_signal(&self) -> DisconnectSignal {
        DisconnectSignal {
            tx: self.tx.clone(),
        }
    }

    /// Keep the body open after the writer is dropped, until the guard is
    pub fn keep_open(&self) -> BodyGuard {
        BodyGuard {
            _tx: self.tx.clone(),
        }
    }
}

/// Fires when the client connection is gone
pub struct DisconnectSignal {
    tx: mpsc::Sender<Chunk>,
}

impl DisconnectSignal {
    /// Wait for the disconnect
    pub async fn fired(&self) {
        self.tx.closed().await
    }
}

/// Holds the response body open; the client sees end of body only after
/// every writer, signal and guard is dropped
pub struct BodyGuard {
    _tx: mpsc::Sender<Chunk>,
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready, assert_ready_ok};

    #[tokio::test]
    async fn test_write_then_end() {
        let (writer, body) = response_channel(4);
        writer.write(Bytes::from_static(b"abc")).await.unwrap();
        drop(writer);

        let chunks: Vec<Bytes> = body.map(|c| c.unwrap()).collect().await;
        assert_eq!(chunks, vec![Bytes::from_static(b"abc")]);
    }

    #[test]
    fn test_flush_waits_for_first_poll() {
        let (mut writer, mut body) = response_channel(4);

        {
            let mut flush = task::spawn(writer.flush());
            assert_pending!(flush.poll());

            let mut next = task::spawn(body.next());
            assert_pending!(next.poll());

            assert!(flush.is_woken());
            assert_ready_ok!(flush.poll());
        }

        assert!(writer.headers_committed());
    }

    #[tokio::test]
    async fn test_flush_after_body_dropped() {
        let (mut writer, body) = response_channel(4);
        drop(body);

        assert_eq!(writer.flush().await, Err(Disconnected));
        assert!(!writer.headers_committed());
    }

    #[test]
    fn test_disconnect_signal_fires_when_body_dropped() {
        let (writer, body) = response_channel(4);
        let signal = writer.disconnect_signal();

        let mut fired = task::spawn(signal.fired());
        assert_pending!(fired.poll());

        drop(body);

        assert!(fired.is_woken());
        assert_ready!(fired.poll());
    }

    #[tokio::test]
    async fn test_write_after_disconnect() {
        let (writer, body) = response_channel(4);
        drop(body);

        let result = writer.write(Bytes::from_static(b"late")).await;
        assert_eq!(result, Err(Disconnected));
    }

    #[tokio::test]
    async fn test_abort_surfaces_error() {
        let (writer, mut body) = response_channel(4);
        writer
            .abort(io::Error::new(io::ErrorKind::ConnectionReset, "peer reset"))
            .await;
        drop(writer);

        let err = body.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_guard_holds_body_open() {
        let (writer, mut body) = response_channel(4);
        let guard = writer.keep_open();
        drop(writer);

        let mut next = task::spawn(body.next());
        assert_pending!(next.poll());

        drop(guard);
        assert!(next.is_woken());
        assert!(assert_ready!(next.poll()).is_none());
    }
}
