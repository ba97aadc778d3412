//! In-memory byte pipe with one write end and one read end
//!
//! The producer holds a [`PipeWriter`]; exactly one consumer may claim the
//! [`PipeReader`]. Either side can close the write end. Once closed, the
//! reader drains whatever is still buffered and then sees end of stream,
//! while further writes fail with `BrokenPipe`.

use std::fmt;
use std::io;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Default buffer capacity for a new pipe
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

struct PipeState {
    buf: BytesMut,
    write_closed: bool,
    reader_taken: bool,
}

struct Shared {
    id: String,
    capacity: usize,
    state: Mutex<PipeState>,
    readable: Notify,
    writable: Notify,
}

impl Shared {
    /// Wake every waiter; several writer handles may be blocked at once
    fn close_write(&self) {
        self.state.lock().write_closed = true;
        self.readable.notify_waiters();
        self.readable.notify_one();
        self.writable.notify_waiters();
        self.writable.notify_one();
    }
}

// ─────────────────────────────────────────────────────────────────
// Pipe
// ─────────────────────────────────────────────────────────────────

/// Handle to a pipe; cheap to clone, every clone refers to the same buffer
#[derive(Clone)]
pub struct Pipe {
    shared: Arc<Shared>,
}

impl Pipe {
    /// Create a pipe buffering at most `capacity` bytes between the ends
    pub fn new(id: impl Into<String>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                id: id.into(),
                capacity,
                state: Mutex::new(PipeState {
                    buf: BytesMut::with_capacity(capacity.min(DEFAULT_PIPE_CAPACITY)),
                    write_closed: false,
                    reader_taken: false,
                }),
                readable: Notify::new(),
                writable: Notify::new(),
            }),
        }
    }

    /// Pipe identifier
    pub fn id(&self) -> &str {
        &self.shared.id
    }

    /// Get a write handle for the producer
    pub fn writer(&self) -> PipeWriter {
        PipeWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Claim the read end. Returns `None` if it was already claimed.
    pub fn take_reader(&self) -> Option<PipeReader> {
        let mut state = self.shared.state.lock();
        if state.reader_taken {
            return None;
        }
        state.reader_taken = true;
        Some(PipeReader {
            shared: Arc::clone(&self.shared),
        })
    }

    /// Force-close the write end, telling the producer nobody is listening
    pub fn close_write(&self) {
        self.shared.close_write();
    }

    /// Whether the write end has been closed by either side
    pub fn is_write_closed(&self) -> bool {
        self.shared.state.lock().write_closed
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Pipe")
            .field("id", &self.shared.id)
            .field("buffered", &state.buf.len())
            .field("write_closed", &state.write_closed)
            .field("reader_taken", &state.reader_taken)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Write end
// ─────────────────────────────────────────────────────────────────

/// Write end of a pipe
pub struct PipeWriter {
    shared: Arc<Shared>,
}

impl PipeWriter {
    /// Write all of `data`, waiting for the reader whenever the buffer is full
    pub async fn write_all(&self, mut data: &[u8]) -> io::Result<()> {
        while !data.is_empty() {
            // Registered before the state check so a close in between is not lost
            let notified = self.shared.writable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if state.write_closed {
                    return Err(io::Error::new(
                        io::ErrorKind::BrokenPipe,
                        format!("pipe {} is closed", self.shared.id),
                    ));
                }

                let room = self.shared.capacity.saturating_sub(state.buf.len());
                if room > 0 {
                    let n = room.min(data.len());
                    state.buf.extend_from_slice(&data[..n]);
                    data = &data[n..];
                    drop(state);
                    self.shared.readable.notify_one();
                    continue;
                }
            }
            notified.await;
        }
        Ok(())
    }

    /// Finish the stream; the reader sees end of stream after draining
    pub fn close(&self) {
        self.shared.close_write();
    }

    /// Whether the write end is closed (by us, or by the reader giving up)
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().write_closed
    }
}

// ─────────────────────────────────────────────────────────────────
// Read end
// ─────────────────────────────────────────────────────────────────

/// Read end of a pipe. Dropping it closes the write end.
pub struct PipeReader {
    shared: Arc<Shared>,
}

impl PipeReader {
    /// Take everything currently buffered, waiting if the buffer is empty.
    /// Returns `None` once the write end is closed and the buffer drained.
    pub async fn read_chunk(&mut self) -> Option<Bytes> {
        loop {
            let notified = self.shared.readable.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.shared.state.lock();
                if !state.buf.is_empty() {
                    let chunk = state.buf.split().freeze();
                    drop(state);
                    self.shared.writable.notify_one();
                    return Some(chunk);
                }
                if state.write_closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Adapt the reader into a byte stream
    pub fn into_stream(self) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
        stream::unfold(self, |mut reader| async move {
            reader.read_chunk().await.map(|chunk| (Ok(chunk), reader))
        })
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.close_write();
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
