//! Copy-or-cancel race
//!
//! Streams a byte source into a client response from a dedicated task while
//! the caller watches for the client going away. Exactly one of the two
//! ends the race: the copy reaching end of stream, or the disconnect.

use std::io;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tracing::{debug, error};

use crate::transport::ResponseWriter;

/// How a relayed stream ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome {
    /// Source reached end of stream and every byte was handed to the client
    Completed { bytes: u64 },

    /// Client disconnected first; the cancel hook ran
    ClientGone { bytes: u64 },

    /// Source failed mid-stream; the client body was aborted
    SourceFailed { bytes: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CopyEnd {
    Eof,
    SinkClosed,
    SourceError,
}

/// Run the copy in its own task and race it against client disconnect.
///
/// `on_cancel` runs at most once, only when the disconnect wins. The race
/// then waits for the copy task to wind down before returning, so nothing
/// is still touching `source` once this resolves.
pub async fn copy_or_cancel<S, F>(source: S, writer: ResponseWriter, on_cancel: F) -> RaceOutcome
where
    S: Stream<Item = io::Result<Bytes>> + Send + 'static,
    F: FnOnce(),
{
    let disconnect = writer.disconnect_signal();
    let mut copy = tokio::spawn(copy_stream(source, writer));

    let finished = tokio::select! {
        biased;
        _ = disconnect.fired() => None,
        copied = &mut copy => Some(copied),
    };

    match finished {
        Some(copied) => match flatten(copied) {
            (CopyEnd::Eof, bytes) => RaceOutcome::Completed { bytes },
            (CopyEnd::SourceError, bytes) => RaceOutcome::SourceFailed { bytes },
            // Sink closed without the signal winning: same thing, the client left
            (CopyEnd::SinkClosed, bytes) => {
                on_cancel();
                RaceOutcome::ClientGone { bytes }
            }
        },
        None => {
            on_cancel();
            let (_, bytes) = flatten(copy.await);
            RaceOutcome::ClientGone { bytes }
        }
    }
}

fn flatten(joined: Result<(CopyEnd, u64), tokio::task::JoinError>) -> (CopyEnd, u64) {
    joined.unwrap_or_else(|e| {
        error!(error = %e, "Copy task failed");
        (CopyEnd::SourceError, 0)
    })
}

/// Pump `source` into `writer` until end of stream, a source error, or the
/// client leaving
async fn copy_stream<S>(source: S, writer: ResponseWriter) -> (CopyEnd, u64)
where
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    let mut source = Box::pin(source);
    let mut copied = 0u64;

    loop {
        let next = tokio::select! {
            biased;
            _ = writer.closed() => return (CopyEnd::SinkClosed, copied),
            next = source.next() => next,
        };

        match next {
            Some(Ok(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                let len = chunk.len() as u64;
                if writer.write(chunk).await.is_err() {
                    return (CopyEnd::SinkClosed, copied);
                }
                copied += len;
            }
            Some(Err(e)) => {
                debug!(error = %e, copied, "Source failed mid-stream");
                writer.abort(e).await;
                return (CopyEnd::SourceError, copied);
            }
            None => return (CopyEnd::Eof, copied),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
