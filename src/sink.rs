//! Output boundary toward the recognition/consumer layer.

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::error::ErrorKind;
use crate::format::NormalizedChunk;

/// Consumer of the normalized stream.
///
/// `on_chunk` is invoked from the capture thread strictly in packet-retrieval
/// order and takes ownership of the chunk. Implementations must not block for
/// long; the capture loop runs on a latency budget of one poll interval.
pub trait AudioSink: Send + Sync {
    fn on_chunk(&self, chunk: NormalizedChunk);

    fn on_error(&self, message: &str, kind: ErrorKind);
}

/// Error report delivered on the error channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub message: String,
    pub kind: ErrorKind,
}

/// Channel-backed sink: chunks and errors each get their own unbounded
/// channel so a slow consumer delays delivery instead of losing audio.
pub struct ChannelSink {
    chunks: Sender<NormalizedChunk>,
    errors: Sender<ErrorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<NormalizedChunk>, Receiver<ErrorEvent>) {
        let (chunk_tx, chunk_rx) = unbounded();
        let (error_tx, error_rx) = unbounded();
        (
            Self {
                chunks: chunk_tx,
                errors: error_tx,
            },
            chunk_rx,
            error_rx,
        )
    }
}

impl AudioSink for ChannelSink {
    fn on_chunk(&self, chunk: NormalizedChunk) {
        // A dropped receiver means the consumer went away; the controller
        // stop path handles shutdown, so the send result is not an error.
        let _ = self.chunks.send(chunk);
    }

    fn on_error(&self, message: &str, kind: ErrorKind) {
        let _ = self.errors.send(ErrorEvent {
            message: message.to_string(),
            kind,
        });
    }
}
