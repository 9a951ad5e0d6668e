//! Worker wire protocol.
//!
//! # Data Flow
//! ```text
//! Gateway → worker:
//!     session.rs (connect, handshake)
//!     → writer.rs (request text → DATA chunks → terminal chunk)
//!
//! Worker → gateway:
//!     bytes on the socket
//!     → chunk.rs (decode 8-byte headers, parse extension directives)
//!     → reader.rs (reassemble message, route DATA to data/error sink)
//!     → MessageOutcome
//! ```
//!
//! # Design Decisions
//! - Message length is never known in advance; the terminal chunk ends it
//! - Every framing fault is fatal for the stream; no internal retries
//! - A reader whose read was cancelled refuses further reads

pub mod chunk;
pub mod reader;
pub mod session;
pub mod writer;

use std::io;
use thiserror::Error;

pub use chunk::{ChunkHeader, ChunkKind, Directive, Status, HEADER_SIZE, MAX_CHUNK_SIZE};
pub use reader::{ChunkEvent, ChunkStreamReader, MessageOutcome, ReaderLimits};
pub use session::WorkerSession;
pub use writer::ChunkWriter;

/// Errors raised while framing or deframing a chunked stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed chunk header: {0}")]
    MalformedHeader(String),

    #[error("stream ended after {read} of {expected} bytes")]
    Truncated { expected: usize, read: usize },

    #[error("stream ended before the terminal chunk")]
    UnexpectedEof,

    #[error("chunk of {requested} bytes exceeds the {max} byte buffer limit")]
    BufferCapacityExceeded { requested: usize, max: usize },

    #[error("chunk of {0} bytes cannot be encoded")]
    ChunkTooLarge(usize),

    #[error("worker requested an emergency exit")]
    EmergencyExit,

    #[error("read from worker timed out")]
    TimedOut,

    #[error("reader is unusable after an interrupted or failed read")]
    Poisoned,

    #[error("stream is closed")]
    Closed,

    #[error("handshake rejected: {0}")]
    Handshake(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ProtocolError {
    /// True for corruption of the framing itself (bad or missing bytes).
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::MalformedHeader(_)
                | ProtocolError::Truncated { .. }
                | ProtocolError::UnexpectedEof
        )
    }
}
