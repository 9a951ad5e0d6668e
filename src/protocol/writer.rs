//! Chunked message writer.
//!
//! Small writes are cached and coalesced into one DATA chunk of at least
//! `min_chunk_size` bytes. Writes larger than a header can describe are split.
//! `finish` flushes the cache and appends the terminal chunk; the writer can
//! then start the next message.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::chunk::{self, ChunkKind, Status, MAX_CHUNK_SIZE, TERMINAL_HEADER};
use crate::protocol::ProtocolError;

/// Default coalescing threshold for DATA chunks.
pub const DEFAULT_MIN_CHUNK_SIZE: usize = 65535;

/// Frames outgoing bytes as a chunked message.
#[derive(Debug)]
pub struct ChunkWriter<W> {
    sink: W,
    cache: Vec<u8>,
    min_chunk_size: usize,
}

impl<W: AsyncWrite + Unpin> ChunkWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            cache: Vec::with_capacity(DEFAULT_MIN_CHUNK_SIZE),
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
        }
    }

    /// Create a writer that coalesces DATA up to `min_chunk_size` bytes.
    pub fn with_min_chunk_size(sink: W, min_chunk_size: usize) -> Result<Self, ProtocolError> {
        if min_chunk_size > MAX_CHUNK_SIZE {
            return Err(ProtocolError::ChunkTooLarge(min_chunk_size));
        }
        Ok(Self {
            sink,
            cache: Vec::with_capacity(min_chunk_size),
            min_chunk_size,
        })
    }

    /// Bytes cached but not yet framed.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn into_inner(self) -> W {
        self.sink
    }

    /// Append message payload.
    pub async fn write_data(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if self.cache.len() + bytes.len() < self.min_chunk_size {
            self.cache.extend_from_slice(bytes);
            return Ok(());
        }
        self.flush_with(bytes).await
    }

    /// Send an EXTENSION chunk. Cached DATA is framed first to keep ordering.
    pub async fn write_extension(&mut self, text: &str) -> Result<(), ProtocolError> {
        self.flush_with(&[]).await?;
        let header = chunk::encode_header(text.len(), ChunkKind::Extension)?;
        self.sink.write_all(&header).await?;
        self.sink.write_all(text.as_bytes()).await?;
        Ok(())
    }

    /// Send a `status=` extension.
    pub async fn write_status(&mut self, status: &Status) -> Result<(), ProtocolError> {
        self.write_extension(&chunk::status_extension(status)).await
    }

    /// Frame anything cached, then end the message with the terminal chunk.
    pub async fn finish(&mut self) -> Result<(), ProtocolError> {
        self.flush_with(&[]).await?;
        self.sink.write_all(&TERMINAL_HEADER).await?;
        self.sink.flush().await?;
        tracing::trace!("Chunked message finished");
        Ok(())
    }

    /// Flush the underlying sink without framing the cache.
    pub async fn flush(&mut self) -> Result<(), ProtocolError> {
        self.sink.flush().await?;
        Ok(())
    }

    async fn flush_with(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let mut rest = bytes;
        while !self.cache.is_empty() || !rest.is_empty() {
            let room = MAX_CHUNK_SIZE - self.cache.len();
            let (head, tail) = rest.split_at(rest.len().min(room));

            let header = chunk::encode_header(self.cache.len() + head.len(), ChunkKind::Data)?;
            self.sink.write_all(&header).await?;
            self.sink.write_all(&self.cache).await?;
            self.sink.write_all(head).await?;

            self.cache.clear();
            rest = tail;
        }
        Ok(())
    }
}
