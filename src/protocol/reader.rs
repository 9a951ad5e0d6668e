//! Chunked message reader.
//!
//! # Responsibilities
//! - Deframe a byte stream into DATA / EXTENSION chunks
//! - Route DATA payload to the data sink, or to the error sink once the
//!   worker has signaled `status=error`
//! - Honor `status=exit` (close at the terminal chunk or end of stream) and
//!   `status=exit!` (drop the source immediately)
//!
//! # Design Decisions
//! - One reader per response stream; it is never shared between tasks
//! - The chunk buffer doubles on demand up to `max_buffer_size`
//! - Any failed, timed out or cancelled read leaves the reader unusable

use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::protocol::chunk::{self, ChunkHeader, ChunkKind, Directive, Status, HEADER_SIZE};
use crate::protocol::ProtocolError;

/// Default starting size of the chunk buffer.
pub const DEFAULT_INITIAL_BUFFER_SIZE: usize = 10 * 1024;

/// Default upper bound for a single chunk.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Chunk buffer sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderLimits {
    pub initial_buffer_size: usize,
    pub max_buffer_size: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            initial_buffer_size: DEFAULT_INITIAL_BUFFER_SIZE,
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
        }
    }
}

/// A chunk as read off the stream. The payload borrows the reader's buffer.
#[derive(Debug)]
pub struct Chunk<'a> {
    pub kind: ChunkKind,
    pub payload: &'a [u8],
}

/// What a single `process_chunk` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkEvent {
    /// Payload bytes were written to one of the sinks.
    Data { len: usize, to_error_sink: bool },
    /// Extension directives were applied.
    Extension,
    /// The terminal chunk was read; the message is complete.
    End,
}

/// Summary of a fully drained message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageOutcome {
    /// The worker signaled `status=error` somewhere in the message.
    pub backend_error: bool,
    pub data_bytes: u64,
    pub error_bytes: u64,
    /// The worker ended the session with `status=exit`.
    pub session_closed: bool,
}

impl MessageOutcome {
    pub fn is_success(&self) -> bool {
        !self.backend_error
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    Open,
    Closed,
    Failed,
}

/// Reads chunked messages from an async byte source.
#[derive(Debug)]
pub struct ChunkStreamReader<R> {
    source: Option<R>,
    limits: ReaderLimits,
    buffer: Vec<u8>,
    current: Option<ChunkHeader>,
    /// Header consumed while honoring `status=exit` that still has to be read.
    pending: Option<ChunkHeader>,
    state: ReaderState,
    in_flight: bool,
    /// `status=error` seen in the message being read.
    message_error: bool,
    /// Whether the last completed message carried `status=error`.
    ended_in_error: bool,
    read_timeout: Option<Duration>,
    payload_bytes: u64,
}

impl<R: AsyncRead + Unpin> ChunkStreamReader<R> {
    /// Wrap a source with default buffer limits.
    pub fn new(source: R) -> Self {
        Self::with_limits(source, ReaderLimits::default())
    }

    /// Wrap a source with explicit buffer limits.
    pub fn with_limits(source: R, limits: ReaderLimits) -> Self {
        let initial = limits.initial_buffer_size.min(limits.max_buffer_size);
        Self {
            source: Some(source),
            limits,
            buffer: vec![0; initial],
            current: None,
            pending: None,
            state: ReaderState::Open,
            in_flight: false,
            message_error: false,
            ended_in_error: false,
            read_timeout: None,
            payload_bytes: 0,
        }
    }

    /// Bound every individual read from the source.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Current size of the chunk buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Total payload bytes read so far (DATA and EXTENSION).
    pub fn payload_bytes(&self) -> u64 {
        self.payload_bytes
    }

    /// Header of the most recently read chunk.
    pub fn current_header(&self) -> Option<ChunkHeader> {
        self.current
    }

    /// True when the most recent chunk was the terminal DATA chunk.
    pub fn is_last_chunk(&self) -> bool {
        self.current.is_some_and(|h| h.is_terminal())
    }

    /// True once the worker closed the session or the source was dropped.
    pub fn is_closed(&self) -> bool {
        self.state == ReaderState::Closed
    }

    /// Give back the source, unless an emergency exit already dropped it.
    pub fn into_inner(self) -> Option<R> {
        self.source
    }

    /// Read one header. `Ok(None)` means the source ended cleanly at a chunk
    /// boundary.
    pub async fn read_chunk_header(&mut self) -> Result<Option<ChunkHeader>, ProtocolError> {
        self.begin()?;
        let result = self.next_header().await;
        self.finish(result)
    }

    /// Read one header and its payload.
    pub async fn read_chunk(&mut self) -> Result<Option<Chunk<'_>>, ProtocolError> {
        self.begin()?;
        let result = self.next_chunk().await;
        let header = self.finish(result)?;
        Ok(header.map(|h| Chunk {
            kind: h.kind,
            payload: &self.buffer[..h.length],
        }))
    }

    /// Read one chunk and route it to the appropriate sink.
    pub async fn process_chunk<D, E>(
        &mut self,
        data: &mut D,
        errors: &mut E,
    ) -> Result<ChunkEvent, ProtocolError>
    where
        D: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        self.begin()?;
        let result = self.route_chunk(data, errors).await;
        self.finish(result)
    }

    /// Drain one complete message into the sinks.
    pub async fn read_message<D, E>(
        &mut self,
        data: &mut D,
        errors: &mut E,
    ) -> Result<MessageOutcome, ProtocolError>
    where
        D: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        self.begin()?;
        let result = self.drain_message(data, errors).await;
        self.finish(result)
    }

    fn begin(&mut self) -> Result<(), ProtocolError> {
        if self.in_flight {
            // A previous read future was dropped before completing.
            tracing::warn!("Chunk reader used after a cancelled read");
            self.state = ReaderState::Failed;
        }
        match self.state {
            ReaderState::Failed => Err(ProtocolError::Poisoned),
            ReaderState::Closed => Err(ProtocolError::Closed),
            ReaderState::Open => {
                self.in_flight = true;
                Ok(())
            }
        }
    }

    fn finish<T>(&mut self, result: Result<T, ProtocolError>) -> Result<T, ProtocolError> {
        self.in_flight = false;
        if let Err(e) = &result {
            if !matches!(e, ProtocolError::EmergencyExit) {
                tracing::debug!(error = %e, "Chunk reader failed");
                self.state = ReaderState::Failed;
            }
        }
        result
    }

    async fn drain_message<D, E>(
        &mut self,
        data: &mut D,
        errors: &mut E,
    ) -> Result<MessageOutcome, ProtocolError>
    where
        D: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        let mut outcome = MessageOutcome::default();

        loop {
            match self.route_chunk(data, errors).await? {
                ChunkEvent::Data { len, to_error_sink: true } => outcome.error_bytes += len as u64,
                ChunkEvent::Data { len, to_error_sink: false } => outcome.data_bytes += len as u64,
                ChunkEvent::Extension => {}
                ChunkEvent::End => break,
            }
        }

        outcome.backend_error = self.ended_in_error;
        outcome.session_closed = self.state == ReaderState::Closed;
        tracing::debug!(
            data_bytes = outcome.data_bytes,
            error_bytes = outcome.error_bytes,
            backend_error = outcome.backend_error,
            "Chunked message complete"
        );
        Ok(outcome)
    }

    async fn route_chunk<D, E>(
        &mut self,
        data: &mut D,
        errors: &mut E,
    ) -> Result<ChunkEvent, ProtocolError>
    where
        D: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        let header = self.next_chunk().await?.ok_or(ProtocolError::UnexpectedEof)?;

        match header.kind {
            ChunkKind::Data if header.length == 0 => Ok(self.end_message()),
            ChunkKind::Data => {
                let payload = &self.buffer[..header.length];
                if self.message_error {
                    errors.write_all(payload).await?;
                    errors.flush().await?;
                } else {
                    data.write_all(payload).await?;
                    data.flush().await?;
                }
                Ok(ChunkEvent::Data {
                    len: header.length,
                    to_error_sink: self.message_error,
                })
            }
            ChunkKind::Extension => {
                let text = String::from_utf8_lossy(&self.buffer[..header.length]).into_owned();
                self.apply_extension(&text).await
            }
        }
    }

    async fn apply_extension(&mut self, text: &str) -> Result<ChunkEvent, ProtocolError> {
        for directive in chunk::parse_extension(text) {
            match directive {
                Directive::Status(Status::Error) => {
                    tracing::debug!("Worker signaled an error status");
                    self.message_error = true;
                }
                Directive::Status(Status::Exit) => match self.next_header().await? {
                    Some(next) if !next.is_terminal() => self.pending = Some(next),
                    _ => {
                        tracing::debug!("Stream closed by worker");
                        self.state = ReaderState::Closed;
                        return Ok(self.end_message());
                    }
                },
                Directive::Status(Status::EmergencyExit) => {
                    tracing::error!("Worker requested an emergency exit, closing stream");
                    self.source = None;
                    self.pending = None;
                    self.state = ReaderState::Closed;
                    return Err(ProtocolError::EmergencyExit);
                }
                Directive::Status(Status::Other(value)) => {
                    tracing::debug!(status = %value, "Ignoring status extension");
                }
                Directive::Unknown(clause) => {
                    tracing::debug!(extension = %clause, "Ignoring extension");
                }
            }
        }
        Ok(ChunkEvent::Extension)
    }

    fn end_message(&mut self) -> ChunkEvent {
        self.ended_in_error = std::mem::take(&mut self.message_error);
        ChunkEvent::End
    }

    async fn next_header(&mut self) -> Result<Option<ChunkHeader>, ProtocolError> {
        if let Some(header) = self.pending.take() {
            self.current = Some(header);
            return Ok(Some(header));
        }

        let source = self.source.as_mut().ok_or(ProtocolError::Closed)?;
        let mut raw = [0u8; HEADER_SIZE];
        let filled = read_up_to(source, &mut raw, self.read_timeout).await?;

        if filled == 0 {
            self.current = None;
            return Ok(None);
        }
        if filled < HEADER_SIZE {
            return Err(ProtocolError::Truncated {
                expected: HEADER_SIZE,
                read: filled,
            });
        }

        let header = chunk::decode_header(&raw)?;
        tracing::trace!(length = header.length, kind = ?header.kind, "Chunk header");
        self.current = Some(header);
        Ok(Some(header))
    }

    async fn next_chunk(&mut self) -> Result<Option<ChunkHeader>, ProtocolError> {
        let Some(header) = self.next_header().await? else {
            return Ok(None);
        };

        self.ensure_capacity(header.length)?;

        let source = self.source.as_mut().ok_or(ProtocolError::Closed)?;
        let filled = read_up_to(source, &mut self.buffer[..header.length], self.read_timeout).await?;
        if filled < header.length {
            return Err(ProtocolError::Truncated {
                expected: header.length,
                read: filled,
            });
        }

        self.payload_bytes += header.length as u64;
        Ok(Some(header))
    }

    fn ensure_capacity(&mut self, needed: usize) -> Result<(), ProtocolError> {
        if needed <= self.buffer.len() {
            return Ok(());
        }
        let max = self.limits.max_buffer_size;
        if needed > max {
            tracing::error!(requested = needed, max, "Chunk exceeds buffer limit");
            return Err(ProtocolError::BufferCapacityExceeded {
                requested: needed,
                max,
            });
        }

        let mut size = self.buffer.len().max(1);
        while size < needed {
            size = size.saturating_mul(2);
        }
        let size = size.min(max);
        tracing::debug!(from = self.buffer.len(), to = size, "Growing chunk buffer");
        self.buffer.resize(size, 0);
        Ok(())
    }
}

/// Fill `buf` from `source`, stopping early only at end of stream.
async fn read_up_to<R>(
    source: &mut R,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let fill = async move {
        let mut filled = 0;
        while filled < buf.len() {
            let n = source.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok::<usize, io::Error>(filled)
    };

    let filled = match timeout {
        Some(limit) => tokio::time::timeout(limit, fill)
            .await
            .map_err(|_| ProtocolError::TimedOut)??,
        None => fill.await?,
    };
    Ok(filled)
}
