//! Worker session: connection, handshake and one request/response exchange.

use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;

use crate::protocol::chunk::Status;
use crate::protocol::reader::{ChunkStreamReader, MessageOutcome, ReaderLimits};
use crate::protocol::writer::{ChunkWriter, DEFAULT_MIN_CHUNK_SIZE};
use crate::protocol::ProtocolError;

/// Sent by the gateway as soon as the connection is up.
pub const CLIENT_HELLO: &[u8] = b"gateway:hello";

/// Worker's answer when it accepts the session.
pub const WORKER_READY: &[u8] = b"worker:ready";

/// Worker's answer when it cannot serve the session.
pub const WORKER_UNDEFINED: &[u8] = b"worker:undefined";

/// Connection and framing parameters for a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub limits: ReaderLimits,
    pub min_chunk_size: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(30),
            limits: ReaderLimits::default(),
            min_chunk_size: DEFAULT_MIN_CHUNK_SIZE,
        }
    }
}

/// An established, handshaken connection to one worker.
#[derive(Debug)]
pub struct WorkerSession<S> {
    reader: ChunkStreamReader<ReadHalf<S>>,
    writer: ChunkWriter<WriteHalf<S>>,
}

impl WorkerSession<TcpStream> {
    /// Connect to `address` and perform the handshake.
    pub async fn connect(address: &str, settings: &SessionSettings) -> Result<Self, ProtocolError> {
        let stream = tokio::time::timeout(settings.connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| ProtocolError::TimedOut)??;
        stream.set_nodelay(true)?;
        tracing::debug!(address = %address, "Connected to worker");
        Self::establish(stream, settings).await
    }
}

impl<S> WorkerSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the handshake over an already open stream.
    pub async fn establish(mut stream: S, settings: &SessionSettings) -> Result<Self, ProtocolError> {
        stream.write_all(CLIENT_HELLO).await?;
        stream.flush().await?;

        let mut answer = [0u8; WORKER_READY.len()];
        tokio::time::timeout(settings.read_timeout, stream.read_exact(&mut answer))
            .await
            .map_err(|_| ProtocolError::TimedOut)?
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => {
                    ProtocolError::Handshake("connection closed during handshake".into())
                }
                _ => ProtocolError::Io(e),
            })?;

        if answer != WORKER_READY {
            let text = String::from_utf8_lossy(&answer).into_owned();
            if WORKER_UNDEFINED.starts_with(&answer) {
                tracing::error!("Worker refused the session, it may be down or busy");
            }
            return Err(ProtocolError::Handshake(text));
        }

        let (read_half, write_half) = tokio::io::split(stream);
        let reader = ChunkStreamReader::with_limits(read_half, settings.limits)
            .with_read_timeout(settings.read_timeout);
        let writer = ChunkWriter::with_min_chunk_size(write_half, settings.min_chunk_size)?;
        Ok(Self { reader, writer })
    }

    /// Send one request as a complete chunked message.
    pub async fn send_request(&mut self, request: &str) -> Result<(), ProtocolError> {
        tracing::trace!(request = %request, "Sending worker request");
        self.writer.write_data(request.as_bytes()).await?;
        self.writer.finish().await
    }

    /// Read the worker's response message into the sinks.
    pub async fn read_response<D, E>(
        &mut self,
        data: &mut D,
        errors: &mut E,
    ) -> Result<MessageOutcome, ProtocolError>
    where
        D: AsyncWrite + Unpin + ?Sized,
        E: AsyncWrite + Unpin + ?Sized,
    {
        self.reader.read_message(data, errors).await
    }

    /// End the session, telling the worker unless it already left.
    pub async fn close(mut self) {
        if !self.reader.is_closed() {
            if let Err(e) = self.writer.write_status(&Status::Exit).await {
                tracing::debug!(error = %e, "Unable to inform worker of session end");
            } else if let Err(e) = self.writer.finish().await {
                tracing::debug!(error = %e, "Unable to inform worker of session end");
            }
        }
        let mut write_half = self.writer.into_inner();
        let _ = write_half.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    /// Minimal worker: handshake, echo the request back upper-cased.
    async fn fake_worker(stream: DuplexStream, answer: &'static [u8]) {
        let (mut rd, mut wr) = tokio::io::split(stream);
        let mut hello = [0u8; CLIENT_HELLO.len()];
        rd.read_exact(&mut hello).await.unwrap();
        assert_eq!(&hello, CLIENT_HELLO);
        wr.write_all(answer).await.unwrap();
        if answer != WORKER_READY {
            return;
        }

        let mut reader = ChunkStreamReader::new(rd);
        let (mut request, mut errors) = (Vec::new(), Vec::new());
        reader.read_message(&mut request, &mut errors).await.unwrap();

        let mut writer = ChunkWriter::new(wr);
        writer.write_data(&request.to_ascii_uppercase()).await.unwrap();
        writer.finish().await.unwrap();
    }

    #[tokio::test]
    async fn test_exchange() {
        let (client, worker) = tokio::io::duplex(1024);
        tokio::spawn(fake_worker(worker, WORKER_READY));

        let mut session = WorkerSession::establish(client, &SessionSettings::default())
            .await
            .unwrap();
        session.send_request("show version;").await.unwrap();

        let (mut data, mut errors) = (Vec::new(), Vec::new());
        let outcome = session.read_response(&mut data, &mut errors).await.unwrap();
        assert!(outcome.is_success());
        assert_eq!(data, b"SHOW VERSION;");
        session.close().await;
    }

    #[tokio::test]
    async fn test_handshake_rejected() {
        let (client, worker) = tokio::io::duplex(1024);
        tokio::spawn(fake_worker(worker, WORKER_UNDEFINED));

        let err = WorkerSession::establish(client, &SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Handshake(_)));
    }

    #[tokio::test]
    async fn test_handshake_eof() {
        let (client, worker) = tokio::io::duplex(1024);
        drop(worker);

        let err = WorkerSession::establish(client, &SessionSettings::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Handshake(_) | ProtocolError::Io(_)));
    }
}
