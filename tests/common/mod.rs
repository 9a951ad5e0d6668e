//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};

use worker_gateway::config::{GatewayConfig, ResponderConfig, WorkerConfig};
use worker_gateway::protocol::session::{CLIENT_HELLO, WORKER_READY, WORKER_UNDEFINED};
use worker_gateway::protocol::{ChunkStreamReader, ChunkWriter, Status};
use worker_gateway::{HttpServer, Shutdown};

/// What a mock worker sends back for one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Data(Vec<u8>),
    /// DATA, then `status=error;` and the error text.
    Error { partial: Vec<u8>, message: Vec<u8> },
    /// DATA, then `status=exit!;`.
    EmergencyExit(Vec<u8>),
    /// Raw bytes with no valid framing.
    Garbage(Vec<u8>),
}

/// A running mock worker.
pub struct MockWorker {
    pub address: String,
    pub sessions: Arc<AtomicUsize>,
    pub requests: mpsc::UnboundedReceiver<String>,
}

/// Start a worker that answers every request with `handler(request)`.
pub async fn start_worker<F>(handler: F) -> MockWorker
where
    F: Fn(&str) -> Reply + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    let sessions = Arc::new(AtomicUsize::new(0));
    let (tx, requests) = mpsc::unbounded_channel();
    let handler = Arc::new(handler);

    let counter = sessions.clone();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let handler = handler.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                serve_session(socket, handler.as_ref(), tx).await;
            });
        }
    });

    MockWorker {
        address,
        sessions,
        requests,
    }
}

async fn serve_session<F>(mut socket: TcpStream, handler: &F, tx: mpsc::UnboundedSender<String>)
where
    F: Fn(&str) -> Reply,
{
    let mut hello = [0u8; CLIENT_HELLO.len()];
    if socket.read_exact(&mut hello).await.is_err() || hello != CLIENT_HELLO {
        return;
    }
    if socket.write_all(WORKER_READY).await.is_err() {
        return;
    }

    let (rd, wr) = socket.into_split();
    let mut reader = ChunkStreamReader::new(rd);
    let mut writer = ChunkWriter::new(wr);

    loop {
        let (mut request, mut errors) = (Vec::new(), Vec::new());
        match reader.read_message(&mut request, &mut errors).await {
            Ok(outcome) if outcome.session_closed => return,
            Ok(_) => {}
            Err(_) => return,
        }
        let request = String::from_utf8_lossy(&request).into_owned();
        let _ = tx.send(request.clone());

        let written = match handler(&request) {
            Reply::Data(body) => write_message(&mut writer, &body, None).await,
            Reply::Error { partial, message } => {
                write_message(&mut writer, &partial, Some((Status::Error, message))).await
            }
            Reply::EmergencyExit(partial) => {
                write_message(&mut writer, &partial, Some((Status::EmergencyExit, Vec::new()))).await
            }
            Reply::Garbage(bytes) => {
                let mut raw = writer.into_inner();
                let _ = raw.write_all(&bytes).await;
                let _ = raw.shutdown().await;
                return;
            }
        };
        if written.is_err() {
            return;
        }
    }
}

async fn write_message<W>(
    writer: &mut ChunkWriter<W>,
    body: &[u8],
    status: Option<(Status, Vec<u8>)>,
) -> Result<(), worker_gateway::protocol::ProtocolError>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    writer.write_data(body).await?;
    if let Some((status, trailer)) = status {
        writer.write_status(&status).await?;
        if !trailer.is_empty() {
            writer.write_data(&trailer).await?;
        }
    }
    writer.finish().await
}

/// Start a worker that refuses every handshake.
pub async fn start_refusing_worker() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut hello = [0u8; CLIENT_HELLO.len()];
            let _ = socket.read_exact(&mut hello).await;
            let _ = socket.write_all(WORKER_UNDEFINED).await;
        }
    });
    address
}

/// An address nothing listens on.
pub async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

pub fn worker(name: &str, address: &str) -> WorkerConfig {
    WorkerConfig {
        name: name.to_string(),
        address: address.to_string(),
        max_connections: 8,
    }
}

pub fn responder(name: &str, suffix: &str, media_type: &str, command: &str) -> ResponderConfig {
    ResponderConfig {
        name: name.to_string(),
        suffix: suffix.to_string(),
        media_type: media_type.to_string(),
        command: command.to_string(),
        alternates: Vec::new(),
    }
}

/// Config with the DAP-style responders used across the tests.
pub fn gateway_config(workers: Vec<WorkerConfig>) -> GatewayConfig {
    let mut dmr = responder(
        "dmr",
        ".dmr",
        "application/vnd.opendap.dap4.dataset-metadata+xml",
        "show dmr {resource};",
    );
    dmr.alternates.push(responder("dmr-html", ".dmr.html", "text/html", "show dmr-html {resource};"));

    let mut iso = responder("iso", ".dmr.iso", "text/xml", "show iso {resource};");
    iso.alternates.push(responder("rubric", ".dmr.iso.rubric", "text/html", "show rubric {resource};"));

    let mut config = GatewayConfig {
        workers,
        responders: vec![dmr, iso],
        ..Default::default()
    };
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.health_check.enabled = false;
    config.observability.metrics_enabled = false;
    config.retries.base_delay_ms = 1;
    config.retries.max_delay_ms = 5;
    config.timeouts.connect_secs = 2;
    config.timeouts.read_secs = 2;
    config.timeouts.request_secs = 5;
    config
}

/// A gateway serving on an ephemeral port.
pub struct TestGateway {
    pub base_url: String,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<GatewayConfig>,
    pub handle: tokio::task::JoinHandle<()>,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

pub async fn start_gateway(config: GatewayConfig) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let shutdown = Shutdown::new();
    let server_shutdown: broadcast::Receiver<()> = shutdown.subscribe();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config).unwrap();
    let handle = tokio::spawn(async move {
        server.run(listener, updates_rx, server_shutdown).await.unwrap();
    });

    TestGateway {
        base_url,
        shutdown,
        config_updates,
        handle,
    }
}
