//! Active health checking.
//!
//! # Responsibilities
//! - Periodically open a session with every worker and close it again
//! - Update worker health from the handshake result

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Worker, WorkerPool};
use crate::observability::metrics;
use crate::protocol::session::{SessionSettings, WorkerSession};

pub struct HealthMonitor {
    pool: Arc<WorkerPool>,
    config: HealthCheckConfig,
    settings: SessionSettings,
}

impl HealthMonitor {
    pub fn new(pool: Arc<WorkerPool>, config: HealthCheckConfig, mut settings: SessionSettings) -> Self {
        let probe_timeout = Duration::from_secs(config.timeout_secs);
        settings.connect_timeout = probe_timeout;
        settings.read_timeout = probe_timeout;
        Self {
            pool,
            config,
            settings,
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Active health checks disabled");
            return;
        }

        tracing::info!(interval_secs = self.config.interval_secs, "Health monitor starting");
        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => self.check_all().await,
                _ = shutdown.recv() => {
                    tracing::info!("Health monitor stopping");
                    break;
                }
            }
        }
    }

    /// Probe every worker once.
    pub async fn check_all(&self) {
        for worker in self.pool.workers() {
            let healthy = self.probe(worker).await;
            if healthy {
                if worker.mark_success(self.config.healthy_threshold) {
                    tracing::info!(worker = %worker.name, "Worker marked healthy");
                }
            } else {
                metrics::record_worker_failure(&worker.name, "probe");
                if worker.mark_failure(self.config.unhealthy_threshold) {
                    tracing::warn!(worker = %worker.name, "Worker marked unhealthy");
                }
            }
            metrics::record_worker_health(&worker.name, worker.is_healthy());
        }
    }

    async fn probe(&self, worker: &Worker) -> bool {
        match WorkerSession::connect(&worker.address, &self.settings).await {
            Ok(session) => {
                session.close().await;
                true
            }
            Err(e) => {
                tracing::warn!(worker = %worker.name, address = %worker.address, error = %e, "Health probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::protocol::session::{CLIENT_HELLO, WORKER_READY};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn ready_worker() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let mut hello = [0u8; CLIENT_HELLO.len()];
                if stream.read_exact(&mut hello).await.is_ok() {
                    let _ = stream.write_all(WORKER_READY).await;
                    let mut rest = Vec::new();
                    let _ = stream.read_to_end(&mut rest).await;
                }
            }
        });
        address
    }

    async fn closed_address() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_probe_updates_health() {
        let workers = vec![
            WorkerConfig {
                name: "up".into(),
                address: ready_worker().await,
                max_connections: 1,
            },
            WorkerConfig {
                name: "down".into(),
                address: closed_address().await,
                max_connections: 1,
            },
        ];
        let pool = Arc::new(WorkerPool::new(&workers, Duration::from_millis(100)).unwrap());
        let config = HealthCheckConfig {
            unhealthy_threshold: 1,
            healthy_threshold: 1,
            ..Default::default()
        };
        let monitor = HealthMonitor::new(pool.clone(), config, SessionSettings::default());

        monitor.check_all().await;

        assert!(pool.workers()[0].is_healthy());
        assert_eq!(pool.workers()[0].health(), crate::load_balancer::HealthState::Healthy);
        assert!(!pool.workers()[1].is_healthy());
    }
}
