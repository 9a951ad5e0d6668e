//! Worker pool management.
//!
//! # Responsibilities
//! - Build the worker ring from configuration
//! - Pick the next usable worker, skipping unhealthy or saturated ones
//! - Provide session guards for tracking

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::WorkerConfig;
use crate::load_balancer::ring::{RingError, WorkerRing};
use crate::load_balancer::worker::{Worker, WorkerGuard};

/// Errors raised when obtaining a worker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error(transparent)]
    Ring(#[from] RingError),

    #[error("none of the {0} workers is healthy with a free session slot")]
    NoWorkerAvailable(usize),
}

/// The fixed set of workers, visited in rotation.
#[derive(Debug)]
pub struct WorkerPool {
    ring: WorkerRing<Arc<Worker>>,
    workers: Vec<Arc<Worker>>,
    acquire_timeout: Duration,
}

impl WorkerPool {
    pub fn new(configs: &[WorkerConfig], acquire_timeout: Duration) -> Result<Self, PoolError> {
        let workers: Vec<Arc<Worker>> = configs
            .iter()
            .map(|c| Arc::new(Worker::new(&c.name, &c.address, c.max_connections)))
            .collect();
        let ring = WorkerRing::from_members(workers.clone())?;
        tracing::info!(workers = workers.len(), "Worker pool initialized");
        Ok(Self {
            ring,
            workers,
            acquire_timeout,
        })
    }

    /// Every configured worker, in configuration order.
    pub fn workers(&self) -> &[Arc<Worker>] {
        &self.workers
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    pub fn ring(&self) -> &WorkerRing<Arc<Worker>> {
        &self.ring
    }

    /// Take the next worker that is healthy and below its session limit.
    ///
    /// Visits at most one full rotation; each visit waits on the ring for up
    /// to the acquire timeout.
    pub async fn acquire(&self) -> Result<WorkerGuard, PoolError> {
        for _ in 0..self.ring.capacity() {
            let worker = self.ring.get_next_within(self.acquire_timeout).await?;
            if !worker.is_healthy() {
                tracing::debug!(worker = %worker.name, "Skipping unhealthy worker");
                continue;
            }
            match worker.try_acquire() {
                Some(guard) => return Ok(guard),
                None => {
                    tracing::debug!(
                        worker = %worker.name,
                        active = worker.active_sessions(),
                        "Skipping saturated worker"
                    );
                }
            }
        }
        for worker in &self.workers {
            tracing::debug!(worker = %worker.name, health = ?worker.health(), "Worker status");
        }
        Err(PoolError::NoWorkerAvailable(self.ring.capacity()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs(names: &[&str], max_connections: usize) -> Vec<WorkerConfig> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| WorkerConfig {
                name: name.to_string(),
                address: format!("127.0.0.1:{}", 9001 + i),
                max_connections,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_acquire_rotates() {
        let pool = WorkerPool::new(&configs(&["a", "b"], 4), Duration::from_millis(50)).unwrap();
        let first = pool.acquire().await.unwrap();
        let second = pool.acquire().await.unwrap();
        let third = pool.acquire().await.unwrap();
        assert_eq!(first.name, "a");
        assert_eq!(second.name, "b");
        assert_eq!(third.name, "a");
        assert_eq!(pool.workers()[0].active_sessions(), 2);
    }

    #[tokio::test]
    async fn test_acquire_skips_unhealthy() {
        let pool = WorkerPool::new(&configs(&["a", "b"], 4), Duration::from_millis(50)).unwrap();
        pool.workers()[0].mark_failure(1);

        for _ in 0..3 {
            assert_eq!(pool.acquire().await.unwrap().name, "b");
        }
    }

    #[tokio::test]
    async fn test_acquire_skips_saturated() {
        let pool = WorkerPool::new(&configs(&["a", "b"], 1), Duration::from_millis(50)).unwrap();
        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!((a.name.as_str(), b.name.as_str()), ("a", "b"));

        assert_eq!(pool.acquire().await.unwrap_err(), PoolError::NoWorkerAvailable(2));
        drop(b);
        assert_eq!(pool.acquire().await.unwrap().name, "b");
    }

    #[tokio::test]
    async fn test_acquire_times_out_on_drained_ring() {
        let pool = WorkerPool::new(&configs(&["a"], 1), Duration::from_millis(20)).unwrap();
        let members = pool.ring().drain().await;

        assert_eq!(pool.acquire().await.unwrap_err(), PoolError::Ring(RingError::Unavailable));

        for member in members {
            pool.ring().add(member).await.unwrap();
        }
        assert_eq!(pool.acquire().await.unwrap().name, "a");
    }

    #[test]
    fn test_empty_pool_rejected() {
        let err = WorkerPool::new(&[], Duration::from_millis(20)).unwrap_err();
        assert_eq!(err, PoolError::Ring(RingError::ZeroCapacity));
    }
}
