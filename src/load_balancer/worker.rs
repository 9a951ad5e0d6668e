//! Worker abstraction.
//!
//! # Responsibilities
//! - Represent a single worker process reachable over TCP
//! - Track in-flight sessions and enforce `max_connections`
//! - Track health state (Unknown/Healthy/Unhealthy)

use serde::Serialize;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

/// Health state of a worker.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Unknown = 0,
    Healthy = 1,
    Unhealthy = 2,
}

impl From<u8> for HealthState {
    fn from(val: u8) -> Self {
        match val {
            1 => HealthState::Healthy,
            2 => HealthState::Unhealthy,
            _ => HealthState::Unknown,
        }
    }
}

/// A single worker. Identity is its name; the rest is runtime bookkeeping.
#[derive(Debug)]
pub struct Worker {
    pub name: String,
    pub address: String,
    pub max_connections: usize,
    active_sessions: AtomicUsize,
    state: AtomicU8,
    consecutive_failures: AtomicUsize,
    consecutive_successes: AtomicUsize,
    total_requests: AtomicU64,
    total_failures: AtomicU64,
}

impl PartialEq for Worker {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Worker {}

impl Worker {
    pub fn new(name: impl Into<String>, address: impl Into<String>, max_connections: usize) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            max_connections,
            active_sessions: AtomicUsize::new(0),
            state: AtomicU8::new(HealthState::Unknown as u8),
            consecutive_failures: AtomicUsize::new(0),
            consecutive_successes: AtomicUsize::new(0),
            total_requests: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
        }
    }

    /// Sessions currently open against this worker.
    pub fn active_sessions(&self) -> usize {
        self.active_sessions.load(Ordering::Relaxed)
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.total_failures.load(Ordering::Relaxed)
    }

    /// Reserve a session slot, or `None` when the worker is saturated.
    pub fn try_acquire(self: &Arc<Self>) -> Option<WorkerGuard> {
        let mut prev = self.active_sessions.load(Ordering::Relaxed);
        loop {
            if prev >= self.max_connections {
                return None;
            }
            match self.active_sessions.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        Some(WorkerGuard {
            worker: self.clone(),
        })
    }

    pub fn health(&self) -> HealthState {
        HealthState::from(self.state.load(Ordering::Relaxed))
    }

    /// Healthy or not yet probed.
    pub fn is_healthy(&self) -> bool {
        self.health() != HealthState::Unhealthy
    }

    /// Record a successful exchange or probe. Returns true on a transition to Healthy.
    pub fn mark_success(&self, healthy_threshold: usize) -> bool {
        self.consecutive_failures.store(0, Ordering::Relaxed);
        if self.health() == HealthState::Healthy {
            return false;
        }

        let successes = self.consecutive_successes.fetch_add(1, Ordering::Relaxed) + 1;
        if successes >= healthy_threshold {
            self.state.store(HealthState::Healthy as u8, Ordering::Relaxed);
            self.consecutive_successes.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }

    /// Record a failed exchange or probe. Returns true on a transition to Unhealthy.
    pub fn mark_failure(&self, unhealthy_threshold: usize) -> bool {
        self.consecutive_successes.store(0, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        if self.health() == HealthState::Unhealthy {
            return false;
        }

        let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if failures >= unhealthy_threshold {
            self.state.store(HealthState::Unhealthy as u8, Ordering::Relaxed);
            self.consecutive_failures.store(0, Ordering::Relaxed);
            return true;
        }
        false
    }
}

/// Holds one session slot on a worker; released on drop.
#[derive(Debug)]
pub struct WorkerGuard {
    worker: Arc<Worker>,
}

impl WorkerGuard {
    pub fn worker(&self) -> &Arc<Worker> {
        &self.worker
    }
}

impl Deref for WorkerGuard {
    type Target = Worker;
    fn deref(&self) -> &Self::Target {
        &self.worker
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        self.worker.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }
}
