//! Retry policy.
//!
//! # Responsibilities
//! - Decide whether a failed exchange may be tried on another worker
//! - Bound the number of attempts
//!
//! # Design Decisions
//! - Only connect and handshake failures are retried; once a request reached
//!   a worker it may have had effects, and a worker-reported error is an answer
//! - Framing faults are never retried

use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::GatewayError;
use crate::resilience::backoff::Backoff;

/// True for failures that happened before the worker saw the request.
pub fn is_retryable(error: &GatewayError) -> bool {
    matches!(error, GatewayError::WorkerUnreachable { .. })
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        let max_attempts = if config.enabled { config.max_attempts.max(1) } else { 1 };
        Self {
            max_attempts,
            backoff: Backoff::from_config(config),
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the next attempt, or `None` to give up.
    pub fn next_delay(&self, attempt: u32, error: &GatewayError) -> Option<Duration> {
        (attempt < self.max_attempts && is_retryable(error)).then(|| self.backoff.delay(attempt))
    }
}
