//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Exchange with a worker fails:
//!     → retries.rs (is the failure retryable? attempts left?)
//!     → backoff.rs (how long to wait)
//!     → next worker from the pool
//! ```
//!
//! # Design Decisions
//! - Every worker call has a deadline (connect, read, whole request)
//! - Retries move to a different worker; the reader never retries
//! - Jittered backoff prevents thundering herd

pub mod backoff;
pub mod retries;

pub use backoff::Backoff;
pub use retries::{is_retryable, RetryPolicy};
