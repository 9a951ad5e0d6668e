//! Worker health subsystem.
//!
//! # Data Flow
//! ```text
//! Active (active.rs):
//!     Periodic timer
//!     → handshake with each worker
//!     → Worker::mark_success / mark_failure
//!
//! Passive (http::forward):
//!     Exchange outcome observed
//!     → Worker::mark_success / mark_failure
//! ```
//!
//! # Design Decisions
//! - State transitions require consecutive successes/failures
//! - Unhealthy workers stay in the ring and are skipped on selection

pub mod active;

pub use active::HealthMonitor;
