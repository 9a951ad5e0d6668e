//! Worker selection subsystem.
//!
//! # Data Flow
//! ```text
//! Request resolved to a responder
//!     → pool.rs (acquire next usable worker)
//!         → ring.rs (rotate: head handed out and requeued at the tail)
//!         → worker.rs (health check, reserve a session slot)
//!     → WorkerGuard held for the duration of the exchange
//! ```
//!
//! # Design Decisions
//! - Ring capacity is fixed at startup from the worker list
//! - Rotation visits workers; it does not lease them
//! - Unhealthy and saturated workers are skipped, not removed

pub mod pool;
pub mod ring;
pub mod worker;

pub use pool::{PoolError, WorkerPool};
pub use ring::{RingError, WorkerRing};
pub use worker::{HealthState, Worker, WorkerGuard};
