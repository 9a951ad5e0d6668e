//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → HTTP server stops accepting and drains
//!               → health monitor exits
//!               → admin listener exits
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - In-flight requests finish; worker sessions close normally

pub mod shutdown;
pub mod signals;

pub use shutdown::{recv_shutdown, Shutdown};
pub use signals::shutdown_on_signal;
