//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path (+ Accept header)
//!     → dispatcher.rs (top-level responders in priority order)
//!     → matcher.rs (anchored longest-suffix match per subtree)
//!     → Resolution (responder, resource id)
//!     → media_type.rs (optional content negotiation)
//!     → responder.rs (worker command for the resource id)
//!
//! Compilation (at startup and on reload):
//!     ResponderConfig[]
//!     → ResponderNode trees
//!     → one SuffixMatcher per tree
//!     → immutable Dispatcher
//! ```
//!
//! # Design Decisions
//! - Dispatcher is compiled once and never mutated
//! - No regex in the hot path (suffix comparison only)
//! - Deterministic: same path always resolves to the same responder
//! - First match wins (registration order)

pub mod dispatcher;
pub mod matcher;
pub mod media_type;
pub mod responder;

pub use dispatcher::{DispatchError, Dispatcher, Resolution};
pub use matcher::SuffixMatcher;
pub use responder::ResponderNode;
