//! HTTP front end.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum router, request id + trace layers)
//!     → routing::Dispatcher (path → responder + resource id)
//!     → forward.rs (pool → worker session → reply or GatewayError)
//!     → response (worker bytes with the responder's media type)
//! ```

pub mod forward;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, GatewayState, HttpServer};
