//! HTTP gateway in front of a pool of worker processes that speak a chunked
//! request/response protocol.

pub mod admin;
pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod routing;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
