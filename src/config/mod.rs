//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On change:
//!     watcher.rs detects the write
//!     → loader.rs loads and validates
//!     → new GatewayConfig sent to the server
//!     → server swaps dispatcher and exchange settings
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The worker list is fixed for the process lifetime

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AdminConfig, GatewayConfig, HealthCheckConfig, ListenerConfig, ResponderConfig, RetryConfig,
    WorkerConfig,
};
pub use validation::{validate_config, ValidationError};
