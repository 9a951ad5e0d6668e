//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the `tracing` subscriber
//! - Pick the filter from `RUST_LOG` or the configured level
//!
//! # Design Decisions
//! - `RUST_LOG` wins over `observability.log_level` when set

use tracing_subscriber::filter::ParseError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter: `RUST_LOG` if set, otherwise `log_level`.
pub fn build_filter(log_level: &str) -> Result<EnvFilter, ParseError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(log_level),
    }
}

/// Install the global subscriber.
pub fn init_logging(log_level: &str) -> Result<(), ParseError> {
    let filter = build_filter(log_level)?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
    Ok(())
}
