//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Worker identities and addresses
//! - Responder tree: suffix shape and uniqueness, media types, commands
//! - Value ranges (timeouts > 0, buffer bounds, attempts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Pure function: &GatewayConfig → Result<(), Vec<ValidationError>>

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{GatewayConfig, ResponderConfig};
use crate::routing::responder::RESOURCE_PLACEHOLDER;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no workers configured")]
    NoWorkers,

    #[error("duplicate worker name '{0}'")]
    DuplicateWorker(String),

    #[error("worker '{name}' has invalid address '{address}'")]
    InvalidWorkerAddress { name: String, address: String },

    #[error("worker '{0}' allows zero connections")]
    ZeroWorkerConnections(String),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),

    #[error("responder '{0}' has an empty suffix")]
    EmptySuffix(String),

    #[error("responder '{name}' suffix '{suffix}' must start with '.'")]
    SuffixWithoutDot { name: String, suffix: String },

    #[error("suffix '{0}' is used by more than one responder")]
    DuplicateSuffix(String),

    #[error("responder '{name}' has invalid media type '{media_type}'")]
    InvalidMediaType { name: String, media_type: String },

    #[error("responder '{0}' command lacks the {{resource}} placeholder")]
    CommandWithoutResource(String),

    #[error("timeout '{0}' must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("max_buffer_size {max} is smaller than initial_buffer_size {initial}")]
    BufferBounds { initial: usize, max: usize },

    #[error("retries.max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Check a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.listener.bind_address.clone()));
    }
    if config.admin.enabled && config.admin.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(config.admin.bind_address.clone()));
    }

    if config.workers.is_empty() {
        errors.push(ValidationError::NoWorkers);
    }
    let mut names = HashSet::new();
    for worker in &config.workers {
        if !names.insert(worker.name.as_str()) {
            errors.push(ValidationError::DuplicateWorker(worker.name.clone()));
        }
        if !is_host_port(&worker.address) {
            errors.push(ValidationError::InvalidWorkerAddress {
                name: worker.name.clone(),
                address: worker.address.clone(),
            });
        }
        if worker.max_connections == 0 {
            errors.push(ValidationError::ZeroWorkerConnections(worker.name.clone()));
        }
    }

    let mut suffixes = HashSet::new();
    for responder in &config.responders {
        validate_responder(responder, &mut suffixes, &mut errors);
    }

    let timeouts = [
        ("connect_secs", config.timeouts.connect_secs),
        ("read_secs", config.timeouts.read_secs),
        ("request_secs", config.timeouts.request_secs),
        ("acquire_timeout_ms", config.pool.acquire_timeout_ms),
    ];
    for (name, value) in timeouts {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }

    let protocol = &config.protocol;
    if protocol.initial_buffer_size == 0 || protocol.max_buffer_size < protocol.initial_buffer_size {
        errors.push(ValidationError::BufferBounds {
            initial: protocol.initial_buffer_size,
            max: protocol.max_buffer_size,
        });
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::ZeroAttempts);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_responder(
    responder: &ResponderConfig,
    suffixes: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    if responder.suffix.is_empty() {
        errors.push(ValidationError::EmptySuffix(responder.name.clone()));
    } else if !responder.suffix.starts_with('.') {
        errors.push(ValidationError::SuffixWithoutDot {
            name: responder.name.clone(),
            suffix: responder.suffix.clone(),
        });
    } else if !suffixes.insert(responder.suffix.to_ascii_lowercase()) {
        errors.push(ValidationError::DuplicateSuffix(responder.suffix.clone()));
    }

    if responder.media_type.parse::<mime::Mime>().is_err() {
        errors.push(ValidationError::InvalidMediaType {
            name: responder.name.clone(),
            media_type: responder.media_type.clone(),
        });
    }

    if !responder.command.contains(RESOURCE_PLACEHOLDER) {
        errors.push(ValidationError::CommandWithoutResource(responder.name.clone()));
    }

    for alternate in &responder.alternates {
        validate_responder(alternate, suffixes, errors);
    }
}

/// `host:port` with a non-empty host and a numeric port.
fn is_host_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}
