//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (durations > 0)
//! - Check listener names are present and unique
//! - Check addresses have a host and a valid port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure: config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::lifecycle::shutdown::ShutdownOptions;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("listener #{index} has an empty name")]
    EmptyListenerName { index: usize },

    #[error("listener name {name:?} is used more than once")]
    DuplicateListener { name: String },

    #[error("{field} {value:?} is not a host:port address")]
    InvalidAddress { field: String, value: String },
}

/// Validate shutdown timing.
pub fn validate_options(options: &ShutdownOptions) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    check_positive(&mut errors, "shutdown_timeout", options.shutdown_timeout);
    check_positive(&mut errors, "wait_time", options.wait_time);
    check_positive(&mut errors, "callback_timeout", options.callback_timeout);
    check_positive(&mut errors, "drain_poll_interval", options.drain_poll_interval);
    finish(errors)
}

/// Validate a whole configuration file.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = match validate_options(&ShutdownOptions::from(&config.shutdown)) {
        Ok(()) => Vec::new(),
        Err(errors) => errors,
    };

    let mut seen = HashSet::new();
    for (index, listener) in config.listeners.iter().enumerate() {
        if listener.name.trim().is_empty() {
            errors.push(ValidationError::EmptyListenerName { index });
        } else if !seen.insert(listener.name.as_str()) {
            errors.push(ValidationError::DuplicateListener {
                name: listener.name.clone(),
            });
        }
        if !is_host_port(&listener.bind_address) {
            errors.push(ValidationError::InvalidAddress {
                field: format!("listeners[{index}].bind_address"),
                value: listener.bind_address.clone(),
            });
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address".to_string(),
            value: config.observability.metrics_address.clone(),
        });
    }

    finish(errors)
}

fn check_positive(errors: &mut Vec<ValidationError>, field: &'static str, value: Duration) {
    if value.is_zero() {
        errors.push(ValidationError::ZeroDuration { field });
    }
}

fn finish(errors: Vec<ValidationError>) -> Result<(), Vec<ValidationError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Accepts socket addresses and `hostname:port` pairs.
fn is_host_port(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && !host.contains(':') && port.parse::<u16>().is_ok(),
        None => false,
    }
}
