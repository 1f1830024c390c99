//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that TLS and storage settings are complete for the selected mode
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Settings that are merely ignored come back from `config_warnings` for
//!   the caller to log once the logger is up
//! - Runs before config is accepted into the system

use crate::config::schema::{AppConfig, StorageKind};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending setting.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Settings that are accepted but have no effect.
pub fn config_warnings(config: &AppConfig) -> Vec<&'static str> {
    let mut warnings = Vec::new();
    if config.listener.devcert && !config.listener.tls {
        warnings.push("listener.devcert is set but tls is disabled, ignoring");
    }
    warnings
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let listener = &config.listener;
    if listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than zero"));
    }
    if listener.tls && !listener.devcert {
        if listener.certfile.as_os_str().is_empty() {
            errors.push(ValidationError::new("listener.certfile", "required when tls is enabled"));
        }
        if listener.keyfile.as_os_str().is_empty() {
            errors.push(ValidationError::new("listener.keyfile", "required when tls is enabled"));
        }
    }
    if config.http.request_timeout_secs == 0 {
        errors.push(ValidationError::new("http.request_timeout_secs", "must be greater than zero"));
    }
    if config.http.max_body_size == 0 {
        errors.push(ValidationError::new("http.max_body_size", "must be greater than zero"));
    }

    let log = &config.request_log;
    for path in &log.disabled_http {
        if !path.starts_with('/') {
            errors.push(ValidationError::new(
                "request_log.disabled_http",
                format!("{:?} is not an absolute path", path),
            ));
        }
    }
    for method in log.disabled_grpc.iter().chain(&log.disabled_grpc_stream) {
        if !is_full_method(method) {
            errors.push(ValidationError::new(
                "request_log.disabled_grpc",
                format!("{:?} is not a full method name (/package.Service/Method)", method),
            ));
        }
    }

    if config.storage.kind == StorageKind::Postgres {
        if config.storage.host.is_empty() {
            errors.push(ValidationError::new("storage.host", "required for postgres"));
        }
        if config.storage.database.is_empty() {
            errors.push(ValidationError::new("storage.database", "required for postgres"));
        }
        if config.storage.max_connections == 0 {
            errors.push(ValidationError::new("storage.max_connections", "must be greater than zero"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_full_method(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('/') else {
        return false;
    };
    match rest.split_once('/') {
        Some((service, method)) => !service.is_empty() && !method.is_empty() && !method.contains('/'),
        None => false,
    }
}
