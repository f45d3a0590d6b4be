//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Endpoint shape, bind addresses, TLS file paths
//! - Static mounts: non-empty paths, no overlap with the endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{Config, StaticMount};
use crate::error::EndpointError;
use crate::routing::Endpoint;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("handler.endpoint: {0}")]
    Endpoint(EndpointError),

    #[error("handler.max_body_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("handler.middleware_timeout_ms must be greater than zero")]
    ZeroMiddlewareTimeout,

    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("listener.tls: {0} must not be empty")]
    EmptyTlsPath(&'static str),

    #[error("listener.redirect_http_address requires listener.tls")]
    RedirectWithoutTls,

    #[error("{kind}[{index}]: url and path must not be empty")]
    EmptyMount { kind: &'static str, index: usize },

    #[error("{kind}[{index}]: '{url}' collides with endpoint '{endpoint}'")]
    MountCollision {
        kind: &'static str,
        index: usize,
        url: String,
        endpoint: String,
    },
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let endpoint = match Endpoint::parse(&config.handler.endpoint) {
        Ok(endpoint) => Some(endpoint),
        Err(e) => {
            errors.push(ValidationError::Endpoint(e));
            None
        }
    };
    if config.handler.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }
    if config.handler.middleware_timeout_ms == Some(0) {
        errors.push(ValidationError::ZeroMiddlewareTimeout);
    }

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    if let Some(redirect) = &config.listener.redirect_http_address {
        check_address(&mut errors, "listener.redirect_http_address", redirect);
        if config.listener.tls.is_none() {
            errors.push(ValidationError::RedirectWithoutTls);
        }
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key_path"));
        }
    }

    check_mounts(&mut errors, "static_files", &config.static_files, endpoint.as_ref());
    check_mounts(&mut errors, "static_folders", &config.static_folders, endpoint.as_ref());

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

fn check_mounts(
    errors: &mut Vec<ValidationError>,
    kind: &'static str,
    mounts: &[StaticMount],
    endpoint: Option<&Endpoint>,
) {
    for (index, mount) in mounts.iter().enumerate() {
        if mount.url.is_empty() || mount.path.is_empty() {
            errors.push(ValidationError::EmptyMount { kind, index });
            continue;
        }
        if let Some(endpoint) = endpoint.filter(|e| e.collides_with(&mount.url)) {
            errors.push(ValidationError::MountCollision {
                kind,
                index,
                url: mount.url.clone(),
                endpoint: endpoint.to_string(),
            });
        }
    }
}
