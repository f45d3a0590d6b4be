//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::dispatch::DEFAULT_MAX_BODY_BYTES;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Request handler settings (endpoint, limits).
    pub handler: HandlerConfig,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,

    /// Single files served outside the endpoint.
    pub static_files: Vec<StaticMount>,

    /// Folders served outside the endpoint.
    pub static_folders: Vec<StaticMount>,
}

/// Request handler configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HandlerConfig {
    /// Prefix for handler routes. `/` disables scoping.
    pub endpoint: String,

    /// Largest request body read into memory.
    pub max_body_bytes: usize,

    /// Bound on a single middleware step, in milliseconds.
    pub middleware_timeout_ms: Option<u64>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            endpoint: "/".to_string(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            middleware_timeout_ms: None,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Plain HTTP address that redirects every request to HTTPS.
    pub redirect_http_address: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
            redirect_http_address: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

/// A static file or folder mount.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct StaticMount {
    /// URL path (file) or URL prefix (folder).
    pub url: String,

    /// Path on disk.
    pub path: String,
}
