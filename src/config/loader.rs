//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::Config;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config = parse_config(&content)?;

    tracing::debug!(path = %path.display(), "Configuration file loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.handler.endpoint, "/");
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.observability.log_level, "info");
        assert!(config.static_folders.is_empty());
    }

    #[test]
    fn test_full_file() {
        let config = parse_config(
            r#"
            [handler]
            endpoint = "/api"
            max_body_bytes = 1024
            middleware_timeout_ms = 250

            [listener]
            bind_address = "127.0.0.1:8443"
            redirect_http_address = "127.0.0.1:8080"
            tls = { cert_path = "cert.pem", key_path = "key.pem" }

            [observability]
            log_level = "debug"
            json = true

            [[static_files]]
            url = "/favicon.ico"
            path = "public/favicon.ico"

            [[static_folders]]
            url = "/assets"
            path = "public"
            "#,
        )
        .unwrap();

        assert_eq!(config.handler.endpoint, "/api");
        assert_eq!(config.handler.max_body_bytes, 1024);
        assert_eq!(config.handler.middleware_timeout_ms, Some(250));
        assert_eq!(config.listener.tls.as_ref().map(|t| t.cert_path.as_str()), Some("cert.pem"));
        assert!(config.observability.json);
        assert_eq!(config.static_files.len(), 1);
        assert_eq!(config.static_folders[0].url, "/assets");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let err = parse_config("[handler]\nendpoint = \"api/\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        assert!(matches!(parse_config("[handler"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[handler]\nendpoint = \"/v1\"").unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.handler.endpoint, "/v1");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
