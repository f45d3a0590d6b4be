//! Error types shared across subsystems.

use thiserror::Error;

/// Boxed error returned by middleware and handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A malformed endpoint prefix. Fatal at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndpointError {
    #[error("endpoint must not be empty")]
    Empty,

    #[error("endpoint '{0}' has to start with '/'")]
    MissingLeadingSlash(String),

    #[error("endpoint '{0}' has to end without a '/'")]
    TrailingSlash(String),
}

/// A rejected route registration. The route table is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("can't add route for path '{pattern}' because parameter name '{name}' repeats")]
    DuplicateParameter { pattern: String, name: String },

    #[error("can't add route for path '{pattern}' because it contains an unnamed parameter")]
    EmptyParameterName { pattern: String },

    #[error("the requested static path '{path}' collides with the api endpoint '{endpoint}'")]
    EndpointCollision { path: String, endpoint: String },
}
