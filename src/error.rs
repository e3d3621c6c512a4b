//! Centralized error types for the dispatcher

use thiserror::Error;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration is missing, malformed, or inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Service discovery failed
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// Upstream did not answer within the configured timeout (milliseconds)
    #[error("Upstream timed out after {0}ms")]
    UpstreamTimeout(u64),

    /// Upstream could not be reached
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;
