//! Error types for the PRF gateway
//!
//! Process-level failures: configuration, I/O, the query core, and the HTTP
//! server. Per-request failures are reported through
//! [`ApiError`](crate::server::query_api::ApiError) instead.

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Errors that stop the gateway from starting or serving
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem or socket failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by the query core
    #[error(transparent)]
    Query(#[from] prf_query::QueryError),

    /// HTTP server failure
    #[error("Server error: {0}")]
    Server(String),
}
