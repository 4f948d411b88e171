//! Error types for the PRF query core.
//!
//! This module defines the failure taxonomy for a single query request:
//! policy rejections raised by the statement guard, dataset resolution
//! failures raised by the rewriter, and execution failures reported by
//! DuckDB itself.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.

use std::path::PathBuf;

/// Reason a statement was refused by the [`guard`](crate::guard).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionReason {
    /// The statement contains a forbidden keyword (stored lowercase).
    #[error("Operation '{}' is not allowed", .0.to_uppercase())]
    ForbiddenOperation(String),
    /// The trimmed statement does not start with `SELECT` or `WITH`.
    #[error("Only SELECT and WITH statements are allowed")]
    NotAReadStatement,
}

/// Errors from the query core.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The statement guard refused the SQL text.
    #[error("{0}")]
    Rejected(RejectionReason),

    /// A `datatranYYYY` reference has no CSV file behind it.
    #[error("CSV dataset not found: {}", path.display())]
    MissingDataset {
        /// The four-digit year taken from the reference.
        year: String,
        /// The path that was checked.
        path: PathBuf,
    },

    /// A positional parameter is not a scalar JSON value.
    #[error("Invalid parameter at position {index}: {detail}")]
    InvalidParameter {
        /// Zero-based position in the parameter list.
        index: usize,
        /// What was wrong with it.
        detail: String,
    },

    /// DuckDB could not resolve a table, schema or file.
    ///
    /// The inner string is the DuckDB diagnostic, unmodified.
    #[error("Catalog/file error: {0}")]
    CatalogOrFile(String),

    /// Any other failure reported by DuckDB (syntax, binder, type mismatch).
    #[error("Query execution failed: {0}")]
    Execution(String),

    /// The engine could not be opened with the given settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem failure outside of DuckDB (e.g. stat of an export file).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking query task panicked or was cancelled.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QueryError {
    /// Create a `MissingDataset` error for a year and the path that was checked.
    pub fn missing_dataset(year: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::MissingDataset {
            year: year.into(),
            path: path.into(),
        }
    }

    /// Create an `InvalidParameter` error.
    pub fn invalid_parameter(index: usize, detail: impl Into<String>) -> Self {
        Self::InvalidParameter {
            index,
            detail: detail.into(),
        }
    }

    /// Returns `true` when the caller's input is at fault rather than the
    /// engine or the host.
    ///
    /// # Examples
    ///
    /// ```
    /// use prf_query::error::{QueryError, RejectionReason};
    ///
    /// let err = QueryError::Rejected(RejectionReason::NotAReadStatement);
    /// assert!(err.is_client_error());
    /// assert!(!QueryError::Config("bad".into()).is_client_error());
    /// ```
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            QueryError::Rejected(_)
                | QueryError::MissingDataset { .. }
                | QueryError::InvalidParameter { .. }
        )
    }

    /// The rejection reason, if the guard refused the statement.
    pub fn rejection(&self) -> Option<&RejectionReason> {
        match self {
            QueryError::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

impl From<RejectionReason> for QueryError {
    fn from(reason: RejectionReason) -> Self {
        QueryError::Rejected(reason)
    }
}

impl From<duckdb::Error> for QueryError {
    fn from(e: duckdb::Error) -> Self {
        let msg = e.to_string();
        // DuckDB prefixes its diagnostics with the error class
        if msg.contains("Catalog Error") || msg.contains("IO Error") {
            QueryError::CatalogOrFile(msg)
        } else {
            QueryError::Execution(msg)
        }
    }
}

/// A specialised `Result` type for query operations.
pub type Result<T> = std::result::Result<T, QueryError>;
