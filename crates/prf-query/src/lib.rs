//! Query core for the PRF gateway (DuckDB-powered SQL over PRF accident data).
//!
//! This crate is a workspace member that isolates the heavy `duckdb` (bundled C++)
//! dependency into its own compilation unit, preventing recompilation of DuckDB
//! when the HTTP layer changes.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.
//!
//! # Overview
//!
//! Callers submit read-only SQL. Each statement is:
//!
//! 1. Checked by the lexical [`guard`] (only `SELECT`/`WITH`, no mutation
//!    keywords).
//! 2. Rewritten so `datatranYYYY` references scan the yearly CSV files.
//! 3. Executed against the persisted DuckDB database opened read-only.
//! 4. Returned as JSON-encoded rows.
//!
//! # Modules
//!
//! - [`guard`] -- Read-only statement filter.
//! - [`rewrite`] -- Virtual-table substitution and pagination.
//! - [`duckdb`] -- Engine, results, Parquet export, EXPLAIN.
//! - [`error`] -- Domain-specific error types.

pub mod duckdb;
pub mod error;
pub mod guard;
pub mod rewrite;

pub use self::duckdb::{DuckDBEngine, ExplainResult, ParquetExport, QueryRequest, QueryResult, QueryResultRow};
pub use error::{QueryError, RejectionReason, Result};
pub use rewrite::{Pagination, QueryRewriter, RewrittenStatement, VirtualTable};
