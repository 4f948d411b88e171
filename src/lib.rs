#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

//! # PRF Gateway
//!
//! A read-only SQL gateway over the PRF (Polícia Rodoviária Federal) accident
//! data. It serves a persisted DuckDB database plus one CSV file per year,
//! which callers query as virtual tables named `datatranYYYY`.
//!
//! ## Features
//!
//! - **Read-only by construction**: statements are filtered lexically and the
//!   database is opened in read-only mode
//! - **Virtual tables**: `datatran2020` becomes a `read_csv_auto(...)` scan of
//!   `<csv_dir>/datatran2020.csv`
//! - **Pagination**: optional `limit`/`offset` appended to the statement
//! - **Parquet export**: write any query result to a Parquet file
//!
//! ## Quick Start
//!
//! ```bash
//! $ prf-gateway --duckdb-path /data/prf.duckdb --csv-dir /data/prf
//!
//! $ curl -X POST http://localhost:8000/query \
//!     -H 'Content-Type: application/json' \
//!     -d '{"sql": "SELECT * FROM datatran2020 WHERE uf = '\''PR'\''", "limit": 100}'
//! ```
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use prf_gateway::server::{build_http_router, QueryApiState};
//! use prf_query::DuckDBEngine;
//! use std::sync::Arc;
//!
//! let engine = Arc::new(DuckDBEngine::open("/data/prf.duckdb", "/data/prf")?);
//! let app = build_http_router(QueryApiState::new(engine));
//! ```

pub mod config;
pub mod error;
pub mod server;

pub use config::{ConfigFile, GatewayArgs, GatewayConfig};
pub use error::{GatewayError, Result};
pub use prf_query;
