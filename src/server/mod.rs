//! HTTP transport for the gateway.
//!
//! - [`http`] - server startup, health check, shutdown signal
//! - [`query_api`] - query, schema, table and dataset endpoints

pub mod http;
pub mod query_api;

pub use http::{build_http_router, shutdown_signal, start_http_server};
pub use query_api::{create_query_api_router, ApiError, QueryApiState};
