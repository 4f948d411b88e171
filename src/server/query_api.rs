//! Query REST API over the PRF DuckDB database.
//!
//! This module exposes the query core over HTTP. Handlers are thin: they
//! marshal the request, call [`DuckDBEngine`], and turn every core error into
//! a `400` with a `{"detail": "..."}` body.
//!
//! # Stability
//!
//! **Stable** -- Breaking changes only in major versions.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/query` | Execute a read-only SQL query |
//! | `POST` | `/query/explain` | Get the query execution plan |
//! | `POST` | `/query/parquet/` | Execute and write the result to a Parquet file |
//! | `GET` | `/schemas` | List schema names |
//! | `GET` | `/tables/{schema}/{table}/rows` | First rows of a table (`?limit=N`) |
//! | `GET` | `/datasets` | List the yearly CSV datasets |
//!
//! # Example
//!
//! ```bash
//! curl -X POST http://localhost:8000/query \
//!   -H 'Content-Type: application/json' \
//!   -d '{"sql": "SELECT * FROM datatran2020 WHERE uf = ?", "params": ["PR"], "limit": 100}'
//!
//! curl 'http://localhost:8000/tables/prf/ocorrencias/rows?limit=5'
//! ```

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prf_query::{DuckDBEngine, ExplainResult, QueryError, QueryRequest, VirtualTable};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for the query API.
#[derive(Clone)]
pub struct QueryApiState {
    /// Read-only DuckDB engine.
    pub engine: Arc<DuckDBEngine>,

    /// Where Parquet exports are written.
    pub export_dir: PathBuf,

    /// Limit used by the table-rows endpoint when `?limit=` is absent.
    pub default_row_limit: i64,
}

impl QueryApiState {
    /// State with the system temp dir for exports and the default row limit.
    pub fn new(engine: Arc<DuckDBEngine>) -> Self {
        Self {
            engine,
            export_dir: std::env::temp_dir(),
            default_row_limit: crate::config::DEFAULT_ROW_LIMIT,
        }
    }
}

// ─── Request / Response types ────────────────────────────────────────────────

/// One result row, keys in column order.
pub type Record = Map<String, JsonValue>;

/// Query string for `GET /tables/{schema}/{table}/rows`.
#[derive(Debug, Deserialize)]
pub struct RowsParams {
    /// Maximum rows to return.
    pub limit: Option<i64>,
}

/// Response body for `POST /query/parquet/`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ParquetExportResponse {
    /// Absolute path of the written file.
    pub file_path: String,
    /// File name only.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
}

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable message, including the engine diagnostic when there is one.
    pub detail: String,
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Create the query API router.
pub fn create_query_api_router(state: QueryApiState) -> Router {
    Router::new()
        .route("/query", post(execute_query_handler))
        .route("/query/explain", post(explain_query_handler))
        .route("/query/parquet/", post(export_parquet_handler))
        .route("/schemas", get(list_schemas_handler))
        .route("/tables/:schema/:table/rows", get(read_table_handler))
        .route("/datasets", get(list_datasets_handler))
        .with_state(state)
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn execute_query_handler(
    State(state): State<QueryApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let Json(request) = payload?;
    let result = state.engine.run_query(&request).await.map_err(|e| {
        warn!(sql = %request.sql, error = %e, "Query failed");
        ApiError::from(e)
    })?;

    Ok(Json(result.into_records()))
}

async fn explain_query_handler(
    State(state): State<QueryApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ExplainResult>, ApiError> {
    let Json(request) = payload?;
    let plan = state.engine.explain(&request).await.map_err(|e| {
        warn!(sql = %request.sql, error = %e, "Explain failed");
        ApiError::from(e)
    })?;

    Ok(Json(plan))
}

async fn export_parquet_handler(
    State(state): State<QueryApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ParquetExportResponse>, ApiError> {
    let Json(request) = payload?;
    let export = state
        .engine
        .export_parquet(&request, &state.export_dir)
        .await
        .map_err(|e| {
            warn!(sql = %request.sql, error = %e, "Parquet export failed");
            ApiError::from(e)
        })?;

    Ok(Json(ParquetExportResponse {
        file_path: export.file_path.to_string_lossy().into_owned(),
        file_name: export.file_name,
        file_size: export.file_size,
    }))
}

async fn list_schemas_handler(
    State(state): State<QueryApiState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let schemas = state.engine.list_schemas().await?;
    Ok(Json(schemas))
}

async fn read_table_handler(
    State(state): State<QueryApiState>,
    Path((schema, table)): Path<(String, String)>,
    Query(params): Query<RowsParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let limit = params.limit.unwrap_or(state.default_row_limit);

    let result = state
        .engine
        .read_table(&schema, &table, limit)
        .await
        .map_err(|e| {
            warn!(schema = %schema, table = %table, error = %e, "Table read failed");
            ApiError::from(e)
        })?;

    Ok(Json(result.into_records()))
}

async fn list_datasets_handler(
    State(state): State<QueryApiState>,
) -> Result<Json<Vec<VirtualTable>>, ApiError> {
    let datasets = state.engine.list_datasets()?;
    info!(count = datasets.len(), "Datasets listed");
    Ok(Json(datasets))
}

// ─── Error handling ──────────────────────────────────────────────────────────

/// Per-request API error.
#[derive(Debug)]
pub enum ApiError {
    /// The statement, its parameters, or the engine rejected the request.
    BadRequest(String),
    /// The gateway itself failed (task panic, serialization).
    Internal(String),
}

impl From<QueryError> for ApiError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Internal(_) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(ErrorResponse { detail })).into_response()
    }
}
