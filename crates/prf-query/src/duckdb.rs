//! DuckDB-backed executor for the PRF query gateway.
//!
//! This module owns the single handle to the persisted DuckDB database and
//! runs guarded, rewritten statements against it. The database is opened in
//! read-only mode once at startup; `datatranYYYY` references are served from
//! CSV files through `read_csv_auto(...)` scans produced by the
//! [`rewrite`](crate::rewrite) module.
//!
//! # Architecture
//!
//! 1. **Guard** -- [`guard::validate`](crate::guard::validate) refuses
//!    anything that is not a plain `SELECT`/`WITH`.
//! 2. **Rewrite** -- virtual tables are resolved to CSV scans and the
//!    requested `LIMIT`/`OFFSET` is appended.
//! 3. **Execute** -- the statement runs on a clone of the base connection
//!    inside `spawn_blocking`, with positional parameters bound from JSON.
//! 4. **Convert** -- DuckDB values are mapped to JSON, preserving column
//!    order.
//!
//! A request moves `Received -> Validated -> Rewritten -> Executed` and ends
//! in success or a terminal [`QueryError`]. Nothing is retried and nothing is
//! cached between requests.
//!
//! # Examples
//!
//! ```ignore
//! use prf_query::duckdb::{DuckDBEngine, QueryRequest};
//!
//! let engine = DuckDBEngine::open("/data/prf.duckdb", "/data/prf")?;
//! let result = engine
//!     .run_query(&QueryRequest::new("SELECT * FROM datatran2020 WHERE uf = 'PR'").with_limit(100))
//!     .await?;
//! println!("Got {} rows", result.row_count);
//! ```

use crate::error::{QueryError, Result};
use crate::guard;
use crate::rewrite::{Pagination, QueryRewriter, RewrittenStatement, VirtualTable};
use duckdb::types::{TimeUnit, Value, ValueRef};
use duckdb::{params_from_iter, AccessMode, Config, Connection};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// ─── Public types ────────────────────────────────────────────────────────────

/// Read-only DuckDB engine.
///
/// Holds one base connection for the lifetime of the process. Each query runs
/// on a `try_clone()` of it, which shares the same database instance without
/// serializing concurrent reads on a single connection.
///
/// The engine is safe to share across threads (`Send + Sync`).
pub struct DuckDBEngine {
    /// Base connection.
    /// Note: Mutex because a DuckDB Connection is `Send` but not `Sync`.
    connection: Arc<Mutex<Connection>>,

    /// Resolves `datatranYYYY` references under the CSV base directory.
    rewriter: QueryRewriter,
}

/// A query as submitted by a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    /// SQL text; must be a `SELECT` or `WITH` statement.
    pub sql: String,

    /// Positional parameters bound to `?` placeholders.
    #[serde(default)]
    pub params: Vec<JsonValue>,

    /// Appended as ` LIMIT n` when present.
    #[serde(default)]
    pub limit: Option<i64>,

    /// Appended as ` OFFSET n` when present.
    #[serde(default)]
    pub offset: Option<i64>,
}

impl QueryRequest {
    /// A request with no parameters and no pagination.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            ..Default::default()
        }
    }

    /// Set positional parameters.
    pub fn with_params(mut self, params: Vec<JsonValue>) -> Self {
        self.params = params;
        self
    }

    /// Set the row limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the row offset.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The pagination clauses requested.
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

/// The result of executing a SQL query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result-set order.
    pub columns: Vec<String>,

    /// Rows in the order DuckDB returned them.
    pub rows: Vec<QueryResultRow>,

    /// Number of rows in `rows`.
    pub row_count: usize,

    /// Execution time in milliseconds.
    pub execution_time_ms: u64,
}

/// A single row in query results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResultRow {
    /// Column values encoded as JSON, aligned with [`QueryResult::columns`].
    pub values: Vec<JsonValue>,
}

impl QueryResult {
    /// Convert to one JSON object per row, keys in column order.
    pub fn into_records(self) -> Vec<Map<String, JsonValue>> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row.values).collect())
            .collect()
    }

    /// Values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&JsonValue>> {
        let idx = self.columns.iter().position(|c| c == name)?;
        Some(self.rows.iter().filter_map(|r| r.values.get(idx)).collect())
    }
}

/// Location and size of a Parquet file written by
/// [`DuckDBEngine::export_parquet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParquetExport {
    /// Absolute path of the file.
    pub file_path: PathBuf,
    /// File name component of `file_path`.
    pub file_name: String,
    /// Size in bytes.
    pub file_size: u64,
}

/// Result of an EXPLAIN request showing the query execution plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplainResult {
    /// The SQL as submitted.
    pub sql: String,
    /// The SQL that would be executed (virtual tables resolved, pagination
    /// appended).
    pub rewritten_sql: String,
    /// DuckDB query plan output lines.
    pub plan: Vec<String>,
    /// Datasets referenced by the query.
    pub datasets: Vec<VirtualTable>,
}

// ─── Engine implementation ───────────────────────────────────────────────────

impl DuckDBEngine {
    /// Open the persisted database at `db_path` in read-only mode.
    ///
    /// A missing `csv_dir` is not an error: the engine starts and any query
    /// that references a virtual table later fails with
    /// [`QueryError::MissingDataset`].
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Config`] when the database file does not exist or
    /// DuckDB refuses to open it.
    pub fn open(db_path: impl AsRef<Path>, csv_dir: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.as_ref();
        if !db_path.is_file() {
            return Err(QueryError::Config(format!(
                "DuckDB database file not found: {}",
                db_path.display()
            )));
        }

        let config = Config::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| QueryError::Config(format!("Invalid DuckDB settings: {}", e)))?;

        let connection = Connection::open_with_flags(db_path, config).map_err(|e| {
            QueryError::Config(format!(
                "Failed to open DuckDB database {}: {}",
                db_path.display(),
                e
            ))
        })?;

        info!(path = %db_path.display(), "DuckDB database opened (read-only)");

        Ok(Self::with_connection(connection, csv_dir))
    }

    /// Wrap an already opened connection.
    ///
    /// Used by tests to inject an isolated in-memory database.
    pub fn with_connection(connection: Connection, csv_dir: impl Into<PathBuf>) -> Self {
        // Extensions ship with the bundled build; never try to download them.
        if let Err(e) = connection.execute_batch("SET autoinstall_known_extensions=false;") {
            debug!(error = %e, "Could not disable extension auto-install");
        }

        let rewriter = QueryRewriter::new(csv_dir);
        if rewriter.csv_dir().is_dir() {
            info!(csv_dir = %rewriter.csv_dir().display(), "CSV base directory registered");
        } else {
            warn!(
                csv_dir = %rewriter.csv_dir().display(),
                "CSV base directory not found; datatranYYYY queries will fail"
            );
        }

        Self {
            connection: Arc::new(Mutex::new(connection)),
            rewriter,
        }
    }

    /// The rewriter used for virtual tables.
    pub fn rewriter(&self) -> &QueryRewriter {
        &self.rewriter
    }

    /// A fresh connection to the same database instance.
    fn session(&self) -> Result<Connection> {
        let base = self.connection.lock();
        Ok(base.try_clone()?)
    }

    /// Run `f` on a cloned connection on the blocking thread pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Result<T> + Send + 'static,
    {
        let conn = self.session()?;
        tokio::task::spawn_blocking(move || f(conn))
            .await
            .map_err(|e| QueryError::Internal(format!("Query task failed: {}", e)))?
    }

    // ── Statement preparation ────────────────────────────────────────────

    /// Validate, rewrite and paginate `sql`.
    ///
    /// This is the only entry point that turns caller SQL into executable
    /// SQL; the guard always runs before any substitution.
    pub fn prepare(&self, sql: &str, pagination: Pagination) -> Result<RewrittenStatement> {
        guard::validate(sql)?;
        self.rewriter.rewrite_paginated(sql, pagination)
    }

    // ── Query execution ──────────────────────────────────────────────────

    /// Execute a caller query.
    ///
    /// # Errors
    ///
    /// - [`QueryError::Rejected`] when the guard refuses the statement.
    /// - [`QueryError::MissingDataset`] when a `datatranYYYY` file is absent;
    ///   DuckDB is not called in that case.
    /// - [`QueryError::InvalidParameter`] for non-scalar parameters.
    /// - [`QueryError::CatalogOrFile`] / [`QueryError::Execution`] for failures
    ///   reported by DuckDB.
    pub async fn run_query(&self, request: &QueryRequest) -> Result<QueryResult> {
        let start_time = Instant::now();

        let stmt = self.prepare(&request.sql, request.pagination())?;
        let params = bind_params(&request.params)?;

        debug!(sql = %stmt.sql, "Rewritten statement");

        let sql = stmt.sql.clone();
        let (columns, rows) = self
            .blocking(move |conn| fetch_rows(&conn, &sql, &params))
            .await?;

        let execution_time_ms = start_time.elapsed().as_millis() as u64;
        let datasets: Vec<&str> = stmt.datasets.iter().map(|d| d.table.as_str()).collect();

        info!(
            sql = %request.sql,
            datasets = ?datasets,
            rows = rows.len(),
            execution_time_ms = execution_time_ms,
            "Query executed successfully"
        );

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms,
        })
    }

    /// Execute already prepared SQL with positional parameters.
    ///
    /// No guard or rewrite is applied; callers pass the output of
    /// [`prepare`](Self::prepare) or SQL they built themselves. Blocks the
    /// calling thread.
    pub fn execute(&self, sql: &str, params: &[JsonValue]) -> Result<QueryResult> {
        let start_time = Instant::now();
        let params = bind_params(params)?;
        let conn = self.session()?;
        let (columns, rows) = fetch_rows(&conn, sql, &params)?;

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    // ── Catalog ──────────────────────────────────────────────────────────

    /// Schema names known to the database, sorted and deduplicated.
    pub async fn list_schemas(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let (_, rows) = fetch_rows(
                &conn,
                "SELECT DISTINCT schema_name FROM information_schema.schemata ORDER BY schema_name",
                &[],
            )?;
            Ok(first_column_strings(rows))
        })
        .await
    }

    /// Tables known to the database as `schema.table`.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        self.blocking(|conn| {
            let (_, rows) = fetch_rows(
                &conn,
                "SELECT table_schema || '.' || table_name FROM information_schema.tables \
                 ORDER BY table_schema, table_name",
                &[],
            )?;
            Ok(first_column_strings(rows))
        })
        .await
    }

    /// Read up to `limit` rows of `schema.table`.
    ///
    /// The identifiers come from the request path and are interpolated
    /// without quoting, so the composed statement goes through the same
    /// guard and rewrite as caller SQL.
    pub async fn read_table(&self, schema: &str, table: &str, limit: i64) -> Result<QueryResult> {
        let start_time = Instant::now();
        let sql = format!("SELECT * FROM {}.{} LIMIT {}", schema, table, limit);
        let stmt = self.prepare(&sql, Pagination::default())?;

        let (columns, rows) = self
            .blocking(move |conn| fetch_rows(&conn, &stmt.sql, &[]))
            .await?;

        info!(
            schema = %schema,
            table = %table,
            rows = rows.len(),
            "Table rows read"
        );

        Ok(QueryResult {
            columns,
            row_count: rows.len(),
            rows,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// CSV datasets available as virtual tables.
    pub fn list_datasets(&self) -> Result<Vec<VirtualTable>> {
        self.rewriter.list_datasets()
    }

    // ── Parquet export ───────────────────────────────────────────────────

    /// Run a caller query and write the full result to a Parquet file in
    /// `dir`.
    ///
    /// Guarding, rewriting and pagination are identical to
    /// [`run_query`](Self::run_query); only the sink differs.
    pub async fn export_parquet(&self, request: &QueryRequest, dir: &Path) -> Result<ParquetExport> {
        let stmt = self.prepare(&request.sql, request.pagination())?;
        let params = bind_params(&request.params)?;

        let file_name = format!("query_{}.parquet", uuid::Uuid::new_v4().simple());
        let file_path = dir.join(&file_name);
        let copy_sql = format!(
            "COPY ({}) TO '{}' (FORMAT PARQUET)",
            stmt.sql,
            file_path.to_string_lossy().replace('\'', "''")
        );

        self.blocking(move |conn| {
            conn.execute(&copy_sql, params_from_iter(params.iter()))?;
            Ok(())
        })
        .await?;

        let file_size = std::fs::metadata(&file_path)?.len();

        info!(
            sql = %request.sql,
            path = %file_path.display(),
            bytes = file_size,
            "Query exported to Parquet"
        );

        Ok(ParquetExport {
            file_path,
            file_name,
            file_size,
        })
    }

    // ── Query plan / EXPLAIN ────────────────────────────────────────────

    /// Return the DuckDB plan for a caller query without executing it.
    ///
    /// The request goes through the same guard and rewrite as
    /// [`run_query`](Self::run_query), so a missing dataset fails here too.
    pub async fn explain(&self, request: &QueryRequest) -> Result<ExplainResult> {
        let stmt = self.prepare(&request.sql, request.pagination())?;
        let params = bind_params(&request.params)?;

        let explain_sql = format!("EXPLAIN {}", stmt.sql);
        let (_, rows) = self
            .blocking(move |conn| fetch_rows(&conn, &explain_sql, &params))
            .await?;

        // EXPLAIN returns (explain_key, explain_value); keep the text cells.
        let plan = rows
            .into_iter()
            .map(|row| {
                row.values
                    .iter()
                    .map(|v| match v {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect();

        Ok(ExplainResult {
            sql: request.sql.clone(),
            rewritten_sql: stmt.sql,
            plan,
            datasets: stmt.datasets,
        })
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

/// Run `sql` and collect column names plus JSON-encoded rows.
fn fetch_rows(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<(Vec<String>, Vec<QueryResultRow>)> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows_result = stmt.query(params_from_iter(params.iter()))?;

    // Column count is discovered per row; Rows holds a mutable borrow on stmt
    // so names are read after it is dropped.
    let mut rows = Vec::new();
    while let Some(row) = rows_result.next()? {
        let mut values = Vec::new();
        for i in 0.. {
            match row.get_ref(i) {
                Ok(value) => values.push(duckdb_value_to_json(value)),
                Err(_) => break,
            }
        }
        rows.push(QueryResultRow { values });
    }
    drop(rows_result);

    let columns: Vec<String> = stmt.column_names().iter().map(|s| s.to_string()).collect();
    Ok((columns, rows))
}

fn first_column_strings(rows: Vec<QueryResultRow>) -> Vec<String> {
    rows.into_iter()
        .filter_map(|row| row.values.into_iter().next())
        .filter_map(|v| match v {
            JsonValue::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Convert JSON positional parameters to DuckDB values.
///
/// Only scalars are accepted. Integers that fit `i64` bind as BIGINT, every
/// other number as DOUBLE.
pub fn bind_params(params: &[JsonValue]) -> Result<Vec<Value>> {
    params
        .iter()
        .enumerate()
        .map(|(index, param)| match param {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Boolean(*b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Ok(Value::BigInt(i)),
                None => n
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| QueryError::invalid_parameter(index, "number out of range")),
            },
            JsonValue::String(s) => Ok(Value::Text(s.clone())),
            JsonValue::Array(_) => Err(QueryError::invalid_parameter(
                index,
                "arrays are not supported",
            )),
            JsonValue::Object(_) => Err(QueryError::invalid_parameter(
                index,
                "objects are not supported",
            )),
        })
        .collect()
}

/// Days between 0001-01-01 (CE day 1) and the Unix epoch.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

fn huge_int_to_json(i: i128) -> JsonValue {
    // Fall back to a string when the value does not fit i64.
    match i64::try_from(i) {
        Ok(n) => JsonValue::Number(n.into()),
        Err(_) => JsonValue::String(i.to_string()),
    }
}

fn decimal_to_json(text: String) -> JsonValue {
    serde_json::from_str(&text).unwrap_or(JsonValue::String(text))
}

fn blob_to_json(bytes: &[u8]) -> JsonValue {
    JsonValue::String(base64::Engine::encode(
        &base64::engine::general_purpose::STANDARD,
        bytes,
    ))
}

fn date_to_json(days: i32) -> JsonValue {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(chrono::NaiveDate::from_num_days_from_ce_opt)
        .map(|d| JsonValue::String(d.to_string()))
        .unwrap_or(JsonValue::Null)
}

fn timestamp_to_json(unit: TimeUnit, v: i64) -> JsonValue {
    chrono::DateTime::from_timestamp_micros(to_micros(unit, v))
        .map(|dt| JsonValue::String(dt.naive_utc().to_string()))
        .unwrap_or(JsonValue::Null)
}

fn time_to_json(unit: TimeUnit, v: i64) -> JsonValue {
    let micros = to_micros(unit, v);
    let secs = u32::try_from(micros.div_euclid(1_000_000)).ok();
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    secs.and_then(|s| chrono::NaiveTime::from_num_seconds_from_midnight_opt(s, nanos))
        .map(|t| JsonValue::String(t.to_string()))
        .unwrap_or(JsonValue::Null)
}

/// Convert a DuckDB `ValueRef` to a `serde_json::Value`.
///
/// Scalars are read in place; nested values (lists, arrays, structs, maps,
/// unions) are materialized first and converted recursively.
fn duckdb_value_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Boolean(b) => JsonValue::Bool(b),
        ValueRef::TinyInt(i) => JsonValue::Number(i.into()),
        ValueRef::SmallInt(i) => JsonValue::Number(i.into()),
        ValueRef::Int(i) => JsonValue::Number(i.into()),
        ValueRef::BigInt(i) => JsonValue::Number(i.into()),
        ValueRef::HugeInt(i) => huge_int_to_json(i),
        ValueRef::UTinyInt(i) => JsonValue::Number(i.into()),
        ValueRef::USmallInt(i) => JsonValue::Number(i.into()),
        ValueRef::UInt(i) => JsonValue::Number(i.into()),
        ValueRef::UBigInt(i) => JsonValue::Number(i.into()),
        ValueRef::Float(f) => float_to_json(f as f64),
        ValueRef::Double(f) => float_to_json(f),
        ValueRef::Decimal(d) => decimal_to_json(d.to_string()),
        ValueRef::Text(s) => JsonValue::String(String::from_utf8_lossy(s).into_owned()),
        ValueRef::Blob(b) => blob_to_json(b),
        ValueRef::Date32(days) => date_to_json(days),
        ValueRef::Timestamp(unit, v) => timestamp_to_json(unit, v),
        ValueRef::Time64(unit, v) => time_to_json(unit, v),
        _ => owned_value_to_json(&Value::from(value)),
    }
}

/// Convert an owned DuckDB `Value`, recursing into nested types.
///
/// Struct fields keep their declared order. Map keys that are not strings
/// are rendered as their JSON text.
fn owned_value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Boolean(b) => JsonValue::Bool(*b),
        Value::TinyInt(i) => JsonValue::Number((*i).into()),
        Value::SmallInt(i) => JsonValue::Number((*i).into()),
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::BigInt(i) => JsonValue::Number((*i).into()),
        Value::HugeInt(i) => huge_int_to_json(*i),
        Value::UTinyInt(i) => JsonValue::Number((*i).into()),
        Value::USmallInt(i) => JsonValue::Number((*i).into()),
        Value::UInt(i) => JsonValue::Number((*i).into()),
        Value::UBigInt(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => float_to_json(*f as f64),
        Value::Double(f) => float_to_json(*f),
        Value::Decimal(d) => decimal_to_json(d.to_string()),
        Value::Text(s) | Value::Enum(s) => JsonValue::String(s.clone()),
        Value::Blob(b) => blob_to_json(b),
        Value::Date32(days) => date_to_json(*days),
        Value::Timestamp(unit, v) => timestamp_to_json(*unit, *v),
        Value::Time64(unit, v) => time_to_json(*unit, *v),
        Value::Interval { months, days, nanos } => serde_json::json!({
            "months": months,
            "days": days,
            "nanos": nanos,
        }),
        Value::List(items) | Value::Array(items) => {
            JsonValue::Array(items.iter().map(owned_value_to_json).collect())
        }
        Value::Struct(fields) => JsonValue::Object(
            fields
                .iter()
                .map(|(name, v)| (name.clone(), owned_value_to_json(v)))
                .collect(),
        ),
        Value::Map(entries) => JsonValue::Object(
            entries
                .iter()
                .map(|(k, v)| {
                    let key = match owned_value_to_json(k) {
                        JsonValue::String(s) => s,
                        other => other.to_string(),
                    };
                    (key, owned_value_to_json(v))
                })
                .collect(),
        ),
        Value::Union(inner) => owned_value_to_json(inner),
        #[allow(unreachable_patterns)]
        other => JsonValue::String(format!("{:?}", other)),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
