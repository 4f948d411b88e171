//! Configuration module for the PRF gateway
//!
//! This module is organized into submodules for better maintainability:
//! - `defaults` - Default constants and values
//! - `args` - CLI argument definitions
//! - `file` - TOML configuration file
//! - `merge` - File/CLI precedence rules

mod args;
mod defaults;
pub mod file;
mod merge;

// Re-export submodule types
pub use args::GatewayArgs;
pub use defaults::*;
pub use file::ConfigFile;
pub use merge::merge_config_with_args;

use prf_query::DuckDBEngine;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::error::{GatewayError, Result};
use defaults::DEFAULT_HTTP_SOCKET_ADDR;

/// Complete runtime configuration for the gateway.
///
/// # Configuration Sources
///
/// Configuration is loaded from multiple sources with this precedence:
/// 1. **CLI arguments / environment variables** (highest priority)
/// 2. **Config file** - TOML configuration file
/// 3. **Built-in defaults** (lowest priority)
///
/// # Example
///
/// ```rust,ignore
/// use prf_gateway::config::{GatewayArgs, GatewayConfig};
///
/// let args = GatewayArgs::parse();
/// let config = GatewayConfig::from_args(args)?;
/// config.validate()?;
/// ```
///
/// # Generating Example Config
///
/// ```bash
/// prf-gateway --generate-config > prf-gateway.toml
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address to listen on for HTTP API
    pub http_addr: SocketAddr,

    /// Persisted DuckDB database file
    pub duckdb_path: PathBuf,

    /// Directory with datatranYYYY.csv files
    pub csv_dir: PathBuf,

    /// Schemas expected in the database
    pub schemas: Vec<String>,

    /// Table checked at startup (`schema.table`)
    pub target_table: String,

    /// Log level
    pub log_level: String,

    /// Where Parquet exports are written
    pub export_dir: PathBuf,

    /// Default limit for the table-rows endpoint
    pub default_row_limit: i64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_SOCKET_ADDR,
            duckdb_path: PathBuf::new(),
            csv_dir: PathBuf::from(DEFAULT_CSV_DIR),
            schemas: Vec::new(),
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            export_dir: std::env::temp_dir(),
            default_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

impl GatewayConfig {
    /// Build the configuration from (already merged) arguments.
    ///
    /// Fails when the database path is unset or does not name an existing
    /// file, or when the listen address is unusable.
    pub fn from_args(args: GatewayArgs) -> Result<Self> {
        let http_addr: SocketAddr = args.http_addr.parse().map_err(|e| {
            GatewayError::Config(format!("Invalid HTTP address '{}': {}", args.http_addr, e))
        })?;

        let duckdb_path = args.duckdb_path.ok_or_else(|| {
            GatewayError::Config(
                "DuckDB database path is required (--duckdb-path or DUCKDB_PATH)".to_string(),
            )
        })?;

        if !duckdb_path.is_file() {
            return Err(GatewayError::Config(format!(
                "DuckDB database file not found: {}",
                duckdb_path.display()
            )));
        }

        let schemas = args
            .schemas
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            http_addr,
            duckdb_path,
            csv_dir: args.csv_dir,
            schemas,
            target_table: args.target_table,
            log_level: args.log_level,
            export_dir: args.export_dir.unwrap_or_else(std::env::temp_dir),
            default_row_limit: args.default_row_limit,
        })
    }

    /// Validate the configuration before serving.
    ///
    /// A missing CSV directory is only logged: the gateway runs degraded and
    /// virtual-table queries fail per request.
    pub fn validate(&self) -> Result<()> {
        if self.http_addr.port() == 0 {
            return Err(GatewayError::Config(
                "HTTP port must be non-zero".to_string(),
            ));
        }

        if self.default_row_limit < 0 {
            return Err(GatewayError::Config(format!(
                "default_row_limit must be >= 0, got {}",
                self.default_row_limit
            )));
        }

        if !self.export_dir.is_dir() {
            return Err(GatewayError::Config(format!(
                "Export directory does not exist: {}",
                self.export_dir.display()
            )));
        }

        if !self.csv_dir.is_dir() {
            warn!(
                csv_dir = %self.csv_dir.display(),
                "CSV directory not found; datatranYYYY queries will fail"
            );
        }

        Ok(())
    }

    /// Log the catalog and warn about configured schemas or the target table
    /// missing from the database.
    pub async fn inspect_catalog(&self, engine: &DuckDBEngine) -> Result<()> {
        let tables = engine.list_tables().await?;
        info!(count = tables.len(), tables = ?tables, "Tables loaded");

        let schemas = engine.list_schemas().await?;
        for schema in &self.schemas {
            if !schemas.contains(schema) {
                warn!(schema = %schema, "Configured schema not found in database");
            }
        }

        if !self.target_table.is_empty() && !tables.contains(&self.target_table) {
            warn!(table = %self.target_table, "Target table not found in database");
        }

        let datasets = engine.list_datasets()?;
        info!(
            count = datasets.len(),
            years = ?datasets.iter().map(|d| d.year.as_str()).collect::<Vec<_>>(),
            "CSV datasets available"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_db(path: PathBuf) -> GatewayArgs {
        GatewayArgs {
            duckdb_path: Some(path),
            ..GatewayArgs::default()
        }
    }

    #[test]
    fn test_missing_duckdb_path_is_fatal() {
        let err = GatewayConfig::from_args(GatewayArgs::default()).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("DUCKDB_PATH"));
    }

    #[test]
    fn test_missing_duckdb_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = GatewayConfig::from_args(args_with_db(dir.path().join("nope.duckdb")))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_from_args_and_validate() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("prf.duckdb");
        std::fs::write(&db, b"").unwrap();

        let mut args = args_with_db(db.clone());
        args.schemas = vec![" prf ".to_string(), "".to_string()];
        args.csv_dir = dir.path().join("no-csv-here");

        let config = GatewayConfig::from_args(args).unwrap();
        assert_eq!(config.duckdb_path, db);
        assert_eq!(config.schemas, vec!["prf"]);
        assert_eq!(config.http_addr.port(), 8000);
        // Missing CSV directory is not fatal.
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("prf.duckdb");
        std::fs::write(&db, b"").unwrap();

        let mut args = args_with_db(db);
        args.http_addr = "not-an-address".to_string();
        assert!(GatewayConfig::from_args(args).is_err());
    }

    #[test]
    fn test_validate_rejects_zero_port_and_negative_limit() {
        let mut config = GatewayConfig {
            http_addr: "127.0.0.1:0".parse().unwrap(),
            ..GatewayConfig::default()
        };
        assert!(config.validate().is_err());

        config.http_addr = "127.0.0.1:8000".parse().unwrap();
        config.default_row_limit = -1;
        assert!(config.validate().is_err());
    }
}
