//! Command-line arguments for the PRF gateway
//!
//! This module defines the CLI arguments structure using clap.

use clap::Parser;
use std::path::PathBuf;

use super::defaults::*;

/// Command-line arguments for the PRF gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "prf-gateway")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Read-only SQL gateway over the PRF DuckDB database and yearly CSV datasets")]
pub struct GatewayArgs {
    /// Path to configuration file (TOML format)
    /// If not specified, looks for prf-gateway.toml in the current directory
    /// and /etc/prf-gateway/
    #[arg(short, long, env = "PRF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Generate example configuration file and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Path to the persisted DuckDB database file (opened read-only)
    #[arg(long, env = "DUCKDB_PATH")]
    pub duckdb_path: Option<PathBuf>,

    /// Directory containing datatranYYYY.csv files
    #[arg(long, env = "PRF_CSV_DIR", default_value = DEFAULT_CSV_DIR)]
    pub csv_dir: PathBuf,

    /// Comma-separated schema names expected in the database
    #[arg(long, env = "SCHEMAS", value_delimiter = ',')]
    pub schemas: Vec<String>,

    /// Table checked at startup, as schema.table
    #[arg(long, env = "PRF_TARGET_TABLE", default_value = DEFAULT_TARGET_TABLE)]
    pub target_table: String,

    /// Address to listen on for HTTP API
    #[arg(long, env = "PRF_HTTP_ADDR", default_value = DEFAULT_HTTP_ADDR)]
    pub http_addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "PRF_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    /// Directory where Parquet exports are written (default: system temp dir)
    #[arg(long, env = "PRF_EXPORT_DIR")]
    pub export_dir: Option<PathBuf>,

    /// Rows returned by the table-rows endpoint when no limit is given
    #[arg(long, env = "PRF_DEFAULT_ROW_LIMIT", default_value_t = DEFAULT_ROW_LIMIT)]
    pub default_row_limit: i64,
}

impl Default for GatewayArgs {
    fn default() -> Self {
        Self {
            config: None,
            generate_config: false,
            duckdb_path: None,
            csv_dir: PathBuf::from(DEFAULT_CSV_DIR),
            schemas: Vec::new(),
            target_table: DEFAULT_TARGET_TABLE.to_string(),
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            export_dir: None,
            default_row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}
