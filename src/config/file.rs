//! Configuration file support for the PRF gateway
//!
//! This module provides TOML configuration file parsing and merging with CLI arguments.
//!
//! ## Priority Order
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values
//!
//! ## Example Configuration
//!
//! ```toml
//! # prf-gateway.toml
//!
//! [server]
//! http_addr = "0.0.0.0:8000"
//! log_level = "info"
//!
//! [database]
//! duckdb_path = "/data/prf.duckdb"
//! schemas = ["prf"]
//! target_table = "prf.ocorrencias"
//!
//! [datasets]
//! csv_dir = "/data/prf"
//!
//! [query]
//! export_dir = "/tmp/prf-exports"
//! default_row_limit = 10
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::defaults::DEFAULT_CONFIG_PATHS;
use crate::error::{GatewayError, Result};

/// Root configuration structure for TOML file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    /// HTTP server configuration
    pub server: ServerSection,

    /// DuckDB database configuration
    pub database: DatabaseSection,

    /// CSV dataset configuration
    pub datasets: DatasetsSection,

    /// Query endpoint configuration
    pub query: QuerySection,
}

/// Server section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// HTTP API listen address
    pub http_addr: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// Database section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// Persisted DuckDB file
    pub duckdb_path: Option<PathBuf>,

    /// Schema names expected in the database
    pub schemas: Option<Vec<String>>,

    /// Table checked at startup
    pub target_table: Option<String>,
}

/// Datasets section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetsSection {
    /// Directory holding datatranYYYY.csv files
    pub csv_dir: Option<PathBuf>,
}

/// Query section configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    /// Where Parquet exports are written
    pub export_dir: Option<PathBuf>,

    /// Default limit for the table-rows endpoint
    pub default_row_limit: Option<i64>,
}

impl ConfigFile {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::parse(&contents).map_err(|e| {
            GatewayError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(contents: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Try to load configuration from default locations
    ///
    /// Searches in order:
    /// 1. ./prf-gateway.toml
    /// 2. /etc/prf-gateway/prf-gateway.toml
    pub fn load_default() -> Option<Self> {
        for path in DEFAULT_CONFIG_PATHS.iter().map(PathBuf::from) {
            if path.exists() {
                match Self::load(&path) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {:?}", path);
                        return Some(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        None
    }

    /// Generate an example configuration file
    pub fn generate_example() -> String {
        r#"# PRF Gateway Configuration File
# Copy to prf-gateway.toml and customize as needed
#
# Configuration priority (highest to lowest):
# 1. Command-line arguments
# 2. Environment variables
# 3. This configuration file
# 4. Default values

[server]
# HTTP API listen address
http_addr = "0.0.0.0:8000"

# Log level (trace, debug, info, warn, error)
log_level = "info"

[database]
# Persisted DuckDB database, opened read-only (required)
duckdb_path = "/data/prf.duckdb"

# Schemas expected in the database; missing ones are logged at startup
# schemas = ["prf"]

# Table checked at startup
target_table = "prf.ocorrencias"

[datasets]
# Directory with datatranYYYY.csv files (';' separated, header row)
csv_dir = "/data/prf"

[query]
# Where POST /query/parquet/ writes its files (default: system temp dir)
# export_dir = "/tmp/prf-exports"

# Rows returned by GET /tables/{schema}/{table}/rows without ?limit=
default_row_limit = 10
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config = ConfigFile::parse(&ConfigFile::generate_example()).unwrap();
        assert_eq!(config.server.http_addr.as_deref(), Some("0.0.0.0:8000"));
        assert_eq!(
            config.database.duckdb_path,
            Some(PathBuf::from("/data/prf.duckdb"))
        );
        assert_eq!(config.datasets.csv_dir, Some(PathBuf::from("/data/prf")));
        assert_eq!(config.query.default_row_limit, Some(10));
        assert!(config.database.schemas.is_none());
    }

    #[test]
    fn test_partial_config_leaves_other_sections_empty() {
        let config = ConfigFile::parse("[datasets]\ncsv_dir = \"/srv/csv\"\n").unwrap();
        assert_eq!(config.datasets.csv_dir, Some(PathBuf::from("/srv/csv")));
        assert!(config.server.http_addr.is_none());
        assert!(config.database.duckdb_path.is_none());
    }

    #[test]
    fn test_load_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[server\nhttp_addr = 1").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(err, GatewayError::Config(_)));
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigFile::load("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
