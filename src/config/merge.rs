//! Configuration merging utilities
//!
//! This module provides functions to merge configuration from files
//! with command-line arguments, where CLI arguments take precedence.

use super::args::GatewayArgs;
use super::defaults::*;
use super::file::ConfigFile;

/// Merge configuration file values with CLI arguments.
/// CLI arguments take precedence over config file values.
/// Only applies config file values where CLI uses defaults.
pub fn merge_config_with_args(mut args: GatewayArgs, config: &ConfigFile) -> GatewayArgs {
    // Helper macro to apply config value if CLI is at default
    macro_rules! apply_if_default {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(val) = $config_val {
                if args.$field == $default {
                    args.$field = val;
                }
            }
        };
    }

    macro_rules! apply_if_default_string {
        ($field:ident, $config_val:expr, $default:expr) => {
            if let Some(ref val) = $config_val {
                if args.$field == $default {
                    args.$field = val.clone();
                }
            }
        };
    }

    macro_rules! apply_option {
        ($field:ident, $config_val:expr) => {
            if args.$field.is_none() {
                if let Some(ref val) = $config_val {
                    args.$field = Some(val.clone());
                }
            }
        };
    }

    // Server section
    apply_if_default_string!(http_addr, config.server.http_addr, DEFAULT_HTTP_ADDR);
    apply_if_default_string!(log_level, config.server.log_level, DEFAULT_LOG_LEVEL);

    // Database section
    apply_option!(duckdb_path, config.database.duckdb_path);
    if args.schemas.is_empty() {
        if let Some(ref schemas) = config.database.schemas {
            args.schemas = schemas.clone();
        }
    }
    apply_if_default_string!(
        target_table,
        config.database.target_table,
        DEFAULT_TARGET_TABLE
    );

    // Datasets section
    if let Some(ref path) = config.datasets.csv_dir {
        if args.csv_dir == std::path::Path::new(DEFAULT_CSV_DIR) {
            args.csv_dir = path.clone();
        }
    }

    // Query section
    apply_option!(export_dir, config.query.export_dir);
    apply_if_default!(
        default_row_limit,
        config.query.default_row_limit,
        DEFAULT_ROW_LIMIT
    );

    args
}
