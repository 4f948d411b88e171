//! Default constants for gateway configuration
//!
//! These constants define the default values used throughout the configuration
//! system when no explicit value is provided.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default listen address for the HTTP API
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8000";

/// Default HTTP socket address (const, no parsing needed)
pub(crate) const DEFAULT_HTTP_SOCKET_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 8000);

/// Default directory holding the `datatranYYYY.csv` files
pub const DEFAULT_CSV_DIR: &str = "/data/prf";

/// Default table inspected at startup
pub const DEFAULT_TARGET_TABLE: &str = "prf.ocorrencias";

/// Default log level
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default row limit for `GET /tables/{schema}/{table}/rows`
pub const DEFAULT_ROW_LIMIT: i64 = 10;

/// Config file locations searched when `--config` is not given
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "prf-gateway.toml",
    "/etc/prf-gateway/prf-gateway.toml",
];
