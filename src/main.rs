//! PRF Gateway - read-only SQL over the PRF accident datasets

use clap::Parser;
use prf_gateway::config::{merge_config_with_args, ConfigFile};
use prf_gateway::prf_query::DuckDBEngine;
use prf_gateway::server::{shutdown_signal, start_http_server, QueryApiState};
use prf_gateway::{GatewayArgs, GatewayConfig, GatewayError, Result};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    if let Err(e) = run() {
        eprintln!("prf-gateway failed to start: {e}");
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    let mut args = GatewayArgs::parse();

    // Handle --generate-config flag
    if args.generate_config {
        println!("{}", ConfigFile::generate_example());
        return Ok(());
    }

    // Load configuration file if specified or from default locations
    let config_file = if let Some(ref path) = args.config {
        match ConfigFile::load(path) {
            Ok(config) => {
                eprintln!("Loaded configuration from {:?}", path);
                Some(config)
            }
            Err(e) => {
                eprintln!("Error loading configuration file: {}", e);
                return Err(e);
            }
        }
    } else {
        ConfigFile::load_default()
    };

    // Merge config file values with CLI args (CLI takes precedence)
    if let Some(ref config) = config_file {
        args = merge_config_with_args(args, config);
    }

    let log_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(log_filter)
        .init();

    let config = match GatewayConfig::from_args(args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to create configuration");
            return Err(e);
        }
    };

    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(e);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| {
            error!(error = %e, "Failed to create Tokio runtime");
            GatewayError::Server(format!("Failed to create Tokio runtime: {}", e))
        })?;

    runtime.block_on(serve(config))
}

async fn serve(config: GatewayConfig) -> Result<()> {
    info!(
        duckdb_path = %config.duckdb_path.display(),
        csv_dir = %config.csv_dir.display(),
        export_dir = %config.export_dir.display(),
        "Starting PRF gateway"
    );

    let engine = Arc::new(DuckDBEngine::open(&config.duckdb_path, config.csv_dir.clone())?);

    // Inspection failures are logged, not fatal.
    if let Err(e) = config.inspect_catalog(&engine).await {
        error!(error = %e, "Startup inspection failed");
    }

    let state = QueryApiState {
        engine,
        export_dir: config.export_dir.clone(),
        default_row_limit: config.default_row_limit,
    };

    start_http_server(config.http_addr, state, shutdown_signal()).await?;

    info!("PRF gateway stopped");
    Ok(())
}
