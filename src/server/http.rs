//! HTTP server for the query API and health checks
//!
//! Provides:
//! - Health check (/health)
//! - Query API (see [`query_api`](super::query_api))

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

use super::query_api::{create_query_api_router, QueryApiState};
use crate::error::{GatewayError, Result};

/// Liveness response body
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Always "ok" while the process is serving
    pub status: &'static str,
}

/// Build the complete router: health plus query API
pub fn build_http_router(state: QueryApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .merge(create_query_api_router(state))
}

/// Start HTTP server and serve until `shutdown` resolves
pub async fn start_http_server<F>(addr: SocketAddr, state: QueryApiState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_http_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::AddrInUse {
            let port = addr.port();
            GatewayError::Server(format!(
                "HTTP port {} is already in use. \
                 Fix: Use --http-addr 0.0.0.0:{} to pick a different port, \
                 or stop the existing process.",
                port,
                port.saturating_add(1)
            ))
        } else {
            GatewayError::Server(format!("Failed to bind HTTP server to {}: {}", addr, e))
        }
    })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("HTTP API server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Liveness check handler
async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use prf_query::DuckDBEngine;
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        let engine = Arc::new(DuckDBEngine::with_connection(conn, "/nonexistent"));
        let app = build_http_router(QueryApiState::new(engine));

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], br#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let conn = duckdb::Connection::open_in_memory().unwrap();
        let engine = Arc::new(DuckDBEngine::with_connection(conn, "/nonexistent"));

        let err = start_http_server(addr, QueryApiState::new(engine), async {})
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }
}
