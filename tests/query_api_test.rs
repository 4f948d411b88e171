//! End-to-end tests for the gateway HTTP API.
//!
//! Each test builds a real DuckDB file in a temp directory, reopens it
//! read-only through `DuckDBEngine::open`, and drives the axum router with
//! `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{self, Request, StatusCode};
use axum::Router;
use prf_gateway::server::{build_http_router, QueryApiState};
use prf_query::DuckDBEngine;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const DATATRAN_2020: &str = "\
id;data_inversa;dia_semana;uf;br;causa_acidente;mortos;feridos
1;2020-01-01;quarta-feira;PR;277;Falta de Atenção;0;2
2;2020-01-01;quarta-feira;SC;101;Velocidade Incompatível;1;0
3;2020-01-02;quinta-feira;PR;376;Animais na Pista;0;1
4;2020-01-03;sexta-feira;SP;116;Falta de Atenção;0;3
5;2020-01-04;sábado;PR;277;Ingestão de Álcool;2;1
6;2020-01-05;domingo;RS;290;Falta de Atenção;0;0
7;2020-01-05;domingo;PR;369;Defeito Mecânico;0;1
";

struct Fixture {
    _dir: TempDir,
    export_dir: TempDir,
    router: Router,
}

fn create_database(path: &Path) {
    let conn = duckdb::Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE SCHEMA prf;
         CREATE TABLE prf.ocorrencias (
             id INTEGER,
             uf VARCHAR,
             municipio VARCHAR,
             mortos INTEGER
         );
         INSERT INTO prf.ocorrencias
         SELECT i, CASE WHEN i % 2 = 0 THEN 'PR' ELSE 'SC' END, 'Curitiba', i % 3
         FROM range(1, 21) t(i);",
    )
    .unwrap();
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("prf.duckdb");
    create_database(&db_path);

    let csv_dir = dir.path().join("csv");
    std::fs::create_dir(&csv_dir).unwrap();
    std::fs::write(csv_dir.join("datatran2020.csv"), DATATRAN_2020).unwrap();

    let export_dir = tempfile::tempdir().unwrap();
    let engine = DuckDBEngine::open(&db_path, &csv_dir).unwrap();
    let state = QueryApiState {
        engine: Arc::new(engine),
        export_dir: export_dir.path().to_path_buf(),
        default_row_limit: 10,
    };

    Fixture {
        _dir: dir,
        export_dir,
        router: build_http_router(state),
    }
}

async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn post_query(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_virtual_table_query_filters_and_paginates() {
    let fx = fixture();

    let (status, body) = send(
        &fx.router,
        post_query(
            "/query",
            json!({"sql": "SELECT * FROM datatran2020 WHERE uf='PR'", "limit": 100, "offset": 0}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert!(rows.iter().all(|r| r["uf"] == "PR"));

    // Column order follows the CSV header.
    let keys: Vec<_> = rows[0].as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys[..3], ["id", "data_inversa", "dia_semana"]);
    assert_eq!(rows[0]["causa_acidente"], "Falta de Atenção");
}

#[tokio::test]
async fn test_pagination_window() {
    let fx = fixture();

    let (status, body) = send(
        &fx.router,
        post_query(
            "/query",
            json!({"sql": "SELECT id FROM datatran2020 ORDER BY id", "limit": 2, "offset": 3}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{"id": 4}, {"id": 5}]));
}

#[tokio::test]
async fn test_drop_is_rejected() {
    let fx = fixture();

    let (status, body) = send(&fx.router, post_query("/query", json!({"sql": "DROP TABLE foo"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Operation 'DROP' is not allowed");
}

#[tokio::test]
async fn test_non_read_statement_is_rejected() {
    let fx = fixture();

    let (status, body) = send(&fx.router, post_query("/query", json!({"sql": "PRAGMA version"}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Only SELECT and WITH statements are allowed");
}

#[tokio::test]
async fn test_missing_dataset() {
    let fx = fixture();

    let (status, body) = send(
        &fx.router,
        post_query("/query", json!({"sql": "SELECT * FROM datatran1999"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("CSV dataset not found"));
    assert!(detail.ends_with("datatran1999.csv"));
}

#[tokio::test]
async fn test_table_rows() {
    let fx = fixture();

    let (status, body) = send(&fx.router, get("/tables/prf/ocorrencias/rows?limit=5")).await;

    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 5);
    let keys: Vec<_> = rows[0].as_object().unwrap().keys().cloned().collect();
    assert_eq!(keys, ["id", "uf", "municipio", "mortos"]);
}

#[tokio::test]
async fn test_table_rows_unknown_table() {
    let fx = fixture();

    let (status, body) = send(&fx.router, get("/tables/prf/nao_existe/rows")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("nao_existe"));
}

#[tokio::test]
async fn test_table_rows_path_goes_through_guard() {
    let fx = fixture();

    let (status, body) = send(&fx.router, get("/tables/prf/dropped/rows")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Operation 'DROP' is not allowed");
}

#[tokio::test]
async fn test_malformed_json_body() {
    let fx = fixture();

    let (status, body) = send(&fx.router, post_query("/query", json!({"sql": 5}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_schemas() {
    let fx = fixture();

    let (status, body) = send(&fx.router, get("/schemas")).await;

    assert_eq!(status, StatusCode::OK);
    let schemas = body.as_array().unwrap();
    assert!(schemas.contains(&json!("prf")));
    assert!(schemas.contains(&json!("main")));
}

#[tokio::test]
async fn test_parquet_export() {
    let fx = fixture();

    let (status, body) = send(
        &fx.router,
        post_query(
            "/query/parquet/",
            json!({"sql": "SELECT uf, SUM(mortos) AS mortos FROM datatran2020 GROUP BY uf"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let file_name = body["file_name"].as_str().unwrap();
    let file_path = Path::new(body["file_path"].as_str().unwrap());
    assert!(file_name.ends_with(".parquet"));
    assert_eq!(file_path.parent().unwrap(), fx.export_dir.path());
    assert_eq!(
        std::fs::metadata(file_path).unwrap().len(),
        body["file_size"].as_u64().unwrap()
    );
}

#[tokio::test]
async fn test_health() {
    let fx = fixture();

    let (status, body) = send(&fx.router, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}
