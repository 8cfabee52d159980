//! End-to-end tests of the collector router, driven in-process.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use url::Url;

use syswatch_collector::db::{SnapshotRepository, SqliteRepository, StoreError};
use syswatch_collector::http::build_router;
use syswatch_collector::state::AppState;
use syswatch_collector::types::Snapshot;

const BASE: &str = "http://collector.test:8000";

fn sqlite_state() -> (AppState, Arc<SqliteRepository>) {
    let repo = Arc::new(SqliteRepository::open_in_memory().unwrap());
    repo.migrate().unwrap();
    let state = AppState::new(repo.clone(), Url::parse(BASE).unwrap());
    (state, repo)
}

fn app() -> Router {
    build_router(sqlite_state().0)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn ingest(app: &Router, body: impl Into<Body>) -> (StatusCode, Value) {
    let req = Request::post("/api/agent/metrics")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(app, req).await
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn metric(app: &Router, id: &str, name: &str) -> f64 {
    let (status, body) = get_json(app, &format!("/api/metrics/{id}/{name}")).await;
    assert_eq!(status, StatusCode::OK);
    body["value"].as_f64().expect("numeric value")
}

async fn hostname(app: &Router, id: &str) -> String {
    let (status, body) = get_json(app, &format!("/api/metrics/{id}/hostname")).await;
    assert_eq!(status, StatusCode::OK);
    body["hostname"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn ingest_then_query_reflects_latest_write() {
    let app = app();
    let (status, ack) = ingest(
        &app,
        r#"{"system_id":"abc","hostname":"h1","cpu":12.5,"ram":40.0,"disk":55.2,"ping":23.1}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        ack,
        json!({ "status": "ok", "dashboard_url": "http://collector.test:8000/view/abc/" })
    );

    assert_eq!(metric(&app, "abc", "cpu").await, 12.5);
    assert_eq!(metric(&app, "abc", "ram").await, 40.0);
    assert_eq!(metric(&app, "abc", "disk").await, 55.2);
    assert_eq!(metric(&app, "abc", "ping").await, 23.1);
    assert_eq!(hostname(&app, "abc").await, "h1");

    let (status, _) = ingest(
        &app,
        r#"{"system_id":"abc","hostname":"h2","cpu":99.9,"ram":1.0,"disk":2.0}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metric(&app, "abc", "cpu").await, 99.9);
    assert_eq!(metric(&app, "abc", "ram").await, 1.0);
    assert_eq!(hostname(&app, "abc").await, "h2");

    // no merge: the second payload had no ping
    let (_, body) = get_json(&app, "/api/metrics/abc/ping").await;
    assert_eq!(body["value"].as_f64(), Some(0.0));
    assert_eq!(body["unmeasured"], json!(true));
}

#[tokio::test]
async fn unknown_system_gets_defaults() {
    let app = app();
    for name in ["cpu", "ram", "disk", "ping"] {
        let (status, body) = get_json(&app, &format!("/api/metrics/never-seen/{name}")).await;
        assert_eq!(status, StatusCode::OK);
        let obj = body.as_object().unwrap();
        assert_eq!(obj.len(), 1, "unexpected fields in {body}");
        assert_eq!(obj["value"].as_f64(), Some(0.0));
    }
    assert_eq!(hostname(&app, "never-seen").await, "Unknown");
}

#[tokio::test]
async fn unrecognized_metric_is_zero() {
    let app = app();
    ingest(&app, r#"{"system_id":"abc","cpu":50}"#).await;
    assert_eq!(metric(&app, "abc", "temperature").await, 0.0);
    // trailing slash form used by older dashboards
    let (status, body) = get_json(&app, "/api/metrics/abc/cpu/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["value"].as_f64(), Some(50.0));
}

#[tokio::test]
async fn malformed_payload_leaves_store_untouched() {
    let app = app();
    ingest(&app, r#"{"system_id":"abc","hostname":"h1","cpu":12.5}"#).await;

    for bad in [
        "not json at all",
        r#"{"system_id":"abc","cpu":"#,
        r#"{"system_id":"abc","cpu":"hot"}"#,
        "[]",
    ] {
        let (status, body) = ingest(&app, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {bad:?}");
        assert_eq!(body["status"], json!("error"));
        assert!(body["message"].as_str().unwrap().contains("invalid JSON"));
    }
    assert_eq!(metric(&app, "abc", "cpu").await, 12.5);
    assert_eq!(hostname(&app, "abc").await, "h1");
}

#[tokio::test]
async fn missing_system_id_is_client_error() {
    let (state, repo) = sqlite_state();
    let app = build_router(state.clone());
    for bad in [r#"{"hostname":"h1","cpu":1}"#, r#"{"system_id":""}"#] {
        let (status, body) = ingest(&app, bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({ "status": "error", "message": "missing system_id" })
        );
    }
    assert!(state.store.is_empty().await);
    assert_eq!(repo.row_count().unwrap(), 0);
}

#[tokio::test]
async fn ingestion_writes_through_to_durable_storage() {
    let (state, repo) = sqlite_state();
    let app = build_router(state);
    ingest(&app, r#"{"system_id":"abc","hostname":"h1","cpu":12.5,"ping":0}"#).await;
    ingest(&app, r#"{"system_id":"abc","hostname":"h1","cpu":13.5}"#).await;

    assert_eq!(repo.row_count().unwrap(), 1);
    let row = repo.fetch("abc").unwrap().unwrap();
    assert_eq!(row.cpu_percent, 13.5);
    assert_eq!(row.hostname, "h1");
    assert_eq!(row.ping_ms, None);
}

#[tokio::test]
async fn cache_miss_falls_back_to_durable_and_warms() {
    let (state, repo) = sqlite_state();
    repo.upsert(&Snapshot {
        system_id: "restored".into(),
        hostname: "old-box".into(),
        cpu_percent: 7.0,
        ram_percent: 8.0,
        disk_percent: 9.0,
        ping_ms: Some(10.0),
        received_at: chrono::Utc::now(),
    })
    .unwrap();
    let app = build_router(state.clone());

    assert!(state.store.get("restored").await.is_none());
    assert_eq!(metric(&app, "restored", "disk").await, 9.0);
    assert_eq!(hostname(&app, "restored").await, "old-box");
    assert_eq!(state.store.get("restored").await.unwrap().ping_ms, Some(10.0));
}

struct FailingRepo;

impl SnapshotRepository for FailingRepo {
    fn upsert(&self, _: &Snapshot) -> Result<(), StoreError> {
        Err(StoreError::Task("disk full".into()))
    }

    fn fetch(&self, _: &str) -> Result<Option<Snapshot>, StoreError> {
        Err(StoreError::Task("disk full".into()))
    }
}

#[tokio::test]
async fn durable_failure_degrades_but_serves_from_cache() {
    let state = AppState::new(Arc::new(FailingRepo), Url::parse(BASE).unwrap());
    let app = build_router(state);

    let (status, ack) = ingest(&app, r#"{"system_id":"abc","hostname":"h1","cpu":42}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], json!("degraded"));
    assert_eq!(
        ack["dashboard_url"],
        json!("http://collector.test:8000/view/abc/")
    );
    assert!(ack["message"].as_str().unwrap().contains("disk full"));

    assert_eq!(metric(&app, "abc", "cpu").await, 42.0);
    assert_eq!(hostname(&app, "abc").await, "h1");
    // lookup errors on a miss read as unknown
    assert_eq!(metric(&app, "other", "cpu").await, 0.0);
}

#[tokio::test]
async fn concurrent_ingestion_of_distinct_ids() {
    let (state, repo) = sqlite_state();
    let app = build_router(state.clone());
    let n = 32;

    let mut tasks = Vec::new();
    for i in 0..n {
        let app = app.clone();
        tasks.push(tokio::spawn(async move {
            let body = format!(
                r#"{{"system_id":"host-{i}","hostname":"h{i}","cpu":{i},"ram":{r},"disk":1,"ping":{p}}}"#,
                r = i as f64 / 2.0,
                p = i + 1
            );
            let (status, _) = ingest(&app, body).await;
            assert_eq!(status, StatusCode::OK);
        }));
    }
    for t in tasks {
        t.await.unwrap();
    }

    assert_eq!(state.store.len().await, n);
    assert_eq!(repo.row_count().unwrap(), n as u64);
    for i in 0..n {
        let id = format!("host-{i}");
        assert_eq!(metric(&app, &id, "cpu").await, i as f64);
        assert_eq!(metric(&app, &id, "ram").await, i as f64 / 2.0);
        assert_eq!(metric(&app, &id, "ping").await, (i + 1) as f64);
        assert_eq!(hostname(&app, &id).await, format!("h{i}"));
    }
}

#[tokio::test]
async fn legacy_receive_path_and_method_check() {
    let app = app();
    let req = Request::post("/receive/")
        .body(Body::from(r#"{"system_id":"legacy","cpu":3}"#))
        .unwrap();
    let (status, ack) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], json!("ok"));
    assert_eq!(metric(&app, "legacy", "cpu").await, 3.0);

    for uri in ["/api/agent/metrics", "/receive/"] {
        let (status, ack) = get_json(&app, uri).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{uri}");
        assert_eq!(ack["status"], json!("error"), "{uri}");
        assert!(ack["message"].as_str().unwrap().contains("GET"), "{ack}");
    }
}

#[tokio::test]
async fn oversized_body_gets_error_ack() {
    let app = app();
    let huge = format!(
        r#"{{"system_id":"big","hostname":"{}"}}"#,
        "x".repeat(3 * 1024 * 1024)
    );
    let (status, ack) = ingest(&app, huge).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(ack["status"], json!("error"));
    assert!(ack["message"].as_str().is_some_and(|m| !m.is_empty()), "{ack}");
    assert_eq!(hostname(&app, "big").await, "Unknown");
}

#[tokio::test]
async fn dashboard_page_and_health() {
    let app = app();
    ingest(&app, r#"{"system_id":"abc","hostname":"<h1>","cpu":12.5}"#).await;

    for (uri, needle) in [
        ("/view/abc/", "&lt;h1&gt;"),
        ("/view/abc", "12.5%"),
        ("/view/nobody/", "Waiting for Agent..."),
        ("/health", "ok"),
    ] {
        let resp = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains(needle), "{uri} missing {needle:?}:\n{text}");
    }
}
