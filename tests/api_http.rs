// tests/api_http.rs
//
// HTTP-level tests for the operator Router without opening sockets,
// exercised via tower::ServiceExt::oneshot.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use once_cell::sync::Lazy;
use serde_json::Value as Json;
use tower::ServiceExt as _; // for `oneshot`

use news_relay::api::{create_router, AppState};
use news_relay::breaker::{BreakerConfig, CircuitBreaker};
use news_relay::health::HealthScorer;
use news_relay::history::RecordHistory;
use news_relay::metrics::Metrics;
use news_relay::scheduler::{IngestionScheduler, SchedulerConfig};
use news_relay::store::JsonStore;
use news_relay::types::PersistentStore;

const BODY_LIMIT: usize = 1024 * 1024;

// The Prometheus recorder can only be installed once per process.
static METRICS: Lazy<Metrics> = Lazy::new(Metrics::init);

struct TestApp {
    router: Router,
    state: AppState,
    _tmp: tempfile::TempDir,
}

async fn test_app() -> TestApp {
    let tmp = tempfile::tempdir().unwrap();
    let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
    let health = Arc::new(HealthScorer::new());
    let scheduler = Arc::new(
        IngestionScheduler::open(
            SchedulerConfig {
                interval: Duration::from_secs(3600),
                startup_grace: Duration::ZERO,
                poll_every: Duration::from_millis(10),
                deviation_band: 0.25,
            },
            store.clone(),
            health.clone(),
        )
        .await
        .unwrap(),
    );
    let state = AppState {
        health,
        history: Arc::new(RecordHistory::with_capacity(10)),
        breakers: vec![
            Arc::new(CircuitBreaker::new("feed", BreakerConfig::default())),
            Arc::new(CircuitBreaker::new("ai", BreakerConfig::default())),
            Arc::new(CircuitBreaker::new("publish", BreakerConfig::default())),
        ],
        scheduler,
        store,
    };
    TestApp {
        router: create_router(state.clone(), &METRICS),
        state,
        _tmp: tmp,
    }
}

async fn json_body(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_score_and_scheduler() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["score"], 100);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["scheduler"]["state"], "IDLE");
}

#[tokio::test]
async fn circuits_lists_all_three() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/circuits")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    let circuits = body["circuits"].as_array().unwrap();
    assert_eq!(circuits.len(), 3);
    assert!(circuits.iter().all(|c| c["state"] == "CLOSED"));
}

#[tokio::test]
async fn reset_closes_an_open_circuit() {
    let app = test_app().await;
    let feed = app.state.breakers[0].clone();
    for _ in 0..5 {
        feed.record_failure("down");
    }
    assert_eq!(feed.state(), news_relay::breaker::CircuitState::Open);

    let resp = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/circuits/feed/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(feed.state(), news_relay::breaker::CircuitState::Closed);
}

#[tokio::test]
async fn reset_unknown_circuit_is_404() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/circuits/nope/reset")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trigger_accepted_when_idle_conflict_when_running() {
    let app = test_app().await;
    let resp = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/trigger")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    assert!(app.state.scheduler.try_begin_cycle());
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/trigger")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn reading_health_does_not_fire_alerts() {
    let app = test_app().await;
    let publish = app.state.breakers[2].clone();
    for _ in 0..5 {
        publish.record_failure("down");
    }

    for _ in 0..3 {
        let resp = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/alerts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(resp).await;
    assert_eq!(body["alerts"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn records_endpoint_returns_empty_list() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/records?count=5")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["records"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn metrics_renders_exposition_format() {
    let app = test_app().await;
    let resp = app
        .router
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}
