// src/api.rs
//! Operator HTTP surface: health, circuit inspection and reset, recent
//! publish records, manual cycle trigger, Prometheus metrics.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::breaker::CircuitBreaker;
use crate::health::HealthScorer;
use crate::history::RecordHistory;
use crate::metrics::Metrics;
use crate::scheduler::{IngestionScheduler, TriggerOutcome};
use crate::types::PersistentStore;

#[derive(Clone)]
pub struct AppState {
    pub health: Arc<HealthScorer>,
    pub history: Arc<RecordHistory>,
    pub breakers: Vec<Arc<CircuitBreaker>>,
    pub scheduler: Arc<IngestionScheduler>,
    pub store: Arc<dyn PersistentStore>,
}

pub fn create_router(state: AppState, metrics: &Metrics) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/circuits", get(circuits))
        .route("/circuits/{name}/reset", post(reset_circuit))
        .route("/records", get(records))
        .route("/alerts", get(alerts))
        .route("/trigger", post(trigger))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
        .merge(metrics.router())
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshots: Vec<_> = state.breakers.iter().map(|b| b.snapshot()).collect();
    let store_ok = state.store.get("health/probe").await.is_ok();
    let snapshot = state.health.evaluate(&snapshots, store_ok);
    Json(serde_json::json!({
        "score": snapshot.score,
        "status": snapshot.status,
        "checks": snapshot.checks,
        "scheduler": {
            "state": state.scheduler.state(),
            "last_post_time": state.scheduler.last_post_time(),
            "next_run_in_secs": state.scheduler.next_run_in(Utc::now()).as_secs(),
        },
    }))
}

async fn circuits(State(state): State<AppState>) -> Json<serde_json::Value> {
    let snapshots: Vec<_> = state.breakers.iter().map(|b| b.snapshot()).collect();
    Json(serde_json::json!({ "circuits": snapshots }))
}

async fn reset_circuit(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let breaker = state
        .breakers
        .iter()
        .find(|b| b.name() == name)
        .ok_or(StatusCode::NOT_FOUND)?;
    breaker.reset();
    tracing::info!(circuit = %name, "circuit reset by operator");
    Ok(Json(serde_json::json!({ "circuit": breaker.snapshot() })))
}

#[derive(Deserialize)]
struct RecordsQuery {
    #[serde(default = "default_record_count")]
    count: usize,
}

fn default_record_count() -> usize {
    50
}

async fn records(
    State(state): State<AppState>,
    Query(q): Query<RecordsQuery>,
) -> Json<serde_json::Value> {
    let records = state.history.snapshot_last_n(q.count.min(1000));
    Json(serde_json::json!({ "records": records }))
}

async fn alerts(
    State(state): State<AppState>,
    Query(q): Query<RecordsQuery>,
) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "alerts": state.health.alert_history(q.count.min(1000)) }))
}

async fn trigger(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.scheduler.trigger_now() {
        TriggerOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({ "trigger": "accepted" })),
        ),
        TriggerOutcome::Busy => (
            StatusCode::CONFLICT,
            Json(serde_json::json!({ "trigger": "busy" })),
        ),
    }
}
