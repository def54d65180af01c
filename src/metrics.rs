use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register metric descriptions.
    pub fn init() -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_counter!("cycles_total", "Ingest-and-publish cycles started");
        describe_counter!(
            "publish_outcomes_total",
            "Per-item cycle outcomes, labelled by outcome"
        );
        describe_counter!(
            "transform_classified_skips_total",
            "Items dropped by classification (ads, off-topic)"
        );
        describe_counter!(
            "transform_ai_fallbacks_total",
            "Items that fell back to dictionary translation"
        );
        describe_histogram!("cycle_duration_ms", "Wall time of one full cycle");
        describe_gauge!("health_score", "Current health score, 0-100");
        describe_gauge!(
            "scheduler_last_post_ts",
            "Unix timestamp of the last successful publish"
        );

        Self { handle }
    }

    /// Router exposing `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}
