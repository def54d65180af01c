//! News Relay — Binary Entrypoint
//! Boots the feed→chat relay: scheduler loop, health monitor, and the
//! operator HTTP server.
//!
//! See `README.md` for quickstart and `config/relay.toml` for tuning.

use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use news_relay::api::{create_router, AppState};
use news_relay::breaker::{BreakerConfig, CircuitBreaker};
use news_relay::config::RelayConfig;
use news_relay::coordinator::{CycleConfig, PublishCoordinator};
use news_relay::health::HealthScorer;
use news_relay::history::RecordHistory;
use news_relay::ledger::DedupLedger;
use news_relay::metrics::Metrics;
use news_relay::providers::{discord::DiscordPublisher, openai::OpenAiAnalyzer, telegram::TelegramFeed};
use news_relay::scheduler::{IngestionScheduler, SchedulerConfig};
use news_relay::store::JsonStore;
use news_relay::transform::ContentTransformer;
use news_relay::types::{DestinationPlatform, FeedSource, PersistentStore};

const ENV_CONFIG_PATH: &str = "RELAY_CONFIG_PATH";
const DEFAULT_CONFIG_PATH: &str = "config/relay.toml";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_relay=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    // Bad configuration is fatal; nothing should run half-configured.
    let cfg = RelayConfig::load_from_file(&config_path)?;
    tracing::info!(
        path = %config_path,
        channels = cfg.channels.len(),
        interval_secs = cfg.schedule.interval_secs,
        "configuration loaded"
    );

    let metrics = Metrics::init();

    let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(&cfg.state_dir)?);
    let ledger = Arc::new(DedupLedger::open(store.clone()).await?);
    tracing::info!(entries = ledger.len().await, "dedup ledger loaded");

    let breaker_cfg = BreakerConfig {
        failure_threshold: cfg.breakers.failure_threshold,
        recovery_timeout: Duration::from_secs(cfg.breakers.recovery_timeout_secs),
        half_open_success_threshold: cfg.breakers.half_open_success_threshold,
    };
    let feed_breaker = Arc::new(CircuitBreaker::new("feed", breaker_cfg));
    let ai_breaker = Arc::new(CircuitBreaker::new("ai", breaker_cfg));
    let publish_breaker = Arc::new(CircuitBreaker::new("publish", breaker_cfg));

    let feed: Arc<dyn FeedSource> = Arc::new(TelegramFeed::new(
        cfg.providers.telegram_bot_token.clone(),
        &cfg.channels,
    ));
    let ai = Arc::new(OpenAiAnalyzer::new(
        cfg.providers.openai_api_key.clone(),
        cfg.providers.openai_model.as_deref(),
    ));
    let destination: Arc<dyn DestinationPlatform> = Arc::new(DiscordPublisher::new(
        cfg.providers.discord_webhook_url.clone(),
        cfg.providers.discord_max_retries,
    ));

    let health = Arc::new(HealthScorer::new());
    let history = Arc::new(RecordHistory::with_capacity(cfg.history_capacity));
    let transformer = ContentTransformer::new(ai, ai_breaker.clone());

    let coordinator = Arc::new(PublishCoordinator::new(
        CycleConfig {
            channels: cfg.channels.clone(),
            fetch_limit: cfg.fetch_limit,
            max_publishes: cfg.max_publishes_per_cycle,
        },
        feed,
        transformer,
        destination,
        ledger,
        feed_breaker.clone(),
        publish_breaker.clone(),
        health.clone(),
        history.clone(),
    ));

    let scheduler = Arc::new(
        IngestionScheduler::open(
            SchedulerConfig {
                interval: cfg.interval(),
                startup_grace: Duration::from_secs(cfg.schedule.startup_grace_secs),
                poll_every: Duration::from_secs(cfg.schedule.poll_secs),
                deviation_band: cfg.schedule.deviation_band,
            },
            store.clone(),
            health.clone(),
        )
        .await?,
    );

    tokio::spawn(scheduler.clone().run_loop(coordinator));

    // Periodic health evaluation, independent of cycles, so the score and
    // alerts stay fresh even when the scheduler is waiting.
    {
        let health = health.clone();
        let store = store.clone();
        let breakers = vec![
            feed_breaker.clone(),
            ai_breaker.clone(),
            publish_breaker.clone(),
        ];
        let every = Duration::from_secs(cfg.health_check_interval_secs);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let snapshots: Vec<_> = breakers.iter().map(|b| b.snapshot()).collect();
                let store_ok = store.get("health/probe").await.is_ok();
                let snap = health.evaluate_and_alert(&snapshots, store_ok);
                tracing::debug!(score = snap.score, status = ?snap.status, "health evaluated");
            }
        });
    }

    let state = AppState {
        health,
        history,
        breakers: vec![feed_breaker, ai_breaker, publish_breaker],
        scheduler,
        store,
    };
    let router = create_router(state, &metrics);

    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    tracing::info!(bind = %cfg.bind, "operator server listening");
    axum::serve(listener, router).await?;
    Ok(())
}
