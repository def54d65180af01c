// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod breaker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod health;
pub mod history;
pub mod ledger;
pub mod metrics;
pub mod providers;
pub mod scheduler;
pub mod store;
pub mod transform;
pub mod types;

// ---- Re-exports for stable public API ----
pub use crate::breaker::{BreakerConfig, CircuitBreaker, CircuitState};
pub use crate::config::RelayConfig;
pub use crate::coordinator::{CycleConfig, CycleReport, PublishCoordinator};
pub use crate::error::RelayError;
pub use crate::health::{HealthScorer, HealthStatus};
pub use crate::ledger::DedupLedger;
pub use crate::scheduler::{IngestionScheduler, SchedulerConfig, TriggerOutcome};
pub use crate::store::JsonStore;
pub use crate::types::{
    AiService, DestinationPlatform, FeedItem, FeedSource, PersistentStore, PublishOutcome,
    TransformedItem,
};
