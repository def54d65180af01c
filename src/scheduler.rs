// src/scheduler.rs
//! Decides when the next ingest-and-publish cycle runs.
//!
//! The IDLE/RUNNING gate guarantees one active cycle at a time; triggers
//! that arrive while RUNNING are dropped, not queued — the next evaluation
//! re-derives correct timing from persisted state. The next run is always
//! computed from the *last successful post time*, so variable cycle
//! duration, restarts, and missed ticks do not accumulate drift.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;

use crate::coordinator::PublishCoordinator;
use crate::health::HealthScorer;
use crate::types::PersistentStore;

const STATE_KEY: &str = "scheduler/last_post_time";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Target spacing between successful posts.
    pub interval: Duration,
    /// Suppresses the first trigger after process start while collaborators
    /// warm up.
    pub startup_grace: Duration,
    /// How often the loop re-evaluates when not yet due.
    pub poll_every: Duration,
    /// Acceptable relative deviation of the realized interval, e.g. 0.25
    /// for ±25%.
    pub deviation_band: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerOutcome {
    Accepted,
    Busy,
}

pub struct IngestionScheduler {
    cfg: SchedulerConfig,
    store: Arc<dyn PersistentStore>,
    health: Arc<HealthScorer>,
    running: AtomicBool,
    force: AtomicBool,
    last_post_time: Mutex<Option<DateTime<Utc>>>,
}

impl IngestionScheduler {
    /// Load persisted state and build the scheduler. Does not start the
    /// loop; see [`run_loop`](Self::run_loop).
    pub async fn open(
        cfg: SchedulerConfig,
        store: Arc<dyn PersistentStore>,
        health: Arc<HealthScorer>,
    ) -> Result<Self> {
        let last_post_time = match store.get(STATE_KEY).await.context("loading scheduler state")? {
            Some(value) => {
                let raw: String = serde_json::from_value(value)?;
                Some(
                    DateTime::parse_from_rfc3339(&raw)
                        .context("parsing last_post_time")?
                        .with_timezone(&Utc),
                )
            }
            None => None,
        };
        Ok(Self {
            cfg,
            store,
            health,
            running: AtomicBool::new(false),
            force: AtomicBool::new(false),
            last_post_time: Mutex::new(last_post_time),
        })
    }

    pub fn state(&self) -> SchedulerState {
        if self.running.load(Ordering::SeqCst) {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    pub fn last_post_time(&self) -> Option<DateTime<Utc>> {
        *self.last_post_time.lock().expect("scheduler mutex poisoned")
    }

    /// Drift-corrected wait: `max(0, interval − (now − last_post_time))`.
    /// With no recorded post the scheduler is immediately due.
    pub fn next_run_in(&self, now: DateTime<Utc>) -> Duration {
        match self.last_post_time() {
            None => Duration::ZERO,
            Some(last) => {
                let since = (now - last).to_std().unwrap_or(Duration::ZERO);
                self.cfg.interval.saturating_sub(since)
            }
        }
    }

    /// Manual trigger. Acted on only while IDLE; while RUNNING the trigger
    /// is dropped and the caller is told so.
    pub fn trigger_now(&self) -> TriggerOutcome {
        if self.running.load(Ordering::SeqCst) {
            tracing::debug!("manual trigger dropped, cycle already running");
            return TriggerOutcome::Busy;
        }
        self.force.store(true, Ordering::SeqCst);
        TriggerOutcome::Accepted
    }

    /// Atomically claim the IDLE→RUNNING edge. Returns false when a cycle
    /// is already active.
    pub fn try_begin_cycle(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Mark the cycle finished. On a successful post the realized interval
    /// is validated against the deviation band and `last_post_time` is
    /// advanced and flushed.
    pub async fn complete_cycle(&self, posted: bool) {
        if posted {
            let now = Utc::now();
            let previous = {
                let mut g = self.last_post_time.lock().expect("scheduler mutex poisoned");
                let prev = *g;
                *g = Some(now);
                prev
            };
            if let Some(prev) = previous {
                let realized = (now - prev).to_std().unwrap_or(Duration::ZERO);
                let target = self.cfg.interval.as_secs_f64();
                let deviating = (realized.as_secs_f64() - target).abs() > target * self.cfg.deviation_band;
                if deviating {
                    tracing::warn!(
                        realized_secs = realized.as_secs(),
                        target_secs = target as u64,
                        "posting interval outside acceptable band"
                    );
                }
                self.health.note_interval_deviation(deviating);
            }
            gauge!("scheduler_last_post_ts").set(now.timestamp() as f64);
            if let Err(e) = self
                .store
                .set(STATE_KEY, serde_json::json!(now.to_rfc3339()))
                .await
            {
                tracing::error!(error = %e, "persisting last_post_time failed");
            }
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// The periodic task. Runs cycles until the process exits; a failed
    /// cycle only affects its own report, never this loop.
    pub async fn run_loop(self: Arc<Self>, coordinator: Arc<PublishCoordinator>) {
        tracing::info!(
            grace_secs = self.cfg.startup_grace.as_secs(),
            interval_secs = self.cfg.interval.as_secs(),
            "scheduler starting"
        );
        tokio::time::sleep(self.cfg.startup_grace).await;

        loop {
            let wait = self.next_run_in(Utc::now());
            let due = self.force.load(Ordering::SeqCst) || wait.is_zero();
            if !due {
                tokio::time::sleep(wait.min(self.cfg.poll_every)).await;
                continue;
            }
            if !self.try_begin_cycle() {
                tokio::time::sleep(self.cfg.poll_every).await;
                continue;
            }
            self.force.store(false, Ordering::SeqCst);

            let report = coordinator.run_cycle().await;
            self.complete_cycle(report.published > 0).await;

            tokio::time::sleep(self.cfg.poll_every).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;

    fn cfg(interval_secs: u64) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(interval_secs),
            startup_grace: Duration::ZERO,
            poll_every: Duration::from_millis(10),
            deviation_band: 0.25,
        }
    }

    async fn scheduler(interval_secs: u64) -> (IngestionScheduler, tempfile::TempDir) {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
        let s = IngestionScheduler::open(cfg(interval_secs), store, Arc::new(HealthScorer::new()))
            .await
            .unwrap();
        (s, tmp)
    }

    #[tokio::test]
    async fn due_immediately_without_history() {
        let (s, _tmp) = scheduler(3600).await;
        assert_eq!(s.next_run_in(Utc::now()), Duration::ZERO);
    }

    #[tokio::test]
    async fn drift_corrected_wait() {
        let (s, _tmp) = scheduler(3600).await;
        let now = Utc::now();
        *s.last_post_time.lock().unwrap() = Some(now - chrono::Duration::seconds(1000));
        let wait = s.next_run_in(now);
        assert_eq!(wait, Duration::from_secs(2600));

        // Already past due → zero, never negative.
        *s.last_post_time.lock().unwrap() = Some(now - chrono::Duration::seconds(4000));
        assert_eq!(s.next_run_in(now), Duration::ZERO);
    }

    #[tokio::test]
    async fn gate_admits_one_cycle() {
        let (s, _tmp) = scheduler(3600).await;
        assert!(s.try_begin_cycle());
        assert!(!s.try_begin_cycle());
        assert_eq!(s.state(), SchedulerState::Running);
        assert_eq!(s.trigger_now(), TriggerOutcome::Busy);
        s.complete_cycle(false).await;
        assert_eq!(s.state(), SchedulerState::Idle);
        assert!(s.try_begin_cycle());
    }

    #[tokio::test]
    async fn trigger_accepted_while_idle() {
        let (s, _tmp) = scheduler(3600).await;
        assert_eq!(s.trigger_now(), TriggerOutcome::Accepted);
    }

    #[tokio::test]
    async fn last_post_time_survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
        {
            let s = IngestionScheduler::open(
                cfg(3600),
                store.clone(),
                Arc::new(HealthScorer::new()),
            )
            .await
            .unwrap();
            s.try_begin_cycle();
            s.complete_cycle(true).await;
            assert!(s.last_post_time().is_some());
        }
        let reopened =
            IngestionScheduler::open(cfg(3600), store, Arc::new(HealthScorer::new()))
                .await
                .unwrap();
        assert!(reopened.last_post_time().is_some());
        assert!(reopened.next_run_in(Utc::now()) > Duration::ZERO);
    }
}
