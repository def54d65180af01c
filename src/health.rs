// src/health.rs
//! Operational health scoring and rate-limited alerting.
//!
//! Every evaluation starts at 100 and subtracts a fixed weighted penalty
//! per failing check, clamped to [0, 100]. Bands: ≥80 HEALTHY, ≥60
//! WARNING, else CRITICAL. Checks on the critical path (destination and
//! feed connectivity) carry larger weights than soft checks.
//!
//! Each distinct alert key is suppressed for a class-dependent cooldown
//! after firing, and a capped rolling history of fired alerts is kept for
//! the operator surface.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::gauge;
use serde::Serialize;

use crate::breaker::{CircuitSnapshot, CircuitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passing: bool,
    pub penalty: u8,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub at: DateTime<Utc>,
    pub score: u8,
    pub status: HealthStatus,
    pub checks: Vec<CheckResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub key: String,
    pub message: String,
    pub fired_at: DateTime<Utc>,
}

// Penalty weights. Destination connectivity dominates: with the publish
// circuit open nothing ships, so that alone lands in WARNING territory.
const PENALTY_PUBLISH_CIRCUIT: u8 = 30;
const PENALTY_FEED_CIRCUIT: u8 = 25;
const PENALTY_AI_CIRCUIT: u8 = 15;
const PENALTY_STORE: u8 = 20;
const PENALTY_FAILURE_STREAK: u8 = 25;
const PENALTY_INTERVAL_DEVIATION: u8 = 10;

const PENALTY_RESOURCES: u8 = 5;

const FAILURE_STREAK_THRESHOLD: u32 = 3;
const RSS_LIMIT_MB: u64 = 512;
const DEVIATION_STREAK_THRESHOLD: u32 = 2;
const ALERT_HISTORY_CAP: usize = 100;

fn cooldown_for(key: &str) -> Duration {
    match key {
        "circuit/publish" | "circuit/feed" | "circuit/ai" => Duration::from_secs(10 * 60),
        "store" | "memory" => Duration::from_secs(30 * 60),
        "publish_failure_streak" => Duration::from_secs(15 * 60),
        "posting_interval_deviation" => Duration::from_secs(60 * 60),
        _ => Duration::from_secs(10 * 60),
    }
}

/// Resident set size in MB from /proc; `None` where unavailable.
fn process_rss_mb() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(pages * 4096 / (1024 * 1024))
}

#[derive(Debug, Default)]
struct Counters {
    posts_ok: u64,
    posts_failed: u64,
    translations_ok: u64,
    translations_failed: u64,
    consecutive_publish_failures: u32,
    consecutive_interval_deviations: u32,
}

#[derive(Debug, Default)]
struct AlertGate {
    last_fired: HashMap<String, DateTime<Utc>>,
    history: Vec<AlertRecord>,
}

#[derive(Debug, Default)]
pub struct HealthScorer {
    counters: Mutex<Counters>,
    alerts: Mutex<AlertGate>,
}

impl HealthScorer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_publish(&self, success: bool) {
        let mut g = self.counters.lock().expect("health mutex poisoned");
        if success {
            g.posts_ok += 1;
            g.consecutive_publish_failures = 0;
        } else {
            g.posts_failed += 1;
            g.consecutive_publish_failures += 1;
        }
    }

    pub fn record_translation(&self, success: bool) {
        let mut g = self.counters.lock().expect("health mutex poisoned");
        if success {
            g.translations_ok += 1;
        } else {
            g.translations_failed += 1;
        }
    }

    /// Scheduler signal: was the realized posting interval outside the
    /// configured band? Sustained deviation (two consecutive cycles)
    /// becomes a failing check; it never blocks cycles.
    pub fn note_interval_deviation(&self, deviating: bool) {
        let mut g = self.counters.lock().expect("health mutex poisoned");
        if deviating {
            g.consecutive_interval_deviations += 1;
        } else {
            g.consecutive_interval_deviations = 0;
        }
    }

    /// Reduce the current signals into one snapshot. Read-only: safe to
    /// call from the operator surface. The periodic monitor uses
    /// [`evaluate_and_alert`](Self::evaluate_and_alert) instead.
    pub fn evaluate(&self, circuits: &[CircuitSnapshot], store_ok: bool) -> HealthSnapshot {
        let now = Utc::now();
        let mut checks = Vec::new();

        for c in circuits {
            let passing = c.state == CircuitState::Closed;
            let penalty = match c.name.as_str() {
                "publish" => PENALTY_PUBLISH_CIRCUIT,
                "feed" => PENALTY_FEED_CIRCUIT,
                _ => PENALTY_AI_CIRCUIT,
            };
            checks.push(CheckResult {
                name: format!("circuit/{}", c.name),
                passing,
                penalty,
                message: if passing {
                    format!("{} dependency reachable", c.name)
                } else {
                    format!(
                        "{} circuit {:?} ({} consecutive failures)",
                        c.name, c.state, c.consecutive_failures
                    )
                },
            });
        }

        checks.push(CheckResult {
            name: "store".into(),
            passing: store_ok,
            penalty: PENALTY_STORE,
            message: if store_ok {
                "persistent store accessible".into()
            } else {
                "persistent store probe failed".into()
            },
        });

        let rss_mb = process_rss_mb();
        checks.push(CheckResult {
            name: "memory".into(),
            // Unknown (non-Linux or parse failure) counts as passing.
            passing: rss_mb.map_or(true, |mb| mb <= RSS_LIMIT_MB),
            penalty: PENALTY_RESOURCES,
            message: match rss_mb {
                Some(mb) => format!("process rss {mb} MB (limit {RSS_LIMIT_MB})"),
                None => "process rss unavailable".into(),
            },
        });

        {
            let g = self.counters.lock().expect("health mutex poisoned");
            let streak_ok = g.consecutive_publish_failures < FAILURE_STREAK_THRESHOLD;
            checks.push(CheckResult {
                name: "publish_failure_streak".into(),
                passing: streak_ok,
                penalty: PENALTY_FAILURE_STREAK,
                message: format!(
                    "{} consecutive publish failures",
                    g.consecutive_publish_failures
                ),
            });

            let interval_ok = g.consecutive_interval_deviations < DEVIATION_STREAK_THRESHOLD;
            checks.push(CheckResult {
                name: "posting_interval_deviation".into(),
                passing: interval_ok,
                penalty: PENALTY_INTERVAL_DEVIATION,
                message: format!(
                    "{} consecutive interval deviations",
                    g.consecutive_interval_deviations
                ),
            });
        }

        let total_penalty: u32 = checks
            .iter()
            .filter(|c| !c.passing)
            .map(|c| c.penalty as u32)
            .sum();
        let score = 100u32.saturating_sub(total_penalty) as u8;
        let status = if score >= 80 {
            HealthStatus::Healthy
        } else if score >= 60 {
            HealthStatus::Warning
        } else {
            HealthStatus::Critical
        };

        HealthSnapshot {
            at: now,
            score,
            status,
            checks,
        }
    }

    /// Evaluate, publish the score gauge, and fire cooldown-gated alerts
    /// for failing checks.
    pub fn evaluate_and_alert(
        &self,
        circuits: &[CircuitSnapshot],
        store_ok: bool,
    ) -> HealthSnapshot {
        let snapshot = self.evaluate(circuits, store_ok);
        gauge!("health_score").set(snapshot.score as f64);
        for check in snapshot.checks.iter().filter(|c| !c.passing) {
            self.fire_alert(&check.name, &check.message, snapshot.at);
        }
        snapshot
    }

    fn fire_alert(&self, key: &str, message: &str, now: DateTime<Utc>) {
        let mut g = self.alerts.lock().expect("health mutex poisoned");
        if let Some(last) = g.last_fired.get(key) {
            let elapsed = (now - *last).to_std().unwrap_or_default();
            if elapsed < cooldown_for(key) {
                return;
            }
        }
        g.last_fired.insert(key.to_string(), now);
        g.history.push(AlertRecord {
            key: key.to_string(),
            message: message.to_string(),
            fired_at: now,
        });
        if g.history.len() > ALERT_HISTORY_CAP {
            let excess = g.history.len() - ALERT_HISTORY_CAP;
            g.history.drain(0..excess);
        }
        tracing::warn!(alert = key, %message, "health alert");
    }

    pub fn alert_history(&self, n: usize) -> Vec<AlertRecord> {
        let g = self.alerts.lock().expect("health mutex poisoned");
        let start = g.history.len().saturating_sub(n);
        g.history[start..].to_vec()
    }

    /// (successful posts, failed posts) since startup.
    pub fn post_counts(&self) -> (u64, u64) {
        let g = self.counters.lock().expect("health mutex poisoned");
        (g.posts_ok, g.posts_failed)
    }

    /// (successful translations, failed translations) since startup.
    pub fn translation_counts(&self) -> (u64, u64) {
        let g = self.counters.lock().expect("health mutex poisoned");
        (g.translations_ok, g.translations_failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::{BreakerConfig, CircuitBreaker};

    fn circuit(name: &'static str, open: bool) -> CircuitSnapshot {
        let cb = CircuitBreaker::new(
            name,
            BreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            },
        );
        if open {
            cb.record_failure("down");
        }
        cb.snapshot()
    }

    #[test]
    fn all_passing_scores_100() {
        let h = HealthScorer::new();
        let snap = h.evaluate(
            &[
                circuit("feed", false),
                circuit("ai", false),
                circuit("publish", false),
            ],
            true,
        );
        assert_eq!(snap.score, 100);
        assert_eq!(snap.status, HealthStatus::Healthy);
    }

    #[test]
    fn score_is_monotone_in_failures_and_bounded() {
        let h = HealthScorer::new();
        let healthy = h.evaluate(&[circuit("publish", false)], true).score;
        let one_down = h.evaluate(&[circuit("publish", true)], true).score;
        let two_down = h.evaluate(&[circuit("publish", true)], false).score;
        assert!(healthy >= one_down);
        assert!(one_down >= two_down);
        assert!(two_down <= 100);

        // Pile on every failure; the score must clamp at 0, not wrap.
        for _ in 0..5 {
            h.record_publish(false);
        }
        h.note_interval_deviation(true);
        h.note_interval_deviation(true);
        let worst = h.evaluate(
            &[
                circuit("feed", true),
                circuit("ai", true),
                circuit("publish", true),
            ],
            false,
        );
        assert_eq!(worst.score, 0);
        assert_eq!(worst.status, HealthStatus::Critical);
    }

    #[test]
    fn status_bands() {
        let h = HealthScorer::new();
        // AI circuit alone: 100 - 15 = 85 → still healthy.
        let s = h.evaluate(&[circuit("ai", true)], true);
        assert_eq!(s.score, 85);
        assert_eq!(s.status, HealthStatus::Healthy);
        // Publish circuit alone: 70 → warning.
        let s = h.evaluate(&[circuit("publish", true)], true);
        assert_eq!(s.score, 70);
        assert_eq!(s.status, HealthStatus::Warning);
        // Publish + feed + store: 25 → critical.
        let s = h.evaluate(&[circuit("publish", true), circuit("feed", true)], false);
        assert_eq!(s.score, 25);
        assert_eq!(s.status, HealthStatus::Critical);
    }

    #[test]
    fn alerts_are_cooldown_gated_and_capped() {
        let h = HealthScorer::new();
        for _ in 0..10 {
            h.evaluate_and_alert(&[circuit("publish", true)], true);
        }
        // Ten evaluations inside the cooldown fire exactly one alert.
        assert_eq!(h.alert_history(100).len(), 1);
        assert_eq!(h.alert_history(100)[0].key, "circuit/publish");
    }

    #[test]
    fn plain_evaluate_never_fires_alerts() {
        let h = HealthScorer::new();
        let snap = h.evaluate(&[circuit("publish", true)], false);
        assert_eq!(snap.status, HealthStatus::Critical);
        assert!(h.alert_history(100).is_empty());
    }

    #[test]
    fn publish_success_resets_streak() {
        let h = HealthScorer::new();
        for _ in 0..4 {
            h.record_publish(false);
        }
        let failing = h.evaluate(&[], true);
        assert!(failing
            .checks
            .iter()
            .any(|c| c.name == "publish_failure_streak" && !c.passing));
        h.record_publish(true);
        let recovered = h.evaluate(&[], true);
        assert!(recovered
            .checks
            .iter()
            .all(|c| c.name != "publish_failure_streak" || c.passing));
    }
}
