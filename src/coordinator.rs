// src/coordinator.rs
//! Composition root: runs exactly one fetch→transform→publish cycle.
//!
//! Candidates are processed oldest-first and the cycle stops after the
//! first successful publish (`max_publishes`, default 1). Step outcomes
//! are tagged values; errors only escape a step when a dependency breaks,
//! and even then they are contained within the cycle.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::{counter, histogram};

use crate::breaker::CircuitBreaker;
use crate::error::RelayError;
use crate::health::HealthScorer;
use crate::history::RecordHistory;
use crate::ledger::DedupLedger;
use crate::transform::{ContentTransformer, TransformOutcome};
use crate::types::{DestinationPlatform, FeedItem, FeedSource, PublishOutcome, PublishRecord};

#[derive(Debug, Clone)]
pub struct CycleConfig {
    pub channels: Vec<String>,
    pub fetch_limit: usize,
    pub max_publishes: u32,
}

#[derive(Debug, Default)]
pub struct CycleReport {
    pub published: u32,
    pub examined: usize,
    /// True when the cycle stopped early because a circuit was open.
    pub aborted: bool,
    pub records: Vec<PublishRecord>,
}

pub struct PublishCoordinator {
    cfg: CycleConfig,
    feed: Arc<dyn FeedSource>,
    transformer: ContentTransformer,
    destination: Arc<dyn DestinationPlatform>,
    ledger: Arc<DedupLedger>,
    feed_breaker: Arc<CircuitBreaker>,
    publish_breaker: Arc<CircuitBreaker>,
    health: Arc<HealthScorer>,
    history: Arc<RecordHistory>,
}

impl PublishCoordinator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cfg: CycleConfig,
        feed: Arc<dyn FeedSource>,
        transformer: ContentTransformer,
        destination: Arc<dyn DestinationPlatform>,
        ledger: Arc<DedupLedger>,
        feed_breaker: Arc<CircuitBreaker>,
        publish_breaker: Arc<CircuitBreaker>,
        health: Arc<HealthScorer>,
        history: Arc<RecordHistory>,
    ) -> Self {
        Self {
            cfg,
            feed,
            transformer,
            destination,
            ledger,
            feed_breaker,
            publish_breaker,
            health,
            history,
        }
    }

    pub async fn run_cycle(&self) -> CycleReport {
        let started = Instant::now();
        counter!("cycles_total").increment(1);
        let mut report = CycleReport::default();

        let candidates = match self.fetch_candidates().await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(error = %e, "fetch failed, abandoning cycle");
                report.aborted = e.is_circuit_open();
                histogram!("cycle_duration_ms").record(started.elapsed().as_millis() as f64);
                return report;
            }
        };

        tracing::debug!(candidates = candidates.len(), "cycle candidates fetched");

        for item in &candidates {
            if report.published >= self.cfg.max_publishes {
                break;
            }
            report.examined += 1;

            if self.ledger.is_recorded(&item.channel, item.id).await {
                self.note(item, PublishOutcome::SkippedDuplicate, &mut report);
                continue;
            }

            let transformed = match self.transformer.transform(item).await {
                TransformOutcome::Skip(_) => {
                    // Classified skips still enter the ledger so the item
                    // is never reprocessed. Not a failure and does not
                    // count toward the publish cap.
                    if let Err(e) = self
                        .ledger
                        .record(&item.channel, item.id, "skipped_classified")
                        .await
                    {
                        tracing::error!(item = item.id, error = %e, "ledger write failed");
                    }
                    self.note(item, PublishOutcome::SkippedClassified, &mut report);
                    continue;
                }
                TransformOutcome::Item(t) => {
                    self.health.record_translation(!t.degraded);
                    t
                }
            };

            let publish_result = self
                .publish_breaker
                .execute(self.destination.publish(&transformed))
                .await;

            match publish_result {
                Ok(receipt) => {
                    if let Err(e) = self.ledger.record(&item.channel, item.id, "published").await {
                        // The publish went out but the ledger flush failed;
                        // the next cycle could double-post this id.
                        tracing::error!(item = item.id, error = %e, "ledger write failed after publish");
                    }
                    self.health.record_publish(true);
                    self.note(
                        item,
                        PublishOutcome::Published {
                            message_id: receipt.message_id,
                        },
                        &mut report,
                    );
                    report.published += 1;
                }
                Err(RelayError::CircuitOpen { dependency }) => {
                    // Every further destination call this cycle is certain
                    // to be blocked; abandon instead of hammering.
                    tracing::warn!(%dependency, "publish circuit open, abandoning cycle");
                    self.note(item, PublishOutcome::FailedTransient, &mut report);
                    report.aborted = true;
                    break;
                }
                Err(RelayError::Permanent(reason)) => {
                    tracing::warn!(item = item.id, %reason, "destination rejected item");
                    if let Err(e) = self
                        .ledger
                        .record(&item.channel, item.id, "failed_permanent")
                        .await
                    {
                        tracing::error!(item = item.id, error = %e, "ledger write failed");
                    }
                    self.health.record_publish(false);
                    self.note(item, PublishOutcome::FailedPermanent, &mut report);
                }
                Err(e) => {
                    // Transient: no ledger entry, eligible for retry next
                    // cycle.
                    tracing::warn!(item = item.id, error = %e, "transient publish failure");
                    self.health.record_publish(false);
                    self.note(item, PublishOutcome::FailedTransient, &mut report);
                }
            }
        }

        histogram!("cycle_duration_ms").record(started.elapsed().as_millis() as f64);
        tracing::info!(
            published = report.published,
            examined = report.examined,
            aborted = report.aborted,
            "cycle complete"
        );
        report
    }

    /// Fetch candidates from every configured channel through the feed
    /// breaker, merged oldest-first.
    async fn fetch_candidates(&self) -> Result<Vec<FeedItem>, RelayError> {
        let mut all = Vec::new();
        for channel in &self.cfg.channels {
            let fetched = self
                .feed_breaker
                .execute(async {
                    self.feed
                        .fetch_latest(channel, self.cfg.fetch_limit)
                        .await
                        .map_err(|e| RelayError::Transient(e.to_string()))
                })
                .await;
            match fetched {
                Ok(mut items) => all.append(&mut items),
                Err(e @ RelayError::CircuitOpen { .. }) => return Err(e),
                Err(e) => {
                    tracing::warn!(%channel, error = %e, "feed fetch failed for channel");
                }
            }
        }
        all.sort_by_key(|item| (item.posted_at, item.id));
        Ok(all)
    }

    fn note(&self, item: &FeedItem, outcome: PublishOutcome, report: &mut CycleReport) {
        counter!("publish_outcomes_total", "outcome" => outcome.label()).increment(1);
        let record = PublishRecord {
            item_id: item.id,
            channel: item.channel.clone(),
            attempted_at: Utc::now(),
            outcome,
        };
        self.history.push(record.clone());
        report.records.push(record);
    }
}
