// src/transform/mod.rs
pub mod clean;
pub mod fallback;
pub mod locations;

use std::sync::Arc;

use metrics::counter;

use crate::breaker::CircuitBreaker;
use crate::error::RelayError;
use crate::types::{AiService, Classification, FeedItem, TransformedItem};

/// Result of transforming one feed item: either something publishable, or
/// a classified-skip the coordinator must still record in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Item(TransformedItem),
    Skip(Classification),
}

/// Deterministically turns one `FeedItem` into a `TransformOutcome`.
///
/// The AI call is wrapped by the `"ai"` circuit breaker; when it is open
/// or the call fails, translation and title fall back to the rule-based
/// path and classification defaults to publish (availability over
/// precision — a missed ad beats a silently dropped story).
pub struct ContentTransformer {
    ai: Arc<dyn AiService>,
    ai_breaker: Arc<CircuitBreaker>,
}

impl ContentTransformer {
    pub fn new(ai: Arc<dyn AiService>, ai_breaker: Arc<CircuitBreaker>) -> Self {
        Self { ai, ai_breaker }
    }

    pub async fn transform(&self, item: &FeedItem) -> TransformOutcome {
        let cleaned = clean::clean_content(&item.text);
        let location_tags = locations::detect(&cleaned);

        let ai_result = self
            .ai_breaker
            .execute(async {
                self.ai
                    .analyze(&cleaned)
                    .await
                    .map_err(|e| RelayError::Transient(e.to_string()))
            })
            .await;

        match ai_result {
            Ok(analysis) => {
                if analysis.classification.should_skip() {
                    counter!("transform_classified_skips_total").increment(1);
                    tracing::info!(
                        item = item.id,
                        channel = %item.channel,
                        is_ad = analysis.classification.is_ad,
                        is_off_topic = analysis.classification.is_off_topic,
                        "item classified as skip"
                    );
                    return TransformOutcome::Skip(analysis.classification);
                }
                TransformOutcome::Item(TransformedItem {
                    source_id: item.id,
                    channel: item.channel.clone(),
                    cleaned_text: cleaned,
                    locations: location_tags,
                    primary_location: analysis.primary_location,
                    title: analysis.title,
                    translation: analysis.translation,
                    media: item.media.clone(),
                    degraded: false,
                })
            }
            Err(e) => {
                counter!("transform_ai_fallbacks_total").increment(1);
                tracing::warn!(
                    item = item.id,
                    channel = %item.channel,
                    error = %e,
                    "AI unavailable, using rule-based fallback"
                );
                TransformOutcome::Item(TransformedItem {
                    source_id: item.id,
                    channel: item.channel.clone(),
                    title: fallback::extract_title(&cleaned),
                    translation: fallback::translate(&cleaned),
                    locations: location_tags,
                    primary_location: None,
                    cleaned_text: cleaned,
                    media: item.media.clone(),
                    degraded: true,
                })
            }
        }
    }
}
