// src/types.rs
//! Core data model and the async traits the pipeline consumes.
//!
//! The traits mirror what the surrounding collaborators actually provide:
//! an ordered feed poller, a structured AI analyzer, a chat destination,
//! and a durable key/value store. Everything else in the crate is built
//! against these seams so tests can swap in mocks.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// One raw post polled from an upstream channel. Immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedItem {
    /// Unique per upstream channel (the platform's message id).
    pub id: i64,
    pub channel: String,
    pub text: String,
    /// Ordered media references (platform file ids or URLs).
    pub media: Vec<MediaRef>,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub reference: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

/// Classification flags returned by the AI analyzer. Both default to
/// `false` when the AI path is unavailable: publishing a borderline item
/// beats silently dropping it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Classification {
    pub is_ad: bool,
    pub is_off_topic: bool,
}

impl Classification {
    pub fn should_skip(&self) -> bool {
        self.is_ad || self.is_off_topic
    }
}

/// Full result of one structured AI call for one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiAnalysis {
    pub title: String,
    pub translation: String,
    pub primary_location: Option<String>,
    pub classification: Classification,
}

/// A `FeedItem` after cleaning, tagging, and translation. Never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransformedItem {
    pub source_id: i64,
    pub channel: String,
    pub cleaned_text: String,
    /// Gazetteer matches in first-occurrence order, duplicates collapsed.
    pub locations: Vec<String>,
    pub primary_location: Option<String>,
    pub title: String,
    pub translation: String,
    pub media: Vec<MediaRef>,
    /// True when the rule-based fallback produced title/translation.
    pub degraded: bool,
}

/// What the destination returned for a successful publish.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: String,
}

/// Tagged outcome of one candidate within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published { message_id: String },
    SkippedDuplicate,
    SkippedClassified,
    FailedTransient,
    FailedPermanent,
}

impl PublishOutcome {
    /// Short label used for ledger entries and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            PublishOutcome::Published { .. } => "published",
            PublishOutcome::SkippedDuplicate => "skipped_duplicate",
            PublishOutcome::SkippedClassified => "skipped_classified",
            PublishOutcome::FailedTransient => "failed_transient",
            PublishOutcome::FailedPermanent => "failed_permanent",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublishRecord {
    pub item_id: i64,
    pub channel: String,
    pub attempted_at: DateTime<Utc>,
    pub outcome: PublishOutcome,
}

/// Ordered feed poller. Returns items oldest→newest.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_latest(&self, channel: &str, limit: usize) -> Result<Vec<FeedItem>>;
    fn name(&self) -> &'static str;
}

/// Structured AI analyzer: classification, translation, title, and primary
/// location in one round trip. Safe under concurrent use for unrelated
/// items.
#[async_trait::async_trait]
pub trait AiService: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AiAnalysis>;
    fn name(&self) -> &'static str;
}

/// Destination chat platform. Does not guarantee dedup; that is this
/// crate's responsibility.
#[async_trait::async_trait]
pub trait DestinationPlatform: Send + Sync {
    async fn publish(&self, item: &TransformedItem) -> Result<PublishReceipt, RelayError>;
    fn name(&self) -> &'static str;
}

/// Durable JSON key/value storage for ledger entries and scheduler state.
/// `set` must be flushed before returning.
#[async_trait::async_trait]
pub trait PersistentStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>>;
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<()>;
}
