// src/ledger.rs
//! Durable at-most-once publish ledger.
//!
//! Every handled item id gets exactly one write-once entry. The
//! coordinator checks `is_recorded` strictly before a publish attempt and
//! calls `record` strictly after the outcome is known; combined with the
//! scheduler's single-cycle-at-a-time gate this makes check-then-act
//! exclusive per id without a lock around the publish itself.
//!
//! Retention is unbounded here; pruning is an external concern.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::types::PersistentStore;

const LEDGER_KEY: &str = "ledger/entries";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub outcome: String,
    pub recorded_at: DateTime<Utc>,
}

pub struct DedupLedger {
    store: Arc<dyn PersistentStore>,
    entries: Mutex<HashMap<String, LedgerEntry>>,
}

impl DedupLedger {
    /// Load existing entries from the store, or start empty.
    pub async fn open(store: Arc<dyn PersistentStore>) -> Result<Self> {
        let entries = match store.get(LEDGER_KEY).await.context("loading ledger")? {
            Some(value) => serde_json::from_value(value).context("parsing ledger entries")?,
            None => HashMap::new(),
        };
        Ok(Self {
            store,
            entries: Mutex::new(entries),
        })
    }

    fn key(channel: &str, id: i64) -> String {
        format!("{channel}:{id}")
    }

    pub async fn is_recorded(&self, channel: &str, id: i64) -> bool {
        self.entries
            .lock()
            .await
            .contains_key(&Self::key(channel, id))
    }

    /// Record an outcome for an id. Write-once: an existing entry is never
    /// overwritten. Flushed to the store before returning.
    pub async fn record(&self, channel: &str, id: i64, outcome: &str) -> Result<()> {
        let key = Self::key(channel, id);
        let snapshot = {
            let mut g = self.entries.lock().await;
            if g.contains_key(&key) {
                tracing::debug!(%key, "ledger entry already present, keeping first");
                return Ok(());
            }
            g.insert(
                key,
                LedgerEntry {
                    outcome: outcome.to_string(),
                    recorded_at: Utc::now(),
                },
            );
            g.clone()
        };
        self.store
            .set(LEDGER_KEY, serde_json::to_value(&snapshot)?)
            .await
            .context("flushing ledger")
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::JsonStore;

    #[tokio::test]
    async fn record_then_is_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
        let ledger = DedupLedger::open(store).await.unwrap();

        assert!(!ledger.is_recorded("newsfeed", 42).await);
        ledger.record("newsfeed", 42, "published").await.unwrap();
        assert!(ledger.is_recorded("newsfeed", 42).await);
        // Same id on a different channel is a different entry.
        assert!(!ledger.is_recorded("other", 42).await);
    }

    #[tokio::test]
    async fn entries_are_write_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
        let ledger = DedupLedger::open(store).await.unwrap();

        ledger.record("c", 1, "skipped_classified").await.unwrap();
        ledger.record("c", 1, "published").await.unwrap();
        let g = ledger.entries.lock().await;
        assert_eq!(g.get("c:1").unwrap().outcome, "skipped_classified");
    }

    #[tokio::test]
    async fn survives_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let store: Arc<dyn PersistentStore> = Arc::new(JsonStore::new(tmp.path()).unwrap());
        {
            let ledger = DedupLedger::open(store.clone()).await.unwrap();
            ledger.record("c", 7, "published").await.unwrap();
        }
        let reopened = DedupLedger::open(store).await.unwrap();
        assert!(reopened.is_recorded("c", 7).await);
        assert_eq!(reopened.len().await, 1);
    }
}
