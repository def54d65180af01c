// src/history.rs
//! Capped in-memory history of publish records for the operator surface.

use std::sync::Mutex;

use crate::types::PublishRecord;

#[derive(Debug)]
pub struct RecordHistory {
    inner: Mutex<Vec<PublishRecord>>,
    cap: usize,
}

impl RecordHistory {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn push(&self, record: PublishRecord) {
        let mut v = self.inner.lock().expect("history mutex poisoned");
        v.push(record);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<PublishRecord> {
        let v = self.inner.lock().expect("history mutex poisoned");
        let start = v.len().saturating_sub(n);
        v[start..].to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PublishOutcome;
    use chrono::Utc;

    fn rec(id: i64) -> PublishRecord {
        PublishRecord {
            item_id: id,
            channel: "c".into(),
            attempted_at: Utc::now(),
            outcome: PublishOutcome::SkippedDuplicate,
        }
    }

    #[test]
    fn cap_drops_oldest() {
        let h = RecordHistory::with_capacity(3);
        for i in 0..5 {
            h.push(rec(i));
        }
        let last = h.snapshot_last_n(10);
        assert_eq!(last.len(), 3);
        assert_eq!(last[0].item_id, 2);
        assert_eq!(last[2].item_id, 4);
    }
}
