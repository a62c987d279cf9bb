use crate::error::CoreResult;
use crate::model::{Document, Journal, Link, Snippet, Specimen};
use crate::storage::Storage;
use dashmap::DashMap;

/// One pending write, keyed by the target table's declared uniqueness
/// columns (§5). Holding the typed record (rather than a dynamic dict)
/// keeps the flush path exhaustive-matchable.
#[derive(Debug, Clone)]
pub enum PendingRecord {
    Journal(Journal),
    Document(Document),
    Snippet(Snippet),
    Specimen(Specimen),
    Link(Link),
}

/// A write-behind batch of pending inserts/updates (§5), flushed at a
/// configured size or at end-of-phase. Keyed on a synthetic uniqueness
/// key so re-staging the same row (e.g. a Link upgraded by a later
/// resolution phase) replaces rather than duplicates the pending write.
#[derive(Debug)]
pub struct WriteBatch {
    pending: DashMap<String, PendingRecord>,
    flush_size: usize,
}

impl WriteBatch {
    pub fn new(flush_size: usize) -> Self {
        Self { pending: DashMap::new(), flush_size }
    }

    /// Stages `record` under `key`, returning true once the batch has
    /// reached its configured flush size (the caller should then call
    /// [`flush`](Self::flush)).
    pub fn stage(&self, key: impl Into<String>, record: PendingRecord) -> bool {
        self.pending.insert(key.into(), record);
        self.pending.len() >= self.flush_size
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Flushes every pending record. A record whose write fails is
    /// retried once in isolation; a record that fails again is logged
    /// and discarded rather than blocking the rest of the batch (§5,
    /// §7 "Constraint violation on write").
    pub async fn flush(&self, storage: &dyn Storage) -> CoreResult<()> {
        let keys: Vec<String> = self.pending.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            let Some((_, record)) = self.pending.remove(&key) else { continue };
            if let Err(e) = Self::write_one(storage, &record).await {
                log::warn!("flush failed for {key:?}, retrying in isolation: {e}");
                if let Err(e) = Self::write_one(storage, &record).await {
                    log::error!("dropping unresolvable row {key:?}: {e}");
                }
            }
        }
        Ok(())
    }

    async fn write_one(storage: &dyn Storage, record: &PendingRecord) -> CoreResult<()> {
        match record {
            PendingRecord::Journal(j) => storage.upsert_journal(j).await,
            PendingRecord::Document(d) => storage.upsert_document(d).await,
            PendingRecord::Snippet(s) => storage.upsert_snippet(s).await,
            PendingRecord::Specimen(s) => storage.upsert_specimen(s).await,
            PendingRecord::Link(l) => storage.upsert_link(l).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage_memory::StorageMemory;

    #[tokio::test]
    async fn flush_writes_every_staged_record() {
        let batch = WriteBatch::new(10);
        batch.stage("journals|Nature", PendingRecord::Journal(Journal { title: "Nature".into(), topic: None }));
        let storage = StorageMemory::new();
        batch.flush(&storage).await.unwrap();
        assert!(storage.get_journal("Nature").await.unwrap().is_some());
        assert!(batch.is_empty());
    }

    #[test]
    fn stage_reports_when_flush_size_reached() {
        let batch = WriteBatch::new(2);
        assert!(!batch.stage("a", PendingRecord::Journal(Journal { title: "A".into(), topic: None })));
        assert!(batch.stage("b", PendingRecord::Journal(Journal { title: "B".into(), topic: None })));
    }
}
