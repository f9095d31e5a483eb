use super::{DocumentStore, StoreError, WriteBatch, WriteOp};

/// Accumulates write ops and commits them in fixed-size atomic chunks.
///
/// Each full chunk goes out as one batch; `finish` flushes the partial tail.
/// A failed commit aborts the run — chunks already committed stay committed,
/// which is acceptable because every producer of these ops is idempotent and
/// a re-run converges on the same documents.
pub struct BatchWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    limit: usize,
    queued: Vec<WriteOp>,
    stats: BatchStats,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub operations: usize,
    pub batches: usize,
}

impl<'a, S: DocumentStore + ?Sized> BatchWriter<'a, S> {
    pub fn new(store: &'a S, limit: usize) -> Self {
        Self {
            store,
            limit: limit.max(1),
            queued: Vec::new(),
            stats: BatchStats::default(),
        }
    }

    pub fn queue(&mut self, op: WriteOp) -> Result<(), StoreError> {
        self.queued.push(op);
        if self.queued.len() >= self.limit {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if self.queued.is_empty() {
            return Ok(());
        }
        let batch: WriteBatch = self.queued.drain(..).collect();
        let committed = batch.len();
        self.store.commit(batch)?;
        self.stats.operations += committed;
        self.stats.batches += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<BatchStats, StoreError> {
        self.flush()?;
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Patch};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Store wrapper counting commits, to observe chunk boundaries.
    struct CountingStore {
        inner: MemoryStore,
        commits: Arc<AtomicUsize>,
    }

    impl DocumentStore for CountingStore {
        fn get(
            &self,
            collection: &str,
            id: &str,
        ) -> Result<Option<crate::store::Document>, StoreError> {
            self.inner.get(collection, id)
        }

        fn list(
            &self,
            collection: &str,
        ) -> Result<Vec<(String, crate::store::Document)>, StoreError> {
            self.inner.list(collection)
        }

        fn find_eq(
            &self,
            collection: &str,
            field: &str,
            value: &serde_json::Value,
        ) -> Result<Vec<(String, crate::store::Document)>, StoreError> {
            self.inner.find_eq(collection, field, value)
        }

        fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
            self.commits.fetch_add(1, Ordering::Relaxed);
            self.inner.commit(batch)
        }
    }

    fn op(id: &str) -> WriteOp {
        WriteOp::merge_set("parent", id, Patch::new().set("n", 1))
    }

    #[test]
    fn commits_one_batch_per_full_chunk_plus_partial_tail() {
        let commits = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryStore::new(),
            commits: commits.clone(),
        };

        let mut writer = BatchWriter::new(&store, 2);
        for id in ["a", "b", "c", "d", "e"] {
            writer.queue(op(id)).expect("queue");
        }
        let stats = writer.finish().expect("finish");

        assert_eq!(stats.operations, 5);
        assert_eq!(stats.batches, 3);
        assert_eq!(commits.load(Ordering::Relaxed), 3);
        assert_eq!(store.inner.document_count("parent"), 5);
    }

    #[test]
    fn finish_without_ops_commits_nothing() {
        let commits = Arc::new(AtomicUsize::new(0));
        let store = CountingStore {
            inner: MemoryStore::new(),
            commits: commits.clone(),
        };

        let writer = BatchWriter::new(&store, 400);
        let stats = writer.finish().expect("finish");

        assert_eq!(stats, BatchStats::default());
        assert_eq!(commits.load(Ordering::Relaxed), 0);
    }
}
