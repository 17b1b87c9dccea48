use crate::errors::{DomainError, DomainResult};
use crate::store::{DocumentStore, WriteOp};
use std::sync::Arc;

/// Outcome of a fully committed batch sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Operations committed.
    pub committed: usize,
    /// Chunks issued against the store.
    pub chunks: usize,
}

/// Chunks a list of write operations to the store's per-commit limit and
/// commits the chunks strictly sequentially.
///
/// Each chunk is atomic; chunks are not atomic relative to one another. A
/// mid-sequence failure leaves the already-committed chunks applied and
/// surfaces as `DomainError::PartialBatch`; retrying the whole operation is
/// safe because deletes and patches tolerate absent targets.
pub struct BatchedWriter {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
}

impl BatchedWriter {
    pub fn new(store: Arc<dyn DocumentStore>, chunk_size: usize) -> Self {
        // Never hand the store a commit larger than it accepts.
        let chunk_size = chunk_size.clamp(1, store.max_commit_ops());
        Self { store, chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub async fn commit_all(&self, ops: Vec<WriteOp>) -> DomainResult<BatchOutcome> {
        let total = ops.len();
        let mut outcome = BatchOutcome::default();

        for chunk in ops.chunks(self.chunk_size) {
            if let Err(e) = self.store.commit(chunk).await {
                log::error!(
                    "Batch commit failed after {} of {} operations: {}",
                    outcome.committed,
                    total,
                    e
                );
                return Err(DomainError::PartialBatch {
                    committed: outcome.committed,
                    total,
                    message: e.to_string(),
                });
            }
            outcome.committed += chunk.len();
            outcome.chunks += 1;
        }

        log::debug!(
            "Committed {} operations in {} chunks",
            outcome.committed,
            outcome.chunks
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{DbError, DomainResult};
    use crate::store::{Collection, DocRef, Document, DocumentStore, SqliteDocumentStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    /// Store wrapper that records per-commit sizes and can fail a chunk.
    struct RecordingStore {
        inner: SqliteDocumentStore,
        commit_sizes: Mutex<Vec<usize>>,
        fail_at_chunk: Option<usize>,
    }

    impl RecordingStore {
        async fn new(fail_at_chunk: Option<usize>) -> Self {
            Self {
                inner: SqliteDocumentStore::in_memory().await.unwrap(),
                commit_sizes: Mutex::new(Vec::new()),
                fail_at_chunk,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn get(&self, c: Collection, id: &str) -> DomainResult<Option<Document>> {
            self.inner.get(c, id).await
        }
        async fn exists(&self, c: Collection, id: &str) -> DomainResult<bool> {
            self.inner.exists(c, id).await
        }
        async fn query_eq(&self, c: Collection, f: &str, v: &str) -> DomainResult<Vec<Document>> {
            self.inner.query_eq(c, f, v).await
        }
        async fn scan(&self, c: Collection) -> DomainResult<Vec<Document>> {
            self.inner.scan(c).await
        }
        async fn insert(&self, c: Collection, id: &str, data: serde_json::Value) -> DomainResult<()> {
            self.inner.insert(c, id, data).await
        }
        async fn commit(&self, ops: &[crate::store::WriteOp]) -> DomainResult<()> {
            {
                let mut sizes = self.commit_sizes.lock().unwrap();
                if self.fail_at_chunk == Some(sizes.len()) {
                    return Err(DbError::Transaction("chunk rejected".to_string()).into());
                }
                sizes.push(ops.len());
            }
            self.inner.commit(ops).await
        }
    }

    fn delete_ops(n: usize) -> Vec<WriteOp> {
        (0..n)
            .map(|i| WriteOp::Delete(DocRef::new(Collection::Items, format!("i{}", i))))
            .collect()
    }

    #[tokio::test]
    async fn never_exceeds_chunk_limit() {
        let store = Arc::new(RecordingStore::new(None).await);
        let writer = BatchedWriter::new(store.clone(), 400);

        let outcome = writer.commit_all(delete_ops(10_000)).await.unwrap();
        assert_eq!(outcome.committed, 10_000);
        assert_eq!(outcome.chunks, 25);

        let sizes = store.commit_sizes.lock().unwrap();
        assert!(sizes.iter().all(|&s| s <= 400));
        assert_eq!(sizes.iter().sum::<usize>(), 10_000);
    }

    #[tokio::test]
    async fn chunk_size_clamped_to_store_limit() {
        let store = Arc::new(RecordingStore::new(None).await);
        let writer = BatchedWriter::new(store, 9_999);
        assert_eq!(writer.chunk_size(), crate::config::STORE_COMMIT_LIMIT);
    }

    #[tokio::test]
    async fn partial_failure_reports_committed_count() {
        let store = Arc::new(RecordingStore::new(Some(2)).await);
        let writer = BatchedWriter::new(store.clone(), 100);

        let err = writer.commit_all(delete_ops(350)).await.unwrap_err();
        match err {
            DomainError::PartialBatch { committed, total, .. } => {
                assert_eq!(committed, 200);
                assert_eq!(total, 350);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_noop() {
        let store = Arc::new(RecordingStore::new(None).await);
        let writer = BatchedWriter::new(store.clone(), 100);
        let outcome = writer.commit_all(Vec::new()).await.unwrap();
        assert_eq!(outcome, BatchOutcome::default());
        assert!(store.commit_sizes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn rerun_after_partial_failure_is_safe() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        for i in 0..5 {
            store
                .insert(Collection::Items, &format!("i{}", i), json!({"postedBy": "u1"}))
                .await
                .unwrap();
        }
        let writer = BatchedWriter::new(store.clone(), 2);
        let ops = delete_ops(5);
        writer.commit_all(ops.clone()).await.unwrap();
        // Everything already gone; retry commits the same ops without error.
        let outcome = writer.commit_all(ops).await.unwrap();
        assert_eq!(outcome.committed, 5);
    }
}
