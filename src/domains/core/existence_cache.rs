use crate::errors::DomainResult;
use crate::store::{Collection, DocumentStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell, Semaphore};

/// Pass-scoped, memoized existence lookups for `(collection, id)` pairs.
///
/// Concurrent callers asking for the same pair share one in-flight store
/// read (many items routinely share one `postedBy`), and distinct lookups
/// are throttled to a bounded fan-out. Create one cache per scan or
/// deletion pass and drop it afterwards; it is not a process cache.
pub struct ExistenceCache {
    store: Arc<dyn DocumentStore>,
    entries: Mutex<HashMap<(Collection, String), Arc<OnceCell<bool>>>>,
    lookup_permits: Semaphore,
}

impl ExistenceCache {
    pub fn new(store: Arc<dyn DocumentStore>, max_fanout: usize) -> Self {
        Self {
            store,
            entries: Mutex::new(HashMap::new()),
            lookup_permits: Semaphore::new(max_fanout.max(1)),
        }
    }

    pub async fn exists(&self, collection: Collection, id: &str) -> DomainResult<bool> {
        let cell = {
            let mut entries = self.entries.lock().await;
            entries
                .entry((collection, id.to_string()))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let result = cell
            .get_or_try_init(|| async {
                let _permit = self.lookup_permits.acquire().await.map_err(|_| {
                    crate::errors::DomainError::Internal(
                        "existence lookup semaphore closed".to_string(),
                    )
                })?;
                self.store.exists(collection, id).await
            })
            .await?;
        Ok(*result)
    }
}
