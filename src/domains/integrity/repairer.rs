use crate::domains::core::BatchedWriter;
use crate::domains::integrity::types::{Finding, FindingKind};
use crate::errors::DomainResult;
use crate::store::{DocumentStore, WriteOp};
use log::info;
use serde_json::Value;
use std::sync::Arc;

/// Sentinel written into an exchange whose item no longer exists.
pub const DELETED_ITEM_TITLE: &str = "Item deleted";

/// Applies fixes for scanner findings, and nothing else: repairs never touch
/// documents the scan did not flag, never recompute ratings and never
/// cascade further.
pub struct ConsistencyRepairer {
    writer: BatchedWriter,
}

impl ConsistencyRepairer {
    pub fn new(store: Arc<dyn DocumentStore>, batch_limit: usize) -> Self {
        Self {
            writer: BatchedWriter::new(store, batch_limit),
        }
    }

    /// Delete every document flagged as an orphan. Returns how many were
    /// deleted. Dangling item references are not orphans and are left alone.
    pub async fn fix_orphaned(&self, findings: &[Finding]) -> DomainResult<usize> {
        let ops: Vec<WriteOp> = findings
            .iter()
            .filter(|f| {
                matches!(
                    f.kind,
                    FindingKind::OrphanedItem | FindingKind::OrphanedExchange
                )
            })
            .map(|f| WriteOp::Delete(f.target.clone()))
            .collect();

        let outcome = self.writer.commit_all(ops).await?;
        if outcome.committed > 0 {
            info!("Deleted {} orphaned documents", outcome.committed);
        }
        Ok(outcome.committed)
    }

    /// Patch every exchange flagged with a dangling `itemId`: the pointer is
    /// nulled and the title replaced with a sentinel. The exchange document
    /// itself is never deleted.
    pub async fn fix_references(&self, findings: &[Finding]) -> DomainResult<usize> {
        let ops: Vec<WriteOp> = findings
            .iter()
            .filter(|f| f.kind == FindingKind::DanglingItemReference)
            .map(|f| {
                let mut fields = serde_json::Map::new();
                fields.insert("itemId".to_string(), Value::Null);
                fields.insert(
                    "itemTitle".to_string(),
                    Value::String(DELETED_ITEM_TITLE.to_string()),
                );
                WriteOp::Patch {
                    target: f.target.clone(),
                    fields,
                }
            })
            .collect();

        let outcome = self.writer.commit_all(ops).await?;
        if outcome.committed > 0 {
            info!("Repaired {} dangling item references", outcome.committed);
        }
        Ok(outcome.committed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::core::ExistenceCache;
    use crate::domains::integrity::scanner::ConsistencyScanner;
    use crate::store::{Collection, SqliteDocumentStore};
    use serde_json::json;

    #[tokio::test]
    async fn fix_orphaned_deletes_flagged_documents_and_rescan_is_clean() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        store
            .insert(
                Collection::Items,
                "a",
                json!({"postedBy": "u1", "title": "Kettle", "status": "available"}),
            )
            .await
            .unwrap();

        let scanner = ConsistencyScanner::new(store.clone(), 100);
        let findings = scanner
            .orphaned_items(&ExistenceCache::new(store.clone(), 100))
            .await
            .unwrap();
        assert_eq!(findings.len(), 1);

        let repairer = ConsistencyRepairer::new(store.clone(), 400);
        assert_eq!(repairer.fix_orphaned(&findings).await.unwrap(), 1);
        assert!(!store.exists(Collection::Items, "a").await.unwrap());

        // A fresh pass sees a clean store.
        let findings = scanner
            .orphaned_items(&ExistenceCache::new(store.clone(), 100))
            .await
            .unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn fix_references_patches_but_never_deletes() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        store
            .insert(Collection::Users, "u1", json!({}))
            .await
            .unwrap();
        store
            .insert(Collection::Users, "u2", json!({}))
            .await
            .unwrap();
        store
            .insert(
                Collection::Exchanges,
                "e1",
                json!({"ownerId": "u1", "requesterId": "u2", "itemId": "deleted", "itemTitle": "Bike", "status": "completed"}),
            )
            .await
            .unwrap();

        let scanner = ConsistencyScanner::new(store.clone(), 100);
        let findings = scanner
            .orphaned_exchanges(&ExistenceCache::new(store.clone(), 100))
            .await
            .unwrap();

        let repairer = ConsistencyRepairer::new(store.clone(), 400);
        assert_eq!(repairer.fix_references(&findings).await.unwrap(), 1);

        let doc = store.get(Collection::Exchanges, "e1").await.unwrap().unwrap();
        assert_eq!(doc.id, "e1");
        assert_eq!(doc.data.get("itemId"), Some(&serde_json::Value::Null));
        assert_eq!(doc.str_field("itemTitle"), Some(DELETED_ITEM_TITLE));
        // Untouched fields survive the patch.
        assert_eq!(doc.str_field("status"), Some("completed"));
    }

    #[tokio::test]
    async fn fix_orphaned_ignores_dangling_references() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        store
            .insert(Collection::Users, "u1", json!({}))
            .await
            .unwrap();
        store
            .insert(Collection::Users, "u2", json!({}))
            .await
            .unwrap();
        store
            .insert(
                Collection::Exchanges,
                "e1",
                json!({"ownerId": "u1", "requesterId": "u2", "itemId": "deleted", "status": "pending"}),
            )
            .await
            .unwrap();

        let scanner = ConsistencyScanner::new(store.clone(), 100);
        let findings = scanner
            .orphaned_exchanges(&ExistenceCache::new(store.clone(), 100))
            .await
            .unwrap();

        let repairer = ConsistencyRepairer::new(store.clone(), 400);
        assert_eq!(repairer.fix_orphaned(&findings).await.unwrap(), 0);
        assert!(store.exists(Collection::Exchanges, "e1").await.unwrap());
    }
}
