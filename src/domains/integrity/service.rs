use crate::config::EngineConfig;
use crate::domains::core::ExistenceCache;
use crate::domains::integrity::repairer::ConsistencyRepairer;
use crate::domains::integrity::scanner::ConsistencyScanner;
use crate::domains::integrity::types::{
    ConsistencyOperation, ConsistencyReport, Finding, FindingKind, IssueSummary, ReportSummary,
};
use crate::errors::{DomainError, ServiceError, ServiceResult};
use crate::store::DocumentStore;
use log::info;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// The consistency endpoint: accepts an operation name, runs the matching
/// scan (and repair, for the fix operations) and rolls findings up into
/// per-kind counts an operator can act on.
///
/// Every run builds a fresh pass-scoped `ExistenceCache`; nothing survives
/// between invocations.
pub struct ConsistencyService {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl ConsistencyService {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(&self, operation: &str) -> ServiceResult<ConsistencyReport> {
        // Unknown operation names are rejected before any I/O.
        let operation = ConsistencyOperation::from_str(operation)
            .map_err(|e| ServiceError::Domain(DomainError::Validation(e)))?;

        let started = Instant::now();
        let scanner = ConsistencyScanner::new(self.store.clone(), self.config.existence_fanout);
        let repairer =
            ConsistencyRepairer::new(self.store.clone(), self.config.integrity_batch_limit);
        let cache = ExistenceCache::new(self.store.clone(), self.config.existence_fanout);

        let (findings, fixed) = match operation {
            ConsistencyOperation::CheckAll => (scanner.check_all(&cache).await?, None),
            ConsistencyOperation::CheckDuplicates => (scanner.duplicate_items().await?, None),
            ConsistencyOperation::FixOrphaned => {
                let mut findings = scanner.orphaned_items(&cache).await?;
                findings.extend(scanner.orphaned_exchanges(&cache).await?);
                // Dangling item references surfaced by the exchange scan are
                // reported but left to fix-references.
                let deleted = repairer.fix_orphaned(&findings).await?;
                (findings, Some(deleted))
            }
            ConsistencyOperation::FixReferences => {
                let findings: Vec<Finding> = scanner
                    .orphaned_exchanges(&cache)
                    .await?
                    .into_iter()
                    .filter(|f| f.kind == FindingKind::DanglingItemReference)
                    .collect();
                let patched = repairer.fix_references(&findings).await?;
                (findings, Some(patched))
            }
        };

        let report = build_report(operation, &findings, fixed, started);
        info!(
            "Consistency {} finished: {} issues, {} fixed, {}ms",
            operation, report.summary.total_issues, report.summary.total_fixed, report.duration_ms
        );
        Ok(report)
    }
}

fn kind_description(kind: FindingKind) -> &'static str {
    match kind {
        FindingKind::OrphanedItem => "Items whose poster no longer exists",
        FindingKind::OrphanedExchange => "Exchanges whose participants no longer exist",
        FindingKind::DanglingItemReference => "Exchanges pointing at a deleted item",
        FindingKind::DuplicateItem => "Repeat postings of the same item by the same user",
        FindingKind::InvalidStatus => "Documents with a status outside the known set",
    }
}

fn build_report(
    operation: ConsistencyOperation,
    findings: &[Finding],
    fixed: Option<usize>,
    started: Instant,
) -> ConsistencyReport {
    let mut counts: HashMap<FindingKind, usize> = HashMap::new();
    let mut order: Vec<FindingKind> = Vec::new();
    for finding in findings {
        if !counts.contains_key(&finding.kind) {
            order.push(finding.kind);
        }
        *counts.entry(finding.kind).or_insert(0) += 1;
    }

    // For the fix operations every surviving finding of the targeted kinds
    // was repaired, so the per-kind fixed count equals the issue count.
    let fixes_applied = fixed.is_some();
    let fixable = |kind: FindingKind| match operation {
        ConsistencyOperation::FixOrphaned => matches!(
            kind,
            FindingKind::OrphanedItem | FindingKind::OrphanedExchange
        ),
        ConsistencyOperation::FixReferences => kind == FindingKind::DanglingItemReference,
        _ => false,
    };

    let issues: Vec<IssueSummary> = order
        .into_iter()
        .map(|kind| {
            let count = counts[&kind];
            IssueSummary {
                kind,
                count,
                description: kind_description(kind).to_string(),
                fixed: (fixes_applied && fixable(kind)).then_some(count),
            }
        })
        .collect();

    ConsistencyReport {
        operation: operation.to_string(),
        summary: ReportSummary {
            total_issues: findings.len(),
            total_fixed: fixed.unwrap_or(0),
        },
        issues,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{Collection, SqliteDocumentStore};
    use serde_json::json;

    async fn service(store: &Arc<SqliteDocumentStore>) -> ConsistencyService {
        ConsistencyService::new(store.clone(), EngineConfig::default())
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        let err = service(&store).await.run("defragment").await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Domain(DomainError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn check_all_reports_the_directly_removed_user_scenario() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        // Item A posted by u1, whose user document was removed directly,
        // bypassing the deletion engine.
        store
            .insert(
                Collection::Items,
                "A",
                json!({"postedBy": "u1", "title": "Textbook", "status": "available"}),
            )
            .await
            .unwrap();

        let report = service(&store).await.run("check-all").await.unwrap();
        assert_eq!(report.summary.total_issues, 1);
        assert_eq!(report.summary.total_fixed, 0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, FindingKind::OrphanedItem);
        assert_eq!(report.issues[0].count, 1);
        assert!(report.issues[0].fixed.is_none());

        let report = service(&store).await.run("fix-orphaned").await.unwrap();
        assert_eq!(report.summary.total_fixed, 1);
        assert_eq!(report.issues[0].fixed, Some(1));
        assert!(!store.exists(Collection::Items, "A").await.unwrap());

        let report = service(&store).await.run("check-all").await.unwrap();
        assert_eq!(report.summary.total_issues, 0);
        assert!(report.issues.is_empty());
    }

    #[tokio::test]
    async fn fix_references_reports_patched_exchanges() {
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
                json!({"ownerId": "u1", "requesterId": "u2", "itemId": "gone", "status": "completed"}),
            )
            .await
            .unwrap();

        let report = service(&store).await.run("fix-references").await.unwrap();
        assert_eq!(report.summary.total_issues, 1);
        assert_eq!(report.summary.total_fixed, 1);
        assert!(store.exists(Collection::Exchanges, "e1").await.unwrap());

        // Now consistent; a second run has nothing to do.
        let report = service(&store).await.run("fix-references").await.unwrap();
        assert_eq!(report.summary.total_issues, 0);
        assert_eq!(report.summary.total_fixed, 0);
    }

    #[tokio::test]
    async fn check_duplicates_is_read_only() {
        let store = Arc::new(SqliteDocumentStore::in_memory().await.unwrap());
        store
            .insert(Collection::Users, "u1", json!({}))
            .await
            .unwrap();
        store
            .insert(Collection::Items, "a", json!({"postedBy": "u1", "title": "Lamp", "status": "available"}))
            .await
            .unwrap();
        store
            .insert(Collection::Items, "b", json!({"postedBy": "u1", "title": "lamp", "status": "available"}))
            .await
            .unwrap();

        let report = service(&store).await.run("check-duplicates").await.unwrap();
        assert_eq!(report.summary.total_issues, 1);
        assert_eq!(report.summary.total_fixed, 0);
        // Both documents are still there.
        assert!(store.exists(Collection::Items, "a").await.unwrap());
        assert!(store.exists(Collection::Items, "b").await.unwrap());
    }
}
