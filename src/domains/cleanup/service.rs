use crate::config::EngineConfig;
use crate::domains::core::BatchedWriter;
use crate::errors::{DomainError, ServiceError, ServiceResult, ValidationError};
use crate::store::records::FINISHED_EXCHANGE_STATUSES;
use crate::store::{Collection, Document, DocumentStore, WriteOp};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

/// Operations accepted by the cleanup endpoint. All of them prune documents
/// last written before a caller-supplied cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOperation {
    /// Completed or cancelled exchanges not touched since the cutoff.
    OldExchanges,
    /// Sessions without activity since the cutoff.
    StaleSessions,
    /// Listing drafts (temporary uploads) abandoned before the cutoff.
    StaleDrafts,
}

impl CleanupOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            CleanupOperation::OldExchanges => "old-exchanges",
            CleanupOperation::StaleSessions => "stale-sessions",
            CleanupOperation::StaleDrafts => "stale-drafts",
        }
    }
}

impl FromStr for CleanupOperation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "old-exchanges" => Ok(CleanupOperation::OldExchanges),
            "stale-sessions" => Ok(CleanupOperation::StaleSessions),
            "stale-drafts" => Ok(CleanupOperation::StaleDrafts),
            other => Err(ValidationError::unknown_operation(other)),
        }
    }
}

impl fmt::Display for CleanupOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-facing result of one cleanup run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub operation: String,
    pub deleted_count: usize,
    pub duration_ms: u64,
    pub details: Vec<String>,
}

/// Time-based pruning of documents the product no longer needs. Deletion
/// goes through the batched writer, so the same chunk limits and retry
/// semantics apply as everywhere else.
pub struct CleanupService {
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
}

impl CleanupService {
    pub fn new(store: Arc<dyn DocumentStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn run(
        &self,
        operation: &str,
        cutoff: DateTime<Utc>,
    ) -> ServiceResult<CleanupReport> {
        let operation = CleanupOperation::from_str(operation)
            .map_err(|e| ServiceError::Domain(DomainError::Validation(e)))?;
        let started = Instant::now();

        let (collection, expired): (Collection, Vec<Document>) = match operation {
            CleanupOperation::OldExchanges => {
                let docs = self.store.scan(Collection::Exchanges).await?;
                let expired = docs
                    .into_iter()
                    .filter(|doc| doc.updated_at < cutoff)
                    .filter(|doc| {
                        doc.str_field("status")
                            .is_some_and(|s| FINISHED_EXCHANGE_STATUSES.contains(&s))
                    })
                    .collect();
                (Collection::Exchanges, expired)
            }
            CleanupOperation::StaleSessions => {
                let docs = self.store.scan(Collection::Sessions).await?;
                let expired = docs
                    .into_iter()
                    .filter(|doc| doc.updated_at < cutoff)
                    .collect();
                (Collection::Sessions, expired)
            }
            CleanupOperation::StaleDrafts => {
                let docs = self.store.scan(Collection::Drafts).await?;
                let expired = docs
                    .into_iter()
                    .filter(|doc| doc.updated_at < cutoff)
                    .collect();
                (Collection::Drafts, expired)
            }
        };

        let ops: Vec<WriteOp> = expired
            .iter()
            .map(|doc| WriteOp::Delete(doc.doc_ref()))
            .collect();
        let writer = BatchedWriter::new(self.store.clone(), self.config.integrity_batch_limit);
        let outcome = writer.commit_all(ops).await?;

        let report = CleanupReport {
            operation: operation.to_string(),
            deleted_count: outcome.committed,
            duration_ms: started.elapsed().as_millis() as u64,
            details: vec![format!(
                "Deleted {} documents from {} older than {}",
                outcome.committed,
                collection,
                cutoff.to_rfc3339()
            )],
        };
        info!(
            "Cleanup {} finished: {} deleted in {}ms",
            operation, report.deleted_count, report.duration_ms
        );
        Ok(report)
    }
}
