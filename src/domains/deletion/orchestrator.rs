use crate::config::EngineConfig;
use crate::domains::core::{BatchedWriter, IdentityProvider, ObjectStorageService};
use crate::domains::deletion::assets::extract_asset_ids;
use crate::domains::deletion::collector::ReferenceCollector;
use crate::domains::deletion::rating::RatingRecalculator;
use crate::domains::deletion::types::{AccountDeletionReport, DeletionStage};
use crate::errors::{ServiceError, ServiceResult, ValidationError};
use crate::store::DocumentStore;
use log::{error, info, warn};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Single entry point for permanently removing every trace of a user:
/// self-service deletion and administrator-forced deletion both run this
/// pipeline (who may call it is enforced upstream).
///
/// Stage order is strict. Nothing is mutated before COLLECTING succeeds;
/// asset cleanup is best-effort and never blocks document deletion; a
/// failure while deleting documents is fatal and safe to retry, since the
/// next COLLECTING pass re-discovers only what is still there.
pub struct DeletionOrchestrator {
    store: Arc<dyn DocumentStore>,
    object_storage: Arc<dyn ObjectStorageService>,
    identity: Arc<dyn IdentityProvider>,
    config: EngineConfig,
}

impl DeletionOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        object_storage: Arc<dyn ObjectStorageService>,
        identity: Arc<dyn IdentityProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            object_storage,
            identity,
            config,
        }
    }

    pub async fn delete_account(&self, user_id: &str) -> ServiceResult<AccountDeletionReport> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(ServiceError::Domain(
                ValidationError::required("userId").into(),
            ));
        }
        // Job id ties the log lines of one deletion together across stages.
        let job_id = Uuid::new_v4();
        info!("[{}] Starting account deletion for {}", job_id, user_id);

        // COLLECTING — nothing has been mutated yet, so any failure here
        // aborts the whole job cleanly.
        let collector = ReferenceCollector::new(self.store.clone());
        let collected = collector
            .collect(user_id)
            .await
            .map_err(|e| stage_failure(DeletionStage::Collecting, &e))?;

        // EXTRACTING_ASSETS — pure traversal over the collected documents.
        let mut seen: HashSet<String> = HashSet::new();
        let mut asset_ids: Vec<String> = Vec::new();
        for doc in &collected.documents {
            for id in extract_asset_ids(doc) {
                if seen.insert(id.clone()) {
                    asset_ids.push(id);
                }
            }
        }

        // DELETING_ASSETS — best-effort; a failed chunk is logged, skipped
        // and must not block document deletion.
        let chunk_size = self
            .config
            .asset_delete_chunk
            .clamp(1, self.object_storage.bulk_limit());
        let mut deleted_assets = 0;
        for chunk in asset_ids.chunks(chunk_size) {
            match self.object_storage.delete_assets(chunk).await {
                Ok(deleted) => deleted_assets += deleted,
                Err(e) => warn!(
                    "[{}] Asset cleanup skipped {} ids for {}: {}",
                    job_id,
                    chunk.len(),
                    user_id,
                    e
                ),
            }
        }

        // DELETING_DOCUMENTS — fatal on failure. Already-committed chunks
        // stay applied; the retry re-collects the smaller remaining set.
        let writer = BatchedWriter::new(self.store.clone(), self.config.deletion_batch_limit);
        let outcome = writer
            .commit_all(collected.delete_ops())
            .await
            .map_err(|e| {
                error!("[{}] Document deletion for {} failed: {}", job_id, user_id, e);
                stage_failure(DeletionStage::DeletingDocuments, &e)
            })?;

        // RECALCULATING_RATINGS — independent per dirty user; failures are
        // logged and the job continues.
        let recalculator = RatingRecalculator::new(self.store.clone());
        for dirty in &collected.dirty_users {
            if let Err(e) = recalculator.recalculate(dirty).await {
                warn!("Rating recalculation for {} failed: {}", dirty, e);
            }
        }

        // DELETING_IDENTITY — "not found" is already success inside the
        // provider; anything else fails the job with the stage name.
        self.identity
            .delete_identity(user_id)
            .await
            .map_err(|e| stage_failure(DeletionStage::DeletingIdentity, &e))?;

        info!(
            "[{}] Account deletion for {} done: {} documents, {} assets",
            job_id, user_id, outcome.committed, deleted_assets
        );
        Ok(AccountDeletionReport {
            success: true,
            deleted_document_count: outcome.committed,
            deleted_asset_count: deleted_assets,
        })
    }
}

fn stage_failure(stage: DeletionStage, source: &dyn fmt::Display) -> ServiceError {
    ServiceError::AccountDeletion {
        stage: stage.to_string(),
        message: source.to_string(),
    }
}
