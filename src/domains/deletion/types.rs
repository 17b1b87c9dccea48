use crate::store::{DocRef, Document, WriteOp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Stages of the account-deletion pipeline, in execution order. A failed job
/// is reported with the stage it died in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionStage {
    Collecting,
    ExtractingAssets,
    DeletingAssets,
    DeletingDocuments,
    RecalculatingRatings,
    DeletingIdentity,
    Done,
}

impl DeletionStage {
    pub fn as_str(self) -> &'static str {
        match self {
            DeletionStage::Collecting => "COLLECTING",
            DeletionStage::ExtractingAssets => "EXTRACTING_ASSETS",
            DeletionStage::DeletingAssets => "DELETING_ASSETS",
            DeletionStage::DeletingDocuments => "DELETING_DOCUMENTS",
            DeletionStage::RecalculatingRatings => "RECALCULATING_RATINGS",
            DeletionStage::DeletingIdentity => "DELETING_IDENTITY",
            DeletionStage::Done => "DONE",
        }
    }
}

impl fmt::Display for DeletionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything discovered for one target user: the documents to delete
/// (deduplicated, including the user's own document) and the users whose
/// aggregate rating must be recomputed once those documents are gone.
#[derive(Debug, Default)]
pub struct CollectedReferences {
    pub documents: Vec<Document>,
    pub dirty_users: BTreeSet<String>,
}

impl CollectedReferences {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn refs(&self) -> Vec<DocRef> {
        self.documents.iter().map(Document::doc_ref).collect()
    }

    pub fn delete_ops(&self) -> Vec<WriteOp> {
        self.documents
            .iter()
            .map(|doc| WriteOp::Delete(doc.doc_ref()))
            .collect()
    }
}

/// Caller-facing result of a completed account deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDeletionReport {
    pub success: bool,
    pub deleted_document_count: usize,
    pub deleted_asset_count: usize,
}
