use crate::errors::ValidationError;
use crate::store::DocRef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classes of integrity violation the scanner can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingKind {
    /// Item whose `postedBy` no longer resolves to a user.
    OrphanedItem,
    /// Exchange whose `ownerId` or `requesterId` no longer resolves.
    OrphanedExchange,
    /// Exchange whose `itemId` no longer resolves; repaired in place, never
    /// deleted, to preserve exchange history.
    DanglingItemReference,
    /// Item posting the same `(postedBy, lowercased title)` as an earlier one.
    DuplicateItem,
    /// Item or exchange whose `status` is outside the closed status set.
    InvalidStatus,
}

impl FindingKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::OrphanedItem => "orphaned-items",
            FindingKind::OrphanedExchange => "orphaned-exchanges",
            FindingKind::DanglingItemReference => "dangling-item-references",
            FindingKind::DuplicateItem => "duplicate-items",
            FindingKind::InvalidStatus => "invalid-statuses",
        }
    }
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One violation, pointing at the offending document.
#[derive(Debug, Clone, Serialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub target: DocRef,
    pub description: String,
}

impl Finding {
    pub fn new(kind: FindingKind, target: DocRef, description: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            description: description.into(),
        }
    }
}

/// Operations accepted by the consistency endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyOperation {
    CheckAll,
    FixOrphaned,
    CheckDuplicates,
    FixReferences,
}

impl ConsistencyOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            ConsistencyOperation::CheckAll => "check-all",
            ConsistencyOperation::FixOrphaned => "fix-orphaned",
            ConsistencyOperation::CheckDuplicates => "check-duplicates",
            ConsistencyOperation::FixReferences => "fix-references",
        }
    }
}

impl FromStr for ConsistencyOperation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "check-all" => Ok(ConsistencyOperation::CheckAll),
            "fix-orphaned" => Ok(ConsistencyOperation::FixOrphaned),
            "check-duplicates" => Ok(ConsistencyOperation::CheckDuplicates),
            "fix-references" => Ok(ConsistencyOperation::FixReferences),
            other => Err(ValidationError::unknown_operation(other)),
        }
    }
}

impl fmt::Display for ConsistencyOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-kind rollup in a consistency report.
#[derive(Debug, Clone, Serialize)]
pub struct IssueSummary {
    #[serde(rename = "type")]
    pub kind: FindingKind,
    pub count: usize,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixed: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_issues: usize,
    pub total_fixed: usize,
}

/// Caller-facing result of one consistency operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub operation: String,
    pub issues: Vec<IssueSummary>,
    pub summary: ReportSummary,
    pub duration_ms: u64,
}
