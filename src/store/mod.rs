pub mod records;
pub mod sqlite;

pub use sqlite::SqliteDocumentStore;

use crate::errors::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The collections tracked by this engine.
///
/// The store itself is schemaless; this closed set is what the product
/// actually writes and what the integrity passes know how to repair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Users,
    Items,
    Exchanges,
    ChatMessages,
    Notifications,
    Reports,
    Warnings,
    Drafts,
    Favorites,
    SupportTickets,
    Sessions,
    Reviews,
}

impl Collection {
    pub const ALL: [Collection; 12] = [
        Collection::Users,
        Collection::Items,
        Collection::Exchanges,
        Collection::ChatMessages,
        Collection::Notifications,
        Collection::Reports,
        Collection::Warnings,
        Collection::Drafts,
        Collection::Favorites,
        Collection::SupportTickets,
        Collection::Sessions,
        Collection::Reviews,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Items => "items",
            Collection::Exchanges => "exchanges",
            Collection::ChatMessages => "chat_messages",
            Collection::Notifications => "notifications",
            Collection::Reports => "reports",
            Collection::Warnings => "warnings",
            Collection::Drafts => "drafts",
            Collection::Favorites => "favorites",
            Collection::SupportTickets => "support_tickets",
            Collection::Sessions => "sessions",
            Collection::Reviews => "reviews",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a single document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: Collection,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document read back from the store. `updated_at` is the server-side
/// write timestamp, not a field of the JSON payload.
#[derive(Debug, Clone)]
pub struct Document {
    pub collection: Collection,
    pub id: String,
    pub data: Value,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn doc_ref(&self) -> DocRef {
        DocRef::new(self.collection, self.id.clone())
    }

    /// Read a top-level string field, if present and non-empty.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.data.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
    }
}

/// A single write operation for a batched commit.
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Delete a document. Deleting an absent document is a no-op.
    Delete(DocRef),
    /// Merge the given top-level fields into a document. Patching an absent
    /// document is a no-op; a `Value::Null` field value nulls the field out.
    Patch {
        target: DocRef,
        fields: serde_json::Map<String, Value>,
    },
}

impl WriteOp {
    pub fn target(&self) -> &DocRef {
        match self {
            WriteOp::Delete(target) => target,
            WriteOp::Patch { target, .. } => target,
        }
    }
}

/// Boundary to the schemaless document store.
///
/// No foreign keys, no cross-collection transactions: a single `commit` is
/// atomic, nothing larger is. Timestamps are generated server side on every
/// write.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by id.
    async fn get(&self, collection: Collection, id: &str) -> DomainResult<Option<Document>>;

    /// Check whether a document exists.
    async fn exists(&self, collection: Collection, id: &str) -> DomainResult<bool>;

    /// Equality-filtered query on a top-level field.
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &str,
    ) -> DomainResult<Vec<Document>>;

    /// Full, unfiltered collection scan in natural iteration order.
    async fn scan(&self, collection: Collection) -> DomainResult<Vec<Document>>;

    /// Create or replace a document.
    async fn insert(&self, collection: Collection, id: &str, data: Value) -> DomainResult<()>;

    /// Commit a batch of writes atomically. Fails without applying anything
    /// if the batch exceeds `max_commit_ops`.
    async fn commit(&self, ops: &[WriteOp]) -> DomainResult<()>;

    /// Hard upper bound on operations per commit.
    fn max_commit_ops(&self) -> usize {
        crate::config::STORE_COMMIT_LIMIT
    }
}
