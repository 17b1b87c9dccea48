use crate::domains::deletion::types::CollectedReferences;
use crate::errors::{DomainError, DomainResult};
use crate::store::records::{decode, ReviewRecord};
use crate::store::{Collection, DocRef, DocumentStore};
use log::{debug, warn};
use std::collections::HashSet;
use std::sync::Arc;

/// Every `(collection, field)` pair that can hold a user id. This table is
/// the reference graph the store cannot express; account deletion traverses
/// it in full.
pub const USER_REFERENCE_FIELDS: &[(Collection, &str)] = &[
    (Collection::Items, "postedBy"),
    (Collection::Exchanges, "ownerId"),
    (Collection::Exchanges, "requesterId"),
    (Collection::ChatMessages, "senderId"),
    (Collection::Notifications, "userId"),
    (Collection::Reports, "reporterId"),
    (Collection::Reports, "targetId"),
    (Collection::Reports, "reportedUserId"),
    (Collection::Warnings, "userId"),
    (Collection::Drafts, "userId"),
    (Collection::Favorites, "userId"),
    (Collection::SupportTickets, "userId"),
    (Collection::Sessions, "userId"),
    (Collection::Reviews, "reviewerId"),
    (Collection::Reviews, "targetUserId"),
];

/// Discovers every document referencing a target user across all tracked
/// collections.
///
/// Fail-closed: the first failing query aborts the whole pass, so no partial
/// reference list is ever handed to the writer.
pub struct ReferenceCollector {
    store: Arc<dyn DocumentStore>,
}

impl ReferenceCollector {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn collect(&self, user_id: &str) -> DomainResult<CollectedReferences> {
        let mut collected = CollectedReferences::default();
        let mut visited: HashSet<DocRef> = HashSet::new();

        // The user's own profile document leads the deletion list.
        if let Some(user_doc) = self.store.get(Collection::Users, user_id).await? {
            visited.insert(user_doc.doc_ref());
            collected.documents.push(user_doc);
        }

        for &(collection, field) in USER_REFERENCE_FIELDS {
            let matches = self
                .store
                .query_eq(collection, field, user_id)
                .await
                .map_err(|e| DomainError::Scan {
                    collection: collection.to_string(),
                    message: format!("query on {} failed: {}", field, e),
                })?;

            for doc in matches {
                // Reviews the target wrote dirty the users who received them:
                // those aggregates must be recomputed after the delete.
                if collection == Collection::Reviews && field == "reviewerId" {
                    match decode::<ReviewRecord>(&doc) {
                        Ok(review) => {
                            if review.target_user_id != user_id {
                                collected.dirty_users.insert(review.target_user_id);
                            }
                        }
                        Err(e) => warn!("Skipping rating bookkeeping for {}: {}", doc.doc_ref(), e),
                    }
                }

                // A report can match by reporter, target and reported user at
                // once; the visited set keeps it queued exactly once.
                if visited.insert(doc.doc_ref()) {
                    collected.documents.push(doc);
                }
            }
        }

        debug!(
            "Collected {} documents and {} dirty users for {}",
            collected.len(),
            collected.dirty_users.len(),
            user_id
        );
        Ok(collected)
    }
}
