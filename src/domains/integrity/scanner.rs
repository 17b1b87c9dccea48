use crate::domains::core::ExistenceCache;
use crate::domains::integrity::types::{Finding, FindingKind};
use crate::errors::{DomainError, DomainResult};
use crate::store::records::{
    decode, ExchangeRecord, ItemRecord, EXCHANGE_STATUSES, ITEM_STATUSES,
};
use crate::store::{Collection, Document, DocumentStore};
use futures::stream::{self, StreamExt, TryStreamExt};
use log::warn;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Read-only full-collection scans for integrity violations. Findings are
/// detection only; repair is the `ConsistencyRepairer`'s job.
///
/// There is no incremental mode: every operation walks the whole collection
/// in the store's natural iteration order. Documents that fail to decode are
/// logged and skipped rather than flagged, so a schema hiccup never feeds
/// the repairer.
pub struct ConsistencyScanner {
    store: Arc<dyn DocumentStore>,
    fanout: usize,
}

impl ConsistencyScanner {
    pub fn new(store: Arc<dyn DocumentStore>, fanout: usize) -> Self {
        Self {
            store,
            fanout: fanout.max(1),
        }
    }

    async fn scan(&self, collection: Collection) -> DomainResult<Vec<Document>> {
        self.store
            .scan(collection)
            .await
            .map_err(|e| DomainError::Scan {
                collection: collection.to_string(),
                message: e.to_string(),
            })
    }

    /// Resolve existence for a set of user/item ids with bounded fan-out,
    /// memoized through the pass-scoped cache.
    async fn resolve_existence(
        &self,
        cache: &ExistenceCache,
        collection: Collection,
        ids: HashSet<String>,
    ) -> DomainResult<HashMap<String, bool>> {
        stream::iter(ids.into_iter().map(|id| async move {
            let exists = cache.exists(collection, &id).await?;
            Ok::<_, DomainError>((id, exists))
        }))
        .buffer_unordered(self.fanout)
        .try_collect()
        .await
    }

    /// Items whose `postedBy` no longer resolves to a user document.
    pub async fn orphaned_items(&self, cache: &ExistenceCache) -> DomainResult<Vec<Finding>> {
        let items = self.scan(Collection::Items).await?;

        let mut decoded: Vec<(Document, ItemRecord)> = Vec::with_capacity(items.len());
        let mut owners: HashSet<String> = HashSet::new();
        for doc in items {
            match decode::<ItemRecord>(&doc) {
                Ok(item) => {
                    owners.insert(item.posted_by.clone());
                    decoded.push((doc, item));
                }
                Err(e) => warn!("Skipping undecodable item: {}", e),
            }
        }
        let exists = self
            .resolve_existence(cache, Collection::Users, owners)
            .await?;

        let mut findings = Vec::new();
        for (doc, item) in decoded {
            if !exists.get(&item.posted_by).copied().unwrap_or(false) {
                findings.push(Finding::new(
                    FindingKind::OrphanedItem,
                    doc.doc_ref(),
                    format!("Item posted by missing user {}", item.posted_by),
                ));
            }
        }
        Ok(findings)
    }

    /// Exchanges with unresolved participants, plus exchanges whose `itemId`
    /// dangles. The latter get their own finding kind so repair patches the
    /// pointer instead of deleting history.
    pub async fn orphaned_exchanges(&self, cache: &ExistenceCache) -> DomainResult<Vec<Finding>> {
        let exchanges = self.scan(Collection::Exchanges).await?;

        let mut decoded: Vec<(Document, ExchangeRecord)> = Vec::with_capacity(exchanges.len());
        let mut users: HashSet<String> = HashSet::new();
        let mut items: HashSet<String> = HashSet::new();
        for doc in exchanges {
            match decode::<ExchangeRecord>(&doc) {
                Ok(exchange) => {
                    users.insert(exchange.owner_id.clone());
                    users.insert(exchange.requester_id.clone());
                    if let Some(item_id) = &exchange.item_id {
                        items.insert(item_id.clone());
                    }
                    decoded.push((doc, exchange));
                }
                Err(e) => warn!("Skipping undecodable exchange: {}", e),
            }
        }
        let users_exist = self
            .resolve_existence(cache, Collection::Users, users)
            .await?;
        let items_exist = self
            .resolve_existence(cache, Collection::Items, items)
            .await?;

        let mut findings = Vec::new();
        for (doc, exchange) in decoded {
            let mut missing_users = Vec::new();
            for user in [&exchange.owner_id, &exchange.requester_id] {
                if !users_exist.get(user.as_str()).copied().unwrap_or(false) {
                    missing_users.push(user.clone());
                }
            }
            if !missing_users.is_empty() {
                findings.push(Finding::new(
                    FindingKind::OrphanedExchange,
                    doc.doc_ref(),
                    format!("Exchange references missing users: {}", missing_users.join(", ")),
                ));
                continue;
            }
            if let Some(item_id) = &exchange.item_id {
                if !items_exist.get(item_id.as_str()).copied().unwrap_or(false) {
                    findings.push(Finding::new(
                        FindingKind::DanglingItemReference,
                        doc.doc_ref(),
                        format!("Exchange references missing item {}", item_id),
                    ));
                }
            }
        }
        Ok(findings)
    }

    /// Items posting the same `(postedBy, lowercased title)`: every group
    /// member after the first is flagged, first-seen in scan order wins.
    pub async fn duplicate_items(&self) -> DomainResult<Vec<Finding>> {
        let items = self.scan(Collection::Items).await?;

        let mut seen: HashMap<(String, String), String> = HashMap::new();
        let mut findings = Vec::new();
        for doc in items {
            let item = match decode::<ItemRecord>(&doc) {
                Ok(item) => item,
                Err(e) => {
                    warn!("Skipping undecodable item: {}", e);
                    continue;
                }
            };
            let title = item.title.trim().to_lowercase();
            if title.is_empty() {
                continue;
            }
            let key = (item.posted_by.clone(), title);
            match seen.get(&key) {
                Some(original) => findings.push(Finding::new(
                    FindingKind::DuplicateItem,
                    doc.doc_ref(),
                    format!("Duplicate of item {} (same poster and title)", original),
                )),
                None => {
                    seen.insert(key, doc.id.clone());
                }
            }
        }
        Ok(findings)
    }

    /// Items and exchanges whose `status` is missing or outside the closed
    /// status sets.
    pub async fn invalid_statuses(&self) -> DomainResult<Vec<Finding>> {
        let mut findings = Vec::new();

        for doc in self.scan(Collection::Items).await? {
            let status = doc.str_field("status");
            if !status.is_some_and(|s| ITEM_STATUSES.contains(&s)) {
                findings.push(Finding::new(
                    FindingKind::InvalidStatus,
                    doc.doc_ref(),
                    format!("Item status {:?} is not a known status", status.unwrap_or("")),
                ));
            }
        }
        for doc in self.scan(Collection::Exchanges).await? {
            let status = doc.str_field("status");
            if !status.is_some_and(|s| EXCHANGE_STATUSES.contains(&s)) {
                findings.push(Finding::new(
                    FindingKind::InvalidStatus,
                    doc.doc_ref(),
                    format!(
                        "Exchange status {:?} is not a known status",
                        status.unwrap_or("")
                    ),
                ));
            }
        }
        Ok(findings)
    }

    /// Run every scan, in a fixed order, against one shared cache.
    pub async fn check_all(&self, cache: &ExistenceCache) -> DomainResult<Vec<Finding>> {
        let mut findings = self.orphaned_items(cache).await?;
        findings.extend(self.orphaned_exchanges(cache).await?);
        findings.extend(self.duplicate_items().await?);
        findings.extend(self.invalid_statuses().await?);
        Ok(findings)
    }
}
