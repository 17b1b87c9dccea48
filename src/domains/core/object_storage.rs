use crate::errors::{DomainError, DomainResult};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Trait for the externally hosted asset store.
#[async_trait]
pub trait ObjectStorageService: Send + Sync {
    /// Bulk-delete the given asset ids, returning how many were removed.
    /// Ids that no longer exist count as removed; deletion is idempotent.
    async fn delete_assets(&self, asset_ids: &[String]) -> DomainResult<usize>;

    /// Provider's own per-call bulk limit.
    fn bulk_limit(&self) -> usize {
        100
    }
}

#[derive(Debug, Serialize)]
struct BulkDeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct BulkDeleteResponse {
    deleted: usize,
}

/// Implementation of `ObjectStorageService` against the asset API server.
pub struct ApiObjectStorageService {
    client: Client,
    base_url: String,
    api_token: String,
}

impl ApiObjectStorageService {
    pub fn new(base_url: &str, api_token: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStorageService for ApiObjectStorageService {
    async fn delete_assets(&self, asset_ids: &[String]) -> DomainResult<usize> {
        if asset_ids.is_empty() {
            return Ok(0);
        }
        debug!("Bulk-deleting {} assets", asset_ids.len());

        let url = format!("{}/api/assets/bulk-delete", self.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&BulkDeleteRequest { ids: asset_ids })
            .send()
            .await
            .map_err(|e| DomainError::External(format!("Asset bulk delete failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(DomainError::External(format!(
                "Asset bulk delete returned status {}",
                response.status()
            )));
        }

        let body: BulkDeleteResponse = response
            .json()
            .await
            .map_err(|e| DomainError::External(format!("Invalid bulk delete response: {}", e)))?;
        Ok(body.deleted)
    }
}
