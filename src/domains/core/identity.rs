use crate::errors::{DomainError, DomainResult};
use async_trait::async_trait;
use log::{debug, info};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Trait for the authentication service holding the canonical login
/// identity, distinct from the user's profile document.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Remove the login identity for a user. An identity that is already
    /// gone is a success, so the call tolerates being issued twice or after
    /// manual removal.
    async fn delete_identity(&self, user_id: &str) -> DomainResult<()>;
}

/// Implementation of `IdentityProvider` against the identity API server.
pub struct ApiIdentityProvider {
    client: Client,
    base_url: String,
    api_token: String,
}

impl ApiIdentityProvider {
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
impl IdentityProvider for ApiIdentityProvider {
    async fn delete_identity(&self, user_id: &str) -> DomainResult<()> {
        let url = format!(
            "{}/api/identities/{}",
            self.base_url,
            urlencoding::encode(user_id)
        );
        debug!("Deleting identity for user {}", user_id);

        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| DomainError::External(format!("Identity delete failed: {}", e)))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => {
                // Already absent counts as deleted.
                info!("Identity for user {} was already removed", user_id);
                Ok(())
            }
            status => Err(DomainError::External(format!(
                "Identity delete returned status {}",
                status
            ))),
        }
    }
}
