//! REST client for the unread message count endpoint.

use crate::{UnreadError, UnreadResult};
use async_trait::async_trait;
use inbox_config_and_utils::Config;
use inbox_storage::CredentialStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Path of the unread count endpoint, relative to the API base URL.
pub const UNREAD_COUNT_PATH: &str = "messages/unread-count";

/// Body returned by the unread count endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u32,
}

/// Source of the unread message count.
///
/// [`ApiClient`] is the production implementation; the provider only sees this trait.
#[async_trait]
pub trait UnreadCountFetcher: Send + Sync {
    /// Fetch the current unread count for the signed-in principal.
    async fn fetch_unread_count(&self) -> UnreadResult<UnreadCountResponse>;
}

/// HTTP client for the messages API.
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    base_url: String,
    credentials: Arc<CredentialStore>,
}

impl ApiClient {
    /// Create a new API client.
    ///
    /// # Arguments
    /// * `base_url` - API base URL (e.g., `https://api.example.com/api`)
    /// * `credentials` - Store the bearer token is read from on every request
    /// * `timeout` - Per-request timeout
    pub fn new(
        base_url: &str,
        credentials: Arc<CredentialStore>,
        timeout: Duration,
    ) -> UnreadResult<Self> {
        Url::parse(base_url)?;

        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// Create a client from the loaded configuration.
    pub fn from_config(config: &Config, credentials: Arc<CredentialStore>) -> UnreadResult<Self> {
        Self::new(
            &config.api_url,
            credentials,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn endpoint(&self, path: &str) -> UnreadResult<Url> {
        Ok(Url::parse(&format!("{}/{}", self.base_url, path))?)
    }

    /// `GET messages/unread-count` with the stored session token.
    pub async fn get_unread_message_count(&self) -> UnreadResult<UnreadCountResponse> {
        let token = self
            .credentials
            .session_token()?
            .ok_or(UnreadError::MissingCredential)?;
        let url = self.endpoint(UNREAD_COUNT_PATH)?;

        debug!(url = %url, "Requesting unread message count");

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, "Unread count request failed");
            return Err(UnreadError::Api { status, message });
        }

        let body = response.text().await?;
        let parsed: UnreadCountResponse = serde_json::from_str(&body)?;

        debug!(count = parsed.count, "Unread message count received");
        Ok(parsed)
    }
}

#[async_trait]
impl UnreadCountFetcher for ApiClient {
    async fn fetch_unread_count(&self) -> UnreadResult<UnreadCountResponse> {
        self.get_unread_message_count().await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
