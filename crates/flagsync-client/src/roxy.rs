//! Roxy fetch strategy
//!
//! Talks to a single configured local development proxy instead of the
//! CDN/API pair. Responses are plain configuration documents with no signed
//! envelope; the signature verifier is never consulted on this path.

use crate::fetch::{classify_transport_error, FetchResult, Fetcher};
use crate::settings::{SdkSettings, SyncSettings};
use async_trait::async_trait;
use flagsync_core::{ConfigurationFetchedInvoker, FetcherError, PropertySource, SetupError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fetcher for a local development proxy endpoint
pub struct RoxyFetcher {
    http: reqwest::Client,
    url: String,
    sdk: SdkSettings,
    buid: String,
    properties: Arc<dyn PropertySource>,
    invoker: Arc<ConfigurationFetchedInvoker>,
}

impl fmt::Debug for RoxyFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoxyFetcher").field("url", &self.url).finish()
    }
}

impl RoxyFetcher {
    /// Create a fetcher for `settings.roxy_url`
    ///
    /// # Errors
    /// - `SetupError::InvalidUrl` if no Roxy URL is configured
    /// - `SetupError::HttpClient` if the client cannot be built
    pub fn new(
        sdk: SdkSettings,
        settings: &SyncSettings,
        properties: Arc<dyn PropertySource>,
        invoker: Arc<ConfigurationFetchedInvoker>,
    ) -> Result<Self, SetupError> {
        let url = settings
            .roxy_url
            .clone()
            .ok_or_else(|| SetupError::InvalidUrl("no roxy url configured".to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| SetupError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            url,
            sdk,
            buid: settings.buid.clone(),
            properties,
            invoker,
        })
    }

    async fn try_fetch(&self) -> Result<FetchResult, FetcherError> {
        let mut query: Vec<(String, String)> =
            self.properties.all_properties().into_iter().collect();
        query.sort();
        query.push(("app_key".to_string(), self.sdk.api_key.clone()));
        query.push(("buid".to_string(), self.buid.clone()));
        query.push(("distinct_id".to_string(), self.properties.distinct_id()));
        if let Some(secret) = &self.sdk.dev_mode_secret {
            query.push(("devModeSecret".to_string(), secret.clone()));
        }

        debug!(url = %self.url, "fetching configuration from roxy");
        let response = self
            .http
            .get(&self.url)
            .query(&query)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "roxy returned unexpected status");
            return Err(FetcherError::NetworkError);
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        Ok(FetchResult::roxy(body))
    }
}

#[async_trait]
impl Fetcher for RoxyFetcher {
    async fn fetch(&self) -> Option<FetchResult> {
        match self.try_fetch().await {
            Ok(result) => Some(result),
            Err(error) => {
                warn!(%error, "roxy fetch failed");
                self.invoker.invoke_error(error);
                None
            }
        }
    }
}
