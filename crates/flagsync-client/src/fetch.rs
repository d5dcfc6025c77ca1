//! Configuration fetch protocol: CDN with API fallback
//!
//! One fetch attempt resolves the request property map, tries the static
//! CDN path first and falls back to the dynamic API endpoint when the CDN
//! answers forbidden/not-found (by HTTP status or the embedded not-found
//! marker) or is unreachable. Terminal failures are announced through the
//! invoker exactly once; success announcements belong to the caller that
//! completes the parse+swap sequence.
//!
//! Wire protocol:
//! - CDN: `GET {cdn_base}/{api_key}/{buid}?distinct_id={id}`
//! - API: `POST {api_base}/{api_key}/{buid}` with the full resolved
//!   property map as a JSON object body

use crate::settings::{SdkSettings, SyncSettings};
use async_trait::async_trait;
use flagsync_core::{
    ConfigurationFetchedInvoker, ErrorReporter, FetcherError, PropertySource,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which source answered a fetch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchSource {
    /// Static, cacheable configuration endpoint
    Cdn,
    /// Dynamic fallback endpoint
    Api,
    /// Local development proxy
    Roxy,
    /// Compiled-in fallback document
    Embedded,
}

impl fmt::Display for FetchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cdn => write!(f, "CDN"),
            Self::Api => write!(f, "API"),
            Self::Roxy => write!(f, "Roxy"),
            Self::Embedded => write!(f, "Embedded"),
        }
    }
}

/// Raw outcome of a successful fetch attempt
///
/// Created once per attempt, consumed exactly once by the parser.
#[derive(Debug, Clone)]
pub struct FetchResult {
    /// Which source answered
    pub source: FetchSource,
    /// HTTP status, absent for Roxy/Embedded provenance
    pub status_code: Option<u16>,
    /// Payload as received
    pub body: String,
}

impl FetchResult {
    /// Result of a network (CDN/API) attempt
    #[must_use]
    pub fn network(source: FetchSource, status_code: u16, body: String) -> Self {
        Self {
            source,
            status_code: Some(status_code),
            body,
        }
    }

    /// Result of a Roxy attempt
    #[must_use]
    pub fn roxy(body: String) -> Self {
        Self {
            source: FetchSource::Roxy,
            status_code: None,
            body,
        }
    }

    /// Result wrapping the embedded fallback document
    #[must_use]
    pub fn embedded(body: String) -> Self {
        Self {
            source: FetchSource::Embedded,
            status_code: None,
            body,
        }
    }
}

/// Fetch strategy seam: network CDN/API protocol or the Roxy proxy
#[async_trait]
pub trait Fetcher: Send + Sync + fmt::Debug {
    /// Run one fetch attempt
    ///
    /// Returns `None` on terminal failure, after announcing it through the
    /// invoker; never propagates transport errors.
    async fn fetch(&self) -> Option<FetchResult>;
}

/// CDN-then-API configuration fetcher
pub struct ConfigurationFetcher {
    http: reqwest::Client,
    sdk: SdkSettings,
    settings: SyncSettings,
    properties: Arc<dyn PropertySource>,
    invoker: Arc<ConfigurationFetchedInvoker>,
    reporter: Arc<dyn ErrorReporter>,
}

impl fmt::Debug for ConfigurationFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationFetcher")
            .field("cdn_base", &self.settings.cdn_base)
            .field("api_base", &self.settings.api_base)
            .finish()
    }
}

/// Outcome of the CDN attempt, before any fallback decision
enum CdnOutcome {
    Success(FetchResult),
    /// Forbidden/not-found/unreachable; the API attempt should run
    Fallback(FetcherError),
}

impl ConfigurationFetcher {
    /// Create a fetcher; the HTTP client is bounded by `settings.timeout`
    ///
    /// # Errors
    /// - `SetupError::HttpClient` if the client cannot be built
    pub fn new(
        sdk: SdkSettings,
        settings: SyncSettings,
        properties: Arc<dyn PropertySource>,
        invoker: Arc<ConfigurationFetchedInvoker>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, flagsync_core::SetupError> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| flagsync_core::SetupError::HttpClient(e.to_string()))?;
        Ok(Self {
            http,
            sdk,
            settings,
            properties,
            invoker,
            reporter,
        })
    }

    /// Full resolved property map embedded into request parameters
    fn request_properties(&self) -> HashMap<String, String> {
        let mut properties = self.properties.all_properties();
        properties.insert("app_key".to_string(), self.sdk.api_key.clone());
        properties.insert("buid".to_string(), self.settings.buid.clone());
        properties.insert("distinct_id".to_string(), self.properties.distinct_id());
        if let Some(secret) = &self.sdk.dev_mode_secret {
            properties.insert("devModeSecret".to_string(), secret.clone());
        }
        properties
    }

    fn path_url(&self, base: &str) -> String {
        format!("{}/{}/{}", base, self.sdk.api_key, self.settings.buid)
    }

    async fn fetch_from_cdn(&self) -> Result<CdnOutcome, FetcherError> {
        let url = self.path_url(&self.settings.cdn_base);
        debug!(%url, "fetching configuration from CDN");

        let response = match self
            .http
            .get(&url)
            .query(&[("distinct_id", self.properties.distinct_id())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "CDN request failed, falling back to API");
                return Ok(CdnOutcome::Fallback(classify_transport_error(&e)));
            }
        };

        let status = response.status();
        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::NOT_FOUND
        {
            return Ok(CdnOutcome::Fallback(FetcherError::NetworkError));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), "CDN returned unexpected status");
            return Err(FetcherError::NetworkError);
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "CDN body read failed, falling back to API");
                return Ok(CdnOutcome::Fallback(classify_transport_error(&e)));
            }
        };

        // The CDN can answer 200 with a stale-path marker instead of an
        // HTTP 404; that marker triggers the same fallback.
        if has_not_found_marker(&body) {
            return Ok(CdnOutcome::Fallback(FetcherError::NetworkError));
        }

        Ok(CdnOutcome::Success(FetchResult::network(
            FetchSource::Cdn,
            status.as_u16(),
            body,
        )))
    }

    async fn fetch_from_api(
        &self,
        properties: &HashMap<String, String>,
    ) -> Result<FetchResult, FetcherError> {
        let url = self.path_url(&self.settings.api_base);
        debug!(%url, "fetching configuration from API");

        let response = self
            .http
            .post(&url)
            .json(properties)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "API returned unexpected status");
            return Err(FetcherError::NetworkError);
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        Ok(FetchResult::network(
            FetchSource::Api,
            status.as_u16(),
            body,
        ))
    }

    async fn try_fetch(&self) -> Result<FetchResult, FetcherError> {
        let properties = self.request_properties();

        match self.fetch_from_cdn().await? {
            CdnOutcome::Success(result) => Ok(result),
            CdnOutcome::Fallback(reason) => {
                // Non-terminal: surfaced as a diagnostic only, the handler
                // contract stays at one terminal notification per cycle.
                self.reporter.report(
                    "CDN attempt failed, retrying against API",
                    &reason.to_string(),
                );
                self.fetch_from_api(&properties).await
            }
        }
    }
}

#[async_trait]
impl Fetcher for ConfigurationFetcher {
    async fn fetch(&self) -> Option<FetchResult> {
        match self.try_fetch().await {
            Ok(result) => {
                debug!(source = %result.source, "configuration fetched");
                Some(result)
            }
            Err(error) => {
                warn!(%error, "configuration fetch failed");
                self.invoker.invoke_error(error);
                None
            }
        }
    }
}

/// Map a transport error onto the fetch taxonomy
pub(crate) fn classify_transport_error(error: &reqwest::Error) -> FetcherError {
    if error.is_builder() {
        FetcherError::Unknown
    } else {
        FetcherError::NetworkError
    }
}

/// Whether the body carries the service's internal not-found marker,
/// distinct from the HTTP status (`{"result": 404}`)
pub(crate) fn has_not_found_marker(body: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| value.get("result").and_then(serde_json::Value::as_i64))
        == Some(404)
}
