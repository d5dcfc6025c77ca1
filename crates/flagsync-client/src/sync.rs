//! Fetch→parse→swap→notify orchestration
//!
//! Owns one synchronization cycle end to end. Cycles are triggered
//! externally (timer or on demand); at most one cycle is in flight at a
//! time, and a trigger arriving while one runs coalesces into a no-op. Per
//! cycle, subscribers observe exactly one terminal notification: a success
//! with the applied status, or the error already announced downstream.

use crate::fetch::{ConfigurationFetcher, FetchResult, FetchSource, Fetcher};
use crate::parser::ConfigurationParser;
use crate::roxy::RoxyFetcher;
use crate::settings::{SdkSettings, SyncSettings};
use crate::signature::SignatureVerifier;
use crate::store::ConfigurationStore;
use flagsync_core::{
    ConfigurationFetchedInvoker, ErrorReporter, FetcherStatus, PropertySource, SetupError,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Result of one `sync()` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A new snapshot was verified and swapped in
    Applied {
        /// Where the snapshot came from
        status: FetcherStatus,
        /// Whether it differs from the previous snapshot
        has_changes: bool,
    },
    /// The cycle failed; the previous snapshot (if any) stays authoritative
    Failed,
    /// Another cycle was already in flight; nothing was fetched
    Coalesced,
}

/// The configuration synchronization pipeline
pub struct ConfigurationSync {
    fetcher: Arc<dyn Fetcher>,
    parser: ConfigurationParser,
    store: Arc<ConfigurationStore>,
    invoker: Arc<ConfigurationFetchedInvoker>,
    sdk: SdkSettings,
    embedded_configuration: Option<String>,
    in_flight: Mutex<()>,
}

impl fmt::Debug for ConfigurationSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationSync")
            .field("fetcher", &self.fetcher)
            .field("has_configuration", &self.store.has_configuration())
            .finish()
    }
}

impl ConfigurationSync {
    /// Wire the pipeline from settings
    ///
    /// A configured Roxy URL selects the local proxy strategy; otherwise the
    /// CDN→API protocol is used with `verifier` authenticating payloads.
    ///
    /// # Errors
    /// - `SetupError` on invalid settings or HTTP client construction
    pub fn new(
        sdk: SdkSettings,
        settings: SyncSettings,
        properties: Arc<dyn PropertySource>,
        verifier: Arc<dyn SignatureVerifier>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, SetupError> {
        let invoker = Arc::new(ConfigurationFetchedInvoker::new(Arc::clone(&reporter)));

        let fetcher: Arc<dyn Fetcher> = if settings.roxy_url.is_some() {
            Arc::new(RoxyFetcher::new(
                sdk.clone(),
                &settings,
                Arc::clone(&properties),
                Arc::clone(&invoker),
            )?)
        } else {
            Arc::new(ConfigurationFetcher::new(
                sdk.clone(),
                settings.clone(),
                properties,
                Arc::clone(&invoker),
                reporter,
            )?)
        };

        Ok(Self::with_fetcher(
            sdk,
            fetcher,
            verifier,
            invoker,
            settings.embedded_configuration,
        ))
    }

    /// Wire the pipeline around a custom fetch strategy
    #[must_use]
    pub fn with_fetcher(
        sdk: SdkSettings,
        fetcher: Arc<dyn Fetcher>,
        verifier: Arc<dyn SignatureVerifier>,
        invoker: Arc<ConfigurationFetchedInvoker>,
        embedded_configuration: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            parser: ConfigurationParser::new(verifier, Arc::clone(&invoker)),
            store: Arc::new(ConfigurationStore::new()),
            invoker,
            sdk,
            embedded_configuration,
            in_flight: Mutex::new(()),
        }
    }

    /// The subscriber registration point
    #[must_use]
    pub fn invoker(&self) -> &Arc<ConfigurationFetchedInvoker> {
        &self.invoker
    }

    /// The shared snapshot store handed to the evaluation side
    #[must_use]
    pub fn store(&self) -> &Arc<ConfigurationStore> {
        &self.store
    }

    /// Run one fetch+parse+swap cycle
    ///
    /// Coalesces if a cycle is already in flight. On success the new
    /// snapshot replaces the previous one atomically and subscribers are
    /// notified with the source status and a has-changes diff; on failure
    /// the error notification was already emitted by the failing stage. A
    /// failing cycle with an embedded document configured and no snapshot
    /// applied yet falls back to applying the embedded document.
    pub async fn sync(&self) -> SyncOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("configuration sync already in flight, coalescing");
            return SyncOutcome::Coalesced;
        };

        let Some(fetch_result) = self.fetcher.fetch().await else {
            return self.fail_cycle();
        };

        let status = status_for(fetch_result.source);
        let Some(configuration) = self.parser.parse(&fetch_result, &self.sdk) else {
            return self.fail_cycle();
        };

        let signed_at = configuration.signed_at;
        let has_changes = self.store.swap(configuration);
        info!(?status, has_changes, "configuration applied");
        self.invoker.invoke(status, signed_at, has_changes);

        SyncOutcome::Applied {
            status,
            has_changes,
        }
    }

    /// Apply the embedded fallback document, if one is configured and no
    /// snapshot has been applied yet
    ///
    /// Runs automatically when a cycle fails; also callable up front to
    /// seed a snapshot before the first cycle. Embedded documents carry the
    /// same signed envelope as CDN output and go through full verification.
    /// Returns whether a snapshot was applied.
    pub fn apply_embedded(&self) -> bool {
        let Some(document) = self.embedded_configuration.as_ref() else {
            return false;
        };
        if self.store.has_configuration() {
            return false;
        }

        let fetch_result = FetchResult::embedded(document.clone());
        let Some(configuration) = self.parser.parse(&fetch_result, &self.sdk) else {
            return false;
        };

        let signed_at = configuration.signed_at;
        let has_changes = self.store.swap(configuration);
        info!("embedded configuration applied");
        self.invoker
            .invoke(FetcherStatus::AppliedFromEmbedded, signed_at, has_changes);
        true
    }

    fn fail_cycle(&self) -> SyncOutcome {
        if self.apply_embedded() {
            return SyncOutcome::Applied {
                status: FetcherStatus::AppliedFromEmbedded,
                has_changes: true,
            };
        }
        SyncOutcome::Failed
    }
}

fn status_for(source: FetchSource) -> FetcherStatus {
    match source {
        FetchSource::Cdn | FetchSource::Api => FetcherStatus::AppliedFromNetwork,
        FetchSource::Roxy => FetcherStatus::AppliedFromRoxy,
        FetchSource::Embedded => FetcherStatus::AppliedFromEmbedded,
    }
}
