//! Fetch outcome events and the in-process publish/subscribe hub
//!
//! Every fetch+parse cycle ends in exactly one terminal notification, built
//! either from a success triple (status, signed date, has-changes) or from a
//! single failure reason. Handlers observe them in registration order.

use crate::error::FetcherError;
use crate::reporting::ErrorReporter;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Terminal outcome of a fetch+parse cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetcherStatus {
    /// Snapshot applied from the embedded fallback document
    AppliedFromEmbedded,
    /// Snapshot applied from the CDN or API
    AppliedFromNetwork,
    /// Snapshot applied from the local development proxy
    AppliedFromRoxy,
    /// The cycle failed; the previous snapshot stays authoritative
    ErrorFetchedFailed,
}

/// Payload delivered to fetch-event subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationFetchedArgs {
    /// Terminal outcome of the cycle
    pub fetcher_status: FetcherStatus,
    /// Signed timestamp of the applied document, if any
    pub creation_date: Option<DateTime<Utc>>,
    /// Whether the applied snapshot differs from the previous one
    pub has_changes: bool,
    /// Failure reason, `NoError` on success
    pub error_details: FetcherError,
}

impl ConfigurationFetchedArgs {
    /// Build a success-style payload; `error_details` is always `NoError`
    #[must_use]
    pub fn from_status(
        fetcher_status: FetcherStatus,
        creation_date: Option<DateTime<Utc>>,
        has_changes: bool,
    ) -> Self {
        Self {
            fetcher_status,
            creation_date,
            has_changes,
            error_details: FetcherError::NoError,
        }
    }

    /// Build an error-style payload for a failed cycle
    #[must_use]
    pub fn from_error(error_details: FetcherError) -> Self {
        Self {
            fetcher_status: FetcherStatus::ErrorFetchedFailed,
            creation_date: None,
            has_changes: false,
            error_details,
        }
    }
}

/// Subscriber interface for fetch outcome notifications
pub trait ConfigurationFetchedHandler: Send + Sync {
    /// Called once per terminal fetch+parse outcome
    fn on_configuration_fetched(&self, args: &ConfigurationFetchedArgs);
}

impl<F> ConfigurationFetchedHandler for F
where
    F: Fn(&ConfigurationFetchedArgs) + Send + Sync,
{
    fn on_configuration_fetched(&self, args: &ConfigurationFetchedArgs) {
        self(args)
    }
}

/// Opaque registration handle, usable to unregister a handler later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// In-process hub fanning fetch outcomes out to registered handlers
///
/// Invoking with zero handlers is a no-op. A panicking handler is isolated:
/// the panic is caught, reported through the [`ErrorReporter`], and the
/// remaining handlers still run.
pub struct ConfigurationFetchedInvoker {
    handlers: RwLock<Vec<(HandlerId, Arc<dyn ConfigurationFetchedHandler>)>>,
    next_id: AtomicU64,
    reporter: Arc<dyn ErrorReporter>,
}

impl std::fmt::Debug for ConfigurationFetchedInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigurationFetchedInvoker")
            .field("handlers", &self.handlers.read().len())
            .finish()
    }
}

impl ConfigurationFetchedInvoker {
    /// Create a hub reporting handler failures through `reporter`
    #[must_use]
    pub fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(0),
            reporter,
        }
    }

    /// Register a handler; handlers run in registration order
    pub fn register_handler(&self, handler: Arc<dyn ConfigurationFetchedHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers.write().push((id, handler));
        id
    }

    /// Remove a previously registered handler; unknown ids are ignored
    pub fn unregister_handler(&self, id: HandlerId) {
        self.handlers.write().retain(|(hid, _)| *hid != id);
    }

    /// Number of currently registered handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Announce a successfully applied snapshot
    pub fn invoke(
        &self,
        fetcher_status: FetcherStatus,
        creation_date: Option<DateTime<Utc>>,
        has_changes: bool,
    ) {
        self.dispatch(&ConfigurationFetchedArgs::from_status(
            fetcher_status,
            creation_date,
            has_changes,
        ));
    }

    /// Announce a failed cycle
    pub fn invoke_error(&self, error_details: FetcherError) {
        self.dispatch(&ConfigurationFetchedArgs::from_error(error_details));
    }

    fn dispatch(&self, args: &ConfigurationFetchedArgs) {
        let handlers = self.handlers.read().clone();
        debug!(
            status = ?args.fetcher_status,
            error = %args.error_details,
            handlers = handlers.len(),
            "dispatching configuration fetched event"
        );
        for (id, handler) in handlers {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                handler.on_configuration_fetched(args);
            }));
            if let Err(panic) = outcome {
                let detail = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("<non-string panic>");
                self.reporter.report(
                    &format!("configuration fetched handler {id:?} panicked"),
                    detail,
                );
            }
        }
    }
}
