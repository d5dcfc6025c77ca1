//! flagsync Client - configuration synchronization pipeline
//!
//! Periodically (trigger supplied by the caller) retrieves the signed
//! experimentation/flag configuration document, authenticates it, parses it
//! into an immutable [`flagsync_core::Configuration`] snapshot, swaps the
//! shared current-configuration reference atomically and announces the
//! outcome to registered subscribers.
//!
//! # Example
//!
//! ```rust,no_run
//! use flagsync_client::{ConfigurationSync, Ed25519Verifier, SdkSettings, SyncSettings};
//! use flagsync_core::{ConfigurationFetchedArgs, LogReporter, StaticPropertySource};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sdk = SdkSettings::new("5e579ecfc45c395c43b42893")?;
//! let settings = SyncSettings::new("buid-1");
//! let verifier = Ed25519Verifier::from_base64("hA3...base64-key...")?;
//!
//! let sync = ConfigurationSync::new(
//!     sdk,
//!     settings,
//!     Arc::new(StaticPropertySource::new("device-1")),
//!     Arc::new(verifier),
//!     Arc::new(LogReporter),
//! )?;
//!
//! sync.invoker().register_handler(Arc::new(|args: &ConfigurationFetchedArgs| {
//!     println!("fetched: {:?}", args.fetcher_status);
//! }));
//!
//! sync.sync().await;
//! let current = sync.store().current();
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod fetch;
pub mod parser;
pub mod roxy;
pub mod settings;
pub mod signature;
pub mod store;
pub mod sync;

// Re-exports for convenience
pub use fetch::{ConfigurationFetcher, FetchResult, FetchSource, Fetcher};
pub use parser::ConfigurationParser;
pub use roxy::RoxyFetcher;
pub use settings::{SdkSettings, SyncSettings};
pub use signature::{DisabledVerifier, Ed25519Verifier, SignatureVerifier};
pub use store::ConfigurationStore;
pub use sync::{ConfigurationSync, SyncOutcome};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
