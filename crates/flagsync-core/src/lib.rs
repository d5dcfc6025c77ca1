//! flagsync Core - configuration model and fetch-event plumbing
//!
//! The network-free half of the flagsync SDK:
//! - Immutable configuration snapshot model (experiments, target groups)
//! - Typed custom/device property value system
//! - Fetch outcome taxonomy and the publish/subscribe invoker
//! - Error reporting seam for diagnostics
//!
//! # Example
//!
//! ```rust
//! use flagsync_core::{
//!     ConfigurationFetchedArgs, ConfigurationFetchedInvoker, FetcherError, LogReporter,
//! };
//! use std::sync::Arc;
//!
//! let invoker = ConfigurationFetchedInvoker::new(Arc::new(LogReporter));
//! invoker.register_handler(Arc::new(|args: &ConfigurationFetchedArgs| {
//!     println!("fetch finished: {:?}", args.fetcher_status);
//! }));
//! invoker.invoke_error(FetcherError::NetworkError);
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

pub mod error;
pub mod events;
pub mod model;
pub mod properties;
pub mod reporting;

// Re-exports for convenience
pub use error::{FetcherError, SetupError};
pub use events::{
    ConfigurationFetchedArgs, ConfigurationFetchedHandler, ConfigurationFetchedInvoker,
    FetcherStatus, HandlerId,
};
pub use model::{Configuration, Experiment, TargetGroup};
pub use properties::{
    CustomProperty, DeviceProperty, PropertyContext, PropertySource, PropertyType, PropertyValue,
    StaticPropertySource, DEVICE_PROPERTY_PREFIX,
};
pub use reporting::{ErrorReporter, LogReporter, NoopReporter};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
