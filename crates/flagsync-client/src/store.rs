//! Current-configuration store
//!
//! Read-mostly shared reference consumed by the evaluation side. Snapshots
//! are swapped in atomically; concurrent readers either see the previous
//! complete snapshot or the new one, never a partial state. The explicit
//! empty initial state replaces scattered None-checks in consumers.

use arc_swap::ArcSwapOption;
use flagsync_core::Configuration;
use std::sync::Arc;

/// Atomic holder of the authoritative configuration snapshot
#[derive(Debug, Default)]
pub struct ConfigurationStore {
    current: ArcSwapOption<Configuration>,
}

impl ConfigurationStore {
    /// Create a store with no configuration yet
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot, if any cycle has succeeded so far
    #[must_use]
    pub fn current(&self) -> Option<Arc<Configuration>> {
        self.current.load_full()
    }

    /// Whether a snapshot has been applied
    #[must_use]
    pub fn has_configuration(&self) -> bool {
        self.current.load().is_some()
    }

    /// Atomically replace the snapshot
    ///
    /// Returns whether the new snapshot differs structurally from the one it
    /// replaces (always `true` for the first snapshot).
    pub fn swap(&self, configuration: Configuration) -> bool {
        let has_changes = match self.current.load().as_deref() {
            Some(previous) => *previous != configuration,
            None => true,
        };
        self.current.store(Some(Arc::new(configuration)));
        has_changes
    }
}
