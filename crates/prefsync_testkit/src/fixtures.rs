//! Service fixtures driven by a manual clock.

use chrono::{DateTime, TimeZone, Utc};
use prefsync_core::{
    ClearanceService, Clock, LogProfileStore, ManualClock, MemoryProfileStore, Profile, ProfileId,
    ProfileStore, ReconciliationService, SyncConfig,
};
use std::sync::Arc;
use tempfile::TempDir;

/// Instant every harness clock starts at.
pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 2, 3, 0, 0)
        .single()
        .expect("valid start time")
}

/// Reconciliation and clearance services sharing one store and one clock.
pub struct TestHarness {
    /// The reconciliation service.
    pub reconcile: ReconciliationService,
    /// The clearance service.
    pub clearance: ClearanceService,
    /// The shared store.
    pub store: Arc<dyn ProfileStore>,
    /// The shared clock, starting at [`start_time`].
    pub clock: Arc<ManualClock>,
    /// The configuration the services were built with.
    pub config: SyncConfig,
    _temp_dir: Option<TempDir>,
}

impl TestHarness {
    /// Creates a harness over an in-memory store with default configuration.
    pub fn memory() -> Self {
        Self::memory_with(SyncConfig::default())
    }

    /// Creates a harness over an in-memory store.
    pub fn memory_with(config: SyncConfig) -> Self {
        Self::build(config, Arc::new(MemoryProfileStore::new()), None)
    }

    /// Creates a harness over a log store in a temporary directory.
    pub fn file() -> Self {
        Self::file_with(SyncConfig::default())
    }

    /// Creates a harness over a log store in a temporary directory.
    pub fn file_with(config: SyncConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = LogProfileStore::open_dir(temp_dir.path()).expect("Failed to open log store");
        Self::build(config, Arc::new(store), Some(temp_dir))
    }

    fn build(config: SyncConfig, store: Arc<dyn ProfileStore>, temp_dir: Option<TempDir>) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let reconcile =
            ReconciliationService::new(config.clone(), Arc::clone(&store), clock.clone());
        let clearance = ClearanceService::new(&config, Arc::clone(&store), clock.clone());
        Self {
            reconcile,
            clearance,
            store,
            clock,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Reads a profile straight from the store, without counting as contact.
    pub fn stored(&self, id: &ProfileId) -> Option<Profile> {
        self.store
            .get(id)
            .expect("store read failed")
            .map(|stored| stored.profile)
    }

    /// Creates a profile and pushes `preferences` changed at the current time.
    pub fn seeded(&self, preferences: &str) -> ProfileId {
        let id = self
            .reconcile
            .create_profile(None)
            .expect("create failed")
            .id()
            .clone();
        self.reconcile
            .push_profile(&id, self.clock.now(), Some(preferences.to_owned()), false)
            .expect("seed push failed");
        id
    }
}
