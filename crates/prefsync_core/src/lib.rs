//! # prefsync core
//!
//! Reconciles small opaque preference documents ("profiles") that many
//! intermittently connected clients keep local copies of.
//!
//! This crate provides:
//! - [`Profile`] and [`ProfileId`], the unit of synchronization
//! - [`IdService`] for generating and validating profile identifiers
//! - [`ProfileStore`] with an in-memory and a log-structured implementation
//! - [`ReconciliationService`]: create, pull, push, tombstone and list
//! - [`ClearanceService`]: the periodic sweep that physically deletes
//!   tombstoned and long-unused profiles
//!
//! ## Conflict rule
//!
//! Every comparison uses a fixed margin (5 minutes by default). A push wins
//! only if the client's change is newer than the stored one by more than the
//! margin; a pull returns the stored copy only if it is newer than the
//! client's by more than the margin. Anything in between keeps the server copy
//! and leaves the client's copy alone.
//!
//! ## Example
//!
//! ```rust
//! use prefsync_core::{MemoryProfileStore, ReconciliationService, SyncConfig, SystemClock};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryProfileStore::new());
//! let service = ReconciliationService::new(SyncConfig::default(), store, Arc::new(SystemClock));
//!
//! let profile = service.create_profile(None).unwrap();
//! assert!(!profile.is_tombstoned());
//! assert_eq!(profile.id().as_str().len(), 16);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod clearance;
mod clock;
mod config;
mod error;
mod id;
mod profile;
mod reconcile;
pub mod store;

pub use clearance::{ClearanceService, SweepReport};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{IdShape, SyncConfig, TombstonePayload};
pub use error::{ConfigError, StoreError, StoreResult, SyncError, SyncResult};
pub use id::IdService;
pub use profile::{Profile, ProfileId, NEVER_CHANGED};
pub use reconcile::ReconciliationService;
pub use store::{
    CompactionPolicy, CompactionStats, LogProfileStore, MemoryProfileStore, ProfileStore,
    Revision, StoredProfile,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
