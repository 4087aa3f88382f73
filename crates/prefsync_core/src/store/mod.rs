//! Profile persistence.
//!
//! The services only talk to [`ProfileStore`]. Two implementations ship:
//!
//! - [`MemoryProfileStore`] - indexed in-memory map
//! - [`LogProfileStore`] - durable, CBOR records in an append-only
//!   [`prefsync_storage::StorageBackend`] replayed into a memory index

mod log;
mod memory;
mod traits;

pub use log::{CompactionPolicy, CompactionStats, LogProfileStore};
pub use memory::MemoryProfileStore;
pub use traits::{ProfileStore, Revision, StoredProfile, UPDATE_ATTEMPTS};
