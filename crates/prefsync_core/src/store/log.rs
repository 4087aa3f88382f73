//! Durable profile store on an append-only log.
//!
//! Every mutation is appended as one frame:
//!
//! ```text
//! +----------------+---------------------------+
//! | len: u32 (LE)  | CBOR-encoded LogRecord    |
//! +----------------+---------------------------+
//! ```
//!
//! Opening the store replays all frames into a [`MemoryProfileStore`] which
//! then answers every read. A frame cut short by a crash is dropped from the
//! log on open; a complete frame that does not decode is corruption.

use super::memory::MemoryProfileStore;
use super::traits::{check_revision, ProfileStore, Revision, StoredProfile};
use crate::error::{StoreError, StoreResult};
use crate::profile::{Profile, ProfileId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use prefsync_storage::{FileBackend, StorageBackend};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name of the log inside a data directory.
pub const LOG_FILE: &str = "profiles.log";

const FRAME_HEADER: usize = 4;

#[derive(Debug, Serialize, Deserialize)]
enum LogRecord {
    Put { profile: Profile, revision: Revision },
    Delete { id: ProfileId },
}

/// Result of [`LogProfileStore::compact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionStats {
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
    /// Profiles written to the compacted log.
    pub live_profiles: usize,
}

/// When a [`LogProfileStore`] compacts its log on its own.
///
/// Every contact refresh appends a record, so without compaction the log
/// grows with traffic rather than with the number of profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionPolicy {
    /// Compact once the log holds this many records per live profile.
    pub records_per_profile: usize,
    /// Never compact a log holding fewer records than this.
    pub min_records: usize,
}

impl CompactionPolicy {
    fn is_due(&self, records: usize, live: usize) -> bool {
        records >= self.min_records
            && records >= live.max(1).saturating_mul(self.records_per_profile)
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            records_per_profile: 8,
            min_records: 4096,
        }
    }
}

struct Log {
    backend: Box<dyn StorageBackend>,
    records: usize,
}

/// A durable profile store.
///
/// Writes go to the backend first and reach the in-memory index only after
/// the append succeeded, so the index never shows a write the log lost.
/// Every write holds the log lock from the revision check to the index
/// update, which serializes writers per store and therefore per id.
pub struct LogProfileStore {
    log: Mutex<Log>,
    index: MemoryProfileStore,
    sync_writes: bool,
    auto_compaction: Option<CompactionPolicy>,
}

impl LogProfileStore {
    /// Opens a store over `backend`, replaying its contents.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupted`] or [`StoreError::Codec`] if a complete
    /// record cannot be decoded, or a storage error if the backend fails.
    pub fn open(mut backend: Box<dyn StorageBackend>) -> StoreResult<Self> {
        let bytes = backend.read_all()?;
        let index = MemoryProfileStore::new();
        let (valid_len, records) = replay(&bytes, &index)?;

        if valid_len < bytes.len() {
            tracing::warn!(
                dropped = bytes.len() - valid_len,
                "discarding torn record at end of profile log"
            );
            backend.replace(&bytes[..valid_len])?;
        }

        tracing::debug!(
            records,
            profiles = index.len()?,
            "profile log replayed"
        );

        Ok(Self {
            log: Mutex::new(Log { backend, records }),
            index,
            sync_writes: true,
            auto_compaction: Some(CompactionPolicy::default()),
        })
    }

    /// Opens `<dir>/profiles.log`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the log is locked by another process, cannot be
    /// created, or does not replay.
    pub fn open_dir(dir: &Path) -> StoreResult<Self> {
        let backend = FileBackend::open_with_create_dirs(&dir.join(LOG_FILE))?;
        Self::open(Box::new(backend))
    }

    /// Sets whether every write is synced to durable storage (default: true).
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }

    /// Sets when the log compacts itself; `None` leaves compaction to
    /// [`LogProfileStore::compact`] alone.
    #[must_use]
    pub fn with_auto_compaction(mut self, policy: Option<CompactionPolicy>) -> Self {
        self.auto_compaction = policy;
        self
    }

    /// Rewrites the log so it holds exactly one record per live profile.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or the backend replace fails; the old log
    /// stays in place in that case.
    pub fn compact(&self) -> StoreResult<CompactionStats> {
        let mut log = self.log.lock();
        self.compact_locked(&mut log)
    }

    /// Returns the current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn log_size(&self) -> StoreResult<u64> {
        Ok(self.log.lock().backend.size()?)
    }

    fn compact_locked(&self, log: &mut Log) -> StoreResult<CompactionStats> {
        let bytes_before = log.backend.size()?;

        let live = self.index.list_all()?;
        let mut buf = Vec::new();
        for stored in &live {
            encode_frame(
                &LogRecord::Put {
                    profile: stored.profile.clone(),
                    revision: stored.revision,
                },
                &mut buf,
            )?;
        }
        log.backend.replace(&buf)?;
        log.records = live.len();

        let stats = CompactionStats {
            bytes_before,
            bytes_after: buf.len() as u64,
            live_profiles: live.len(),
        };
        tracing::info!(
            bytes_before = stats.bytes_before,
            bytes_after = stats.bytes_after,
            live = stats.live_profiles,
            "profile log compacted"
        );
        Ok(stats)
    }

    /// Compacts if the policy says so. The write that triggered it already
    /// succeeded, so a failure here is only logged.
    fn maybe_compact(&self, log: &mut Log) {
        let Some(policy) = self.auto_compaction else {
            return;
        };
        let live = match self.index.len() {
            Ok(live) => live,
            Err(e) => {
                tracing::warn!(error = %e, "cannot count profiles for compaction");
                return;
            }
        };
        if !policy.is_due(log.records, live) {
            return;
        }
        if let Err(e) = self.compact_locked(log) {
            tracing::warn!(error = %e, records = log.records, "automatic compaction failed");
        }
    }

    fn append(&self, log: &mut Log, record: &LogRecord) -> StoreResult<()> {
        let mut frame = Vec::new();
        encode_frame(record, &mut frame)?;
        log.backend.append(&frame)?;
        if self.sync_writes {
            log.backend.sync()?;
        } else {
            log.backend.flush()?;
        }
        log.records += 1;
        Ok(())
    }

    fn write_profile(&self, log: &mut Log, profile: Profile) -> StoreResult<StoredProfile> {
        // The revision is only taken once the record is in the log.
        let revision = self.index.next_revision();
        let record = LogRecord::Put {
            profile: profile.clone(),
            revision,
        };
        self.append(log, &record)?;

        let stored = StoredProfile { profile, revision };
        self.index.install(stored.clone());
        self.maybe_compact(log);
        Ok(stored)
    }

    fn remove_locked(&self, log: &mut Log, id: &ProfileId) -> StoreResult<bool> {
        self.append(log, &LogRecord::Delete { id: id.clone() })?;
        let removed = self.index.remove(id).is_some();
        self.maybe_compact(log);
        Ok(removed)
    }
}

impl ProfileStore for LogProfileStore {
    fn get(&self, id: &ProfileId) -> StoreResult<Option<StoredProfile>> {
        self.index.get(id)
    }

    fn exists(&self, id: &ProfileId) -> StoreResult<bool> {
        self.index.exists(id)
    }

    fn put(&self, profile: &Profile, expected: Option<Revision>) -> StoreResult<Revision> {
        let mut log = self.log.lock();
        check_revision(profile.id(), expected, self.index.revision_of(profile.id()))?;
        Ok(self.write_profile(&mut log, profile.clone())?.revision)
    }

    fn update(
        &self,
        id: &ProfileId,
        apply: &mut dyn FnMut(&mut Profile),
    ) -> StoreResult<Option<StoredProfile>> {
        let mut log = self.log.lock();
        let Some(current) = self.index.get(id)? else {
            return Ok(None);
        };

        let mut profile = current.profile.clone();
        apply(&mut profile);
        if profile == current.profile {
            return Ok(Some(current));
        }
        self.write_profile(&mut log, profile).map(Some)
    }

    fn delete(&self, id: &ProfileId) -> StoreResult<bool> {
        let mut log = self.log.lock();
        if !self.index.exists(id)? {
            return Ok(false);
        }
        self.remove_locked(&mut log, id)
    }

    fn delete_if_current(&self, id: &ProfileId, expected: Revision) -> StoreResult<bool> {
        let mut log = self.log.lock();
        let Some(actual) = self.index.revision_of(id) else {
            return Ok(false);
        };
        check_revision(id, Some(expected), Some(actual))?;
        self.remove_locked(&mut log, id)
    }

    fn list_all(&self) -> StoreResult<Vec<StoredProfile>> {
        self.index.list_all()
    }

    fn list_contact_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<StoredProfile>> {
        self.index.list_contact_before(cutoff)
    }

    fn list_tombstoned(&self) -> StoreResult<Vec<StoredProfile>> {
        self.index.list_tombstoned()
    }

    fn len(&self) -> StoreResult<usize> {
        self.index.len()
    }
}

fn encode_frame(record: &LogRecord, out: &mut Vec<u8>) -> StoreResult<()> {
    let mut payload = Vec::new();
    ciborium::into_writer(record, &mut payload).map_err(|e| StoreError::codec(e.to_string()))?;

    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::codec(format!("record too large: {} bytes", payload.len())))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&payload);
    Ok(())
}

/// Applies every complete frame in `bytes` to `index`.
///
/// Returns the length of the valid prefix and the number of records applied.
fn replay(bytes: &[u8], index: &MemoryProfileStore) -> StoreResult<(usize, usize)> {
    let mut offset = 0usize;
    let mut records = 0usize;

    while bytes.len() - offset >= FRAME_HEADER {
        let mut header = [0u8; FRAME_HEADER];
        header.copy_from_slice(&bytes[offset..offset + FRAME_HEADER]);
        let len = u32::from_le_bytes(header) as usize;

        let start = offset + FRAME_HEADER;
        let Some(end) = start.checked_add(len).filter(|end| *end <= bytes.len()) else {
            break;
        };

        let record: LogRecord = ciborium::from_reader(&bytes[start..end]).map_err(|e| {
            StoreError::Corrupted(format!("undecodable record at offset {offset}: {e}"))
        })?;
        match record {
            LogRecord::Put { profile, revision } => {
                index.install(StoredProfile { profile, revision })
            }
            LogRecord::Delete { id } => {
                index.remove(&id);
            }
        }

        records += 1;
        offset = end;
    }

    Ok((offset, records))
}
