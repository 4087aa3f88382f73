//! Physical deletion of tombstoned and abandoned profiles.

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::error::{StoreError, SyncResult};
use crate::profile::{saturating_sub, ProfileId};
use crate::store::{ProfileStore, Revision};
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Why a profile was picked up by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reason {
    Tombstoned,
    Stale,
}

/// Outcome of one clearance sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// Profiles with last contact before this instant were eligible.
    pub cutoff: DateTime<Utc>,
    /// Eligible profiles found.
    pub candidates: usize,
    /// Profiles physically deleted.
    pub deleted: usize,
    /// Candidates left in place because they were written after being
    /// listed, typically by a client getting in touch.
    pub survived: usize,
    /// Profiles whose deletion failed; they are retried next sweep.
    pub failed: usize,
    /// True if the sweep did nothing because another one was running.
    pub skipped: bool,
}

/// Deletes tombstoned profiles and profiles out of contact for longer than
/// the retention window.
///
/// Stateless between runs: eligibility is derived from the stored profiles
/// each time, so an interrupted sweep is simply finished by the next one.
pub struct ClearanceService {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    retention: TimeDelta,
    running: Mutex<()>,
}

impl ClearanceService {
    /// Creates a clearance service over `store`.
    pub fn new(config: &SyncConfig, store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            retention: config.retention(),
            running: Mutex::new(()),
        }
    }

    /// Returns the retention window.
    pub fn retention(&self) -> TimeDelta {
        self.retention
    }

    /// Runs one sweep.
    ///
    /// A failed deletion is logged and counted; the sweep carries on with the
    /// next profile. Each candidate is deleted only at the revision it was
    /// listed at, so a profile contacted mid-sweep is kept and counted in
    /// [`SweepReport::survived`]. A sweep started while another is in flight returns at
    /// once with [`SweepReport::skipped`] set.
    ///
    /// # Errors
    ///
    /// Returns an error only if the candidate profiles cannot be listed.
    pub fn run_clearance_sweep(&self) -> SyncResult<SweepReport> {
        let started_at = self.clock.now();
        let cutoff = saturating_sub(started_at, self.retention);
        let mut report = SweepReport {
            started_at,
            cutoff,
            candidates: 0,
            deleted: 0,
            survived: 0,
            failed: 0,
            skipped: false,
        };

        let Some(_guard) = self.running.try_lock() else {
            tracing::warn!("clearance sweep already running, skipping");
            report.skipped = true;
            return Ok(report);
        };

        let mut candidates: BTreeMap<ProfileId, (Revision, Reason)> = BTreeMap::new();
        for stored in self.store.list_contact_before(cutoff)? {
            candidates.insert(stored.profile.id().clone(), (stored.revision, Reason::Stale));
        }
        for stored in self.store.list_tombstoned()? {
            candidates.insert(
                stored.profile.id().clone(),
                (stored.revision, Reason::Tombstoned),
            );
        }
        report.candidates = candidates.len();

        for (id, (revision, reason)) in candidates {
            match self.store.delete_if_current(&id, revision) {
                Ok(true) => {
                    tracing::debug!(%id, ?reason, "profile cleared");
                    report.deleted += 1;
                }
                Ok(false) => {
                    tracing::debug!(%id, "profile vanished before clearance");
                }
                Err(StoreError::RevisionConflict { .. }) => {
                    tracing::debug!(%id, ?reason, "profile written since listed, kept");
                    report.survived += 1;
                }
                Err(e) => {
                    tracing::warn!(%id, error = %e, "failed to clear profile");
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            %cutoff,
            candidates = report.candidates,
            deleted = report.deleted,
            survived = report.survived,
            failed = report.failed,
            "clearance sweep finished"
        );
        Ok(report)
    }
}
