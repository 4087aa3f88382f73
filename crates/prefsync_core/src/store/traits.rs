//! The profile store contract.

use crate::error::{StoreError, StoreResult};
use crate::profile::{Profile, ProfileId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque token identifying one stored version of a profile.
///
/// Returned next to every profile a store hands out and passed back on
/// write, so a store can refuse a write based on a stale read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Revision(u64);

impl Revision {
    /// Creates a revision from its raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A profile as read from a store, with its revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredProfile {
    /// The profile.
    pub profile: Profile,
    /// The revision the store holds it at.
    pub revision: Revision,
}

/// How often the default [`ProfileStore::update`] re-reads a profile whose
/// revision moved under it before giving up.
pub const UPDATE_ATTEMPTS: usize = 16;

/// Key-value persistence for profiles, keyed by [`ProfileId`].
///
/// Stores serialize writes to the same key; nothing more is required from
/// them. `put` is conditional on the revision the caller read, which is how a
/// create refuses to overwrite an existing profile. Read-modify-write goes
/// through [`ProfileStore::update`], so concurrent requests on one profile
/// are applied one after the other instead of failing each other.
///
/// # Implementors
///
/// - [`super::MemoryProfileStore`]
/// - [`super::LogProfileStore`]
pub trait ProfileStore: Send + Sync {
    /// Looks up a profile.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn get(&self, id: &ProfileId) -> StoreResult<Option<StoredProfile>>;

    /// Returns true if a profile with `id` exists.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn exists(&self, id: &ProfileId) -> StoreResult<bool> {
        Ok(self.get(id)?.is_some())
    }

    /// Writes `profile`.
    ///
    /// `expected` is `None` to insert a profile that must not exist yet, or
    /// the revision last read to overwrite exactly that version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RevisionConflict`] if the stored revision is not
    /// `expected`.
    fn put(&self, profile: &Profile, expected: Option<Revision>) -> StoreResult<Revision>;

    /// Applies `apply` to the current version of a profile and writes the
    /// result, as one step with respect to other writers of the same id.
    ///
    /// Returns the profile as stored afterwards, or `None` if no profile has
    /// this id. Nothing is written when `apply` leaves the profile unchanged.
    /// `apply` may run more than once and must decide from the profile it is
    /// given each time.
    ///
    /// The default re-reads and retries on a revision conflict, up to
    /// [`UPDATE_ATTEMPTS`] times; the bundled stores apply the change under
    /// their write lock and never conflict.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RevisionConflict`] if the default implementation
    /// lost every attempt, or an error if the store itself fails.
    fn update(
        &self,
        id: &ProfileId,
        apply: &mut dyn FnMut(&mut Profile),
    ) -> StoreResult<Option<StoredProfile>> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let Some(current) = self.get(id)? else {
                return Ok(None);
            };
            let mut profile = current.profile.clone();
            apply(&mut profile);
            if profile == current.profile {
                return Ok(Some(current));
            }

            match self.put(&profile, Some(current.revision)) {
                Ok(revision) => return Ok(Some(StoredProfile { profile, revision })),
                Err(StoreError::RevisionConflict { .. }) if attempt < UPDATE_ATTEMPTS => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Physically removes a profile. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn delete(&self, id: &ProfileId) -> StoreResult<bool>;

    /// Removes a profile only if it is still at `expected`.
    ///
    /// Returns false if the profile no longer exists. The default checks and
    /// deletes in two steps; the bundled stores do both under one lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RevisionConflict`] if the profile was written
    /// since `expected` was read.
    fn delete_if_current(&self, id: &ProfileId, expected: Revision) -> StoreResult<bool> {
        match self.get(id)? {
            None => Ok(false),
            Some(current) => {
                check_revision(id, Some(expected), Some(current.revision))?;
                self.delete(id)
            }
        }
    }

    /// Returns every profile, ordered by id ascending.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn list_all(&self) -> StoreResult<Vec<StoredProfile>>;

    /// Returns every profile whose last contact is strictly before `cutoff`.
    ///
    /// The default scans [`ProfileStore::list_all`]; stores with an index on
    /// last contact should override it.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn list_contact_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<StoredProfile>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|stored| stored.profile.last_contact() < cutoff)
            .collect())
    }

    /// Returns every tombstoned profile, ordered by id ascending.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn list_tombstoned(&self) -> StoreResult<Vec<StoredProfile>> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|stored| stored.profile.is_tombstoned())
            .collect())
    }

    /// Returns the number of stored profiles.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn len(&self) -> StoreResult<usize> {
        Ok(self.list_all()?.len())
    }

    /// Returns true if the store holds no profiles.
    ///
    /// # Errors
    ///
    /// Returns an error only if the store itself fails.
    fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl<S: ProfileStore + ?Sized> ProfileStore for Arc<S> {
    fn get(&self, id: &ProfileId) -> StoreResult<Option<StoredProfile>> {
        (**self).get(id)
    }

    fn exists(&self, id: &ProfileId) -> StoreResult<bool> {
        (**self).exists(id)
    }

    fn put(&self, profile: &Profile, expected: Option<Revision>) -> StoreResult<Revision> {
        (**self).put(profile, expected)
    }

    fn update(
        &self,
        id: &ProfileId,
        apply: &mut dyn FnMut(&mut Profile),
    ) -> StoreResult<Option<StoredProfile>> {
        (**self).update(id, apply)
    }

    fn delete(&self, id: &ProfileId) -> StoreResult<bool> {
        (**self).delete(id)
    }

    fn delete_if_current(&self, id: &ProfileId, expected: Revision) -> StoreResult<bool> {
        (**self).delete_if_current(id, expected)
    }

    fn list_all(&self) -> StoreResult<Vec<StoredProfile>> {
        (**self).list_all()
    }

    fn list_contact_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<StoredProfile>> {
        (**self).list_contact_before(cutoff)
    }

    fn list_tombstoned(&self) -> StoreResult<Vec<StoredProfile>> {
        (**self).list_tombstoned()
    }

    fn len(&self) -> StoreResult<usize> {
        (**self).len()
    }
}

/// Checks a conditional write against the revision currently stored.
pub(crate) fn check_revision(
    id: &ProfileId,
    expected: Option<Revision>,
    actual: Option<Revision>,
) -> StoreResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(StoreError::RevisionConflict {
            id: id.clone(),
            expected,
            actual,
        })
    }
}
