//! In-memory profile store.

use super::traits::{check_revision, ProfileStore, Revision, StoredProfile};
use crate::error::StoreResult;
use crate::profile::{Profile, ProfileId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};

/// An in-memory profile store.
///
/// Keeps two secondary indexes so the clearance sweep never scans the whole
/// map: `(last_contact, id)` ordered by time, and the set of tombstoned ids.
///
/// # Example
///
/// ```rust
/// use prefsync_core::{MemoryProfileStore, Profile, ProfileId, ProfileStore};
/// use chrono::Utc;
///
/// let store = MemoryProfileStore::new();
/// let profile = Profile::new(ProfileId::from("12ab34cd56ef7890"), Utc::now());
/// let revision = store.put(&profile, None).unwrap();
///
/// let stored = store.get(profile.id()).unwrap().unwrap();
/// assert_eq!(stored.revision, revision);
/// ```
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: BTreeMap<ProfileId, StoredProfile>,
    by_contact: BTreeSet<(DateTime<Utc>, ProfileId)>,
    tombstones: BTreeSet<ProfileId>,
    last_revision: u64,
}

impl Inner {
    fn allocate_revision(&mut self) -> Revision {
        self.last_revision += 1;
        Revision::new(self.last_revision)
    }

    fn install(&mut self, stored: StoredProfile) {
        let id = stored.profile.id().clone();
        self.unindex(&id);

        self.by_contact
            .insert((stored.profile.last_contact(), id.clone()));
        if stored.profile.is_tombstoned() {
            self.tombstones.insert(id.clone());
        }
        self.last_revision = self.last_revision.max(stored.revision.get());
        self.rows.insert(id, stored);
    }

    fn unindex(&mut self, id: &ProfileId) -> Option<StoredProfile> {
        let old = self.rows.remove(id)?;
        self.by_contact
            .remove(&(old.profile.last_contact(), id.clone()));
        self.tombstones.remove(id);
        Some(old)
    }

    fn collect<'a>(&self, ids: impl Iterator<Item = &'a ProfileId>) -> Vec<StoredProfile> {
        let mut out: Vec<StoredProfile> = ids.filter_map(|id| self.rows.get(id).cloned()).collect();
        out.sort_by(|a, b| a.profile.id().cmp(b.profile.id()));
        out
    }
}

impl MemoryProfileStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the revision the next write will get, without reserving it.
    ///
    /// [`MemoryProfileStore::install`] moves the counter past it once the
    /// write is applied.
    pub(crate) fn next_revision(&self) -> Revision {
        Revision::new(self.inner.read().last_revision + 1)
    }

    /// Installs a profile at a known revision, bypassing the revision check.
    ///
    /// Used when replaying a log whose records were already checked.
    pub(crate) fn install(&self, stored: StoredProfile) {
        self.inner.write().install(stored);
    }

    /// Removes a profile without any check. Returns the removed row.
    pub(crate) fn remove(&self, id: &ProfileId) -> Option<StoredProfile> {
        self.inner.write().unindex(id)
    }

    /// Returns the current revision of `id`, if stored.
    pub(crate) fn revision_of(&self, id: &ProfileId) -> Option<Revision> {
        self.inner.read().rows.get(id).map(|stored| stored.revision)
    }
}

impl ProfileStore for MemoryProfileStore {
    fn get(&self, id: &ProfileId) -> StoreResult<Option<StoredProfile>> {
        Ok(self.inner.read().rows.get(id).cloned())
    }

    fn exists(&self, id: &ProfileId) -> StoreResult<bool> {
        Ok(self.inner.read().rows.contains_key(id))
    }

    fn put(&self, profile: &Profile, expected: Option<Revision>) -> StoreResult<Revision> {
        let mut inner = self.inner.write();
        let actual = inner.rows.get(profile.id()).map(|stored| stored.revision);
        check_revision(profile.id(), expected, actual)?;

        let revision = inner.allocate_revision();
        inner.install(StoredProfile {
            profile: profile.clone(),
            revision,
        });
        Ok(revision)
    }

    fn update(
        &self,
        id: &ProfileId,
        apply: &mut dyn FnMut(&mut Profile),
    ) -> StoreResult<Option<StoredProfile>> {
        let mut inner = self.inner.write();
        let Some(current) = inner.rows.get(id).cloned() else {
            return Ok(None);
        };

        let mut profile = current.profile.clone();
        apply(&mut profile);
        if profile == current.profile {
            return Ok(Some(current));
        }

        let stored = StoredProfile {
            profile,
            revision: inner.allocate_revision(),
        };
        inner.install(stored.clone());
        Ok(Some(stored))
    }

    fn delete(&self, id: &ProfileId) -> StoreResult<bool> {
        Ok(self.inner.write().unindex(id).is_some())
    }

    fn delete_if_current(&self, id: &ProfileId, expected: Revision) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let Some(actual) = inner.rows.get(id).map(|stored| stored.revision) else {
            return Ok(false);
        };
        check_revision(id, Some(expected), Some(actual))?;
        Ok(inner.unindex(id).is_some())
    }

    fn list_all(&self) -> StoreResult<Vec<StoredProfile>> {
        Ok(self.inner.read().rows.values().cloned().collect())
    }

    fn list_contact_before(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<StoredProfile>> {
        let inner = self.inner.read();
        let ids = inner
            .by_contact
            .iter()
            .take_while(|(contact, _)| *contact < cutoff)
            .map(|(_, id)| id);
        Ok(inner.collect(ids))
    }

    fn list_tombstoned(&self) -> StoreResult<Vec<StoredProfile>> {
        let inner = self.inner.read();
        Ok(inner.collect(inner.tombstones.iter()))
    }

    fn len(&self) -> StoreResult<usize> {
        Ok(self.inner.read().rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn profile(id: &str, contact: DateTime<Utc>) -> Profile {
        Profile::new(ProfileId::from(id), contact)
    }

    #[test]
    fn insert_and_get() {
        let store = MemoryProfileStore::new();
        let p = profile("b", t0());

        let rev = store.put(&p, None).unwrap();
        let stored = store.get(p.id()).unwrap().unwrap();
        assert_eq!(stored.profile, p);
        assert_eq!(stored.revision, rev);
        assert!(store.exists(p.id()).unwrap());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn insert_over_existing_is_refused() {
        let store = MemoryProfileStore::new();
        let p = profile("b", t0());
        store.put(&p, None).unwrap();

        let mut other = profile("b", t0() + TimeDelta::hours(1));
        other.touch(t0() + TimeDelta::hours(2));
        let err = store.put(&other, None).unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
        assert_eq!(store.get(p.id()).unwrap().unwrap().profile, p);
    }

    #[test]
    fn stale_revision_is_refused() {
        let store = MemoryProfileStore::new();
        let mut p = profile("b", t0());
        let first = store.put(&p, None).unwrap();

        p.touch(t0() + TimeDelta::minutes(1));
        let second = store.put(&p, Some(first)).unwrap();
        assert!(second > first);

        p.touch(t0() + TimeDelta::minutes(2));
        assert!(store.put(&p, Some(first)).is_err());
        assert!(store.put(&p, Some(second)).is_ok());
    }

    #[test]
    fn list_all_is_ordered_by_id() {
        let store = MemoryProfileStore::new();
        for id in ["c", "a", "b"] {
            store.put(&profile(id, t0()), None).unwrap();
        }

        let ids: Vec<_> = store
            .list_all()
            .unwrap()
            .into_iter()
            .map(|s| s.profile.id().to_string())
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn contact_index_follows_updates() {
        let store = MemoryProfileStore::new();
        let mut old = profile("old", t0());
        let rev = store.put(&old, None).unwrap();
        store
            .put(&profile("new", t0() + TimeDelta::days(10)), None)
            .unwrap();

        let cutoff = t0() + TimeDelta::days(1);
        let stale = store.list_contact_before(cutoff).unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].profile.id().as_str(), "old");

        old.touch(t0() + TimeDelta::days(2));
        store.put(&old, Some(rev)).unwrap();
        assert!(store.list_contact_before(cutoff).unwrap().is_empty());
    }

    #[test]
    fn tombstone_index() {
        let store = MemoryProfileStore::new();
        let mut p = profile("gone", t0());
        let rev = store.put(&p, None).unwrap();
        store.put(&profile("kept", t0()), None).unwrap();
        assert!(store.list_tombstoned().unwrap().is_empty());

        p.tombstone(t0(), None);
        store.put(&p, Some(rev)).unwrap();
        let tombstoned = store.list_tombstoned().unwrap();
        assert_eq!(tombstoned.len(), 1);
        assert!(tombstoned[0].profile.is_tombstoned());
    }

    #[test]
    fn delete_clears_indexes() {
        let store = MemoryProfileStore::new();
        let mut p = profile("x", t0());
        let rev = store.put(&p, None).unwrap();
        p.tombstone(t0(), None);
        store.put(&p, Some(rev)).unwrap();

        assert!(store.delete(p.id()).unwrap());
        assert!(!store.delete(p.id()).unwrap());
        assert!(store.list_tombstoned().unwrap().is_empty());
        assert!(store
            .list_contact_before(t0() + TimeDelta::days(1))
            .unwrap()
            .is_empty());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn install_keeps_revisions_monotonic() {
        let store = MemoryProfileStore::new();
        store.install(StoredProfile {
            profile: profile("a", t0()),
            revision: Revision::new(40),
        });
        assert_eq!(store.revision_of(&ProfileId::from("a")), Some(Revision::new(40)));

        let next = store.put(&profile("b", t0()), None).unwrap();
        assert_eq!(next, Revision::new(41));
        assert_eq!(store.next_revision(), Revision::new(42));
        assert_eq!(store.next_revision(), Revision::new(42));
        assert!(store.remove(&ProfileId::from("a")).is_some());
    }

    #[test]
    fn update_applies_and_bumps_revision() {
        let store = MemoryProfileStore::new();
        let p = profile("u", t0());
        let first = store.put(&p, None).unwrap();

        let later = t0() + TimeDelta::hours(1);
        let updated = store
            .update(p.id(), &mut |profile: &mut Profile| profile.touch(later))
            .unwrap()
            .unwrap();
        assert!(updated.revision > first);
        assert_eq!(updated.profile.last_contact(), later);
        assert_eq!(store.get(p.id()).unwrap().unwrap(), updated);
        assert!(store.list_contact_before(later).unwrap().is_empty());
    }

    #[test]
    fn unchanged_update_writes_nothing() {
        let store = MemoryProfileStore::new();
        let p = profile("u", t0());
        let first = store.put(&p, None).unwrap();

        let same = store
            .update(p.id(), &mut |profile: &mut Profile| profile.touch(t0()))
            .unwrap()
            .unwrap();
        assert_eq!(same.revision, first);
        assert!(store
            .update(&ProfileId::from("missing"), &mut |_: &mut Profile| {})
            .unwrap()
            .is_none());
    }

    #[test]
    fn conditional_delete() {
        let store = MemoryProfileStore::new();
        let mut p = profile("d", t0());
        let first = store.put(&p, None).unwrap();
        p.touch(t0() + TimeDelta::minutes(1));
        let second = store.put(&p, Some(first)).unwrap();

        let err = store.delete_if_current(p.id(), first).unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { .. }));
        assert!(store.exists(p.id()).unwrap());

        assert!(store.delete_if_current(p.id(), second).unwrap());
        assert!(!store.delete_if_current(p.id(), second).unwrap());
    }
}
