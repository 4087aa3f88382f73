//! Profile reconciliation.

use crate::clock::Clock;
use crate::config::{SyncConfig, TombstonePayload};
use crate::error::{StoreError, SyncError, SyncResult};
use crate::id::IdService;
use crate::profile::{saturating_add, saturating_sub, Profile, ProfileId};
use crate::store::{ProfileStore, StoredProfile};
use chrono::{DateTime, TimeDelta, Utc};
use std::sync::Arc;

/// Applies client creates, pulls, pushes and deletes to the stored profiles.
///
/// Every operation works on a single profile with one read-modify-write and
/// refreshes that profile's `last_contact`, whatever the outcome. The only
/// exceptions are [`ReconciliationService::last_change`],
/// [`ReconciliationService::last_contact`] and
/// [`ReconciliationService::profile_count`], which are inspection reads.
pub struct ReconciliationService {
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
    ids: IdService,
    margin: TimeDelta,
    tombstone_payload: TombstonePayload,
}

impl ReconciliationService {
    /// Creates a reconciliation service over `store`.
    pub fn new(config: SyncConfig, store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        let ids = IdService::new(config.id_shape, Arc::clone(&store), Arc::clone(&clock));
        Self {
            store,
            clock,
            ids,
            margin: config.margin(),
            tombstone_payload: config.tombstone_payload,
        }
    }

    /// Returns the identifier service.
    pub fn ids(&self) -> &IdService {
        &self.ids
    }

    /// Returns the conflict margin.
    pub fn margin(&self) -> TimeDelta {
        self.margin
    }

    /// Creates a profile, generating an identifier unless one is supplied.
    ///
    /// # Errors
    ///
    /// - [`SyncError::MalformedIdentifier`] if `requested` has the wrong shape
    /// - [`SyncError::AlreadyExists`] if `requested` is taken, or another
    ///   request created the same id concurrently
    /// - [`SyncError::IdentifierExhausted`] if two generated ids were taken
    pub fn create_profile(&self, requested: Option<&str>) -> SyncResult<Profile> {
        let id = match requested {
            Some(raw) => {
                if !self.ids.validate(raw) {
                    return Err(SyncError::MalformedIdentifier(raw.to_owned()));
                }
                let id = ProfileId::from(raw);
                if self.ids.is_taken(&id)? {
                    return Err(SyncError::AlreadyExists(id));
                }
                id
            }
            None => self.ids.generate_unused()?,
        };

        let profile = Profile::new(id, self.clock.now());
        match self.store.put(&profile, None) {
            Ok(_) => {
                tracing::info!(id = %profile.id(), "profile created");
                Ok(profile)
            }
            Err(StoreError::RevisionConflict { id, .. }) => Err(SyncError::AlreadyExists(id)),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns a profile unconditionally, refreshing its last contact.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no profile has this id.
    pub fn get_profile(&self, id: &ProfileId) -> SyncResult<Profile> {
        let now = self.clock.now();
        self.modify(id, |profile| profile.touch(now))
    }

    /// Returns the stored profile if it is newer than the client's copy by
    /// more than the margin.
    ///
    /// Last contact is refreshed either way.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if no profile has this id
    /// - [`SyncError::ServerCopyNotNewer`] if the client should keep its copy
    pub fn get_profile_if_newer_than(
        &self,
        id: &ProfileId,
        client_last_change: DateTime<Utc>,
    ) -> SyncResult<Profile> {
        let profile = self.get_profile(id)?;

        if saturating_sub(profile.last_change(), self.margin) > client_last_change {
            return Ok(profile);
        }

        tracing::debug!(
            %id,
            stored = %profile.last_change(),
            client = %client_last_change,
            "server copy not newer"
        );
        Err(SyncError::ServerCopyNotNewer {
            id: id.clone(),
            stored: profile.last_change(),
            client: client_last_change,
        })
    }

    /// Applies a client's copy of the preferences.
    ///
    /// The push is accepted if `client_last_change` is after the stored change
    /// plus the margin, or if `force_overwrite` is set. Last contact is
    /// refreshed whether the push is accepted or not.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotFound`] if no profile has this id
    /// - [`SyncError::AlreadyTombstoned`] if the profile was deleted
    /// - [`SyncError::ClientCopyOutdated`] if the push was rejected
    pub fn push_profile(
        &self,
        id: &ProfileId,
        client_last_change: DateTime<Utc>,
        preferences: Option<String>,
        force_overwrite: bool,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        let margin = self.margin;
        let mut outcome = PushOutcome::Accepted;
        self.modify(id, |profile| {
            profile.touch(now);
            outcome = if profile.is_tombstoned() {
                PushOutcome::Tombstoned
            } else if force_overwrite
                || client_last_change > saturating_add(profile.last_change(), margin)
            {
                profile.apply_client_change(client_last_change, preferences.clone());
                PushOutcome::Accepted
            } else {
                PushOutcome::Outdated(profile.last_change())
            };
        })?;

        match outcome {
            PushOutcome::Accepted => {
                tracing::debug!(%id, forced = force_overwrite, "push accepted");
                Ok(())
            }
            PushOutcome::Tombstoned => {
                tracing::debug!(%id, "push against tombstoned profile");
                Err(SyncError::AlreadyTombstoned(id.clone()))
            }
            PushOutcome::Outdated(stored) => {
                tracing::debug!(
                    %id,
                    %stored,
                    client = %client_last_change,
                    "client copy outdated"
                );
                Err(SyncError::ClientCopyOutdated {
                    id: id.clone(),
                    stored,
                    client: client_last_change,
                })
            }
        }
    }

    /// Soft-deletes a profile.
    ///
    /// The profile is flagged tombstoned, its `last_change` jumps a century
    /// ahead and its preferences become `final_payload` (or nothing, when
    /// configured with [`TombstonePayload::Clear`]). Tombstoning an already
    /// tombstoned profile only refreshes its last contact.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no profile has this id.
    pub fn tombstone_profile(
        &self,
        id: &ProfileId,
        final_payload: Option<String>,
    ) -> SyncResult<()> {
        let now = self.clock.now();
        let payload = match self.tombstone_payload {
            TombstonePayload::Store => final_payload,
            TombstonePayload::Clear => None,
        };
        let mut newly = false;
        self.modify(id, |profile| {
            profile.touch(now);
            newly = profile.tombstone(now, payload.clone());
        })?;

        if newly {
            tracing::info!(%id, "profile tombstoned");
        }
        Ok(())
    }

    /// Returns every profile ordered by id, refreshing each one's last contact.
    ///
    /// Diagnostic only; cost is linear in the store size.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::EmptyStore`] if there are no profiles.
    pub fn list_all(&self) -> SyncResult<Vec<Profile>> {
        let all = self.store.list_all()?;
        if all.is_empty() {
            return Err(SyncError::EmptyStore);
        }
        self.touch_listed(all)
    }

    /// Returns every tombstoned profile ordered by id, refreshing each one's
    /// last contact. May be empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn list_tombstoned(&self) -> SyncResult<Vec<Profile>> {
        self.touch_listed(self.store.list_tombstoned()?)
    }

    /// Returns a profile's `last_change` without counting as contact.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no profile has this id.
    pub fn last_change(&self, id: &ProfileId) -> SyncResult<DateTime<Utc>> {
        Ok(self.load(id)?.profile.last_change())
    }

    /// Returns a profile's `last_contact` without counting as contact.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if no profile has this id.
    pub fn last_contact(&self, id: &ProfileId) -> SyncResult<DateTime<Utc>> {
        Ok(self.load(id)?.profile.last_contact())
    }

    /// Returns the number of stored profiles without counting as contact.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn profile_count(&self) -> SyncResult<usize> {
        Ok(self.store.len()?)
    }

    fn load(&self, id: &ProfileId) -> SyncResult<StoredProfile> {
        self.store
            .get(id)?
            .ok_or_else(|| SyncError::NotFound(id.clone()))
    }

    /// Runs `apply` on the current version of a profile and stores the result.
    fn modify(&self, id: &ProfileId, mut apply: impl FnMut(&mut Profile)) -> SyncResult<Profile> {
        self.store
            .update(id, &mut apply)?
            .map(|stored| stored.profile)
            .ok_or_else(|| SyncError::NotFound(id.clone()))
    }

    /// Refreshes the last contact of listed profiles. Profiles cleared since
    /// they were listed are left out.
    fn touch_listed(&self, listed: Vec<StoredProfile>) -> SyncResult<Vec<Profile>> {
        let now = self.clock.now();
        let mut touched = Vec::with_capacity(listed.len());
        for stored in listed {
            let id = stored.profile.id();
            if let Some(updated) = self.store.update(id, &mut |profile: &mut Profile| {
                profile.touch(now);
            })? {
                touched.push(updated.profile);
            }
        }
        Ok(touched)
    }
}

/// What a push decided, recorded from inside the store update.
enum PushOutcome {
    Accepted,
    Tombstoned,
    Outdated(DateTime<Utc>),
}
