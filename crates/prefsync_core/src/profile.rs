//! The profile data model.

use chrono::{DateTime, Months, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// `lastChange` of a profile no client has ever written.
pub const NEVER_CHANGED: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// How far a tombstone pushes `lastChange` into the future.
const TOMBSTONE_JUMP: Months = Months::new(100 * 12);

/// Identifier of a profile.
///
/// The wrapper does not validate on construction; shape checks live in
/// [`crate::IdService::validate`] so lookups with arbitrary strings simply
/// miss instead of failing differently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the inner string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for ProfileId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ProfileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The unit of synchronization.
///
/// # Invariants
///
/// - `id` never changes
/// - `last_contact` never moves backwards
/// - `last_change` only moves on accepted writes and on tombstoning
/// - once `tombstoned` is set it stays set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    id: ProfileId,
    last_change: DateTime<Utc>,
    last_contact: DateTime<Utc>,
    preferences: Option<String>,
    tombstoned: bool,
}

impl Profile {
    /// Creates a fresh profile that no client has written yet.
    #[must_use]
    pub fn new(id: ProfileId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            last_change: NEVER_CHANGED,
            last_contact: now,
            preferences: None,
            tombstoned: false,
        }
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> &ProfileId {
        &self.id
    }

    /// Returns the time of the last accepted change to the preferences.
    #[must_use]
    pub fn last_change(&self) -> DateTime<Utc> {
        self.last_change
    }

    /// Returns the last time the store was touched for this profile.
    #[must_use]
    pub fn last_contact(&self) -> DateTime<Utc> {
        self.last_contact
    }

    /// Returns the opaque preferences payload, if any.
    #[must_use]
    pub fn preferences(&self) -> Option<&str> {
        self.preferences.as_deref()
    }

    /// Returns true once the profile has been deleted by a client.
    #[must_use]
    pub fn is_tombstoned(&self) -> bool {
        self.tombstoned
    }

    /// Returns true if a client has ever changed this profile.
    #[must_use]
    pub fn has_changed(&self) -> bool {
        self.last_change != NEVER_CHANGED
    }

    /// Records a store access at `now`.
    pub(crate) fn touch(&mut self, now: DateTime<Utc>) {
        self.last_contact = self.last_contact.max(now);
    }

    /// Applies an accepted client write.
    pub(crate) fn apply_client_change(
        &mut self,
        client_last_change: DateTime<Utc>,
        preferences: Option<String>,
    ) {
        self.last_change = self.last_change.max(client_last_change);
        self.preferences = preferences;
    }

    /// Marks the profile deleted.
    ///
    /// `last_change` jumps 100 years ahead so no client timestamp can ever
    /// outrank the tombstone. A profile still at [`NEVER_CHANGED`] is first
    /// moved to `now`. Returns false, changing nothing, if already tombstoned.
    pub(crate) fn tombstone(&mut self, now: DateTime<Utc>, final_payload: Option<String>) -> bool {
        if self.tombstoned {
            return false;
        }

        let base = if self.has_changed() {
            self.last_change
        } else {
            now
        };
        self.last_change = base
            .checked_add_months(TOMBSTONE_JUMP)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.preferences = final_payload;
        self.tombstoned = true;
        true
    }

    /// Returns true if the profile is due for physical deletion at `cutoff`.
    #[must_use]
    pub fn is_clearable(&self, cutoff: DateTime<Utc>) -> bool {
        self.tombstoned || self.last_contact < cutoff
    }
}

/// Adds `delta` to `at`, saturating at the representable range.
pub(crate) fn saturating_add(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_add_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}

/// Subtracts `delta` from `at`, saturating at the representable range.
pub(crate) fn saturating_sub(at: DateTime<Utc>, delta: TimeDelta) -> DateTime<Utc> {
    at.checked_sub_signed(delta).unwrap_or(if delta < TimeDelta::zero() {
        DateTime::<Utc>::MAX_UTC
    } else {
        DateTime::<Utc>::MIN_UTC
    })
}
