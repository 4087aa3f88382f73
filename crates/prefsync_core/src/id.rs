//! Profile identifier generation and validation.

use crate::clock::Clock;
use crate::config::IdShape;
use crate::error::{SyncError, SyncResult};
use crate::profile::ProfileId;
use crate::store::ProfileStore;
use chrono::{Datelike, Timelike};
use rand::Rng;
use std::sync::Arc;

const LOWERCASE: &[u8; 26] = b"abcdefghijklmnopqrstuvwxyz";

/// Generates hard-to-guess identifiers and validates supplied ones.
///
/// A generated identifier starts from the current day, month, year, hour and
/// minute, each shifted by a fixed offset and written as two digits, then gets
/// random lowercase letters inserted at random positions. Identifiers made in
/// the same minute differ only by their letters, so generation is not
/// coordinated and callers must still check [`IdService::is_taken`].
pub struct IdService {
    shape: IdShape,
    store: Arc<dyn ProfileStore>,
    clock: Arc<dyn Clock>,
}

impl IdService {
    /// Creates an identifier service.
    pub fn new(shape: IdShape, store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            shape,
            store,
            clock,
        }
    }

    /// Returns the identifier shape in use.
    pub fn shape(&self) -> IdShape {
        self.shape
    }

    /// Generates an identifier of the configured shape. Never fails.
    pub fn generate(&self) -> ProfileId {
        let mut rng = rand::thread_rng();
        let now = self.clock.now();

        let fields = [
            i64::from(now.day()) + 25,
            i64::from(now.month0()) + 56,
            i64::from(now.year()) - 2000 + 7,
            i64::from(now.hour()) + 71,
            i64::from(now.minute()) + 10,
        ];
        let mut id: String = fields
            .iter()
            .map(|field| format!("{:02}", field.rem_euclid(100)))
            .collect();

        id.truncate(self.shape.digits);
        while id.len() < self.shape.digits {
            id.push(char::from(b'0' + rng.gen_range(0..10u8)));
        }

        for _ in 0..self.shape.letters {
            let position = rng.gen_range(0..=id.len());
            let letter = LOWERCASE[rng.gen_range(0..LOWERCASE.len())];
            id.insert(position, char::from(letter));
        }

        ProfileId::from(id)
    }

    /// Returns true if `id` has the configured shape. Pure; no store access.
    pub fn validate(&self, id: &str) -> bool {
        self.shape.matches(id)
    }

    /// Returns true if a profile with `id` already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn is_taken(&self, id: &ProfileId) -> SyncResult<bool> {
        Ok(self.store.exists(id)?)
    }

    /// Generates an identifier that is not taken yet.
    ///
    /// Regenerates once on collision.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::IdentifierExhausted`] if the retry collides too.
    pub fn generate_unused(&self) -> SyncResult<ProfileId> {
        for attempt in 0..2 {
            let id = self.generate();
            if !self.is_taken(&id)? {
                return Ok(id);
            }
            tracing::debug!(%id, attempt, "generated profile id already taken");
        }
        Err(SyncError::IdentifierExhausted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::profile::Profile;
    use crate::store::MemoryProfileStore;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn service(shape: IdShape) -> IdService {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 11, 30, 23, 59, 0).unwrap());
        IdService::new(shape, Arc::new(MemoryProfileStore::new()), Arc::new(clock))
    }

    #[test]
    fn generated_id_has_shape() {
        let ids = service(IdShape::default());
        let id = ids.generate();
        assert_eq!(id.as_str().len(), 16);
        assert!(ids.validate(id.as_str()));
    }

    #[test]
    fn generated_digits_encode_the_time() {
        let ids = service(IdShape::default());
        let digits: String = ids
            .generate()
            .as_str()
            .chars()
            .filter(char::is_ascii_digit)
            .collect();
        // day 30+25, month 10+56, year 24+7, hour 23+71, minute 59+10
        assert_eq!(digits, "5566319469");
    }

    #[test]
    fn custom_shape_is_honoured() {
        let ids = service(IdShape {
            digits: 14,
            letters: 2,
        });
        for _ in 0..20 {
            let id = ids.generate();
            assert!(ids.validate(id.as_str()), "{id}");
        }

        let short = service(IdShape {
            digits: 4,
            letters: 8,
        });
        assert!(short.validate(short.generate().as_str()));
    }

    #[test]
    fn validate_rejects_wrong_alphabet() {
        let ids = service(IdShape::default());
        assert!(ids.validate("1a2b3c4d5e6f7890"));
        assert!(!ids.validate("1A2b3c4d5e6f7890"));
        assert!(!ids.validate("1a2b3c4d5e6f789_"));
        assert!(!ids.validate("1a2b3c4d5e6f78901"));
    }

    #[test]
    fn is_taken_consults_store() {
        let store = Arc::new(MemoryProfileStore::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let ids = IdService::new(IdShape::default(), store.clone(), clock);

        let id = ids.generate();
        assert!(!ids.is_taken(&id).unwrap());
        store.put(&Profile::new(id.clone(), Utc::now()), None).unwrap();
        assert!(ids.is_taken(&id).unwrap());
    }

    #[test]
    fn every_id_taken_exhausts() {
        struct FullStore;
        impl ProfileStore for FullStore {
            fn get(&self, _: &ProfileId) -> crate::StoreResult<Option<crate::StoredProfile>> {
                Ok(None)
            }
            fn exists(&self, _: &ProfileId) -> crate::StoreResult<bool> {
                Ok(true)
            }
            fn put(
                &self,
                _: &Profile,
                _: Option<crate::Revision>,
            ) -> crate::StoreResult<crate::Revision> {
                Ok(crate::Revision::new(1))
            }
            fn delete(&self, _: &ProfileId) -> crate::StoreResult<bool> {
                Ok(false)
            }
            fn list_all(&self) -> crate::StoreResult<Vec<crate::StoredProfile>> {
                Ok(Vec::new())
            }
        }

        let ids = IdService::new(
            IdShape::default(),
            Arc::new(FullStore),
            Arc::new(ManualClock::new(Utc::now())),
        );
        assert!(matches!(
            ids.generate_unused(),
            Err(SyncError::IdentifierExhausted)
        ));
    }

    proptest! {
        #[test]
        fn generated_ids_always_validate(
            digits in 1usize..20,
            letters in 0usize..10,
            secs in 0i64..4_102_444_800,
        ) {
            let clock = ManualClock::new(Utc.timestamp_opt(secs, 0).unwrap());
            let ids = IdService::new(
                IdShape { digits, letters },
                Arc::new(MemoryProfileStore::new()),
                Arc::new(clock),
            );
            let id = ids.generate();
            prop_assert_eq!(id.as_str().len(), digits + letters);
            prop_assert!(ids.validate(id.as_str()));
        }
    }
}
