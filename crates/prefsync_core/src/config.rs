//! Service configuration.

use crate::error::ConfigError;
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default conflict margin: 5 minutes.
pub const DEFAULT_CONFLICT_MARGIN: Duration = Duration::from_secs(5 * 60);

/// Default retention window: 540 days (18 months of 30 days).
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(540 * 24 * 60 * 60);

/// Default sweep cadence: once a week.
pub const DEFAULT_SWEEP_CADENCE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Shape every profile identifier must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdShape {
    /// Number of decimal digits.
    pub digits: usize,
    /// Number of lowercase ASCII letters.
    pub letters: usize,
}

impl IdShape {
    /// Total identifier length.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.digits + self.letters
    }

    /// Returns true if the shape admits only the empty identifier.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if `id` has exactly this many digits and lowercase letters
    /// and nothing else.
    #[must_use]
    pub fn matches(&self, id: &str) -> bool {
        let mut digits = 0usize;
        let mut letters = 0usize;
        for c in id.chars() {
            if c.is_ascii_digit() {
                digits += 1;
            } else if c.is_ascii_lowercase() {
                letters += 1;
            } else {
                return false;
            }
        }
        digits == self.digits && letters == self.letters
    }
}

impl Default for IdShape {
    fn default() -> Self {
        Self {
            digits: 10,
            letters: 6,
        }
    }
}

/// What a tombstone keeps as the profile's preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TombstonePayload {
    /// Keep the final marker payload the deleting client sent.
    #[default]
    Store,
    /// Drop the payload entirely.
    Clear,
}

/// Configuration for the reconciliation and clearance services.
///
/// Built once at startup and handed to each service by value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Minimum distance between two change timestamps for one to win.
    #[serde(with = "duration_secs")]
    pub conflict_margin: Duration,
    /// How long a profile may go without contact before it is cleared.
    #[serde(with = "duration_secs")]
    pub retention_window: Duration,
    /// Interval between clearance sweeps.
    #[serde(with = "duration_secs")]
    pub sweep_cadence: Duration,
    /// Identifier shape.
    pub id_shape: IdShape,
    /// Payload handling on tombstone.
    pub tombstone_payload: TombstonePayload,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the conflict margin.
    #[must_use]
    pub fn with_conflict_margin(mut self, margin: Duration) -> Self {
        self.conflict_margin = margin;
        self
    }

    /// Sets the retention window.
    #[must_use]
    pub fn with_retention_window(mut self, window: Duration) -> Self {
        self.retention_window = window;
        self
    }

    /// Sets the sweep cadence.
    #[must_use]
    pub fn with_sweep_cadence(mut self, cadence: Duration) -> Self {
        self.sweep_cadence = cadence;
        self
    }

    /// Sets the identifier shape.
    #[must_use]
    pub fn with_id_shape(mut self, shape: IdShape) -> Self {
        self.id_shape = shape;
        self
    }

    /// Sets the tombstone payload handling.
    #[must_use]
    pub fn with_tombstone_payload(mut self, payload: TombstonePayload) -> Self {
        self.tombstone_payload = payload;
        self
    }

    /// Parses a JSON configuration. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or fails [`SyncConfig::validate`].
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a JSON configuration file. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Checks that every value is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for an empty identifier shape, a zero
    /// sweep cadence, or a duration too large for timestamp arithmetic.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id_shape.is_empty() {
            return Err(ConfigError::Invalid("identifier shape is empty".into()));
        }
        if self.sweep_cadence.is_zero() {
            return Err(ConfigError::Invalid("sweep cadence must be positive".into()));
        }
        for (name, value) in [
            ("conflict_margin", self.conflict_margin),
            ("retention_window", self.retention_window),
        ] {
            if TimeDelta::from_std(value).is_err() {
                return Err(ConfigError::Invalid(format!("{name} is out of range")));
            }
        }
        Ok(())
    }

    /// The conflict margin as a signed delta.
    #[must_use]
    pub fn margin(&self) -> TimeDelta {
        TimeDelta::from_std(self.conflict_margin).unwrap_or(TimeDelta::MAX)
    }

    /// The retention window as a signed delta.
    #[must_use]
    pub fn retention(&self) -> TimeDelta {
        TimeDelta::from_std(self.retention_window).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conflict_margin: DEFAULT_CONFLICT_MARGIN,
            retention_window: DEFAULT_RETENTION_WINDOW,
            sweep_cadence: DEFAULT_SWEEP_CADENCE,
            id_shape: IdShape::default(),
            tombstone_payload: TombstonePayload::default(),
        }
    }
}

/// Durations as whole seconds.
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.conflict_margin, Duration::from_secs(300));
        assert_eq!(config.retention_window, Duration::from_secs(540 * 86_400));
        assert_eq!(config.sweep_cadence, Duration::from_secs(7 * 86_400));
        assert_eq!(config.id_shape.len(), 16);
        assert_eq!(config.tombstone_payload, TombstonePayload::Store);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_builder() {
        let config = SyncConfig::new()
            .with_conflict_margin(Duration::from_secs(60))
            .with_retention_window(Duration::from_secs(180 * 86_400))
            .with_tombstone_payload(TombstonePayload::Clear);

        assert_eq!(config.margin(), TimeDelta::minutes(1));
        assert_eq!(config.retention(), TimeDelta::days(180));
        assert_eq!(config.tombstone_payload, TombstonePayload::Clear);
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config =
            SyncConfig::from_json_str(r#"{ "retention_window": 15552000, "tombstone_payload": "clear" }"#)
                .unwrap();
        assert_eq!(config.retention_window, Duration::from_secs(15_552_000));
        assert_eq!(config.tombstone_payload, TombstonePayload::Clear);
        assert_eq!(config.conflict_margin, DEFAULT_CONFLICT_MARGIN);
        assert_eq!(config.id_shape, IdShape::default());
    }

    #[test]
    fn json_rejects_empty_shape() {
        let err = SyncConfig::from_json_str(r#"{ "id_shape": { "digits": 0, "letters": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn json_rejects_garbage() {
        let err = SyncConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefsync.json");
        let config = SyncConfig::default().with_conflict_margin(Duration::from_secs(30));
        std::fs::write(&path, serde_json::to_string(&config).unwrap()).unwrap();

        assert_eq!(SyncConfig::from_json_file(&path).unwrap(), config);
    }

    #[test]
    fn shape_matching() {
        let shape = IdShape::default();
        assert!(shape.matches("12ab34cd56ef7890"));
        assert!(shape.matches("abcdef1234567890"));
        assert!(!shape.matches("12AB34cd56ef7890"));
        assert!(!shape.matches("12ab34cd56ef789"));
        assert!(!shape.matches("12ab34cd56ef78901"));
        assert!(!shape.matches("12ab34cd56ef789-"));
        assert!(!shape.matches("12ab34cd56éf7890"));
        assert!(!shape.matches(""));
    }
}
