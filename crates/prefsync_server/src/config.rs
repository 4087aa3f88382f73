//! Server configuration.

use prefsync_core::{ConfigError, SyncConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Service configuration.
    pub sync: SyncConfig,
    /// Whether the server runs the clearance sweep in the background.
    pub run_scheduler: bool,
}

impl ServerConfig {
    /// Creates a server configuration around `sync`.
    pub fn new(sync: SyncConfig) -> Self {
        Self {
            sync,
            run_scheduler: true,
        }
    }

    /// Enables or disables the background clearance sweep.
    pub fn with_scheduler(mut self, enabled: bool) -> Self {
        self.run_scheduler = enabled;
        self
    }

    /// Parses and validates a configuration from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a value is unusable.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.sync.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its content is invalid.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SyncConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert!(config.run_scheduler);
        assert_eq!(config.sync, SyncConfig::default());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new(
            SyncConfig::default().with_conflict_margin(Duration::from_secs(60)),
        )
        .with_scheduler(false);

        assert!(!config.run_scheduler);
        assert_eq!(config.sync.conflict_margin, Duration::from_secs(60));
    }

    #[test]
    fn parse_partial_json() {
        let config =
            ServerConfig::from_json_str(r#"{"run_scheduler":false,"sync":{"conflict_margin":30}}"#)
                .unwrap();
        assert!(!config.run_scheduler);
        assert_eq!(config.sync.conflict_margin, Duration::from_secs(30));
        assert_eq!(config.sync.retention_window, SyncConfig::default().retention_window);
    }

    #[test]
    fn rejects_invalid_values() {
        let err = ServerConfig::from_json_str(r#"{"sync":{"sweep_cadence":0}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
