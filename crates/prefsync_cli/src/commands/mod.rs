//! CLI command implementations.

pub mod maintenance;
pub mod profile;

use prefsync_core::{LogProfileStore, SystemClock};
use prefsync_server::{ServerConfig, SyncServer};
use std::path::Path;
use std::sync::Arc;

/// Loads the configuration file, or the defaults when none is given.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(ServerConfig::from_json_file(path)?),
        None => Ok(ServerConfig::default()),
    }
}

/// Opens the profile log in `data` and wraps it in a server.
pub fn open_server(
    data: &Path,
    config: ServerConfig,
) -> Result<SyncServer, Box<dyn std::error::Error>> {
    let store = LogProfileStore::open_dir(data)?;
    Ok(SyncServer::new(config, Arc::new(store), Arc::new(SystemClock)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn missing_config_uses_defaults() {
        assert_eq!(load_config(None).unwrap(), ServerConfig::default());
    }

    #[test]
    fn config_file_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefsync.json");
        std::fs::write(&path, r#"{"sync":{"conflict_margin":120}}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.sync.conflict_margin, Duration::from_secs(120));
    }

    #[test]
    fn second_open_of_same_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let _server = open_server(dir.path(), ServerConfig::default()).unwrap();
        assert!(open_server(dir.path(), ServerConfig::default()).is_err());
    }
}
