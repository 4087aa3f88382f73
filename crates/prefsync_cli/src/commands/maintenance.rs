//! Store maintenance commands.

use prefsync_core::LogProfileStore;
use prefsync_server::{ClearanceScheduler, ServerConfig};
use std::path::Path;

/// Rewrites the profile log and prints the statistics.
pub fn compact(data: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = LogProfileStore::open_dir(data)?;
    let stats = store.compact()?;
    tracing::info!(
        bytes_before = stats.bytes_before,
        bytes_after = stats.bytes_after,
        "profile log compacted"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

/// Runs the clearance sweep on the configured cadence until Ctrl-C.
pub fn schedule(data: &Path, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cadence = config.sync.sweep_cadence;
    let server = super::open_server(data, config)?;

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let scheduler = ClearanceScheduler::spawn(server.clearance(), cadence);
        eprintln!("Sweeping every {}s, press Ctrl-C to stop", cadence.as_secs());
        tokio::signal::ctrl_c().await?;
        scheduler.shutdown().await?;
        Ok::<_, Box<dyn std::error::Error>>(())
    })
}
