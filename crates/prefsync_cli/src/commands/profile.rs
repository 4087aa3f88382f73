//! Profile commands, executed as server requests.

use prefsync_server::{ServerConfig, SyncRequest, SyncResponse};
use std::path::Path;
use std::process::ExitCode;

/// Runs one request against the store in `data` and prints the response.
///
/// Rejections are printed like any other response; the exit code tells them
/// apart.
pub fn run(
    data: &Path,
    config: ServerConfig,
    request: SyncRequest,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let server = super::open_server(data, config)?;
    tracing::debug!(op = request.op(), data = %data.display(), "running request");
    let response = server.handle(request);
    println!("{}", render(&response)?);

    if response.status().is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn render(response: &SyncResponse) -> serde_json::Result<String> {
    serde_json::to_string_pretty(response)
}
