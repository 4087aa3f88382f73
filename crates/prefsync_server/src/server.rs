//! Main sync server.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{HandlerContext, RequestHandler};
use crate::messages::{ErrorBody, Status, SyncRequest, SyncResponse};
use crate::scheduler::ClearanceScheduler;
use prefsync_core::{ClearanceService, Clock, ProfileStore};
use std::sync::Arc;

/// The sync server.
///
/// Owns the reconciliation and clearance services for one store and turns
/// every failure into an [`ErrorBody`] carrying an HTTP-style status, ready
/// to be exposed by a transport of the embedder's choice.
///
/// # Example
///
/// ```
/// use prefsync_core::{MemoryProfileStore, SystemClock};
/// use prefsync_server::{ServerConfig, SyncRequest, SyncServer};
/// use std::sync::Arc;
///
/// let server = SyncServer::new(
///     ServerConfig::default(),
///     Arc::new(MemoryProfileStore::new()),
///     Arc::new(SystemClock),
/// );
/// let response = server.handle(SyncRequest::ListAll);
/// assert_eq!(response.status().code(), 409);
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a new sync server over `store`.
    pub fn new(config: ServerConfig, store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store, clock));
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the clearance service shared with the scheduler.
    pub fn clearance(&self) -> Arc<ClearanceService> {
        Arc::clone(&self.context.clearance)
    }

    /// Handles a request, converting failures into error responses.
    pub fn handle(&self, request: SyncRequest) -> SyncResponse {
        let op = request.op();
        match self.handler.handle(request) {
            Ok(response) => response,
            Err(err) => {
                log_rejection(op, &err);
                SyncResponse::Error(error_body(&err))
            }
        }
    }

    /// Handles a JSON-encoded request and returns the JSON-encoded response.
    ///
    /// Requests that do not parse are answered with a 400 error body.
    pub fn handle_json(&self, request: &str) -> String {
        let response = match serde_json::from_str::<SyncRequest>(request) {
            Ok(request) => self.handle(request),
            Err(e) => {
                let err = ServerError::InvalidRequest(e.to_string());
                tracing::debug!(error = %err, "unparseable request");
                SyncResponse::Error(error_body(&err))
            }
        };
        encode(&response)
    }

    /// Starts the background clearance sweep if the configuration asks for it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start_scheduler(&self) -> Option<ClearanceScheduler> {
        if !self.context.config.run_scheduler {
            return None;
        }
        Some(ClearanceScheduler::spawn(
            self.clearance(),
            self.context.config.sync.sweep_cadence,
        ))
    }
}

fn error_body(err: &ServerError) -> ErrorBody {
    ErrorBody {
        status: err.status(),
        error: err.kind().to_owned(),
        message: err.to_string(),
    }
}

fn log_rejection(op: &str, err: &ServerError) {
    match err {
        ServerError::Sync(sync) if sync.is_negative_outcome() => {
            tracing::debug!(op, error = %err, "request declined");
        }
        _ if err.is_server_error() => tracing::error!(op, error = %err, "request failed"),
        _ => tracing::info!(op, error = %err, "request rejected"),
    }
}

fn encode(response: &SyncResponse) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::error!(error = %e, "cannot encode response");
        format!(
            r#"{{"result":"error","status":{},"error":"internal","message":"response encoding failed"}}"#,
            Status::INTERNAL_SERVER_ERROR
        )
    })
}
