//! Error types for the sync server.

use crate::messages::Status;
use prefsync_core::SyncError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the sync server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A service call failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the status a client sees for this error.
    pub fn status(&self) -> Status {
        match self {
            ServerError::Sync(err) => match err {
                SyncError::NotFound(_) => Status::NOT_FOUND,
                SyncError::AlreadyExists(_)
                | SyncError::ClientCopyOutdated { .. }
                | SyncError::ServerCopyNotNewer { .. }
                | SyncError::EmptyStore => Status::CONFLICT,
                SyncError::MalformedIdentifier(_) => Status::UNPROCESSABLE_ENTITY,
                SyncError::AlreadyTombstoned(_) => Status::GONE,
                SyncError::IdentifierExhausted => Status::SERVICE_UNAVAILABLE,
                SyncError::Store(_) => Status::INTERNAL_SERVER_ERROR,
            },
            ServerError::InvalidRequest(_) => Status::BAD_REQUEST,
            ServerError::Internal(_) => Status::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns a stable machine-readable name for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Sync(err) => match err {
                SyncError::NotFound(_) => "not_found",
                SyncError::AlreadyExists(_) => "already_exists",
                SyncError::MalformedIdentifier(_) => "malformed_identifier",
                SyncError::IdentifierExhausted => "identifier_exhausted",
                SyncError::ClientCopyOutdated { .. } => "client_copy_outdated",
                SyncError::ServerCopyNotNewer { .. } => "server_copy_not_newer",
                SyncError::AlreadyTombstoned(_) => "already_tombstoned",
                SyncError::EmptyStore => "empty_store",
                SyncError::Store(_) => "store_failure",
            },
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::Internal(_) => "internal",
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        self.status().is_client_error()
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status().is_server_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use prefsync_core::ProfileId;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert!(ServerError::from(SyncError::IdentifierExhausted).is_server_error());
    }

    #[test]
    fn status_mapping() {
        let id = ProfileId::from("0123456789abcdef");
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let cases = [
            (SyncError::NotFound(id.clone()), 404),
            (SyncError::AlreadyExists(id.clone()), 409),
            (SyncError::MalformedIdentifier("x".into()), 422),
            (
                SyncError::ClientCopyOutdated {
                    id: id.clone(),
                    stored: at,
                    client: at,
                },
                409,
            ),
            (
                SyncError::ServerCopyNotNewer {
                    id: id.clone(),
                    stored: at,
                    client: at,
                },
                409,
            ),
            (SyncError::AlreadyTombstoned(id), 410),
            (SyncError::EmptyStore, 409),
            (SyncError::IdentifierExhausted, 503),
        ];
        for (err, code) in cases {
            assert_eq!(ServerError::from(err).status().code(), code);
        }
    }

    #[test]
    fn error_display() {
        let err = ServerError::from(SyncError::NotFound(ProfileId::from("abc")));
        assert_eq!(err.to_string(), "profile not found: abc");
        assert_eq!(err.kind(), "not_found");
    }

    #[test]
    fn transport_errors_are_distinct_from_service_errors() {
        let invalid = ServerError::InvalidRequest("not json".into());
        let internal = ServerError::Internal("scheduler task panicked".into());
        assert_eq!((invalid.status().code(), invalid.kind()), (400, "invalid_request"));
        assert_eq!((internal.status().code(), internal.kind()), (500, "internal"));
        assert_eq!(internal.to_string(), "internal error: scheduler task panicked");
    }
}
