//! Error types for profile reconciliation.

use crate::profile::ProfileId;
use crate::store::Revision;
use chrono::{DateTime, Utc};
use std::io;
use thiserror::Error;

/// Result type for profile store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for reconciliation and clearance operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors raised by a [`crate::ProfileStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] prefsync_storage::StorageError),

    /// A log record could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// The stored revision is not the one the writer read.
    #[error("revision conflict on profile {id}: expected {expected:?}, found {actual:?}")]
    RevisionConflict {
        /// Profile being written.
        id: ProfileId,
        /// Revision the writer expected (`None` = must not exist).
        expected: Option<Revision>,
        /// Revision actually stored (`None` = absent).
        actual: Option<Revision>,
    },

    /// The persisted log is unreadable.
    #[error("store corrupted: {0}")]
    Corrupted(String),
}

impl StoreError {
    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }
}

/// Errors returned by the reconciliation and clearance services.
///
/// `ClientCopyOutdated` and `ServerCopyNotNewer` are ordinary outcomes of the
/// timestamp comparison; see [`SyncError::is_negative_outcome`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// No profile exists for the identifier.
    #[error("profile not found: {0}")]
    NotFound(ProfileId),

    /// The identifier is already used by another profile.
    #[error("profile already exists: {0}")]
    AlreadyExists(ProfileId),

    /// A caller-supplied identifier does not have the required shape.
    #[error("malformed profile identifier: {0:?}")]
    MalformedIdentifier(String),

    /// Two freshly generated identifiers in a row were already taken.
    #[error("profile creation failed: generated identifiers exhausted")]
    IdentifierExhausted,

    /// The pushed copy is not newer than the stored one by more than the margin.
    #[error("client copy of {id} is outdated: stored change {stored}, client change {client}")]
    ClientCopyOutdated {
        /// Profile identifier.
        id: ProfileId,
        /// Stored `lastChange`.
        stored: DateTime<Utc>,
        /// Client-supplied `lastChange`.
        client: DateTime<Utc>,
    },

    /// The stored copy is not newer than the client's by more than the margin.
    #[error("server copy of {id} is not newer: stored change {stored}, client change {client}")]
    ServerCopyNotNewer {
        /// Profile identifier.
        id: ProfileId,
        /// Stored `lastChange`.
        stored: DateTime<Utc>,
        /// Client-supplied `lastChange`.
        client: DateTime<Utc>,
    },

    /// The profile has been deleted and accepts no further pushes.
    #[error("profile {0} is tombstoned")]
    AlreadyTombstoned(ProfileId),

    /// `list_all` found no profiles at all.
    #[error("no profiles in store")]
    EmptyStore,

    /// The profile store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    /// Returns true for the expected negative results of the conflict rule.
    ///
    /// Callers should report these as regular answers and not log them as failures.
    pub fn is_negative_outcome(&self) -> bool {
        matches!(
            self,
            SyncError::ClientCopyOutdated { .. } | SyncError::ServerCopyNotNewer { .. }
        )
    }

    /// Returns true if the request itself cannot succeed as sent.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SyncError::NotFound(_)
                | SyncError::AlreadyExists(_)
                | SyncError::MalformedIdentifier(_)
                | SyncError::ClientCopyOutdated { .. }
                | SyncError::ServerCopyNotNewer { .. }
                | SyncError::AlreadyTombstoned(_)
                | SyncError::EmptyStore
        )
    }

    /// Returns true if the failure is on the server side.
    pub fn is_server_error(&self) -> bool {
        matches!(self, SyncError::Store(_) | SyncError::IdentifierExhausted)
    }
}

/// Errors loading or validating a [`crate::SyncConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read configuration: {0}")]
    Io(#[from] io::Error),

    /// The configuration file is not valid JSON for the expected shape.
    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
