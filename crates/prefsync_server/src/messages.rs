//! Request and response messages.
//!
//! Both sides are JSON objects tagged by a single field: requests by `op`,
//! responses by `result`.

use chrono::{DateTime, Utc};
use prefsync_core::{Profile, ProfileId, SweepReport};
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-style status code of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(u16);

impl Status {
    /// 200
    pub const OK: Status = Status(200);
    /// 201
    pub const CREATED: Status = Status(201);
    /// 400
    pub const BAD_REQUEST: Status = Status(400);
    /// 404
    pub const NOT_FOUND: Status = Status(404);
    /// 409
    pub const CONFLICT: Status = Status(409);
    /// 410
    pub const GONE: Status = Status(410);
    /// 422
    pub const UNPROCESSABLE_ENTITY: Status = Status(422);
    /// 500
    pub const INTERNAL_SERVER_ERROR: Status = Status(500);
    /// 503
    pub const SERVICE_UNAVAILABLE: Status = Status(503);

    /// Returns the numeric code.
    pub fn code(self) -> u16 {
        self.0
    }

    /// Returns true for 2xx codes.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.0)
    }

    /// Returns true for 4xx codes.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.0)
    }

    /// Returns true for 5xx codes.
    pub fn is_server_error(self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A request to the sync server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncRequest {
    /// Create a profile, optionally under a caller-chosen id.
    Create {
        /// Requested identifier.
        #[serde(default)]
        id: Option<String>,
    },
    /// Fetch a profile unconditionally.
    Get {
        /// Profile identifier.
        id: ProfileId,
    },
    /// Fetch a profile only if the stored copy is clearly newer.
    Pull {
        /// Profile identifier.
        id: ProfileId,
        /// The client's `last_change`.
        since: DateTime<Utc>,
    },
    /// Offer the client's copy.
    Push {
        /// Profile identifier.
        id: ProfileId,
        /// The client's `last_change`.
        changed: DateTime<Utc>,
        /// The client's preferences.
        #[serde(default)]
        preferences: Option<String>,
        /// Accept regardless of timestamps.
        #[serde(default)]
        force: bool,
    },
    /// Tombstone a profile.
    Delete {
        /// Profile identifier.
        id: ProfileId,
        /// Payload kept on the tombstone.
        #[serde(default)]
        preferences: Option<String>,
    },
    /// List every profile.
    ListAll,
    /// List tombstoned profiles.
    ListTombstoned,
    /// Read a profile's `last_change`.
    LastChange {
        /// Profile identifier.
        id: ProfileId,
    },
    /// Read a profile's `last_contact`.
    LastContact {
        /// Profile identifier.
        id: ProfileId,
    },
    /// Count stored profiles.
    Count,
    /// Run a clearance sweep now.
    Sweep,
}

impl SyncRequest {
    /// Returns the operation name, as used in the `op` tag.
    pub fn op(&self) -> &'static str {
        match self {
            SyncRequest::Create { .. } => "create",
            SyncRequest::Get { .. } => "get",
            SyncRequest::Pull { .. } => "pull",
            SyncRequest::Push { .. } => "push",
            SyncRequest::Delete { .. } => "delete",
            SyncRequest::ListAll => "list_all",
            SyncRequest::ListTombstoned => "list_tombstoned",
            SyncRequest::LastChange { .. } => "last_change",
            SyncRequest::LastContact { .. } => "last_contact",
            SyncRequest::Count => "count",
            SyncRequest::Sweep => "sweep",
        }
    }
}

/// Body of a rejected request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Status code.
    pub status: Status,
    /// Machine-readable error name.
    pub error: String,
    /// Human-readable description.
    pub message: String,
}

/// A response from the sync server.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncResponse {
    /// A profile was created.
    Created {
        /// The new profile.
        profile: Profile,
    },
    /// A single profile.
    Profile {
        /// The profile.
        profile: Profile,
    },
    /// Several profiles, ordered by id.
    Profiles {
        /// The profiles.
        profiles: Vec<Profile>,
    },
    /// A push was stored.
    Accepted,
    /// A profile was tombstoned.
    Deleted,
    /// A timestamp read.
    Timestamp {
        /// The value.
        at: DateTime<Utc>,
    },
    /// A profile count.
    Count {
        /// The value.
        count: usize,
    },
    /// Outcome of an on-demand sweep.
    Swept {
        /// The report.
        report: SweepReport,
    },
    /// The request was rejected.
    Error(ErrorBody),
}

impl SyncResponse {
    /// Returns the status code of the response.
    pub fn status(&self) -> Status {
        match self {
            SyncResponse::Created { .. } => Status::CREATED,
            SyncResponse::Error(body) => body.status,
            _ => Status::OK,
        }
    }

    /// Returns the error body, if the request was rejected.
    pub fn error(&self) -> Option<&ErrorBody> {
        match self {
            SyncResponse::Error(body) => Some(body),
            _ => None,
        }
    }
}
