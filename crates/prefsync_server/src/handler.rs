//! Request handlers for sync operations.

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::messages::{SyncRequest, SyncResponse};
use prefsync_core::{ClearanceService, Clock, ProfileStore, ReconciliationService};
use std::sync::Arc;

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Profile reconciliation.
    pub reconcile: ReconciliationService,
    /// Physical deletion, shared with the background scheduler.
    pub clearance: Arc<ClearanceService>,
}

impl HandlerContext {
    /// Creates the services over `store` and `clock`.
    pub fn new(config: ServerConfig, store: Arc<dyn ProfileStore>, clock: Arc<dyn Clock>) -> Self {
        let reconcile =
            ReconciliationService::new(config.sync.clone(), Arc::clone(&store), Arc::clone(&clock));
        let clearance = Arc::new(ClearanceService::new(&config.sync, store, clock));
        Self {
            config,
            reconcile,
            clearance,
        }
    }
}

/// Handler for sync requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Executes a request against the services.
    pub fn handle(&self, request: SyncRequest) -> ServerResult<SyncResponse> {
        let reconcile = &self.context.reconcile;
        let response = match request {
            SyncRequest::Create { id } => SyncResponse::Created {
                profile: reconcile.create_profile(id.as_deref())?,
            },
            SyncRequest::Get { id } => SyncResponse::Profile {
                profile: reconcile.get_profile(&id)?,
            },
            SyncRequest::Pull { id, since } => SyncResponse::Profile {
                profile: reconcile.get_profile_if_newer_than(&id, since)?,
            },
            SyncRequest::Push {
                id,
                changed,
                preferences,
                force,
            } => {
                reconcile.push_profile(&id, changed, preferences, force)?;
                SyncResponse::Accepted
            }
            SyncRequest::Delete { id, preferences } => {
                reconcile.tombstone_profile(&id, preferences)?;
                SyncResponse::Deleted
            }
            SyncRequest::ListAll => SyncResponse::Profiles {
                profiles: reconcile.list_all()?,
            },
            SyncRequest::ListTombstoned => SyncResponse::Profiles {
                profiles: reconcile.list_tombstoned()?,
            },
            SyncRequest::LastChange { id } => SyncResponse::Timestamp {
                at: reconcile.last_change(&id)?,
            },
            SyncRequest::LastContact { id } => SyncResponse::Timestamp {
                at: reconcile.last_contact(&id)?,
            },
            SyncRequest::Count => SyncResponse::Count {
                count: reconcile.profile_count()?,
            },
            SyncRequest::Sweep => SyncResponse::Swept {
                report: self.context.clearance.run_clearance_sweep()?,
            },
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServerError;
    use chrono::TimeDelta;
    use prefsync_core::{ManualClock, MemoryProfileStore, ProfileId, SyncError};
    use prefsync_testkit::start_time;

    fn create_handler() -> (RequestHandler, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start_time()));
        let context = Arc::new(HandlerContext::new(
            ServerConfig::default(),
            Arc::new(MemoryProfileStore::new()),
            clock.clone(),
        ));
        (RequestHandler::new(context), clock)
    }

    fn create(handler: &RequestHandler) -> ProfileId {
        match handler.handle(SyncRequest::Create { id: None }).unwrap() {
            SyncResponse::Created { profile } => profile.id().clone(),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn create_and_get() {
        let (handler, _) = create_handler();
        let id = create(&handler);

        let response = handler.handle(SyncRequest::Get { id: id.clone() }).unwrap();
        match response {
            SyncResponse::Profile { profile } => assert_eq!(profile.id(), &id),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn push_then_pull() {
        let (handler, clock) = create_handler();
        let id = create(&handler);

        let response = handler
            .handle(SyncRequest::Push {
                id: id.clone(),
                changed: clock.now(),
                preferences: Some("compact".into()),
                force: false,
            })
            .unwrap();
        assert_eq!(response, SyncResponse::Accepted);

        // a client that last changed an hour before sees the server copy
        let response = handler
            .handle(SyncRequest::Pull {
                id: id.clone(),
                since: clock.now() - TimeDelta::hours(1),
            })
            .unwrap();
        match response {
            SyncResponse::Profile { profile } => assert_eq!(profile.preferences(), Some("compact")),
            other => panic!("unexpected response: {other:?}"),
        }

        // a client within the margin keeps its copy
        let err = handler
            .handle(SyncRequest::Pull {
                id,
                since: clock.now() - TimeDelta::minutes(2),
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Sync(SyncError::ServerCopyNotNewer { .. })
        ));
    }

    #[test]
    fn delete_then_push_is_gone() {
        let (handler, clock) = create_handler();
        let id = create(&handler);

        handler
            .handle(SyncRequest::Delete {
                id: id.clone(),
                preferences: None,
            })
            .unwrap();
        let err = handler
            .handle(SyncRequest::Push {
                id,
                changed: clock.now(),
                preferences: None,
                force: true,
            })
            .unwrap_err();
        assert_eq!(err.status().code(), 410);
    }

    #[test]
    fn count_and_sweep() {
        let (handler, _) = create_handler();
        let id = create(&handler);
        handler
            .handle(SyncRequest::Delete {
                id,
                preferences: None,
            })
            .unwrap();

        assert_eq!(
            handler.handle(SyncRequest::Count).unwrap(),
            SyncResponse::Count { count: 1 }
        );
        match handler.handle(SyncRequest::Sweep).unwrap() {
            SyncResponse::Swept { report } => assert_eq!(report.deleted, 1),
            other => panic!("unexpected response: {other:?}"),
        }
        assert_eq!(
            handler.handle(SyncRequest::Count).unwrap(),
            SyncResponse::Count { count: 0 }
        );
    }
}
