//! # prefsync server
//!
//! Request surface for the prefsync services.
//!
//! This crate provides:
//! - [`SyncRequest`] / [`SyncResponse`] messages with a JSON encoding
//! - [`RequestHandler`] translating requests into service calls
//! - [`SyncServer`], which owns the services and maps failures to
//!   HTTP-style [`Status`] codes
//! - [`ClearanceScheduler`], the background task that runs the clearance
//!   sweep on a fixed cadence
//!
//! # Protocol
//!
//! Clients synchronize with pull-then-push:
//! 1. Pull with the local `last_change`; the server answers with its copy
//!    only if that copy is clearly newer
//! 2. Push local edits with their `last_change`; the server keeps them only
//!    if they are clearly newer than its copy
//!
//! "Clearly" means by more than the configured conflict margin.
//!
//! ```rust
//! use prefsync_core::{MemoryProfileStore, SystemClock};
//! use prefsync_server::{ServerConfig, SyncServer};
//! use std::sync::Arc;
//!
//! let server = SyncServer::new(
//!     ServerConfig::default(),
//!     Arc::new(MemoryProfileStore::new()),
//!     Arc::new(SystemClock),
//! );
//! let reply = server.handle_json(r#"{"op":"create"}"#);
//! assert!(reply.contains("\"result\":\"created\""));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod handler;
mod messages;
mod scheduler;
mod server;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use messages::{ErrorBody, Status, SyncRequest, SyncResponse};
pub use scheduler::ClearanceScheduler;
pub use server::SyncServer;
