//! # prefsync storage
//!
//! Byte log backends underneath the durable profile store.
//!
//! Backends are **opaque append-only logs**: they never interpret the bytes
//! they hold. Record framing, encoding and replay belong to `prefsync_core`.
//!
//! ## Design Principles
//!
//! - A backend is a single growing byte sequence (append, read back, sync)
//! - Compaction swaps the whole sequence at once through [`StorageBackend::replace`]
//! - Must be `Send + Sync` so a store can sit behind shared service handles
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For tests and ephemeral servers
//! - [`FileBackend`] - For persistent storage using OS file APIs
//!
//! ## Example
//!
//! ```rust
//! use prefsync_storage::{StorageBackend, InMemoryBackend};
//!
//! let mut backend = InMemoryBackend::new();
//! backend.append(b"hello ").unwrap();
//! backend.append(b"world").unwrap();
//! assert_eq!(backend.read_all().unwrap(), b"hello world");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;
