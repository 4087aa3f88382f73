//! # prefsync testkit
//!
//! Test utilities for prefsync.
//!
//! This crate provides:
//! - [`TestHarness`]: services wired to a [`prefsync_core::ManualClock`] over
//!   a memory or temporary file store
//! - proptest strategies for identifiers, payloads and timestamp offsets
//!
//! ## Usage
//!
//! ```rust
//! use prefsync_testkit::TestHarness;
//!
//! let harness = TestHarness::memory();
//! let profile = harness.reconcile.create_profile(None).unwrap();
//! assert!(harness.stored(profile.id()).is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
