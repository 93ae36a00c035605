//! Keystone Testing Infrastructure
//!
//! Common setup for identity tests: deterministic actors, an identity
//! builder that installs keys and thresholds, an external call collaborator
//! that records what it was asked to do, and proptest strategies.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//!
//! # Usage
//!
//! ```rust,no_run
//! use keystone_testkit::*;
//!
//! let fixture = IdentityFixture::builder()
//!     .executors(3)
//!     .execution_threshold(2)
//!     .build();
//! assert_eq!(fixture.executors.len(), 3);
//! ```

/// Recording external call collaborator
pub mod external;
/// Deterministic actors and identity builder
pub mod fixtures;
/// Proptest strategies
pub mod strategies;

pub use external::{CallRecord, RecordingExternalCall};
pub use fixtures::{actor, IdentityFixture, IdentityFixtureBuilder};
