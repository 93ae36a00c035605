//! Keystone Core - Identity Authorization Foundation
//!
//! Pure types shared by every Keystone crate. Nothing in here owns mutable
//! identity state; the registry and approval engine live in
//! `keystone-identity`.
//!
//! # Contents
//!
//! - Identifiers: `KeyId` (32 bytes, never zero when stored), `Address`
//!   (20-byte principal), `ExecutionId` (monotonic request counter)
//! - Capabilities: `PurposeSet` bitmask and the validated single-bit `Purpose`
//!   selector used by every has-purpose query
//! - Errors: the unified `IdentityError` taxonomy
//! - Notifications: `IdentityEvent` values emitted by successful mutations
//! - Configuration: `IdentityConfig` loaded from TOML and the environment

#![forbid(unsafe_code)]

/// Unified error handling
pub mod errors;

/// Pure synchronous hashing used for key derivation
pub mod hash;

/// Key, principal and execution identifiers
pub mod identifiers;

/// Capability bitmask and single-bit selectors
pub mod purpose;

/// Notifications emitted by identity mutations
pub mod events;

/// Identity configuration
pub mod config;

pub use config::IdentityConfig;
pub use errors::{IdentityError, IdentityResult};
pub use events::{EventRecord, IdentityEvent};
pub use identifiers::{Address, ExecutionId, KeyId};
pub use purpose::{KeyType, Purpose, PurposeSet};
