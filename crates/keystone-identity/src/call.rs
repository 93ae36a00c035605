//! Self-call payloads
//!
//! When an execution targets the identity itself, its payload is a
//! bincode-encoded [`SelfCall`]. Only registry and threshold mutations can be
//! expressed; an identity cannot queue or vote on its own executions.

use keystone_core::{IdentityError, IdentityResult, KeyId, KeyType, Purpose, PurposeSet};
use serde::{Deserialize, Serialize};

/// Mutation of the identity's own authorization state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelfCall {
    /// Replace a key entry
    SetKey {
        /// Key to write
        key: KeyId,
        /// Full purpose set
        purposes: PurposeSet,
        /// Key type
        key_type: KeyType,
    },
    /// Merge one purpose into a key
    AddKey {
        /// Key to extend
        key: KeyId,
        /// Purpose to add
        purpose: Purpose,
        /// Key type
        key_type: KeyType,
    },
    /// Delete a key
    RemoveKey {
        /// Key to delete
        key: KeyId,
    },
    /// Clear one purpose from a key
    RemoveKeyPurpose {
        /// Key to shrink
        key: KeyId,
        /// Purpose to clear
        purpose: Purpose,
    },
    /// Change the approval threshold of a purpose
    ChangeKeysRequired {
        /// Purpose whose threshold changes
        purpose: Purpose,
        /// New count
        count: u32,
    },
}

impl SelfCall {
    /// Encode as an execution payload
    pub fn encode(&self) -> IdentityResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| IdentityError::serialization(e.to_string()))
    }

    /// Decode an execution payload
    pub fn decode(payload: &[u8]) -> IdentityResult<Self> {
        bincode::deserialize(payload).map_err(|e| IdentityError::serialization(e.to_string()))
    }

    /// Short operation name for logs
    pub fn name(&self) -> &'static str {
        match self {
            SelfCall::SetKey { .. } => "set_key",
            SelfCall::AddKey { .. } => "add_key",
            SelfCall::RemoveKey { .. } => "remove_key",
            SelfCall::RemoveKeyPurpose { .. } => "remove_key_purpose",
            SelfCall::ChangeKeysRequired { .. } => "change_keys_required",
        }
    }
}
