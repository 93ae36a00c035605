//! Identity notifications
//!
//! Every successful mutation emits exactly one [`IdentityEvent`] (an approval
//! that dispatches emits its `Approved` and then its `Executed` or
//! `ExecutionFailed`). Failed calls emit nothing.

use crate::identifiers::{Address, ExecutionId, KeyId};
use crate::purpose::{KeyType, Purpose, PurposeSet};
use serde::{Deserialize, Serialize};

/// Notification emitted by an identity state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum IdentityEvent {
    /// Key entry replaced wholesale
    KeySet {
        /// Key that was written
        key: KeyId,
        /// Purposes it now holds
        purposes: PurposeSet,
        /// Key type it now carries
        key_type: KeyType,
    },

    /// One purpose merged into a key
    KeyAdded {
        /// Key that was extended
        key: KeyId,
        /// Purpose that was added
        purpose: Purpose,
        /// Key type it now carries
        key_type: KeyType,
    },

    /// Purposes removed from a key
    KeyRemoved {
        /// Key that lost purposes
        key: KeyId,
        /// Purposes that were removed
        purposes: PurposeSet,
        /// Key type at the time of removal
        key_type: KeyType,
    },

    /// Approval threshold changed for a purpose
    KeysRequiredChanged {
        /// Purpose whose threshold changed
        purpose: Purpose,
        /// New required approval count
        count: u32,
    },

    /// New execution recorded as pending
    ExecutionRequested {
        /// Allocated execution id
        id: ExecutionId,
        /// Call target
        target: Address,
        /// Amount attached to the call
        value: u128,
        /// Opaque call data
        #[serde(with = "hex_bytes")]
        payload: Vec<u8>,
    },

    /// Vote recorded on an execution
    Approved {
        /// Execution voted on
        id: ExecutionId,
        /// Key that voted
        key: KeyId,
        /// Whether the vote approves
        approved: bool,
    },

    /// Approved execution dispatched successfully
    Executed {
        /// Execution that ran
        id: ExecutionId,
        /// Call target
        target: Address,
        /// Amount attached to the call
        value: u128,
        /// Data returned by the target
        #[serde(with = "hex_bytes")]
        output: Vec<u8>,
    },

    /// Approved execution dispatched but the target failed
    ExecutionFailed {
        /// Execution that ran
        id: ExecutionId,
        /// Call target
        target: Address,
        /// Amount attached to the call
        value: u128,
        /// Failure reported by the target
        reason: String,
    },
}

impl IdentityEvent {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            IdentityEvent::KeySet { .. } => "key_set",
            IdentityEvent::KeyAdded { .. } => "key_added",
            IdentityEvent::KeyRemoved { .. } => "key_removed",
            IdentityEvent::KeysRequiredChanged { .. } => "keys_required_changed",
            IdentityEvent::ExecutionRequested { .. } => "execution_requested",
            IdentityEvent::Approved { .. } => "approved",
            IdentityEvent::Executed { .. } => "executed",
            IdentityEvent::ExecutionFailed { .. } => "execution_failed",
        }
    }

    /// Execution this event belongs to, if any
    pub fn execution_id(&self) -> Option<ExecutionId> {
        match self {
            IdentityEvent::ExecutionRequested { id, .. }
            | IdentityEvent::Approved { id, .. }
            | IdentityEvent::Executed { id, .. }
            | IdentityEvent::ExecutionFailed { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Key this event is about, if any
    pub fn key(&self) -> Option<KeyId> {
        match self {
            IdentityEvent::KeySet { key, .. }
            | IdentityEvent::KeyAdded { key, .. }
            | IdentityEvent::KeyRemoved { key, .. }
            | IdentityEvent::Approved { key, .. } => Some(*key),
            _ => None,
        }
    }
}

/// Event with its position in the identity's notification log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in emission order, starting at 0
    pub sequence: u64,
    /// The notification
    #[serde(flatten)]
    pub event: IdentityEvent,
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let approved = IdentityEvent::Approved {
            id: ExecutionId::new(3),
            key: KeyId::new([1u8; 32]),
            approved: true,
        };
        assert_eq!(approved.event_type(), "approved");
        assert_eq!(approved.execution_id(), Some(ExecutionId::new(3)));
        assert_eq!(approved.key(), Some(KeyId::new([1u8; 32])));

        let changed = IdentityEvent::KeysRequiredChanged {
            purpose: Purpose::MANAGEMENT,
            count: 2,
        };
        assert_eq!(changed.execution_id(), None);
        assert_eq!(changed.key(), None);
    }

    #[test]
    fn test_json_shape() {
        let record = EventRecord {
            sequence: 4,
            event: IdentityEvent::ExecutionRequested {
                id: ExecutionId::new(1),
                target: Address::new([0u8; 20]),
                value: 0,
                payload: vec![0xde, 0xad],
            },
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sequence"], 4);
        assert_eq!(json["event"], "execution_requested");
        assert_eq!(json["payload"], "dead");
    }
}
