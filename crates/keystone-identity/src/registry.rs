//! Key Registry
//!
//! Owns every key record of one identity: `KeyId -> (PurposeSet, KeyType)`.
//! A key is present iff its purpose set is non-empty; absence is the "no
//! purposes" state and `get_key` reports it as [`KeyRecord::EMPTY`].
//!
//! Mutations are authorized against the registry itself: the caller must be
//! the identity's own address (a self-call dispatched after approval) or act
//! through a key holding [`Purpose::MANAGEMENT`].

use keystone_core::{
    Address, IdentityError, IdentityEvent, IdentityResult, KeyId, KeyType, Purpose, PurposeSet,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Purposes and type held by one key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Capabilities held
    pub purposes: PurposeSet,
    /// Signature-scheme tag
    pub key_type: KeyType,
}

impl KeyRecord {
    /// Record reported for absent keys
    pub const EMPTY: KeyRecord = KeyRecord {
        purposes: PurposeSet::EMPTY,
        key_type: KeyType::NONE,
    };
}

/// Registry of keys for a single identity
#[derive(Debug, Clone)]
pub struct KeyRegistry {
    identity: Address,
    keys: BTreeMap<KeyId, KeyRecord>,
    initialized: bool,
}

impl KeyRegistry {
    /// Create an empty, uninitialized registry for the identity at `identity`
    pub fn new(identity: Address) -> Self {
        Self {
            identity,
            keys: BTreeMap::new(),
            initialized: false,
        }
    }

    /// Address of the identity that owns this registry
    pub fn identity(&self) -> Address {
        self.identity
    }

    /// Whether `initialize` has run
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Install the first MANAGEMENT key
    ///
    /// Succeeds once per registry; the key is derived from `caller`.
    pub fn initialize(&mut self, caller: Address, key_type: KeyType) -> IdentityResult<KeyId> {
        if self.initialized {
            return Err(IdentityError::AlreadyInitialized);
        }
        let key = caller.key_id();
        self.initialized = true;
        self.keys.insert(
            key,
            KeyRecord {
                purposes: Purpose::MANAGEMENT.into(),
                key_type,
            },
        );
        info!(identity = %self.identity, manager = %caller, key = %key, "identity initialized");
        Ok(key)
    }

    /// Purposes and type of `key`, or [`KeyRecord::EMPTY`] when absent
    pub fn get_key(&self, key: &KeyId) -> KeyRecord {
        self.keys.get(key).copied().unwrap_or(KeyRecord::EMPTY)
    }

    /// Whether `key` holds the single capability named by `selector`
    pub fn key_has_purpose(&self, key: &KeyId, selector: u64) -> IdentityResult<bool> {
        let purpose = Purpose::from_bits(selector).map_err(|err| {
            debug!(key = %key, selector, "rejected multi-bit purpose query");
            err
        })?;
        Ok(self.holds(key, purpose))
    }

    /// Typed membership test used by authorization checks
    pub fn holds(&self, key: &KeyId, purpose: Purpose) -> bool {
        self.keys
            .get(key)
            .is_some_and(|record| record.purposes.contains(purpose))
    }

    /// All keys holding the single capability named by `selector`
    pub fn keys_by_purpose(&self, selector: u64) -> IdentityResult<BTreeSet<KeyId>> {
        let purpose = Purpose::from_bits(selector)?;
        Ok(self
            .keys
            .iter()
            .filter(|(_, record)| record.purposes.contains(purpose))
            .map(|(key, _)| *key)
            .collect())
    }

    /// Number of keys holding `purpose`
    pub fn count_with(&self, purpose: Purpose) -> usize {
        self.keys
            .values()
            .filter(|record| record.purposes.contains(purpose))
            .count()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether no key is stored
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Iterate keys in identifier order
    pub fn iter(&self) -> impl Iterator<Item = (&KeyId, &KeyRecord)> {
        self.keys.iter()
    }

    /// Whether `caller` may act with `purpose`: either the identity itself or
    /// a principal whose derived key holds it
    pub fn is_authorized(&self, caller: &Address, purpose: Purpose) -> bool {
        *caller == self.identity || self.holds(&caller.key_id(), purpose)
    }

    /// Require MANAGEMENT authority for `caller`
    pub fn authorize_management(&self, caller: &Address) -> IdentityResult<()> {
        if self.is_authorized(caller, Purpose::MANAGEMENT) {
            Ok(())
        } else {
            debug!(caller = %caller, "management check failed");
            Err(IdentityError::Unauthorized {
                caller: *caller,
                required: Purpose::MANAGEMENT,
            })
        }
    }

    /// Replace the entry for `key`
    pub fn set_key(
        &mut self,
        caller: Address,
        key: KeyId,
        purposes: PurposeSet,
        key_type: KeyType,
    ) -> IdentityResult<IdentityEvent> {
        ensure_nonzero(&key)?;
        self.authorize_management(&caller)?;
        if purposes.is_empty() {
            return Err(IdentityError::invalid_key(format!(
                "{key} cannot be stored without purposes; remove it instead"
            )));
        }

        self.keys.insert(key, KeyRecord { purposes, key_type });
        info!(key = %key, purposes = %purposes, key_type = %key_type, by = %caller, "key set");
        Ok(IdentityEvent::KeySet {
            key,
            purposes,
            key_type,
        })
    }

    /// Merge one capability into `key`, creating it when absent
    pub fn add_key(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
        key_type: KeyType,
    ) -> IdentityResult<IdentityEvent> {
        ensure_nonzero(&key)?;
        self.authorize_management(&caller)?;
        let purpose = Purpose::from_bits(selector)?;
        if self.holds(&key, purpose) {
            return Err(IdentityError::KeyConflict { key, purpose });
        }

        let mut record = self.get_key(&key);
        record.purposes.insert(purpose);
        record.key_type = key_type;
        self.keys.insert(key, record);
        info!(key = %key, purpose = %purpose, by = %caller, "key purpose added");
        Ok(IdentityEvent::KeyAdded {
            key,
            purpose,
            key_type,
        })
    }

    /// Delete `key` and all its purposes
    pub fn remove_key(&mut self, caller: Address, key: KeyId) -> IdentityResult<IdentityEvent> {
        ensure_nonzero(&key)?;
        self.authorize_management(&caller)?;
        let removed = self
            .keys
            .remove(&key)
            .ok_or_else(|| IdentityError::invalid_key(format!("{key} is not registered")))?;

        info!(key = %key, purposes = %removed.purposes, by = %caller, "key removed");
        Ok(IdentityEvent::KeyRemoved {
            key,
            purposes: removed.purposes,
            key_type: removed.key_type,
        })
    }

    /// Clear one capability from `key`; the key disappears with its last one
    pub fn remove_key_purpose(
        &mut self,
        caller: Address,
        key: KeyId,
        selector: u64,
    ) -> IdentityResult<IdentityEvent> {
        ensure_nonzero(&key)?;
        self.authorize_management(&caller)?;
        let purpose = Purpose::from_bits(selector)?;
        let Some(record) = self.keys.get_mut(&key) else {
            return Err(IdentityError::invalid_key(format!("{key} is not registered")));
        };
        if !record.purposes.contains(purpose) {
            return Err(IdentityError::invalid_key(format!(
                "{key} does not hold {purpose}"
            )));
        }

        record.purposes.remove(purpose);
        let key_type = record.key_type;
        if record.purposes.is_empty() {
            self.keys.remove(&key);
        }
        info!(key = %key, purpose = %purpose, by = %caller, "key purpose removed");
        Ok(IdentityEvent::KeyRemoved {
            key,
            purposes: purpose.into(),
            key_type,
        })
    }
}

fn ensure_nonzero(key: &KeyId) -> IdentityResult<()> {
    if key.is_zero() {
        Err(IdentityError::invalid_key("zero key identifier"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Address {
        Address::new([0xee; 20])
    }

    fn manager() -> Address {
        Address::new([0x01; 20])
    }

    fn initialized() -> KeyRegistry {
        let mut registry = KeyRegistry::new(identity());
        registry.initialize(manager(), KeyType::ECDSA).unwrap();
        registry
    }

    #[test]
    fn test_absent_key_is_empty() {
        let registry = KeyRegistry::new(identity());
        let record = registry.get_key(&KeyId::new([9u8; 32]));
        assert_eq!(record, KeyRecord::EMPTY);
        assert!(!registry
            .key_has_purpose(&KeyId::new([9u8; 32]), Purpose::MANAGEMENT.bits())
            .unwrap());
    }

    #[test]
    fn test_initialize_installs_manager_once() {
        let mut registry = KeyRegistry::new(identity());
        let key = registry.initialize(manager(), KeyType::ECDSA).unwrap();
        assert_eq!(key, manager().key_id());
        assert!(registry.holds(&key, Purpose::MANAGEMENT));
        assert_eq!(registry.len(), 1);

        assert_eq!(
            registry.initialize(Address::new([2u8; 20]), KeyType::ECDSA),
            Err(IdentityError::AlreadyInitialized)
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_set_key_rejects_zero_before_authorization() {
        let mut registry = KeyRegistry::new(identity());
        let err = registry
            .set_key(
                Address::new([5u8; 20]),
                KeyId::ZERO,
                Purpose::EXECUTION.into(),
                KeyType::ECDSA,
            )
            .unwrap_err();
        assert_eq!(err.code(), "invalid_key");
    }

    #[test]
    fn test_identity_may_mutate_without_key() {
        let mut registry = initialized();
        let key = KeyId::new([3u8; 32]);
        registry
            .set_key(identity(), key, Purpose::EXECUTION.into(), KeyType::RSA)
            .unwrap();
        assert_eq!(registry.get_key(&key).key_type, KeyType::RSA);
    }

    #[test]
    fn test_remove_purpose_drops_empty_key() {
        let mut registry = initialized();
        let key = KeyId::new([4u8; 32]);
        registry
            .add_key(manager(), key, Purpose::EXECUTION.bits(), KeyType::ECDSA)
            .unwrap();
        registry
            .add_key(manager(), key, Purpose::ENCRYPTION.bits(), KeyType::ECDSA)
            .unwrap();

        registry
            .remove_key_purpose(manager(), key, Purpose::EXECUTION.bits())
            .unwrap();
        assert_eq!(
            registry.get_key(&key).purposes,
            PurposeSet::from(Purpose::ENCRYPTION)
        );

        registry
            .remove_key_purpose(manager(), key, Purpose::ENCRYPTION.bits())
            .unwrap();
        assert_eq!(registry.get_key(&key), KeyRecord::EMPTY);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_keys_by_purpose_sorted() {
        let mut registry = initialized();
        for seed in [9u8, 3, 6] {
            registry
                .set_key(
                    manager(),
                    KeyId::new([seed; 32]),
                    Purpose::EXECUTION.into(),
                    KeyType::ECDSA,
                )
                .unwrap();
        }
        let keys: Vec<_> = registry
            .keys_by_purpose(Purpose::EXECUTION.bits())
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(
            keys,
            vec![
                KeyId::new([3u8; 32]),
                KeyId::new([6u8; 32]),
                KeyId::new([9u8; 32])
            ]
        );
        assert_eq!(registry.count_with(Purpose::EXECUTION), 3);
        assert!(registry.keys_by_purpose(0b11).is_err());
    }
}
