//! Key registry tests through the identity facade

use assert_matches::assert_matches;
use keystone_core::{
    IdentityConfig, IdentityError, IdentityEvent, KeyId, KeyType, Purpose, PurposeSet,
};
use keystone_identity::{Identity, KeyRecord};
use keystone_testkit::{actor, IdentityFixture};

#[test]
fn initialize_installs_single_manager() {
    let mut identity = Identity::new(actor("identity"), IdentityConfig::default());
    let manager = actor("manager");
    let key = identity.initialize(manager).unwrap();

    assert_eq!(key, manager.key_id());
    assert!(identity.key_has_purpose(&key, Purpose::MANAGEMENT.bits()).unwrap());
    assert_eq!(
        identity.keys_by_purpose(Purpose::MANAGEMENT.bits()).unwrap().len(),
        1
    );
    assert_eq!(
        identity.initialize(actor("other")),
        Err(IdentityError::AlreadyInitialized)
    );
}

#[test]
fn set_key_replaces_entry() {
    let mut fixture = IdentityFixture::builder().keep_events().build();
    let manager = fixture.manager;
    let key = actor("device").key_id();

    let both = PurposeSet::from(Purpose::EXECUTION).with(Purpose::ENCRYPTION);
    fixture
        .identity
        .set_key(manager, key, both, KeyType::ECDSA)
        .unwrap();
    fixture
        .identity
        .set_key(manager, key, Purpose::CLAIM_SIGNER.into(), KeyType::RSA)
        .unwrap();

    assert_eq!(
        fixture.identity.get_key(&key),
        KeyRecord {
            purposes: Purpose::CLAIM_SIGNER.into(),
            key_type: KeyType::RSA
        }
    );
    assert!(!fixture
        .identity
        .key_has_purpose(&key, Purpose::EXECUTION.bits())
        .unwrap());
    assert_eq!(fixture.identity.events().len(), 2);
}

#[test]
fn add_key_merges_and_detects_conflict() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    let key = actor("device").key_id();

    fixture
        .identity
        .add_key(manager, key, Purpose::EXECUTION.bits(), KeyType::ECDSA)
        .unwrap();
    fixture
        .identity
        .add_key(manager, key, Purpose::CLAIM_SIGNER.bits(), KeyType::ECDSA)
        .unwrap();
    assert_eq!(fixture.identity.get_key(&key).purposes.len(), 2);

    assert_eq!(
        fixture
            .identity
            .add_key(manager, key, Purpose::EXECUTION.bits(), KeyType::ECDSA),
        Err(IdentityError::KeyConflict {
            key,
            purpose: Purpose::EXECUTION
        })
    );
}

#[test]
fn remove_key_purpose_drops_key_with_last_purpose() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    let key = actor("device").key_id();
    fixture
        .identity
        .add_key(manager, key, Purpose::EXECUTION.bits(), KeyType::ECDSA)
        .unwrap();

    fixture
        .identity
        .remove_key_purpose(manager, key, Purpose::EXECUTION.bits())
        .unwrap();
    assert_eq!(fixture.identity.get_key(&key), KeyRecord::EMPTY);
    assert!(!fixture.identity.registry().iter().any(|(k, _)| *k == key));
}

#[test]
fn remove_key_clears_every_purpose() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    let key = actor("device").key_id();
    fixture
        .identity
        .set_key(
            manager,
            key,
            PurposeSet::from_bits(0b1110),
            KeyType::ECDSA,
        )
        .unwrap();
    fixture.identity.take_events();

    fixture.identity.remove_key(manager, key).unwrap();
    assert_eq!(fixture.identity.get_key(&key), KeyRecord::EMPTY);
    assert_matches!(
        &fixture.identity.events()[0].event,
        IdentityEvent::KeyRemoved { purposes, .. } if purposes.bits() == 0b1110
    );

    assert_matches!(
        fixture.identity.remove_key(manager, key),
        Err(IdentityError::InvalidKey { .. })
    );
}

#[test]
fn zero_key_rejected() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    assert_matches!(
        fixture
            .identity
            .add_key(manager, KeyId::ZERO, Purpose::EXECUTION.bits(), KeyType::ECDSA),
        Err(IdentityError::InvalidKey { .. })
    );
    assert!(fixture.identity.events().is_empty());
}

#[test]
fn non_manager_cannot_mutate() {
    let mut fixture = IdentityFixture::builder().executors(1).build();
    let executor = fixture.executors[0];
    let target = actor("device").key_id();

    let err = fixture
        .identity
        .add_key(executor, target, Purpose::EXECUTION.bits(), KeyType::ECDSA)
        .unwrap_err();
    assert_eq!(
        err,
        IdentityError::Unauthorized {
            caller: executor,
            required: Purpose::MANAGEMENT
        }
    );
    assert_eq!(fixture.identity.get_key(&target), KeyRecord::EMPTY);
}

#[test]
fn multi_bit_selector_rejected_everywhere() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    let key = manager.key_id();
    let selector = Purpose::MANAGEMENT.bits() | Purpose::EXECUTION.bits();

    assert_eq!(
        fixture.identity.key_has_purpose(&key, selector),
        Err(IdentityError::InvalidPurposeSelector { selector })
    );
    assert!(fixture.identity.keys_by_purpose(0).is_err());
    assert!(fixture.identity.keys_required(selector).is_err());
    assert!(fixture
        .identity
        .change_keys_required(manager, selector, 1)
        .is_err());
    assert!(fixture
        .identity
        .add_key(manager, actor("x").key_id(), selector, KeyType::ECDSA)
        .is_err());
}

#[test]
fn threshold_zero_rejected() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    assert_eq!(
        fixture
            .identity
            .change_keys_required(manager, Purpose::EXECUTION.bits(), 0),
        Err(IdentityError::InvalidThreshold {
            purpose: Purpose::EXECUTION,
            count: 0
        })
    );
    assert_eq!(
        fixture
            .identity
            .keys_required(Purpose::EXECUTION.bits())
            .unwrap(),
        1
    );
}

#[test]
fn manager_can_remove_itself() {
    let mut fixture = IdentityFixture::basic();
    let manager = fixture.manager;
    fixture
        .identity
        .remove_key(manager, manager.key_id())
        .unwrap();

    assert!(fixture
        .identity
        .keys_by_purpose(Purpose::MANAGEMENT.bits())
        .unwrap()
        .is_empty());
    assert_matches!(
        fixture
            .identity
            .add_key(manager, manager.key_id(), Purpose::MANAGEMENT.bits(), KeyType::ECDSA),
        Err(IdentityError::Unauthorized { .. })
    );
}
