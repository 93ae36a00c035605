//! Property tests for registry and approval invariants

use keystone_core::{IdentityError, Purpose};
use keystone_identity::ExecutionState;
use keystone_testkit::strategies::{
    arb_invalid_selector, arb_key_id, arb_key_type, arb_purpose, arb_purpose_set,
};
use keystone_testkit::{actor, IdentityFixture};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Stored keys always report exactly the purposes they were set with
    #[test]
    fn set_key_reflected_by_has_purpose(
        key in arb_key_id(),
        purposes in arb_purpose_set(),
        key_type in arb_key_type(),
        probe in arb_purpose(),
    ) {
        let mut fixture = IdentityFixture::basic();
        let manager = fixture.manager;
        fixture.identity.set_key(manager, key, purposes, key_type).unwrap();

        let held = fixture.identity.key_has_purpose(&key, probe.bits()).unwrap();
        prop_assert_eq!(held, purposes.contains(probe));
        prop_assert_eq!(fixture.identity.get_key(&key).key_type, key_type);
    }

    /// Selectors without exactly one bit never pass validation
    #[test]
    fn invalid_selector_always_rejected(selector in arb_invalid_selector()) {
        let fixture = IdentityFixture::basic();
        let key = fixture.manager.key_id();
        prop_assert_eq!(
            fixture.identity.key_has_purpose(&key, selector),
            Err(IdentityError::InvalidPurposeSelector { selector })
        );
    }

    /// An execution dispatches exactly when distinct approvals reach the threshold
    #[test]
    fn dispatch_at_threshold(executors in 1usize..6, threshold in 1u32..6) {
        let mut fixture = IdentityFixture::builder()
            .executors(executors)
            .execution_threshold(threshold)
            .build();
        let voters = fixture.executors.clone();

        let id = fixture
            .identity
            .execute(voters[0], actor("contract"), 0, vec![])
            .unwrap();
        for voter in voters.iter().skip(1) {
            if fixture.identity.execution(id).unwrap().state != ExecutionState::Pending {
                break;
            }
            fixture.identity.approve(*voter, id, true).unwrap();
        }

        let execution = fixture.identity.execution(id).unwrap();
        let reached = executors >= threshold as usize;
        prop_assert_eq!(execution.state == ExecutionState::Executed, reached);
        prop_assert_eq!(fixture.external.calls().len(), usize::from(reached));
        prop_assert!(execution.approvals() <= threshold as usize);
    }

    /// Clearing every purpose one by one removes the key
    #[test]
    fn removing_all_purposes_removes_key(key in arb_key_id(), purposes in arb_purpose_set()) {
        let mut fixture = IdentityFixture::basic();
        let manager = fixture.manager;
        prop_assume!(key != manager.key_id());
        fixture
            .identity
            .set_key(manager, key, purposes, keystone_core::KeyType::ECDSA)
            .unwrap();
        for purpose in purposes.iter() {
            fixture
                .identity
                .remove_key_purpose(manager, key, purpose.bits())
                .unwrap();
        }
        prop_assert!(fixture.identity.get_key(&key).purposes.is_empty());
        prop_assert!(!fixture
            .identity
            .keys_by_purpose(Purpose::EXECUTION.bits())
            .unwrap()
            .contains(&key));
    }
}
