//! Property test strategies for Keystone types

use proptest::prelude::*;

pub use proptest;

use keystone_core::{Address, KeyId, KeyType, Purpose, PurposeSet};

/// Strategy for non-zero key ids
pub fn arb_key_id() -> impl Strategy<Value = KeyId> {
    any::<[u8; 32]>()
        .prop_filter("key id must be non-zero", |bytes| bytes.iter().any(|b| *b != 0))
        .prop_map(KeyId::new)
}

/// Strategy for addresses
pub fn arb_address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(Address::new)
}

/// Strategy for one of the four named purposes
pub fn arb_purpose() -> impl Strategy<Value = Purpose> {
    prop_oneof![
        Just(Purpose::MANAGEMENT),
        Just(Purpose::EXECUTION),
        Just(Purpose::CLAIM_SIGNER),
        Just(Purpose::ENCRYPTION),
    ]
}

/// Strategy for non-empty purpose sets over the named purposes
pub fn arb_purpose_set() -> impl Strategy<Value = PurposeSet> {
    (1u64..16).prop_map(PurposeSet::from_bits)
}

/// Strategy for arbitrary selectors, valid or not
pub fn arb_selector() -> impl Strategy<Value = u64> {
    prop_oneof![
        (0u32..64).prop_map(|shift| 1u64 << shift),
        any::<u64>(),
    ]
}

/// Strategy for selectors with zero or several bits set
pub fn arb_invalid_selector() -> impl Strategy<Value = u64> {
    any::<u64>().prop_filter("selector must not be a single bit", |s| s.count_ones() != 1)
}

/// Strategy for key types
pub fn arb_key_type() -> impl Strategy<Value = KeyType> {
    prop_oneof![Just(KeyType::ECDSA), Just(KeyType::RSA), (3u64..100).prop_map(KeyType)]
}
