//! Capability bitmask
//!
//! A key holds a [`PurposeSet`]: a fixed-width bitmask where every bit is one
//! capability. Queries never take a set. They take a [`Purpose`], which can
//! only be built from a value with exactly one bit set, so an authorization
//! check is always explicit about the single capability it tests.
//!
//! | Purpose        | Bit | ERC-734 purpose |
//! |----------------|-----|-----------------|
//! | `MANAGEMENT`   | `1` | 1               |
//! | `EXECUTION`    | `2` | 2 (action)      |
//! | `CLAIM_SIGNER` | `4` | 3               |
//! | `ENCRYPTION`   | `8` | 4               |

use crate::errors::{IdentityError, IdentityResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single capability bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Purpose(u64);

impl Purpose {
    /// May reconfigure the identity: keys, thresholds
    pub const MANAGEMENT: Purpose = Purpose(1 << 0);
    /// May act on the identity's behalf towards other targets
    pub const EXECUTION: Purpose = Purpose(1 << 1);
    /// May sign claims about the identity
    pub const CLAIM_SIGNER: Purpose = Purpose(1 << 2);
    /// May be used to encrypt data for the identity
    pub const ENCRYPTION: Purpose = Purpose(1 << 3);

    /// Validate a raw selector
    ///
    /// Fails with `InvalidPurposeSelector` unless exactly one bit is set.
    pub fn from_bits(selector: u64) -> IdentityResult<Self> {
        if selector.is_power_of_two() {
            Ok(Self(selector))
        } else {
            Err(IdentityError::InvalidPurposeSelector { selector })
        }
    }

    /// Raw bit value
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Well-known name, if any
    pub fn name(&self) -> Option<&'static str> {
        match *self {
            Self::MANAGEMENT => Some("MANAGEMENT"),
            Self::EXECUTION => Some("EXECUTION"),
            Self::CLAIM_SIGNER => Some("CLAIM_SIGNER"),
            Self::ENCRYPTION => Some("ENCRYPTION"),
            _ => None,
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "PURPOSE({:#x})", self.0),
        }
    }
}

impl TryFrom<u64> for Purpose {
    type Error = IdentityError;

    fn try_from(selector: u64) -> Result<Self, Self::Error> {
        Self::from_bits(selector)
    }
}

impl From<Purpose> for u64 {
    fn from(purpose: Purpose) -> Self {
        purpose.0
    }
}

/// Set of capabilities held by one key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PurposeSet(u64);

impl PurposeSet {
    /// No capabilities; the state of an absent key
    pub const EMPTY: PurposeSet = PurposeSet(0);

    /// Build from a raw bitmask (any number of bits)
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Raw bitmask
    pub fn bits(&self) -> u64 {
        self.0
    }

    /// Whether no capability is held
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Number of capabilities held
    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    /// Membership test for one capability
    pub fn contains(&self, purpose: Purpose) -> bool {
        self.0 & purpose.0 != 0
    }

    /// Membership test for a raw selector
    ///
    /// Rejects zero and multi-bit selectors instead of treating them as a
    /// union.
    pub fn contains_selector(&self, selector: u64) -> IdentityResult<bool> {
        Purpose::from_bits(selector).map(|purpose| self.contains(purpose))
    }

    /// Add one capability
    pub fn insert(&mut self, purpose: Purpose) {
        self.0 |= purpose.0;
    }

    /// Remove one capability
    pub fn remove(&mut self, purpose: Purpose) {
        self.0 &= !purpose.0;
    }

    /// Builder-style insert
    pub fn with(mut self, purpose: Purpose) -> Self {
        self.insert(purpose);
        self
    }

    /// Iterate held capabilities from lowest bit to highest
    pub fn iter(&self) -> impl Iterator<Item = Purpose> {
        let bits = self.0;
        (0..u64::BITS)
            .map(|shift| 1u64 << shift)
            .filter(move |bit| bits & bit != 0)
            .map(Purpose)
    }
}

impl From<Purpose> for PurposeSet {
    fn from(purpose: Purpose) -> Self {
        Self(purpose.0)
    }
}

impl FromIterator<Purpose> for PurposeSet {
    fn from_iter<I: IntoIterator<Item = Purpose>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl fmt::Display for PurposeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, purpose) in self.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{purpose}")?;
        }
        f.write_str("}")
    }
}

/// Signature-scheme tag attached to a key
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyType(pub u64);

impl KeyType {
    /// Reported for absent keys
    pub const NONE: KeyType = KeyType(0);
    /// secp256k1 ECDSA
    pub const ECDSA: KeyType = KeyType(1);
    /// RSA
    pub const RSA: KeyType = KeyType(2);

    /// Raw tag value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NONE => f.write_str("none"),
            Self::ECDSA => f.write_str("ecdsa"),
            Self::RSA => f.write_str("rsa"),
            KeyType(other) => write!(f, "type-{other}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;

    #[test]
    fn test_selector_validation() {
        assert_eq!(Purpose::from_bits(1).unwrap(), Purpose::MANAGEMENT);
        assert_eq!(Purpose::from_bits(2).unwrap(), Purpose::EXECUTION);
        assert_matches!(
            Purpose::from_bits(0),
            Err(IdentityError::InvalidPurposeSelector { selector: 0 })
        );
        assert_matches!(
            Purpose::from_bits(3),
            Err(IdentityError::InvalidPurposeSelector { selector: 3 })
        );
    }

    #[test]
    fn test_set_insert_remove() {
        let mut set = PurposeSet::EMPTY;
        assert!(set.is_empty());

        set.insert(Purpose::MANAGEMENT);
        set.insert(Purpose::EXECUTION);
        assert_eq!(set.len(), 2);
        assert!(set.contains(Purpose::MANAGEMENT));

        set.remove(Purpose::MANAGEMENT);
        assert!(!set.contains(Purpose::MANAGEMENT));
        assert_eq!(set, PurposeSet::from(Purpose::EXECUTION));
    }

    #[test]
    fn test_contains_selector_rejects_unions() {
        let set = PurposeSet::from_bits(0b11);
        assert!(set.contains_selector(1).unwrap());
        assert!(set.contains_selector(2).unwrap());
        assert!(!set.contains_selector(4).unwrap());
        assert!(set.contains_selector(0b11).is_err());
        assert!(set.contains_selector(0).is_err());
    }

    #[test]
    fn test_display() {
        let set: PurposeSet = [Purpose::EXECUTION, Purpose::MANAGEMENT].into_iter().collect();
        assert_eq!(set.to_string(), "{MANAGEMENT|EXECUTION}");
        assert_eq!(Purpose::from_bits(64).unwrap().to_string(), "PURPOSE(0x40)");
        assert_eq!(KeyType::ECDSA.to_string(), "ecdsa");
    }

    #[test]
    fn test_purpose_serde_rejects_multi_bit() {
        let ok: Purpose = serde_json::from_str("2").unwrap();
        assert_eq!(ok, Purpose::EXECUTION);
        assert!(serde_json::from_str::<Purpose>("6").is_err());
    }

    proptest! {
        #[test]
        fn selector_valid_iff_single_bit(selector in any::<u64>()) {
            prop_assert_eq!(Purpose::from_bits(selector).is_ok(), selector.count_ones() == 1);
        }

        #[test]
        fn iter_collect_roundtrips(bits in any::<u64>()) {
            let set = PurposeSet::from_bits(bits);
            let rebuilt: PurposeSet = set.iter().collect();
            prop_assert_eq!(rebuilt, set);
            prop_assert_eq!(set.iter().count(), set.len());
        }

        #[test]
        fn contains_matches_bit_test(bits in any::<u64>(), shift in 0u32..64) {
            let set = PurposeSet::from_bits(bits);
            let selector = 1u64 << shift;
            prop_assert_eq!(set.contains_selector(selector).unwrap(), bits & selector != 0);
        }
    }
}
