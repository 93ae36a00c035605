//! Core identifier types
//!
//! Keys are named by a 32-byte [`KeyId`]; the principals that call into an
//! identity are named by a 20-byte [`Address`]. A principal acts through the
//! key derived from its address with [`KeyId::derive`].

use crate::errors::IdentityError;
use crate::hash::hash_tagged;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

const KEY_DERIVATION_TAG: &[u8] = b"keystone/key-id/v1";

fn decode_hex<const N: usize>(input: &str) -> Result<[u8; N], String> {
    let trimmed = input.strip_prefix("0x").unwrap_or(input);
    let bytes = hex::decode(trimmed).map_err(|e| e.to_string())?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| format!("expected {N} bytes, got {}", b.len()))
}

/// 32-byte key identifier
///
/// The zero value is reserved: it never names a stored key and every
/// mutation rejects it with `InvalidKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(pub [u8; 32]);

impl KeyId {
    /// The reserved zero identifier
    pub const ZERO: KeyId = KeyId([0u8; 32]);

    /// Create from raw bytes
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the key identifier a principal acts through
    pub fn derive(address: &Address) -> Self {
        Self(hash_tagged(KEY_DERIVATION_TAG, address.as_bytes()))
    }

    /// Whether this is the reserved zero identifier
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Get the inner bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for KeyId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<32>(s)
            .map(Self)
            .map_err(|e| IdentityError::invalid_key(format!("cannot parse key id: {e}")))
    }
}

impl From<[u8; 32]> for KeyId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// 20-byte principal address
///
/// Used both for callers and for execution targets. The identity itself has
/// an address; an execution whose target equals it is a self-call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Create from raw bytes
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Get the inner bytes
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Key identifier this principal acts through
    pub fn key_id(&self) -> KeyId {
        KeyId::derive(self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_hex::<20>(s)
            .map(Self)
            .map_err(|e| IdentityError::serialization(format!("cannot parse address: {e}")))
    }
}

impl From<[u8; 20]> for Address {
    fn from(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }
}

// Hex strings for human-readable formats (JSON, TOML), raw bytes otherwise.
macro_rules! impl_byte_serde {
    ($ty:ident, $len:literal) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.collect_str(self)
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let text = String::deserialize(deserializer)?;
                    decode_hex::<$len>(&text)
                        .map(Self)
                        .map_err(serde::de::Error::custom)
                } else {
                    <[u8; $len]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

impl_byte_serde!(KeyId, 32);
impl_byte_serde!(Address, 20);

/// Identifier of a requested execution
///
/// Allocated from a counter that starts at 1 and never reuses a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExecutionId(pub u64);

impl ExecutionId {
    /// First id handed out by a fresh identity
    pub const FIRST: ExecutionId = ExecutionId(1);

    /// Create an execution id
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Get the next id in sequence
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "exec-{}", self.0)
    }
}

impl From<u64> for ExecutionId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
