//! Pure synchronous hashing
//!
//! The single place the digest algorithm is chosen. Key identifiers are
//! derived through [`hash_tagged`] so that every derivation is domain
//! separated.
//!
//! Current algorithm: **SHA-256** (32-byte output)

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes to a 32-byte digest
pub fn hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash `data` prefixed with a domain-separation tag
pub fn hash_tagged(tag: &[u8], data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update((tag.len() as u64).to_be_bytes());
    hasher.update(tag);
    hasher.update(data);
    hasher.finalize().into()
}
