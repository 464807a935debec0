//! Opaque, totally-ordered identifiers.
//!
//! `Id` is the 32-byte identifier used for transactions, blocks and
//! supernets; `NodeId` is the 20-byte identifier of a validator's network
//! identity. Both order bytewise, which is the order the staker indices
//! (`[`crate::staker`]) and the validator-set diffs (`[`crate::validator_set`]`)
//! key off of.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// The all-zero supernet ID identifies the Primary Network.
pub const PRIMARY_NETWORK_ID: Id = Id([0u8; 32]);

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Id(pub [u8; 32]);

impl Id {
    pub const LEN: usize = 32;

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive an `Id` from the canonical encoding of some serialized payload.
    /// Mirrors the teacher's `Transaction::txid`, which hashes the canonical
    /// serialized form rather than minting a random identifier.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn is_primary_network(&self) -> bool {
        *self == PRIMARY_NETWORK_ID
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", hex::encode(self.0))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct NodeId(pub [u8; 20]);

impl NodeId {
    pub const LEN: usize = 20;

    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_order_bytewise() {
        let a = Id([0u8; 32]);
        let mut b = [0u8; 32];
        b[31] = 1;
        let b = Id(b);
        assert!(a < b);
    }

    #[test]
    fn canonical_hash_is_deterministic() {
        let a = Id::from_canonical_bytes(b"same-payload");
        let b = Id::from_canonical_bytes(b"same-payload");
        assert_eq!(a, b);
    }

    #[test]
    fn primary_network_is_all_zero() {
        assert!(PRIMARY_NETWORK_ID.is_primary_network());
        assert!(!Id::from_canonical_bytes(b"x").is_primary_network());
    }
}
