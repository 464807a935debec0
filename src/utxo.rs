//! UTXO model (§3): `(tx_id, output_index) -> (asset_id, amount, owner_spec,
//! locktime, threshold)`, grounded on the teacher's `OutPoint`/`UTXO` pair
//! in `types.rs`, generalized with an asset ID (this network is
//! multi-asset, unlike the teacher's single-token UTXO set) and an
//! `OwnerSpec` instead of a raw script.

use serde::{Deserialize, Serialize};

use crate::ids::Id;
use crate::supernet::OwnerSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub tx_id: Id,
    pub output_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub asset_id: Id,
    pub amount: u64,
    pub owner: OwnerSpec,
    pub locktime: i64,
    pub threshold: u32,
}

impl Utxo {
    pub fn is_spendable_at(&self, chain_time: i64, signers: &[ed25519_dalek::VerifyingKey]) -> bool {
        chain_time >= self.locktime
            && signers.len() as u32 >= self.threshold
            && self.owner.is_satisfied_by(signers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locktime_gates_spendability() {
        use ed25519_dalek::SigningKey;
        use rand::rngs::OsRng;

        let key = SigningKey::generate(&mut OsRng).verifying_key();
        let utxo = Utxo {
            outpoint: OutPoint {
                tx_id: Id::from_canonical_bytes(b"tx"),
                output_index: 0,
            },
            asset_id: crate::ids::PRIMARY_NETWORK_ID,
            amount: 100,
            owner: OwnerSpec::single(key),
            locktime: 100,
            threshold: 1,
        };
        assert!(!utxo.is_spendable_at(50, &[key]));
        assert!(utxo.is_spendable_at(100, &[key]));
    }
}
