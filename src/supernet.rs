//! Supernet records (§3): a named group of validators, optionally
//! "transformed" into a permissionless supernet with its own staking
//! economics and reward pool.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::ids::Id;

/// `owner_spec` is modeled as a threshold multisig over public keys, the
/// minimal shape needed to check `Unauthorized` (§7) without pulling in a
/// full scripting system (out of scope per §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnerSpec {
    pub threshold: u32,
    #[serde(with = "verifying_key_vec")]
    pub signers: Vec<VerifyingKey>,
}

impl OwnerSpec {
    pub fn single(key: VerifyingKey) -> Self {
        Self {
            threshold: 1,
            signers: vec![key],
        }
    }

    pub fn is_satisfied_by(&self, provided: &[VerifyingKey]) -> bool {
        let matched = self
            .signers
            .iter()
            .filter(|s| provided.contains(s))
            .count();
        matched as u32 >= self.threshold
    }
}

mod verifying_key_vec {
    use ed25519_dalek::VerifyingKey;
    use serde::{Deserializer, Serializer};
    use serde::{de::Error as _, ser::SerializeSeq};

    pub fn serialize<S: Serializer>(keys: &[VerifyingKey], s: S) -> Result<S::Ok, S::Error> {
        let mut seq = s.serialize_seq(Some(keys.len()))?;
        for key in keys {
            seq.serialize_element(&key.to_bytes())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<VerifyingKey>, D::Error> {
        let raw: Vec<[u8; 32]> = serde::Deserialize::deserialize(d)?;
        raw.into_iter()
            .map(|bytes| VerifyingKey::from_bytes(&bytes).map_err(D::Error::custom))
            .collect()
    }
}

/// Staking economics for a supernet once `TransformSupernetTx` has run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationParams {
    pub transformation_tx: Id,
    pub uptime_requirement_ppm: u64,
    pub min_validator_stake: u64,
    pub max_validator_stake: u64,
    pub min_stake_duration_secs: i64,
    pub max_stake_duration_secs: i64,
    pub reward: crate::config::RewardScheduleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supernet {
    pub supernet_id: Id,
    pub owner: OwnerSpec,
    pub transformation: Option<TransformationParams>,
}

impl Supernet {
    pub fn is_transformed(&self) -> bool {
        self.transformation.is_some()
    }

    pub fn primary_network(owner: OwnerSpec) -> Self {
        Self {
            supernet_id: crate::ids::PRIMARY_NETWORK_ID,
            owner,
            transformation: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    #[test]
    fn owner_spec_threshold_is_respected() {
        let k1 = SigningKey::generate(&mut OsRng).verifying_key();
        let k2 = SigningKey::generate(&mut OsRng).verifying_key();
        let spec = OwnerSpec {
            threshold: 2,
            signers: vec![k1, k2],
        };
        assert!(!spec.is_satisfied_by(&[k1]));
        assert!(spec.is_satisfied_by(&[k1, k2]));
    }

    #[test]
    fn owner_spec_round_trips_through_codec() {
        let k1 = SigningKey::generate(&mut OsRng).verifying_key();
        let spec = OwnerSpec::single(k1);
        let bytes = crate::codec::encode(&spec).unwrap();
        let back: OwnerSpec = crate::codec::decode(&bytes).unwrap();
        assert_eq!(spec.signers, back.signers);
    }
}
