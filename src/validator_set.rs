//! C8 — Historical Validator-Set Service.
//!
//! Reconstructs the validator set in force at any accepted height by
//! starting from the fully materialized accepted view and walking stored
//! per-height diffs backward (§4.5). Cached with an `lru::LruCache` behind
//! a `parking_lot::RwLock`, matching the teacher's bounded-cache idiom for
//! hot read paths.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use lru::LruCache;
use parking_lot::RwLock;

use crate::codec;
use crate::error::VmError;
use crate::ids::{Id, NodeId};
use crate::state::{store::AcceptedView, BlsChange, PersistentStore};
use crate::state::keys;

#[derive(Debug, Clone, Copy)]
pub struct ValidatorInfo {
    pub weight: u64,
    pub public_key: Option<VerifyingKey>,
}

#[derive(Debug, Clone, Default)]
pub struct ValidatorSet {
    pub entries: HashMap<NodeId, ValidatorInfo>,
}

pub struct ValidatorSetService {
    cache: RwLock<LruCache<(u64, Id), Arc<ValidatorSet>>>,
}

impl ValidatorSetService {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).expect("capacity is at least 1");
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Called whenever `StateStore::accept` commits a new height: the
    /// service has no way to know in advance which cached `(height,
    /// supernet)` pairs a new acceptance could affect, so it clears
    /// conservatively rather than risk serving a stale entry.
    pub fn invalidate(&self) {
        self.cache.write().clear();
    }

    pub fn get(
        &self,
        base: &Arc<dyn PersistentStore>,
        accepted: &AcceptedView,
        last_accepted_height: u64,
        target_height: u64,
        supernet_id: Id,
    ) -> Result<Arc<ValidatorSet>, VmError> {
        if target_height > last_accepted_height {
            return Err(VmError::FutureHeight {
                target: target_height,
                last_accepted: last_accepted_height,
            });
        }

        if let Some(hit) = self.cache.write().get(&(target_height, supernet_id)).cloned() {
            return Ok(hit);
        }

        let weights = reconstruct_weights(
            base,
            accepted,
            target_height,
            last_accepted_height,
            &supernet_id,
        )?;
        let primary_keys = reconstruct_keys(
            base,
            accepted,
            target_height,
            last_accepted_height,
            &crate::ids::PRIMARY_NETWORK_ID,
        )?;

        let entries = weights
            .into_iter()
            .map(|(node_id, weight)| {
                let public_key = primary_keys.get(&node_id).copied().flatten();
                (
                    node_id,
                    ValidatorInfo {
                        weight: weight as u64,
                        public_key,
                    },
                )
            })
            .collect();

        let result = Arc::new(ValidatorSet { entries });
        self.cache
            .write()
            .put((target_height, supernet_id), result.clone());
        Ok(result)
    }
}

fn split_validator_diff_key(key: &[u8]) -> (Id, NodeId) {
    let len = key.len();
    let supernet_id = Id::from_bytes(key[len - 52..len - 20].try_into().unwrap());
    let node_id = NodeId::from_bytes(key[len - 20..].try_into().unwrap());
    (supernet_id, node_id)
}

fn reconstruct_weights(
    base: &Arc<dyn PersistentStore>,
    accepted: &AcceptedView,
    target_height: u64,
    last_accepted_height: u64,
    supernet_id: &Id,
) -> Result<HashMap<NodeId, i64>, VmError> {
    let mut weights: HashMap<NodeId, i64> = HashMap::new();
    for staker in accepted
        .current
        .values()
        .filter(|s| &s.supernet_id == supernet_id)
    {
        *weights.entry(staker.node_id).or_insert(0) += staker.weight as i64;
    }

    for height in ((target_height + 1)..=last_accepted_height).rev() {
        for (key, value) in base.scan_prefix(&keys::validator_diff_height_prefix(height))? {
            let (key_supernet, node_id) = split_validator_diff_key(&key);
            if &key_supernet != supernet_id {
                continue;
            }
            let delta: i64 = codec::decode(&value)?;
            *weights.entry(node_id).or_insert(0) -= delta;
        }
    }

    weights.retain(|_, weight| *weight > 0);
    Ok(weights)
}

fn reconstruct_keys(
    base: &Arc<dyn PersistentStore>,
    accepted: &AcceptedView,
    target_height: u64,
    last_accepted_height: u64,
    supernet_id: &Id,
) -> Result<HashMap<NodeId, Option<VerifyingKey>>, VmError> {
    let mut keys_map: HashMap<NodeId, Option<VerifyingKey>> = HashMap::new();
    for staker in accepted
        .current
        .values()
        .filter(|s| &s.supernet_id == supernet_id)
    {
        if let Some(key) = staker.public_key {
            keys_map.insert(staker.node_id, Some(key));
        }
    }

    for height in ((target_height + 1)..=last_accepted_height).rev() {
        for (key, value) in base.scan_prefix(&keys::bls_key_diff_height_prefix(height))? {
            let (key_supernet, node_id) = split_validator_diff_key(&key);
            if &key_supernet != supernet_id {
                continue;
            }
            let change: BlsChange = codec::decode(&value)?;
            match change {
                BlsChange::NoChange => {}
                BlsChange::Appeared(_) => {
                    keys_map.remove(&node_id);
                }
                BlsChange::Disappeared(previous) => {
                    keys_map.insert(node_id, Some(previous));
                }
            }
        }
    }

    Ok(keys_map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn future_height_is_rejected_before_any_lookup() {
        let service = ValidatorSetService::new(16);
        let base: Arc<dyn PersistentStore> = Arc::new(crate::state::memory_store::MemoryStore::new());
        let accepted = test_accepted_view(base.clone());
        let err = service
            .get(&base, &accepted, 10, 11, crate::ids::PRIMARY_NETWORK_ID)
            .unwrap_err();
        assert!(matches!(err, VmError::FutureHeight { .. }));
    }

    fn test_accepted_view(base: Arc<dyn PersistentStore>) -> AcceptedView {
        // AcceptedView's fields are all `pub(crate)`-visible within this
        // crate; constructing one directly here keeps this test independent
        // of `StateStore::open`'s disk-scanning path.
        crate::state::store::AcceptedView::for_tests(base)
    }
}
