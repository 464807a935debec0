//! `StateStore` ties the persistent base to the in-memory diff arena: a
//! `tokio::sync::RwLock`-guarded accepted view (small, frequently read) and
//! a `DashMap` of verified-but-unaccepted diffs keyed by block ID, the same
//! split the teacher draws between its committed chain tip and its
//! `block_cache` of pending candidates.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;

use crate::chain_record::ChainRecord;
use crate::codec;
use crate::error::{StateError, VmError};
use crate::ids::Id;
use crate::staker::StakerSet;
use crate::supernet::Supernet;
use crate::utxo::{OutPoint, Utxo};

use super::diff::StakerMutation;
use super::{keys, Diff, PersistentStore, StateReader, WriteBatch};

/// The fully materialized state at `last_accepted_height`, per §4.6 step 2's
/// requirement that historical reconstruction starts from an authoritative
/// in-memory snapshot rather than replaying from genesis every time.
#[derive(Clone)]
pub struct AcceptedView {
    pub height: u64,
    pub last_accepted_block_id: Id,
    pub timestamp: i64,
    pub fee_pool: u64,
    pub current: StakerSet,
    pub pending: StakerSet,
    pub supernets: HashMap<Id, Supernet>,
    pub chains: HashMap<Id, ChainRecord>,
    pub reward_pools: HashMap<Id, u64>,
    pub current_supply: HashMap<Id, u64>,
    base: Arc<dyn PersistentStore>,
}

impl AcceptedView {
    #[cfg(test)]
    pub fn for_tests(base: Arc<dyn PersistentStore>) -> Self {
        Self {
            height: 0,
            last_accepted_block_id: crate::ids::PRIMARY_NETWORK_ID,
            timestamp: 0,
            fee_pool: 0,
            current: StakerSet::new(),
            pending: StakerSet::new(),
            supernets: HashMap::new(),
            chains: HashMap::new(),
            reward_pools: HashMap::new(),
            current_supply: HashMap::new(),
            base,
        }
    }
}

impl StateReader for AcceptedView {
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<Utxo> {
        self.base
            .get(&keys::utxo(outpoint))
            .ok()
            .flatten()
            .and_then(|bytes| codec::decode(&bytes).ok())
    }

    fn current_stakers(&self) -> &StakerSet {
        &self.current
    }

    fn pending_stakers(&self) -> &StakerSet {
        &self.pending
    }

    fn supernets(&self) -> &HashMap<Id, Supernet> {
        &self.supernets
    }

    fn chains(&self) -> &HashMap<Id, ChainRecord> {
        &self.chains
    }

    fn reward_pools(&self) -> &HashMap<Id, u64> {
        &self.reward_pools
    }

    fn current_supply_map(&self) -> &HashMap<Id, u64> {
        &self.current_supply
    }

    fn timestamp(&self) -> i64 {
        self.timestamp
    }

    fn fee_pool(&self) -> u64 {
        self.fee_pool
    }
}

pub struct StateStore {
    base: Arc<dyn PersistentStore>,
    accepted: RwLock<AcceptedView>,
    diffs: DashMap<Id, Arc<Diff>>,
}

impl StateStore {
    /// Load the accepted view from `base`, or seed an empty one (genesis)
    /// if the store has never been written to.
    pub fn open(base: Arc<dyn PersistentStore>) -> Result<Self, VmError> {
        let last_accepted_block_id = match base.get(keys::LAST_ACCEPTED)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => crate::ids::PRIMARY_NETWORK_ID,
        };
        let timestamp = match base.get(keys::TIMESTAMP)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => 0,
        };
        let fee_pool = match base.get(keys::FEE_POOL)? {
            Some(bytes) => codec::decode(&bytes)?,
            None => 0,
        };

        let mut current = StakerSet::new();
        for (_, value) in base.scan_prefix(&keys::current_staker_prefix())? {
            current.insert(codec::decode(&value)?);
        }
        let mut pending = StakerSet::new();
        for (_, value) in base.scan_prefix(&keys::pending_staker_prefix())? {
            pending.insert(codec::decode(&value)?);
        }
        let mut supernets = HashMap::new();
        for (_, value) in base.scan_prefix(&keys::supernet_prefix())? {
            let supernet: Supernet = codec::decode(&value)?;
            supernets.insert(supernet.supernet_id, supernet);
        }
        let mut chains = HashMap::new();
        for (_, value) in base.scan_prefix(&keys::chain_prefix())? {
            let chain: ChainRecord = codec::decode(&value)?;
            chains.insert(chain.chain_id, chain);
        }
        let mut reward_pools = HashMap::new();
        for (key, value) in base.scan_prefix(&keys::reward_pool_prefix())? {
            let supernet_id = Id::from_bytes(key[key.len() - 32..].try_into().unwrap());
            reward_pools.insert(supernet_id, codec::decode(&value)?);
        }
        let mut current_supply = HashMap::new();
        for (key, value) in base.scan_prefix(&keys::current_supply_prefix())? {
            let supernet_id = Id::from_bytes(key[key.len() - 32..].try_into().unwrap());
            current_supply.insert(supernet_id, codec::decode(&value)?);
        }
        let height = base.scan_prefix(&keys::block_by_height_prefix())?.len() as u64;

        let accepted = AcceptedView {
            height,
            last_accepted_block_id,
            timestamp,
            fee_pool,
            current,
            pending,
            supernets,
            chains,
            reward_pools,
            current_supply,
            base: base.clone(),
        };

        Ok(Self {
            base,
            accepted: RwLock::new(accepted),
            diffs: DashMap::new(),
        })
    }

    pub fn base(&self) -> &Arc<dyn PersistentStore> {
        &self.base
    }

    pub async fn accepted_snapshot(&self) -> AcceptedView {
        self.accepted.read().await.clone()
    }

    pub async fn height(&self) -> u64 {
        self.accepted.read().await.height
    }

    pub async fn last_accepted_block_id(&self) -> Id {
        self.accepted.read().await.last_accepted_block_id
    }

    pub fn get_diff(&self, block_id: &Id) -> Option<Arc<Diff>> {
        self.diffs.get(block_id).map(|entry| entry.clone())
    }

    /// Start a new diff over `parent_block_id`, which may be the accepted
    /// tip or any still-in-flight verified block.
    pub async fn begin_diff(
        &self,
        parent_block_id: Id,
        height: u64,
        timestamp: i64,
    ) -> Result<Diff, VmError> {
        if let Some(parent_diff) = self.get_diff(&parent_block_id) {
            return Ok(Diff::new_child(
                parent_block_id,
                height,
                timestamp,
                &*parent_diff,
                Some(parent_diff.clone()),
                self.base.clone(),
            ));
        }
        let accepted = self.accepted.read().await;
        if accepted.last_accepted_block_id != parent_block_id {
            return Err(VmError::NotFound(format!("parent block {parent_block_id}")));
        }
        Ok(Diff::new_child(
            parent_block_id,
            height,
            timestamp,
            &*accepted,
            None,
            self.base.clone(),
        ))
    }

    pub fn register_diff(&self, block_id: Id, diff: Diff) {
        self.diffs.insert(block_id, Arc::new(diff));
    }

    pub fn reject(&self, block_id: &Id) {
        self.diffs.remove(block_id);
    }

    /// Commit a verified block's diff to the persistent base and fold it
    /// into the accepted view. A no-op if `block_id` is already the
    /// accepted tip (Idempotence, §4.5).
    pub async fn accept(&self, block_id: Id) -> Result<(), VmError> {
        {
            let accepted = self.accepted.read().await;
            if accepted.last_accepted_block_id == block_id {
                return Ok(());
            }
        }

        let (_, diff) = self
            .diffs
            .remove(&block_id)
            .ok_or_else(|| VmError::NotFound(format!("diff for block {block_id}")))?;

        let mut accepted = self.accepted.write().await;
        if diff.parent_id != accepted.last_accepted_block_id {
            self.diffs.insert(block_id, diff);
            return Err(VmError::State(StateError::CommitConflict(block_id)));
        }

        let mut batch = WriteBatch::new();
        for mutation in &diff.mutations {
            match mutation {
                StakerMutation::InsertPending(staker) => batch.put(
                    keys::pending_staker(&staker.supernet_id, &staker.node_id, &staker.tx_id),
                    codec::encode(staker)?,
                ),
                StakerMutation::RemovePending(supernet_id, node_id, tx_id) => {
                    batch.delete(keys::pending_staker(supernet_id, node_id, tx_id))
                }
                StakerMutation::InsertCurrent(staker) => batch.put(
                    keys::current_staker(&staker.supernet_id, &staker.node_id, &staker.tx_id),
                    codec::encode(staker)?,
                ),
                StakerMutation::RemoveCurrent(supernet_id, node_id, tx_id) => {
                    batch.delete(keys::current_staker(supernet_id, node_id, tx_id))
                }
            }
        }
        for supernet_id in &diff.new_supernets {
            let supernet = diff.supernets.get(supernet_id).expect("tracked supernet present");
            batch.put(keys::supernet(supernet_id), codec::encode(supernet)?);
        }
        for chain_id in &diff.new_chains {
            let chain = diff.chains.get(chain_id).expect("tracked chain present");
            batch.put(keys::chain(chain_id), codec::encode(chain)?);
        }
        for (supernet_id, remaining) in &diff.reward_pools {
            batch.put(keys::reward_pool(supernet_id), codec::encode(remaining)?);
        }
        for (supernet_id, supply) in &diff.current_supply {
            batch.put(keys::current_supply(supernet_id), codec::encode(supply)?);
        }
        let (utxo_added, utxo_removed) = diff.utxo_overlay();
        for (outpoint, utxo) in utxo_added {
            batch.put(keys::utxo(outpoint), codec::encode(utxo)?);
        }
        for outpoint in utxo_removed {
            batch.delete(keys::utxo(outpoint));
        }
        for ((supernet_id, node_id), delta) in &diff.validator_deltas {
            batch.put(
                keys::validator_diff(diff.height, supernet_id, node_id),
                codec::encode(&delta.weight_delta)?,
            );
            batch.put(
                keys::bls_key_diff(diff.height, supernet_id, node_id),
                codec::encode(&delta.bls_change)?,
            );
        }
        batch.put(keys::LAST_ACCEPTED.to_vec(), codec::encode(&block_id)?);
        batch.put(keys::TIMESTAMP.to_vec(), codec::encode(&diff.timestamp)?);
        batch.put(keys::FEE_POOL.to_vec(), codec::encode(&diff.fee_pool)?);
        batch.put(keys::block_by_height(diff.height), codec::encode(&block_id)?);

        if let Err(err) = self.base.write_batch(batch) {
            drop(accepted);
            self.diffs.insert(block_id, diff);
            return Err(VmError::Fatal(format!("commit failed: {err}")));
        }

        accepted.height = diff.height;
        accepted.last_accepted_block_id = block_id;
        accepted.timestamp = diff.timestamp;
        accepted.fee_pool = diff.fee_pool;
        accepted.current = diff.current.clone();
        accepted.pending = diff.pending.clone();
        accepted.supernets = diff.supernets.clone();
        accepted.chains = diff.chains.clone();
        accepted.reward_pools = diff.reward_pools.clone();
        accepted.current_supply = diff.current_supply.clone();

        Ok(())
    }

    /// Drop verified-but-never-accepted diffs at or below `height`, called
    /// periodically by the VM's background pruning task so rejected forks
    /// don't accumulate in the arena for the life of the process.
    pub fn prune_diffs_at_or_below(&self, height: u64) {
        self.diffs.retain(|_, diff| diff.height > height);
    }
}
