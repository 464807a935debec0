//! C2 — the in-memory working copy a block is verified against before it is
//! accepted.
//!
//! A `Diff` is built over a parent reader (either the accepted view or
//! another in-flight `Diff`, for chains of un-accepted blocks such as a
//! Proposal block's Commit/Abort children). Validator and supernet state is
//! small enough across a real deployment's lifetime that a `Diff` clones it
//! forward from its parent rather than layering a sparse overlay; the UTXO
//! set is not, so UTXO reads walk the diff chain down to the persistent
//! base the way §4.1 describes, and only additions/removals are recorded
//! locally.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::chain_record::ChainRecord;
use crate::ids::{Id, NodeId};
use crate::staker::StakerSet;
use crate::supernet::Supernet;
use crate::utxo::{OutPoint, Utxo};

use super::{PersistentStore, StateReader};

/// Net change to a node's weight in one supernet at one height, plus
/// whatever BLS-equivalent key change accompanied it. Stored so
/// `crate::validator_set` can walk backwards from the accepted tip (§4.6).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorDelta {
    pub weight_delta: i64,
    pub bls_change: BlsChange,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum BlsChange {
    #[default]
    NoChange,
    /// The node carried no BLS-equivalent key before this height and does
    /// after (a primary-network validator was added).
    Appeared(VerifyingKey),
    /// The node carried this key before this height and does not after (a
    /// primary-network validator retired or was removed).
    Disappeared(VerifyingKey),
}

/// An ordered log of staker-set mutations applied while building a `Diff`,
/// replayed against the accepted view's indices on commit instead of
/// rewriting the whole set.
#[derive(Debug, Clone)]
pub enum StakerMutation {
    InsertPending(crate::staker::Staker),
    /// supernet_id, node_id, tx_id of the removed staker.
    RemovePending(Id, NodeId, Id),
    InsertCurrent(crate::staker::Staker),
    /// supernet_id, node_id, tx_id of the removed staker.
    RemoveCurrent(Id, NodeId, Id),
}

pub struct Diff {
    pub parent_id: Id,
    pub height: u64,
    pub timestamp: i64,
    pub fee_pool: u64,
    pub current: StakerSet,
    pub pending: StakerSet,
    pub supernets: HashMap<Id, Supernet>,
    pub chains: HashMap<Id, ChainRecord>,
    pub reward_pools: HashMap<Id, u64>,
    pub current_supply: HashMap<Id, u64>,

    utxo_added: HashMap<OutPoint, Utxo>,
    utxo_removed: HashSet<OutPoint>,

    pub mutations: Vec<StakerMutation>,
    pub new_supernets: Vec<Id>,
    pub new_chains: Vec<Id>,
    pub validator_deltas: HashMap<(Id, NodeId), ValidatorDelta>,

    parent_diff: Option<Arc<Diff>>,
    base: Arc<dyn PersistentStore>,
}

impl Diff {
    /// Build a child diff over any reader, cloning its small collections
    /// forward. `parent_as_diff` links the UTXO fallthrough chain when the
    /// parent is itself an unaccepted `Diff`.
    pub fn new_child(
        parent_id: Id,
        height: u64,
        timestamp: i64,
        parent: &dyn StateReader,
        parent_as_diff: Option<Arc<Diff>>,
        base: Arc<dyn PersistentStore>,
    ) -> Self {
        Self {
            parent_id,
            height,
            timestamp,
            fee_pool: parent.fee_pool(),
            current: parent.current_stakers().clone(),
            pending: parent.pending_stakers().clone(),
            supernets: parent.supernets().clone(),
            chains: parent.chains().clone(),
            reward_pools: parent.reward_pools().clone(),
            current_supply: parent.current_supply_map().clone(),
            utxo_added: HashMap::new(),
            utxo_removed: HashSet::new(),
            mutations: Vec::new(),
            new_supernets: Vec::new(),
            new_chains: Vec::new(),
            validator_deltas: HashMap::new(),
            parent_diff: parent_as_diff,
            base,
        }
    }

    pub fn put_utxo(&mut self, utxo: Utxo) {
        self.utxo_removed.remove(&utxo.outpoint);
        self.utxo_added.insert(utxo.outpoint, utxo);
    }

    pub fn spend_utxo(&mut self, outpoint: OutPoint) {
        self.utxo_added.remove(&outpoint);
        self.utxo_removed.insert(outpoint);
    }

    pub fn insert_supernet(&mut self, supernet: Supernet) {
        self.new_supernets.push(supernet.supernet_id);
        self.supernets.insert(supernet.supernet_id, supernet);
    }

    pub fn insert_chain(&mut self, chain: ChainRecord) {
        self.new_chains.push(chain.chain_id);
        self.chains.insert(chain.chain_id, chain);
    }

    pub fn insert_pending(&mut self, staker: crate::staker::Staker) {
        self.pending.insert(staker.clone());
        self.mutations.push(StakerMutation::InsertPending(staker));
    }

    /// Removes a pending staker by its own `tx_id`. A no-op if it is not
    /// pending (e.g. already promoted or never inserted).
    pub fn remove_pending(&mut self, tx_id: Id) {
        let Some(staker) = self.pending.remove_by_tx_id(&tx_id) else {
            return;
        };
        self.mutations.push(StakerMutation::RemovePending(
            staker.supernet_id,
            staker.node_id,
            staker.tx_id,
        ));
    }

    /// Promote a staker from pending to current, recording the weight and
    /// BLS-key delta this introduces at this diff's height.
    pub fn promote_to_current(&mut self, mut staker: crate::staker::Staker) {
        let identity = staker.identity();
        let tx_id = staker.tx_id;
        self.pending.remove_by_tx_id(&tx_id);
        self.mutations.push(StakerMutation::RemovePending(
            staker.supernet_id,
            staker.node_id,
            tx_id,
        ));
        staker.priority = staker.priority.to_current();
        let entry = self.validator_deltas.entry(identity).or_default();
        entry.weight_delta += staker.weight as i64;
        if let Some(key) = staker.public_key {
            entry.bls_change = BlsChange::Appeared(key);
        }
        self.current.insert(staker.clone());
        self.mutations.push(StakerMutation::InsertCurrent(staker));
    }

    /// Remove a current staker by its own `tx_id` (retirement or
    /// supernet-validator removal cascade), recording the inverse weight
    /// delta. A no-op if it is not current.
    pub fn remove_current(&mut self, tx_id: Id) {
        let Some(staker) = self.current.remove_by_tx_id(&tx_id) else {
            return;
        };
        let entry = self.validator_deltas.entry(staker.identity()).or_default();
        entry.weight_delta -= staker.weight as i64;
        if let Some(key) = staker.public_key {
            entry.bls_change = BlsChange::Disappeared(key);
        }
        self.mutations.push(StakerMutation::RemoveCurrent(
            staker.supernet_id,
            staker.node_id,
            staker.tx_id,
        ));
    }

    pub fn set_reward_pool(&mut self, supernet_id: Id, remaining: u64) {
        self.reward_pools.insert(supernet_id, remaining);
    }

    pub fn set_current_supply(&mut self, supernet_id: Id, supply: u64) {
        self.current_supply.insert(supernet_id, supply);
    }

    pub fn set_fee_pool(&mut self, fee_pool: u64) {
        self.fee_pool = fee_pool;
    }

    pub fn utxo_overlay(&self) -> (&HashMap<OutPoint, Utxo>, &HashSet<OutPoint>) {
        (&self.utxo_added, &self.utxo_removed)
    }

    /// Promote due pending stakers and remove due delegators/supernet
    /// validators at `target_time`, per §4.2's promotion rule. Applied once
    /// per Standard/Banff block (or per `AdvanceTimeTx` in the Apricot
    /// case) at the timestamp the block is advancing chain-time to.
    ///
    /// Per §9's open question, the removal loop stops at the first current
    /// staker that is neither a delegator nor a supernet validator (i.e. a
    /// primary-network validator), even if later entries in iteration order
    /// are themselves due — this reproduces the source's degenerate
    /// behavior rather than skipping past it.
    pub fn advance_time(&mut self, cfg: &crate::config::VmConfig, target_time: i64) {
        loop {
            let Some(head) = self.pending.peek_head() else {
                break;
            };
            if head.next_time() > target_time {
                break;
            }
            let mut staker = head.clone();

            if staker.reward_owner.is_some() {
                let (schedule, min_duration, max_duration, pool_remaining) =
                    self.reward_params(&staker, cfg);
                let duration = staker.end_time - staker.start_time;
                let reward = crate::reward::calculate_reward(
                    schedule,
                    cfg.network.genesis_time(),
                    crate::reward::RewardInputs {
                        stake_amount: staker.weight,
                        staked_duration_secs: duration,
                        stake_start_time: staker.start_time,
                        min_stake_duration_secs: min_duration,
                        max_stake_duration_secs: max_duration,
                        reward_pool_remaining: pool_remaining,
                    },
                );
                staker.potential_reward = reward;
                if let Some(remaining) = pool_remaining {
                    self.set_reward_pool(staker.supernet_id, remaining.saturating_sub(reward));
                } else if reward > 0 {
                    let supply = self.current_supply(&staker.supernet_id);
                    self.set_current_supply(staker.supernet_id, supply.saturating_add(reward));
                }
            }

            self.promote_to_current(staker);
        }

        loop {
            let Some(head) = self.current.peek_head() else {
                break;
            };
            if !(head.priority.is_delegator() || head.priority.is_supernet_validator()) {
                break;
            }
            if head.end_time > target_time {
                break;
            }
            let staker = head.clone();
            if staker.potential_reward > 0 {
                if let Some(owner) = staker.reward_owner.clone() {
                    self.credit_reward(staker.tx_id, &owner, staker.potential_reward);
                }
            }
            self.remove_current(staker.tx_id);
        }
    }

    /// The reward schedule, stake-duration bounds, and remaining pool
    /// (`None` for the primary network's unbounded pool, §4.3) a staker's
    /// promotion reward should be computed against.
    fn reward_params<'a>(
        &'a self,
        staker: &crate::staker::Staker,
        cfg: &'a crate::config::VmConfig,
    ) -> (&'a crate::config::RewardScheduleConfig, i64, i64, Option<u64>) {
        if staker.supernet_id.is_primary_network() {
            return (
                &cfg.reward,
                cfg.staking.min_stake_duration_secs,
                cfg.staking.max_stake_duration_secs,
                None,
            );
        }
        match self
            .supernets
            .get(&staker.supernet_id)
            .and_then(|s| s.transformation.as_ref())
        {
            Some(params) => (
                &params.reward,
                params.min_stake_duration_secs,
                params.max_stake_duration_secs,
                Some(self.reward_pool(&staker.supernet_id)),
            ),
            None => (
                &cfg.reward,
                cfg.staking.min_stake_duration_secs,
                cfg.staking.max_stake_duration_secs,
                Some(self.reward_pool(&staker.supernet_id)),
            ),
        }
    }

    /// Pay out a fixed `potential_reward` to `owner` via a synthetic UTXO,
    /// the "distributed atomically on removal" half of §4.2 step 2. Keyed
    /// off `base_tx_id` plus a salt so repeated payouts (validator, then
    /// each delegator) never collide with a real transaction's outputs.
    pub(crate) fn credit_reward(
        &mut self,
        base_tx_id: Id,
        owner: &crate::supernet::OwnerSpec,
        amount: u64,
    ) {
        if amount == 0 {
            return;
        }
        let synthetic_id = Id::from_canonical_bytes(format!("{base_tx_id}:reward").as_bytes());
        self.put_utxo(Utxo {
            outpoint: OutPoint {
                tx_id: synthetic_id,
                output_index: 0,
            },
            asset_id: crate::ids::PRIMARY_NETWORK_ID,
            amount,
            owner: owner.clone(),
            locktime: 0,
            threshold: owner.threshold,
        });
    }
}

impl StateReader for Diff {
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<Utxo> {
        if self.utxo_removed.contains(outpoint) {
            return None;
        }
        if let Some(utxo) = self.utxo_added.get(outpoint) {
            return Some(utxo.clone());
        }
        if let Some(parent) = &self.parent_diff {
            return parent.get_utxo(outpoint);
        }
        self.base
            .get(&super::keys::utxo(outpoint))
            .ok()
            .flatten()
            .and_then(|bytes| crate::codec::decode(&bytes).ok())
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
