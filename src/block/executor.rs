//! C5 — Block Executor.
//!
//! Owns the cache of verified-but-unaccepted blocks (§3's block-state cache)
//! and drives every block through Verify → Accept/Reject. Grounded on the
//! teacher's `block/validator.rs`, generalized from one block shape's static
//! validation to the five-shape state machine and height/timestamp rules
//! §4.4 spells out, plus actual state mutation (the teacher validates a
//! block in isolation; here Verify also builds the `Diff` the block's
//! effects land in).

use std::sync::Arc;

use dashmap::DashMap;

use crate::atomic_memory::{AtomicRequest, SharedMemory};
use crate::block::option_block::{self, OptionBlocks};
use crate::block::types::Block;
use crate::config::VmConfig;
use crate::error::VmError;
use crate::ids::Id;
use crate::staker::next_staker_change_time;
use crate::state::{StateReader, StateStore, WriteBatch};
use crate::state::{diff::Diff, keys};
use crate::supernet::OwnerSpec;
use crate::tx::{self, Transaction};
use crate::uptime::UptimeCalculator;
use crate::utxo::{OutPoint, Utxo};
use crate::validator_set::ValidatorSetService;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Processing,
    Accepted,
    Rejected,
}

#[derive(Clone)]
struct BlockRecord {
    block: Block,
    height: u64,
    timestamp: i64,
    status: BlockStatus,
}

pub struct BlockExecutor {
    store: Arc<StateStore>,
    validator_sets: Arc<ValidatorSetService>,
    uptime: Arc<dyn UptimeCalculator>,
    shared_memory: Arc<dyn SharedMemory>,
    cfg: VmConfig,
    blocks: DashMap<Id, BlockRecord>,
    children: DashMap<Id, Vec<Id>>,
    pending_atomic_requests: DashMap<Id, Vec<AtomicRequest>>,
}

impl BlockExecutor {
    pub fn new(
        store: Arc<StateStore>,
        validator_sets: Arc<ValidatorSetService>,
        uptime: Arc<dyn UptimeCalculator>,
        shared_memory: Arc<dyn SharedMemory>,
        cfg: VmConfig,
    ) -> Self {
        Self {
            store,
            validator_sets,
            uptime,
            shared_memory,
            cfg,
            blocks: DashMap::new(),
            children: DashMap::new(),
            pending_atomic_requests: DashMap::new(),
        }
    }

    pub async fn last_accepted_block_id(&self) -> Id {
        self.store.last_accepted_block_id().await
    }

    pub fn status(&self, block_id: &Id) -> Result<BlockStatus, VmError> {
        if let Some(record) = self.blocks.get(block_id) {
            return Ok(record.status);
        }
        if self.store.base().get(&keys::block(block_id))?.is_some() {
            return Ok(BlockStatus::Accepted);
        }
        Err(VmError::NotFound(format!("block {block_id}")))
    }

    pub fn get_block(&self, block_id: &Id) -> Result<Block, VmError> {
        if let Some(record) = self.blocks.get(block_id) {
            return Ok(record.block.clone());
        }
        let bytes = self
            .store
            .base()
            .get(&keys::block(block_id))?
            .ok_or_else(|| VmError::NotFound(format!("block {block_id}")))?;
        Ok(crate::codec::decode(&bytes)?)
    }

    pub fn get_block_id_at_height(&self, height: u64) -> Result<Id, VmError> {
        let bytes = self
            .store
            .base()
            .get(&keys::block_by_height(height))?
            .ok_or_else(|| VmError::NotFound(format!("block at height {height}")))?;
        Ok(crate::codec::decode(&bytes)?)
    }

    /// Verify `block`, building its `Diff` over its parent's view and
    /// registering it in the block-state cache. Returns the block's own ID.
    pub async fn verify(&self, block: Block, now: i64) -> Result<Id, VmError> {
        let block_id = block.id()?;
        if let Some(existing) = self.blocks.get(&block_id) {
            return Ok(match existing.status {
                BlockStatus::Rejected => {
                    return Err(VmError::NotFound(format!(
                        "block {block_id} was already rejected"
                    )))
                }
                _ => block_id,
            });
        }

        match &block {
            Block::Standard {
                header,
                timestamp,
                transactions,
            } => {
                self.verify_standard(block_id, &block, header.parent_id, *timestamp, transactions, now)
                    .await
            }
            Block::Proposal {
                header,
                timestamp,
                reward_validator_tx,
            } => {
                self.verify_proposal(
                    block_id,
                    &block,
                    header.parent_id,
                    *timestamp,
                    reward_validator_tx,
                    now,
                )
                .await
            }
            Block::Commit { proposal_block_id, .. } => {
                self.verify_option(block_id, &block, *proposal_block_id, true)
                    .await
            }
            Block::Abort { proposal_block_id, .. } => {
                self.verify_option(block_id, &block, *proposal_block_id, false)
                    .await
            }
            Block::Atomic { header, transaction } => {
                self.verify_atomic(block_id, &block, header.parent_id, transaction, now)
                    .await
            }
        }
    }

    /// The Commit/Abort candidates a verified `Proposal` block exposes
    /// (§4.4.4). `NotOracle` if `proposal_block_id` is not a `Proposal`.
    pub fn options(&self, proposal_block_id: Id, now: i64) -> Result<OptionBlocks, VmError> {
        let record = self
            .blocks
            .get(&proposal_block_id)
            .ok_or_else(|| VmError::NotFound(format!("block {proposal_block_id}")))?;
        let (reward_tx, height) = match &record.block {
            Block::Proposal {
                reward_validator_tx,
                ..
            } => (reward_validator_tx.clone(), record.height),
            _ => return Err(VmError::NotOracle(proposal_block_id)),
        };
        drop(record);

        let diff = self
            .store
            .get_diff(&proposal_block_id)
            .ok_or_else(|| VmError::NotFound(format!("diff for block {proposal_block_id}")))?;
        let staker = diff
            .current_stakers()
            .get_by_tx_id(&reward_tx.validator_tx_id)
            .cloned()
            .ok_or_else(|| VmError::NotFound(format!("staker tx {}", reward_tx.validator_tx_id)))?;
        if !staker.priority.is_validator() || staker.priority.is_supernet_validator() {
            return Err(VmError::UnexpectedStakerTxType);
        }
        let supernet = diff.get_supernet(&staker.supernet_id).cloned();

        Ok(option_block::build_options(
            proposal_block_id,
            height,
            &staker,
            supernet.as_ref(),
            &self.cfg,
            self.uptime.as_ref(),
            now,
        ))
    }

    /// Commit a verified block to the persistent base, reject every sibling
    /// rooted on the same parent, and persist its encoded bytes (§4.4.1's
    /// "on accept" steps).
    pub async fn accept(&self, block_id: Id) -> Result<(), VmError> {
        let already_accepted = matches!(
            self.blocks.get(&block_id).map(|r| r.status),
            Some(BlockStatus::Accepted)
        );
        if already_accepted {
            return Ok(());
        }

        let record = self
            .blocks
            .get(&block_id)
            .ok_or_else(|| VmError::NotFound(format!("block {block_id}")))?
            .clone();

        self.store.accept(block_id).await?;

        let bytes = crate::codec::encode(&record.block)?;
        let mut batch = WriteBatch::new();
        batch.put(keys::block(&block_id), bytes);
        self.store
            .base()
            .write_batch(batch)
            .map_err(|e| VmError::Fatal(format!("persisting block {block_id}: {e}")))?;

        if let Some(mut r) = self.blocks.get_mut(&block_id) {
            r.status = BlockStatus::Accepted;
        }
        self.validator_sets.invalidate();

        let parent_id = record.block.parent_id();
        if let Some(siblings) = self.children.get(&parent_id).map(|v| v.clone()) {
            for sibling in siblings {
                if sibling != block_id {
                    self.reject_subtree(sibling);
                }
            }
        }

        if let Some((_, requests)) = self.pending_atomic_requests.remove(&block_id) {
            self.shared_memory.apply(&requests);
        }

        Ok(())
    }

    pub fn reject(&self, block_id: Id) -> Result<(), VmError> {
        if !self.blocks.contains_key(&block_id) {
            return Err(VmError::NotFound(format!("block {block_id}")));
        }
        self.reject_subtree(block_id);
        Ok(())
    }

    fn reject_subtree(&self, block_id: Id) {
        self.store.reject(&block_id);
        self.pending_atomic_requests.remove(&block_id);
        if let Some(mut r) = self.blocks.get_mut(&block_id) {
            r.status = BlockStatus::Rejected;
        }
        if let Some((_, children)) = self.children.remove(&block_id) {
            for child in children {
                self.reject_subtree(child);
            }
        }
    }

    async fn parent_info(&self, parent_id: &Id) -> Result<(u64, i64), VmError> {
        if let Some(record) = self.blocks.get(parent_id) {
            return Ok((record.height, record.timestamp));
        }
        let accepted = self.store.accepted_snapshot().await;
        if &accepted.last_accepted_block_id == parent_id {
            return Ok((accepted.height, accepted.timestamp));
        }
        Err(VmError::NotFound(format!("parent block {parent_id}")))
    }

    async fn next_staker_change_time_for(&self, parent_id: &Id) -> Result<Option<i64>, VmError> {
        if let Some(diff) = self.store.get_diff(parent_id) {
            return Ok(next_staker_change_time(
                diff.current_stakers(),
                diff.pending_stakers(),
            ));
        }
        let accepted = self.store.accepted_snapshot().await;
        if &accepted.last_accepted_block_id == parent_id {
            return Ok(next_staker_change_time(&accepted.current, &accepted.pending));
        }
        Err(VmError::NotFound(format!("parent block {parent_id}")))
    }

    fn check_banff_timestamp(
        &self,
        parent_timestamp: i64,
        banff_ts: i64,
        now: i64,
        next_change: Option<i64>,
    ) -> Result<(), VmError> {
        if banff_ts < parent_timestamp {
            return Err(VmError::ChildBlockEarlierThanParent {
                parent: parent_timestamp,
                child: banff_ts,
            });
        }
        if banff_ts > now + self.cfg.sync_bound_secs {
            return Err(VmError::ChildBlockBeyondSyncBound {
                now,
                child: banff_ts,
                bound: self.cfg.sync_bound_secs,
            });
        }
        if let Some(next_change) = next_change {
            if banff_ts > next_change {
                return Err(VmError::ChildBlockAfterStakerChangeTime {
                    child: banff_ts,
                    next_change,
                });
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn verify_standard(
        &self,
        block_id: Id,
        block: &Block,
        parent_id: Id,
        timestamp: Option<i64>,
        transactions: &[Transaction],
        now: i64,
    ) -> Result<Id, VmError> {
        let (parent_height, parent_timestamp) = self.parent_info(&parent_id).await?;
        if block.height() != parent_height + 1 {
            return Err(VmError::IncorrectBlockHeight {
                parent: parent_height,
                actual: block.height(),
            });
        }

        let is_banff_shape = timestamp.is_some();
        if !is_banff_shape && parent_timestamp >= self.cfg.banff_time {
            return Err(VmError::ApricotBlockIssuedAfterFork);
        }

        if let Some(banff_ts) = timestamp {
            let next_change = self.next_staker_change_time_for(&parent_id).await?;
            self.check_banff_timestamp(parent_timestamp, banff_ts, now, next_change)?;
            if transactions.is_empty() && banff_ts <= parent_timestamp {
                return Err(VmError::BanffStandardBlockWithoutChanges(block.height()));
            }
        }

        let effective_timestamp = timestamp.unwrap_or(parent_timestamp);
        let mut diff = self
            .store
            .begin_diff(parent_id, block.height(), effective_timestamp)
            .await?;

        if is_banff_shape {
            diff.advance_time(&self.cfg, effective_timestamp);
        }

        for transaction in transactions {
            let tx_id = transaction.id()?;
            match transaction {
                Transaction::AdvanceTime(advance) => {
                    if is_banff_shape {
                        return Err(VmError::TxFailed {
                            txid: tx_id,
                            reason: "AdvanceTimeTx is Apricot-only".into(),
                        });
                    }
                    if advance.new_chain_time < diff.timestamp {
                        return Err(VmError::ChildBlockEarlierThanParent {
                            parent: diff.timestamp,
                            child: advance.new_chain_time,
                        });
                    }
                    if advance.new_chain_time > now + self.cfg.sync_bound_secs {
                        return Err(VmError::ChildBlockBeyondSyncBound {
                            now,
                            child: advance.new_chain_time,
                            bound: self.cfg.sync_bound_secs,
                        });
                    }
                    if let Some(next_change) =
                        next_staker_change_time(diff.current_stakers(), diff.pending_stakers())
                    {
                        if advance.new_chain_time > next_change {
                            return Err(VmError::ChildBlockAfterStakerChangeTime {
                                child: advance.new_chain_time,
                                next_change,
                            });
                        }
                    }
                    diff.timestamp = advance.new_chain_time;
                    diff.advance_time(&self.cfg, advance.new_chain_time);
                }
                _ => tx::executor::execute(transaction, tx_id, &mut diff, &self.cfg, diff.timestamp)?,
            }
        }

        let final_timestamp = diff.timestamp;
        self.store.register_diff(block_id, diff);
        self.blocks.insert(
            block_id,
            BlockRecord {
                block: block.clone(),
                height: block.height(),
                timestamp: final_timestamp,
                status: BlockStatus::Processing,
            },
        );
        self.children.entry(parent_id).or_default().push(block_id);
        Ok(block_id)
    }

    async fn verify_proposal(
        &self,
        block_id: Id,
        block: &Block,
        parent_id: Id,
        timestamp: Option<i64>,
        reward_tx: &crate::tx::RewardValidatorTx,
        now: i64,
    ) -> Result<Id, VmError> {
        let (parent_height, parent_timestamp) = self.parent_info(&parent_id).await?;
        if block.height() != parent_height + 1 {
            return Err(VmError::IncorrectBlockHeight {
                parent: parent_height,
                actual: block.height(),
            });
        }

        let is_banff_shape = timestamp.is_some();
        if !is_banff_shape && parent_timestamp >= self.cfg.banff_time {
            return Err(VmError::ApricotBlockIssuedAfterFork);
        }

        if let Some(banff_ts) = timestamp {
            let next_change = self.next_staker_change_time_for(&parent_id).await?;
            self.check_banff_timestamp(parent_timestamp, banff_ts, now, next_change)?;
        }

        let effective_timestamp = timestamp.unwrap_or(parent_timestamp);
        let mut diff = self
            .store
            .begin_diff(parent_id, block.height(), effective_timestamp)
            .await?;

        if is_banff_shape {
            diff.advance_time(&self.cfg, effective_timestamp);
        }

        let staker = diff
            .current_stakers()
            .get_by_tx_id(&reward_tx.validator_tx_id)
            .cloned()
            .ok_or_else(|| VmError::NotFound(format!("staker tx {}", reward_tx.validator_tx_id)))?;
        if !staker.priority.is_validator() || staker.priority.is_supernet_validator() {
            return Err(VmError::UnexpectedStakerTxType);
        }
        if staker.end_time > diff.timestamp {
            return Err(VmError::TxFailed {
                txid: reward_tx.validator_tx_id,
                reason: "referenced staker has not reached its end time".into(),
            });
        }

        self.store.register_diff(block_id, diff);
        self.blocks.insert(
            block_id,
            BlockRecord {
                block: block.clone(),
                height: block.height(),
                timestamp: effective_timestamp,
                status: BlockStatus::Processing,
            },
        );
        self.children.entry(parent_id).or_default().push(block_id);
        Ok(block_id)
    }

    /// Commit or Abort a `Proposal`'s retiring validator (§4.4.3): cascades
    /// the removal to every current supernet validator sharing the node's
    /// identity (invariant 2), and on Commit splits and pays out the
    /// validator's `potential_reward`.
    async fn verify_option(
        &self,
        block_id: Id,
        block: &Block,
        proposal_block_id: Id,
        is_commit: bool,
    ) -> Result<Id, VmError> {
        let proposal = self
            .blocks
            .get(&proposal_block_id)
            .ok_or_else(|| VmError::NotFound(format!("proposal block {proposal_block_id}")))?
            .clone();
        let reward_tx = match &proposal.block {
            Block::Proposal {
                reward_validator_tx,
                ..
            } => reward_validator_tx.clone(),
            _ => return Err(VmError::NotOracle(proposal_block_id)),
        };

        if block.height() != proposal.height + 1 {
            return Err(VmError::IncorrectBlockHeight {
                parent: proposal.height,
                actual: block.height(),
            });
        }

        let mut diff = self
            .store
            .begin_diff(proposal_block_id, block.height(), proposal.timestamp)
            .await?;

        let staker = diff
            .current_stakers()
            .get_by_tx_id(&reward_tx.validator_tx_id)
            .cloned()
            .ok_or_else(|| VmError::NotFound(format!("staker tx {}", reward_tx.validator_tx_id)))?;

        let cascaded: Vec<Id> = diff
            .current_stakers()
            .values()
            .filter(|s| s.node_id == staker.node_id && s.priority.is_supernet_validator())
            .map(|s| s.tx_id)
            .collect();
        let delegators: Vec<crate::staker::Staker> = diff
            .current_stakers()
            .delegators_of(&staker.node_id, &staker.supernet_id)
            .into_iter()
            .cloned()
            .collect();

        for tx_id in cascaded {
            diff.remove_current(tx_id);
        }
        diff.remove_current(staker.tx_id);

        if is_commit {
            if let Some(owner) = staker.reward_owner.clone() {
                let (validator_share, delegator_pool) =
                    crate::reward::split(staker.potential_reward, staker.delegation_fee_ppm);
                credit(&mut diff, staker.tx_id, "validator-reward", &owner, validator_share);
                pay_delegators(&mut diff, &staker.tx_id, &owner, delegator_pool, &delegators);
            }
        }

        self.store.register_diff(block_id, diff);
        self.blocks.insert(
            block_id,
            BlockRecord {
                block: block.clone(),
                height: block.height(),
                timestamp: proposal.timestamp,
                status: BlockStatus::Processing,
            },
        );
        self.children
            .entry(proposal_block_id)
            .or_default()
            .push(block_id);
        Ok(block_id)
    }

    async fn verify_atomic(
        &self,
        block_id: Id,
        block: &Block,
        parent_id: Id,
        transaction: &Transaction,
        now: i64,
    ) -> Result<Id, VmError> {
        let (parent_height, parent_timestamp) = self.parent_info(&parent_id).await?;
        if block.height() != parent_height + 1 {
            return Err(VmError::IncorrectBlockHeight {
                parent: parent_height,
                actual: block.height(),
            });
        }
        if parent_timestamp >= self.cfg.banff_time {
            return Err(VmError::ApricotBlockIssuedAfterFork);
        }
        let _ = now;

        let tx_id = transaction.id()?;
        let mut diff = self
            .store
            .begin_diff(parent_id, block.height(), parent_timestamp)
            .await?;

        let requests = match transaction {
            Transaction::Import(import) => {
                let mut requests = Vec::with_capacity(import.imported_inputs.len());
                for input in &import.imported_inputs {
                    let utxo = self
                        .shared_memory
                        .get(&import.source_chain, &input.outpoint)
                        .ok_or_else(|| {
                            VmError::NotFound(format!("imported utxo {:?}", input.outpoint))
                        })?;
                    if !utxo.is_spendable_at(parent_timestamp, &input.signers) {
                        return Err(VmError::NoSpendableFunds);
                    }
                    diff.put_utxo(utxo);
                    requests.push(AtomicRequest::Consume {
                        chain_id: import.source_chain,
                        outpoint: input.outpoint,
                    });
                }
                tx::executor::execute(transaction, tx_id, &mut diff, &self.cfg, parent_timestamp)?;
                requests
            }
            Transaction::Export(export) => {
                tx::executor::execute(transaction, tx_id, &mut diff, &self.cfg, parent_timestamp)?;
                let base_output_count = export.base.outputs.len();
                export
                    .exported_outputs
                    .iter()
                    .enumerate()
                    .map(|(index, output)| AtomicRequest::Put {
                        chain_id: export.destination_chain,
                        utxo: Utxo {
                            outpoint: OutPoint {
                                tx_id,
                                output_index: (base_output_count + index) as u32,
                            },
                            asset_id: output.asset_id,
                            amount: output.amount,
                            owner: output.owner.clone(),
                            locktime: output.locktime,
                            threshold: output.owner.threshold,
                        },
                    })
                    .collect()
            }
            _ => {
                return Err(VmError::TxFailed {
                    txid: tx_id,
                    reason: "atomic block must carry an Import or Export transaction".into(),
                })
            }
        };

        self.store.register_diff(block_id, diff);
        self.blocks.insert(
            block_id,
            BlockRecord {
                block: block.clone(),
                height: block.height(),
                timestamp: parent_timestamp,
                status: BlockStatus::Processing,
            },
        );
        self.children.entry(parent_id).or_default().push(block_id);
        self.pending_atomic_requests.insert(block_id, requests);
        Ok(block_id)
    }
}

fn credit(diff: &mut Diff, base_tx_id: Id, salt: &str, owner: &OwnerSpec, amount: u64) {
    if amount == 0 {
        return;
    }
    let synthetic_id = Id::from_canonical_bytes(format!("{base_tx_id}:{salt}").as_bytes());
    diff.put_utxo(Utxo {
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

/// Pro-rate `delegator_pool` by weight among `delegators`. Any remainder
/// left by integer division (§9: rounding toward zero) goes unclaimed rather
/// than to the validator or to whichever delegator happens to be last.
fn pay_delegators(
    diff: &mut Diff,
    validator_tx_id: &Id,
    validator_owner: &OwnerSpec,
    delegator_pool: u64,
    delegators: &[crate::staker::Staker],
) {
    if delegator_pool == 0 {
        return;
    }
    let total_weight: u128 = delegators.iter().map(|d| d.weight as u128).sum();
    if total_weight == 0 {
        credit(
            diff,
            *validator_tx_id,
            "no-delegator-reward",
            validator_owner,
            delegator_pool,
        );
        return;
    }
    for delegator in delegators {
        let share = ((delegator_pool as u128 * delegator.weight as u128) / total_weight) as u64;
        if let Some(owner) = &delegator.reward_owner {
            credit(diff, delegator.tx_id, "delegator-reward", owner, share);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic_memory::InMemorySharedMemory;
    use crate::staker::{Priority, Staker};
    use crate::state::memory_store::MemoryStore;
    use crate::supernet::OwnerSpec;
    use crate::uptime::InMemoryUptimeCalculator;
    use crate::validator_set::ValidatorSetService;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    fn owner() -> OwnerSpec {
        OwnerSpec::single(SigningKey::generate(&mut OsRng).verifying_key())
    }

    fn executor() -> (Arc<StateStore>, BlockExecutor) {
        let store = Arc::new(StateStore::open(Arc::new(MemoryStore::new())).unwrap());
        let validator_sets = Arc::new(ValidatorSetService::new(16));
        let uptime = Arc::new(InMemoryUptimeCalculator::new());
        let shared_memory = InMemorySharedMemory::new();
        let executor = BlockExecutor::new(
            store.clone(),
            validator_sets,
            uptime,
            shared_memory,
            VmConfig::testnet(),
        );
        (store, executor)
    }

    fn staker(tx_byte: u8, weight: u64, priority: Priority, delegation_fee_ppm: u64, potential_reward: u64, owner: OwnerSpec) -> Staker {
        let mut tx_id = [0u8; 32];
        tx_id[0] = tx_byte;
        Staker {
            tx_id: Id(tx_id),
            node_id: NodeId([7u8; 20]),
            supernet_id: crate::ids::PRIMARY_NETWORK_ID,
            weight,
            start_time: 0,
            end_time: 500,
            potential_reward,
            priority,
            public_key: None,
            delegation_fee_ppm,
            reward_owner: Some(owner),
        }
    }

    /// A validator plus two distinct delegators sharing its `(supernet_id,
    /// node_id)` identity must each be paid a correctly pro-rated share of
    /// the validator's withheld reward on Commit — the multi-delegator case
    /// `StakerSet`'s by-identity collision used to make unreachable.
    #[tokio::test]
    async fn commit_pays_every_delegator_its_pro_rated_share() {
        let (store, executor) = executor();
        let genesis = store.last_accepted_block_id().await;

        let validator_owner = owner();
        let d1_owner = owner();
        let d2_owner = owner();
        let validator = staker(
            1,
            2_000_000,
            Priority::PrimaryValidatorCurrent,
            100_000, // 10% withheld for delegators
            1_000,
            validator_owner.clone(),
        );
        let d1 = staker(2, 3_000_000, Priority::PrimaryDelegatorCurrent, 0, 0, d1_owner.clone());
        let d2 = staker(3, 1_000_000, Priority::PrimaryDelegatorCurrent, 0, 0, d2_owner.clone());
        let validator_tx_id = validator.tx_id;

        let mut diff = store.begin_diff(genesis, 1, 500).await.unwrap();
        diff.current.insert(validator);
        diff.current.insert(d1);
        diff.current.insert(d2);
        let proposal_id = Id::from_canonical_bytes(b"proposal");
        store.register_diff(proposal_id, diff);
        executor.blocks.insert(
            proposal_id,
            BlockRecord {
                block: Block::Proposal {
                    header: crate::block::types::BlockHeader {
                        parent_id: genesis,
                        height: 1,
                    },
                    timestamp: Some(500),
                    reward_validator_tx: crate::tx::RewardValidatorTx { validator_tx_id },
                },
                height: 1,
                timestamp: 500,
                status: BlockStatus::Processing,
            },
        );

        let commit_id = Id::from_canonical_bytes(b"commit");
        let commit_block = Block::Commit {
            header: crate::block::types::BlockHeader {
                parent_id: proposal_id,
                height: 2,
            },
            proposal_block_id: proposal_id,
        };
        executor
            .verify_option(commit_id, &commit_block, proposal_id, true)
            .await
            .unwrap();

        let diff = store.get_diff(&commit_id).unwrap();
        let (utxo_added, _) = diff.utxo_overlay();
        let paid = |owner: &OwnerSpec| -> u64 {
            utxo_added
                .values()
                .filter(|u| &u.owner == owner)
                .map(|u| u.amount)
                .sum()
        };

        // potential_reward=1_000, delegation_fee_ppm=100_000 -> validator
        // keeps 900, delegator pool is 100, split 3:1 by weight.
        assert_eq!(paid(&validator_owner), 900);
        assert_eq!(paid(&d1_owner), 75);
        assert_eq!(paid(&d2_owner), 25);

        // Both delegators and the validator were actually removed from the
        // current set, not just the one that used to win the collision.
        assert!(diff.current_stakers().get_by_tx_id(&validator_tx_id).is_none());
    }
}
