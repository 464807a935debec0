//! C7 — Block Builder.
//!
//! Assembles the next block atop a given preference: a `Proposal` block
//! when a current primary-network validator's stake has matured, else a
//! `Standard`/Banff block carrying ready mempool transactions and/or a
//! chain-time advance. Grounded on the teacher's `blockchain.rs`
//! `create_next_block` flow (pull ready transactions from the pool,
//! compute the block's timestamp, package both into the next block), with
//! the reward-distribution half of that flow replaced by the validator
//! reward path the Proposal→Commit cycle already owns (`option_block`,
//! `executor`).

use std::sync::Arc;

use crate::config::VmConfig;
use crate::error::VmError;
use crate::ids::Id;
use crate::mempool::Mempool;
use crate::staker::{next_staker_change_time, Priority};
use crate::state::{Diff, StateReader, StateStore};
use crate::tx::{AdvanceTimeTx, RewardValidatorTx, Transaction};

use super::types::{Block, BlockHeader};

/// No config field bounds block contents (§ ambient storage config has
/// none); these mirror the teacher's `MAX_POOL_SIZE`-style constants
/// rather than a per-byte consensus rule.
const MAX_BLOCK_TRANSACTIONS: usize = 256;
const MAX_BLOCK_BYTES: usize = 128 * 1024;

enum ParentView {
    Diff(Arc<Diff>),
    Accepted(crate::state::AcceptedView),
}

impl ParentView {
    fn height(&self) -> u64 {
        match self {
            ParentView::Diff(d) => d.height,
            ParentView::Accepted(a) => a.height,
        }
    }

    fn reader(&self) -> &dyn StateReader {
        match self {
            ParentView::Diff(d) => d.as_ref(),
            ParentView::Accepted(a) => a,
        }
    }
}

pub struct BlockBuilder {
    store: Arc<StateStore>,
    mempool: Arc<Mempool>,
    cfg: VmConfig,
}

impl BlockBuilder {
    pub fn new(store: Arc<StateStore>, mempool: Arc<Mempool>, cfg: VmConfig) -> Self {
        Self {
            store,
            mempool,
            cfg,
        }
    }

    async fn parent_view(&self, preference: Id) -> Result<ParentView, VmError> {
        if let Some(diff) = self.store.get_diff(&preference) {
            return Ok(ParentView::Diff(diff));
        }
        let accepted = self.store.accepted_snapshot().await;
        if accepted.last_accepted_block_id == preference {
            return Ok(ParentView::Accepted(accepted));
        }
        Err(VmError::NotFound(format!("preference block {preference}")))
    }

    /// Build a block atop `preference`. `NoPendingBlocks` if there is
    /// neither a matured validator to retire, a ready transaction, nor any
    /// useful time advance.
    pub async fn build_block(&self, preference: Id, now: i64) -> Result<Block, VmError> {
        let parent = self.parent_view(preference).await?;
        let parent_height = parent.height();
        let parent_timestamp = parent.reader().timestamp();
        let reader = parent.reader();

        let is_banff_shape = parent_timestamp >= self.cfg.banff_time;
        let next_change = next_staker_change_time(reader.current_stakers(), reader.pending_stakers());

        let target_time = if is_banff_shape {
            let mut t = now.max(parent_timestamp);
            if let Some(next_change) = next_change {
                t = t.min(next_change);
            }
            t.min(now + self.cfg.sync_bound_secs)
        } else {
            parent_timestamp
        };

        let header = BlockHeader {
            parent_id: preference,
            height: parent_height + 1,
        };

        if let Some(validator) = due_primary_validator(reader, target_time) {
            let reward_validator_tx = RewardValidatorTx {
                validator_tx_id: validator.tx_id,
            };
            return Ok(Block::Proposal {
                header,
                timestamp: is_banff_shape.then_some(target_time),
                reward_validator_tx,
            });
        }

        let candidates = self
            .mempool
            .candidates(MAX_BLOCK_TRANSACTIONS, MAX_BLOCK_BYTES);

        if is_banff_shape {
            if candidates.is_empty() && target_time <= parent_timestamp {
                return Err(VmError::NoPendingBlocks);
            }
            return Ok(Block::Standard {
                header,
                timestamp: Some(target_time),
                transactions: candidates,
            });
        }

        if !candidates.is_empty() {
            return Ok(Block::Standard {
                header,
                timestamp: None,
                transactions: candidates,
            });
        }

        let mut advance_to = now.max(parent_timestamp);
        if let Some(next_change) = next_change {
            advance_to = advance_to.min(next_change);
        }
        advance_to = advance_to.min(now + self.cfg.sync_bound_secs);

        if advance_to > parent_timestamp {
            return Ok(Block::Standard {
                header,
                timestamp: None,
                transactions: vec![Transaction::AdvanceTime(AdvanceTimeTx {
                    new_chain_time: advance_to,
                })],
            });
        }

        Err(VmError::NoPendingBlocks)
    }

    /// Forget the mempool entries a block carried, called once that block
    /// is accepted.
    pub fn mark_included(&self, block: &Block) {
        if let Block::Standard { transactions, .. } = block {
            for tx in transactions {
                if let Ok(tx_id) = tx.id() {
                    self.mempool.remove(&tx_id);
                }
            }
        }
    }

    /// Return a rejected block's transactions to the mempool so they are
    /// eligible for the next attempt.
    pub fn requeue_rejected(&self, block: &Block) {
        if let Block::Standard { transactions, .. } = block {
            for tx in transactions {
                if !tx.is_apricot_time_advance() {
                    self.mempool.requeue(tx.clone());
                }
            }
        }
    }
}

/// The current primary-network validator with the earliest matured
/// `end_time`, if any is due by `target_time`. Only primary-network
/// validators are considered: delegators and supernet validators are
/// retired automatically by `Diff::advance_time`, never via a Proposal
/// block (§4.2).
fn due_primary_validator<'a>(
    reader: &'a dyn StateReader,
    target_time: i64,
) -> Option<&'a crate::staker::Staker> {
    reader
        .current_stakers()
        .values()
        .filter(|s| s.priority == Priority::PrimaryValidatorCurrent && s.end_time <= target_time)
        .min_by_key(|s| (s.end_time, s.tx_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic_memory::InMemorySharedMemory;
    use crate::config::VmConfig;
    use crate::ids::NodeId;
    use crate::state::memory_store::MemoryStore;
    use crate::supernet::OwnerSpec;

    fn cfg() -> VmConfig {
        let mut c = VmConfig::testnet();
        c.banff_time = 0;
        c
    }

    fn store() -> Arc<StateStore> {
        Arc::new(StateStore::open(Arc::new(MemoryStore::new())).unwrap())
    }

    fn validator(tx_byte: u8, end_time: i64) -> crate::staker::Staker {
        let mut tx_id = [0u8; 32];
        tx_id[0] = tx_byte;
        let mut node_id = [0u8; 20];
        node_id[0] = tx_byte;
        crate::staker::Staker {
            tx_id: Id(tx_id),
            node_id: NodeId(node_id),
            supernet_id: crate::ids::PRIMARY_NETWORK_ID,
            weight: 2_000_000,
            start_time: 0,
            end_time,
            potential_reward: 500,
            priority: Priority::PrimaryValidatorCurrent,
            public_key: None,
            delegation_fee_ppm: 0,
            reward_owner: Some(OwnerSpec {
                threshold: 1,
                signers: vec![],
            }),
        }
    }

    #[tokio::test]
    async fn proposes_matured_validator_before_touching_mempool() {
        let store = store();
        let tip = store.last_accepted_block_id().await;
        let mut diff = store.begin_diff(tip, 1, 100).await.unwrap();
        diff.current.insert(validator(1, 100));
        store.register_diff(Id::from_canonical_bytes(b"a"), diff);
        let _ = InMemorySharedMemory::new();

        let builder = BlockBuilder::new(store.clone(), Arc::new(Mempool::new()), cfg());
        let block = builder
            .build_block(Id::from_canonical_bytes(b"a"), 200)
            .await
            .unwrap();
        assert!(matches!(block, Block::Proposal { .. }));
    }

    #[tokio::test]
    async fn no_work_yields_no_pending_blocks() {
        let store = store();
        let tip = store.last_accepted_block_id().await;
        let builder = BlockBuilder::new(store, Arc::new(Mempool::new()), cfg());
        let result = builder.build_block(tip, 0).await;
        assert!(matches!(result, Err(VmError::NoPendingBlocks)));
    }
}
