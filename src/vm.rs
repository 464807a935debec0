//! The `ChainVm` contract (§6) and `PlatformVm`, the struct composing every
//! other component behind it.
//!
//! Grounded on the teacher's `Blockchain` (the single struct the network
//! and RPC layers drive through a handful of entry points) generalized to
//! the explicit async trait §6's table spells out, and on §5's locking
//! model: one `tokio::sync::RwLock<()>` stands in for "the context lock",
//! taken for write by every mutating entry point and for read by every
//! query, mirroring the teacher's single `Blockchain` method-level
//! synchronization without exposing the state it guards directly.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock as AsyncRwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::atomic_memory::SharedMemory;
use crate::block::builder::BlockBuilder;
use crate::block::option_block::OptionBlocks;
use crate::block::{Block, BlockExecutor, BlockStatus};
use crate::config::VmConfig;
use crate::error::VmError;
use crate::ids::{Id, NodeId};
use crate::mempool::Mempool;
use crate::state::{PersistentStore, StateStore};
use crate::tx::Transaction;
use crate::uptime::UptimeCalculator;
use crate::validator_set::{ValidatorSet, ValidatorSetService};

/// Bootstrapping vs. steady-state operation (§6: `SetState`), forwarded so
/// the uptime manager only tracks liveness once consensus is caught up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmState {
    Bootstrapping,
    NormalOp,
}

#[async_trait]
pub trait ChainVm: Send + Sync {
    async fn build_block(&self, now: i64) -> Result<Block, VmError>;
    fn parse_block(&self, bytes: &[u8]) -> Result<Block, VmError>;
    async fn get_block(&self, id: Id) -> Result<Block, VmError>;
    async fn last_accepted(&self) -> Id;
    async fn get_block_id_at_height(&self, height: u64) -> Result<Id, VmError>;
    fn set_preference(&self, id: Id);
    async fn verify(&self, block: Block, now: i64) -> Result<Id, VmError>;
    async fn accept(&self, block_id: Id) -> Result<(), VmError>;
    async fn reject(&self, block_id: Id) -> Result<(), VmError>;
    async fn status(&self, block_id: Id) -> Result<BlockStatus, VmError>;
    async fn options(&self, proposal_block_id: Id, now: i64) -> Result<OptionBlocks, VmError>;
    async fn get_validator_set(
        &self,
        height: u64,
        supernet_id: Id,
    ) -> Result<Arc<ValidatorSet>, VmError>;
    fn connected(&self, node_id: NodeId, at: i64);
    fn disconnected(&self, node_id: NodeId, at: i64);
    fn connected_supernet(&self, node_id: NodeId, supernet_id: Id, at: i64);
    async fn issue_tx(&self, tx: Transaction) -> Result<Id, VmError>;
    fn set_state(&self, state: VmState);
}

pub struct PlatformVm {
    store: Arc<StateStore>,
    executor: Arc<BlockExecutor>,
    builder: BlockBuilder,
    mempool: Arc<Mempool>,
    validator_sets: Arc<ValidatorSetService>,
    uptime: Arc<dyn UptimeCalculator>,
    cfg: VmConfig,
    /// Single global lock serializing writes (§5); reads take it shared.
    /// Guards nothing directly — every field above is independently
    /// thread-safe — but callers driven by the consensus engine still
    /// acquire it on entry and release on exit, the way §5 requires.
    context_lock: AsyncRwLock<()>,
    preference: parking_lot::RwLock<Id>,
    state: parking_lot::RwLock<VmState>,
}

impl PlatformVm {
    /// `Initialize` (§6): load state from `base` (or seed genesis-empty if
    /// never written to) and start with the accepted tip as preference.
    pub async fn initialize(
        base: Arc<dyn PersistentStore>,
        shared_memory: Arc<dyn SharedMemory>,
        uptime: Arc<dyn UptimeCalculator>,
        cfg: VmConfig,
    ) -> Result<Self, VmError> {
        let store = Arc::new(StateStore::open(base)?);
        let validator_sets = Arc::new(ValidatorSetService::new(
            cfg.storage.validator_set_cache_entries,
        ));
        let executor = Arc::new(BlockExecutor::new(
            store.clone(),
            validator_sets.clone(),
            uptime.clone(),
            shared_memory,
            cfg.clone(),
        ));
        let mempool = Arc::new(Mempool::new());
        let builder = BlockBuilder::new(store.clone(), mempool.clone(), cfg.clone());
        let preference = executor.last_accepted_block_id().await;

        Ok(Self {
            store,
            executor,
            builder,
            mempool,
            validator_sets,
            uptime,
            cfg,
            context_lock: AsyncRwLock::new(()),
            preference: parking_lot::RwLock::new(preference),
            state: parking_lot::RwLock::new(VmState::Bootstrapping),
        })
    }

    pub fn config(&self) -> &VmConfig {
        &self.cfg
    }

    /// Spawn the background pruning task §5 describes: periodically drop
    /// verified-but-never-accepted diffs more than `keep_last_n_heights`
    /// behind the accepted tip, releasing the context lock between ticks
    /// so it never starves consensus.
    pub fn spawn_pruning_task(
        self: &Arc<Self>,
        cancel: CancellationToken,
        period: Duration,
        keep_last_n_heights: u64,
    ) -> JoinHandle<()> {
        let vm = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let _guard = vm.context_lock.write().await;
                        let height = vm.store.height().await;
                        vm.store
                            .prune_diffs_at_or_below(height.saturating_sub(keep_last_n_heights));
                    }
                }
            }
        })
    }
}

#[async_trait]
impl ChainVm for PlatformVm {
    async fn build_block(&self, now: i64) -> Result<Block, VmError> {
        let _guard = self.context_lock.write().await;
        let preference = *self.preference.read();
        self.builder.build_block(preference, now).await
    }

    fn parse_block(&self, bytes: &[u8]) -> Result<Block, VmError> {
        Ok(crate::codec::decode(bytes)?)
    }

    async fn get_block(&self, id: Id) -> Result<Block, VmError> {
        let _guard = self.context_lock.read().await;
        self.executor.get_block(&id)
    }

    async fn last_accepted(&self) -> Id {
        let _guard = self.context_lock.read().await;
        self.executor.last_accepted_block_id().await
    }

    async fn get_block_id_at_height(&self, height: u64) -> Result<Id, VmError> {
        let _guard = self.context_lock.read().await;
        self.executor.get_block_id_at_height(height)
    }

    fn set_preference(&self, id: Id) {
        *self.preference.write() = id;
    }

    async fn verify(&self, block: Block, now: i64) -> Result<Id, VmError> {
        let _guard = self.context_lock.write().await;
        self.executor.verify(block, now).await
    }

    async fn accept(&self, block_id: Id) -> Result<(), VmError> {
        let _guard = self.context_lock.write().await;
        let block = self.executor.get_block(&block_id)?;
        self.executor.accept(block_id).await?;
        self.builder.mark_included(&block);
        Ok(())
    }

    async fn reject(&self, block_id: Id) -> Result<(), VmError> {
        let _guard = self.context_lock.write().await;
        let block = self.executor.get_block(&block_id)?;
        self.executor.reject(block_id)?;
        self.builder.requeue_rejected(&block);
        Ok(())
    }

    async fn status(&self, block_id: Id) -> Result<BlockStatus, VmError> {
        let _guard = self.context_lock.read().await;
        self.executor.status(&block_id)
    }

    async fn options(&self, proposal_block_id: Id, now: i64) -> Result<OptionBlocks, VmError> {
        let _guard = self.context_lock.read().await;
        self.executor.options(proposal_block_id, now)
    }

    async fn get_validator_set(
        &self,
        height: u64,
        supernet_id: Id,
    ) -> Result<Arc<ValidatorSet>, VmError> {
        let _guard = self.context_lock.read().await;
        let accepted = self.store.accepted_snapshot().await;
        let last_height = accepted.height;
        self.validator_sets
            .get(self.store.base(), &accepted, last_height, height, supernet_id)
    }

    fn connected(&self, node_id: NodeId, at: i64) {
        self.uptime.connected(node_id, at);
    }

    fn disconnected(&self, node_id: NodeId, at: i64) {
        self.uptime.disconnected(node_id, at);
    }

    fn connected_supernet(&self, node_id: NodeId, _supernet_id: Id, at: i64) {
        self.uptime.connected(node_id, at);
    }

    async fn issue_tx(&self, tx: Transaction) -> Result<Id, VmError> {
        let _guard = self.context_lock.write().await;
        let tx_id = tx.id()?;
        self.mempool
            .add(tx)
            .map_err(|e| VmError::TxFailed {
                txid: tx_id,
                reason: e.to_string(),
            })?;
        Ok(tx_id)
    }

    fn set_state(&self, new_state: VmState) {
        *self.state.write() = new_state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atomic_memory::InMemorySharedMemory;
    use crate::state::memory_store::MemoryStore;
    use crate::uptime::InMemoryUptimeCalculator;

    async fn vm() -> PlatformVm {
        let base = Arc::new(MemoryStore::new());
        let shared_memory = InMemorySharedMemory::new();
        let uptime = Arc::new(InMemoryUptimeCalculator::new());
        PlatformVm::initialize(base, shared_memory, uptime, VmConfig::testnet())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_vm_has_genesis_preference_and_no_pending_work() {
        let vm = vm().await;
        assert_eq!(vm.last_accepted().await, crate::ids::PRIMARY_NETWORK_ID);
        let result = vm.build_block(vm.config().network.genesis_time()).await;
        assert!(matches!(result, Err(VmError::NoPendingBlocks)));
    }

    #[tokio::test]
    async fn issue_tx_lands_in_the_mempool() {
        let vm = vm().await;
        let tx = Transaction::Base(crate::tx::BaseTx {
            base: crate::tx::BaseTxFields {
                inputs: vec![],
                outputs: vec![],
                memo: vec![1, 2, 3],
            },
        });
        let tx_id = vm.issue_tx(tx).await.unwrap();
        assert!(vm.mempool.contains(&tx_id));
    }

    #[tokio::test]
    async fn set_preference_changes_what_build_block_builds_against() {
        let vm = vm().await;
        let genesis = vm.last_accepted().await;
        vm.set_preference(genesis);
        assert_eq!(*vm.preference.read(), genesis);
    }
}
