//! C2 — the layered state model: a sorted, durable key/value base plus a
//! stack of in-memory diffs for blocks that have been verified but not yet
//! accepted.
//!
//! Grounded on the teacher's `storage.rs`/`BlockStorage` (sorted KV with
//! atomic batch writes) generalized to an explicit trait so the VM can run
//! against either `sled` (production) or an in-memory `BTreeMap`
//! (deterministic tests), the same seam the teacher draws between its sled
//! tree and its `#[cfg(test)]` harness.

pub mod diff;
pub mod keys;
pub mod memory_store;
pub mod sled_store;
pub mod store;

use std::collections::HashMap;

use crate::chain_record::ChainRecord;
use crate::error::StateError;
use crate::ids::Id;
use crate::staker::StakerSet;
use crate::supernet::Supernet;
use crate::utxo::{OutPoint, Utxo};

pub use diff::{BlsChange, Diff, ValidatorDelta};
pub use store::{AcceptedView, StateStore};

/// The durable, sorted key/value layer underneath the diff stack. A single
/// `write_batch` call must be atomic: either every put/delete in it lands,
/// or none do (§4.1's "commit is all-or-nothing").
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StateError>;
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StateError>;
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StateError>;
}

#[derive(Debug, Default)]
pub struct WriteBatch {
    puts: Vec<(Vec<u8>, Vec<u8>)>,
    deletes: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.puts.push((key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    pub fn puts(&self) -> &[(Vec<u8>, Vec<u8>)] {
        &self.puts
    }

    pub fn deletes(&self) -> &[Vec<u8>] {
        &self.deletes
    }
}

/// Read access common to the accepted view and every in-flight `Diff`, the
/// seam transaction execution (`crate::tx`) and block execution
/// (`crate::block`) are written against so they don't care which one
/// they're handed.
pub trait StateReader {
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<Utxo>;
    fn current_stakers(&self) -> &StakerSet;
    fn pending_stakers(&self) -> &StakerSet;
    fn supernets(&self) -> &HashMap<Id, Supernet>;
    fn chains(&self) -> &HashMap<Id, ChainRecord>;
    fn reward_pools(&self) -> &HashMap<Id, u64>;
    fn current_supply_map(&self) -> &HashMap<Id, u64>;
    fn timestamp(&self) -> i64;
    fn fee_pool(&self) -> u64;

    fn get_supernet(&self, id: &Id) -> Option<&Supernet> {
        self.supernets().get(id)
    }

    fn reward_pool(&self, supernet_id: &Id) -> u64 {
        self.reward_pools().get(supernet_id).copied().unwrap_or(0)
    }

    fn current_supply(&self, supernet_id: &Id) -> u64 {
        self.current_supply_map()
            .get(supernet_id)
            .copied()
            .unwrap_or(0)
    }
}
