//! Pending-transaction pool feeding the C7 block builder.
//!
//! Grounded on the teacher's `TransactionPool`: a `DashMap` for lock-free
//! concurrent ingress, with the same pool-size/byte ceilings guarding
//! against unbounded growth. Unlike the teacher's pool there is no
//! separate "finalized" stage — a transaction leaves the pool the moment
//! a block carrying it is verified and returns if that block is rejected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use thiserror::Error;

use crate::ids::Id;
use crate::tx::Transaction;

const MAX_POOL_SIZE: usize = 10_000;
const MAX_POOL_BYTES: usize = 64 * 1024 * 1024;

#[derive(Error, Debug)]
pub enum MempoolError {
    #[error("mempool is full")]
    Full,
    #[error("transaction already in mempool")]
    AlreadyExists,
}

#[derive(Clone)]
struct Entry {
    tx: Transaction,
    size: usize,
    added_at: Instant,
}

/// Pending transactions, keyed by TxID, awaiting inclusion in a Standard
/// block.
pub struct Mempool {
    pending: DashMap<Id, Entry>,
    bytes: AtomicUsize,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new()
    }
}

impl Mempool {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
            bytes: AtomicUsize::new(0),
        }
    }

    /// Admit `tx`, computing its TxID and encoded size. Rejects duplicates
    /// and enforces the pool-size ceiling.
    pub fn add(&self, tx: Transaction) -> Result<Id, MempoolError> {
        let tx_id = tx.id().map_err(|_| MempoolError::Full)?;
        if self.pending.contains_key(&tx_id) {
            return Err(MempoolError::AlreadyExists);
        }
        let size = crate::codec::encoded_size(&tx).unwrap_or(0) as usize;
        if self.pending.len() >= MAX_POOL_SIZE
            || self.bytes.load(Ordering::Relaxed) + size > MAX_POOL_BYTES
        {
            return Err(MempoolError::Full);
        }
        self.pending.insert(
            tx_id,
            Entry {
                tx,
                size,
                added_at: Instant::now(),
            },
        );
        self.bytes.fetch_add(size, Ordering::Relaxed);
        Ok(tx_id)
    }

    /// Remove `tx_id`, if present — called once the block that carried it
    /// is accepted.
    pub fn remove(&self, tx_id: &Id) {
        if let Some((_, entry)) = self.pending.remove(tx_id) {
            self.bytes.fetch_sub(entry.size, Ordering::Relaxed);
        }
    }

    /// Return `tx` to the pool after the block carrying it was rejected,
    /// provided nothing else has since taken its place.
    pub fn requeue(&self, tx: Transaction) {
        let _ = self.add(tx);
    }

    pub fn contains(&self, tx_id: &Id) -> bool {
        self.pending.contains_key(tx_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Oldest-first candidates for the next block, bounded by `max_count`
    /// and `max_bytes`.
    pub fn candidates(&self, max_count: usize, max_bytes: usize) -> Vec<Transaction> {
        let mut entries: Vec<(Id, Entry)> = self
            .pending
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        entries.sort_by_key(|(_, e)| e.added_at);

        let mut out = Vec::new();
        let mut used_bytes = 0usize;
        for (_, entry) in entries {
            if out.len() >= max_count || used_bytes + entry.size > max_bytes {
                break;
            }
            used_bytes += entry.size;
            out.push(entry.tx);
        }
        out
    }

    /// Drop pending transactions older than `max_age`, returning the count
    /// evicted. Intended for the VM's periodic background sweep.
    pub fn evict_stale(&self, max_age: std::time::Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<Id> = self
            .pending
            .iter()
            .filter(|e| now.duration_since(e.value().added_at) > max_age)
            .map(|e| *e.key())
            .collect();
        for tx_id in &stale {
            self.remove(tx_id);
        }
        stale.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tx::AdvanceTimeTx;

    fn tx(new_chain_time: i64) -> Transaction {
        Transaction::AdvanceTime(AdvanceTimeTx { new_chain_time })
    }

    #[test]
    fn add_then_contains() {
        let pool = Mempool::new();
        let t = tx(1);
        let tx_id = t.id().unwrap();
        pool.add(t).unwrap();
        assert!(pool.contains(&tx_id));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn duplicate_is_rejected() {
        let pool = Mempool::new();
        pool.add(tx(1)).unwrap();
        assert!(matches!(pool.add(tx(1)), Err(MempoolError::AlreadyExists)));
    }

    #[test]
    fn remove_drops_entry() {
        let pool = Mempool::new();
        let t = tx(1);
        let tx_id = t.id().unwrap();
        pool.add(t).unwrap();
        pool.remove(&tx_id);
        assert!(!pool.contains(&tx_id));
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn candidates_respects_max_count() {
        let pool = Mempool::new();
        for i in 0..5 {
            pool.add(tx(i)).unwrap();
        }
        let candidates = pool.candidates(3, usize::MAX);
        assert_eq!(candidates.len(), 3);
    }
}
