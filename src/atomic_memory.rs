//! Cross-chain atomic shared-memory transport (§1: "modeled as an opaque
//! KV interface"). The real implementation lives in the surrounding
//! multi-chain node and is shared by every chain's VM; this crate only
//! consumes it through the `SharedMemory` trait at the seam `ImportTx`
//! verification needs (§4.4.5).
//!
//! Grounded on the teacher's `UtxoStorage` trait shape (`storage.rs`): a
//! narrow async-free read/write interface over opaque keys, generalized
//! from "this chain's UTXOs" to "any chain's shared inbox" since the
//! atomic memory is keyed by source chain as well as outpoint.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::ids::Id;
use crate::utxo::{OutPoint, Utxo};

/// One shared-memory mutation an accepted Atomic block (or Standard block
/// carrying an `Import`/`Export`) registers against the external transport,
/// recorded in the block-state cache (§3) until accept time.
#[derive(Debug, Clone)]
pub enum AtomicRequest {
    /// Mark `outpoint` (sourced from `chain_id`) as consumed so it cannot
    /// be imported a second time.
    Consume { chain_id: Id, outpoint: OutPoint },
    /// Publish `utxo` into `chain_id`'s inbox for a later import there.
    Put { chain_id: Id, utxo: Utxo },
}

/// The opaque, external shared-memory collaborator. The VM holds only a
/// handle (§5: "owned by an external collaborator; the VM holds only a
/// handle").
pub trait SharedMemory: Send + Sync {
    /// Resolve an imported UTXO. `Ok(None)` models "not yet present" (§4.4.5:
    /// Verify returns `NotFound` without rejecting the block).
    fn get(&self, chain_id: &Id, outpoint: &OutPoint) -> Option<Utxo>;

    /// Apply a batch of requests atomically once the block that produced
    /// them is accepted.
    fn apply(&self, requests: &[AtomicRequest]);
}

/// In-memory `SharedMemory`, used by tests and by single-chain deployments
/// where no other VM instance shares the transport.
#[derive(Default)]
pub struct InMemorySharedMemory {
    inbox: RwLock<HashMap<(Id, OutPoint), Utxo>>,
    consumed: RwLock<HashSet<(Id, OutPoint)>>,
}

impl InMemorySharedMemory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl SharedMemory for InMemorySharedMemory {
    fn get(&self, chain_id: &Id, outpoint: &OutPoint) -> Option<Utxo> {
        let key = (*chain_id, *outpoint);
        if self.consumed.read().contains(&key) {
            return None;
        }
        self.inbox.read().get(&key).cloned()
    }

    fn apply(&self, requests: &[AtomicRequest]) {
        let mut inbox = self.inbox.write();
        let mut consumed = self.consumed.write();
        for request in requests {
            match request {
                AtomicRequest::Consume { chain_id, outpoint } => {
                    let key = (*chain_id, *outpoint);
                    inbox.remove(&key);
                    consumed.insert(key);
                }
                AtomicRequest::Put { chain_id, utxo } => {
                    inbox.insert((*chain_id, utxo.outpoint), utxo.clone());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utxo(tx_byte: u8) -> Utxo {
        let mut tx_id = [0u8; 32];
        tx_id[0] = tx_byte;
        Utxo {
            outpoint: OutPoint {
                tx_id: Id(tx_id),
                output_index: 0,
            },
            asset_id: crate::ids::PRIMARY_NETWORK_ID,
            amount: 100,
            owner: crate::supernet::OwnerSpec {
                threshold: 0,
                signers: vec![],
            },
            locktime: 0,
            threshold: 0,
        }
    }

    #[test]
    fn missing_utxo_is_none_not_an_error() {
        let mem = InMemorySharedMemory::new();
        let chain = Id::from_canonical_bytes(b"chain");
        assert!(mem.get(&chain, &utxo(1).outpoint).is_none());
    }

    #[test]
    fn put_then_get_round_trips_until_consumed() {
        let mem = InMemorySharedMemory::new();
        let chain = Id::from_canonical_bytes(b"chain");
        let u = utxo(1);
        mem.apply(&[AtomicRequest::Put {
            chain_id: chain,
            utxo: u.clone(),
        }]);
        assert!(mem.get(&chain, &u.outpoint).is_some());

        mem.apply(&[AtomicRequest::Consume {
            chain_id: chain,
            outpoint: u.outpoint,
        }]);
        assert!(mem.get(&chain, &u.outpoint).is_none());
    }
}
