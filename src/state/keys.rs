//! Key-space layout for `PersistentStore` (§6's "layered state model" KV
//! contract). Every collection the VM persists gets its own byte-string
//! prefix so `scan_prefix` can enumerate it without touching the others,
//! mirroring the teacher's `storage.rs` column-family-by-prefix layout over
//! a single sled tree.

use crate::ids::{Id, NodeId};
use crate::utxo::OutPoint;

const UTXO: &[u8] = b"utxo/";
const CURRENT_STAKER: &[u8] = b"currentStaker/";
const PENDING_STAKER: &[u8] = b"pendingStaker/";
const SUPERNET: &[u8] = b"supernet/";
const CHAIN: &[u8] = b"chain/";
const TX: &[u8] = b"tx/";
const BLOCK: &[u8] = b"block/";
const BLOCK_BY_HEIGHT: &[u8] = b"blockByHeight/";
const VALIDATOR_DIFF: &[u8] = b"validatorDiff/";
const BLS_KEY_DIFF: &[u8] = b"blsKeyDiff/";
const REWARD_POOL: &[u8] = b"rewardPool/";
const CURRENT_SUPPLY: &[u8] = b"currentSupply/";

pub const LAST_ACCEPTED: &[u8] = b"lastAccepted";
pub const TIMESTAMP: &[u8] = b"timestamp";
pub const FEE_POOL: &[u8] = b"feePool";

pub fn utxo(outpoint: &OutPoint) -> Vec<u8> {
    [
        UTXO,
        outpoint.tx_id.as_bytes().as_slice(),
        &outpoint.output_index.to_be_bytes()[..],
    ]
    .concat()
}

fn identity_bytes(supernet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    [supernet_id.as_bytes().as_slice(), node_id.as_bytes().as_slice()].concat()
}

/// Keyed by `(supernet_id, node_id, tx_id)`, not just the `(supernet_id,
/// node_id)` slot: a validator and its delegators share a slot and must
/// each get a distinct persisted entry.
pub fn current_staker(supernet_id: &Id, node_id: &NodeId, tx_id: &Id) -> Vec<u8> {
    [
        CURRENT_STAKER,
        &identity_bytes(supernet_id, node_id)[..],
        tx_id.as_bytes().as_slice(),
    ]
    .concat()
}

pub fn pending_staker(supernet_id: &Id, node_id: &NodeId, tx_id: &Id) -> Vec<u8> {
    [
        PENDING_STAKER,
        &identity_bytes(supernet_id, node_id)[..],
        tx_id.as_bytes().as_slice(),
    ]
    .concat()
}

pub fn supernet(id: &Id) -> Vec<u8> {
    [SUPERNET, id.as_bytes().as_slice()].concat()
}

pub fn supernet_prefix() -> Vec<u8> {
    SUPERNET.to_vec()
}

pub fn chain(id: &Id) -> Vec<u8> {
    [CHAIN, id.as_bytes().as_slice()].concat()
}

pub fn chain_prefix() -> Vec<u8> {
    CHAIN.to_vec()
}

pub fn tx(id: &Id) -> Vec<u8> {
    [TX, id.as_bytes().as_slice()].concat()
}

pub fn block(id: &Id) -> Vec<u8> {
    [BLOCK, id.as_bytes().as_slice()].concat()
}

pub fn block_by_height(height: u64) -> Vec<u8> {
    [BLOCK_BY_HEIGHT, &height.to_be_bytes()[..]].concat()
}

pub fn block_by_height_prefix() -> Vec<u8> {
    BLOCK_BY_HEIGHT.to_vec()
}

pub fn validator_diff(height: u64, supernet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    [
        VALIDATOR_DIFF,
        &height.to_be_bytes()[..],
        supernet_id.as_bytes().as_slice(),
        node_id.as_bytes().as_slice(),
    ]
    .concat()
}

pub fn validator_diff_height_prefix(height: u64) -> Vec<u8> {
    [VALIDATOR_DIFF, &height.to_be_bytes()[..]].concat()
}

pub fn bls_key_diff(height: u64, supernet_id: &Id, node_id: &NodeId) -> Vec<u8> {
    [
        BLS_KEY_DIFF,
        &height.to_be_bytes()[..],
        supernet_id.as_bytes().as_slice(),
        node_id.as_bytes().as_slice(),
    ]
    .concat()
}

pub fn bls_key_diff_height_prefix(height: u64) -> Vec<u8> {
    [BLS_KEY_DIFF, &height.to_be_bytes()[..]].concat()
}

pub fn reward_pool(supernet_id: &Id) -> Vec<u8> {
    [REWARD_POOL, supernet_id.as_bytes().as_slice()].concat()
}

pub fn reward_pool_prefix() -> Vec<u8> {
    REWARD_POOL.to_vec()
}

pub fn current_supply(supernet_id: &Id) -> Vec<u8> {
    [CURRENT_SUPPLY, supernet_id.as_bytes().as_slice()].concat()
}

pub fn current_supply_prefix() -> Vec<u8> {
    CURRENT_SUPPLY.to_vec()
}

pub fn current_staker_prefix() -> Vec<u8> {
    CURRENT_STAKER.to_vec()
}

pub fn pending_staker_prefix() -> Vec<u8> {
    PENDING_STAKER.to_vec()
}

pub fn utxo_prefix() -> Vec<u8> {
    UTXO.to_vec()
}
