//! Blockchain records created by `CreateChainTx` (§3): a supernet
//! authorizes the existence of another chain, identified by a genesis
//! payload and a VM identifier the surrounding multi-chain node uses to
//! pick a runtime for it. The platform VM only stores and indexes these
//! records; it does not execute the chains they describe.

use serde::{Deserialize, Serialize};

use crate::ids::Id;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainRecord {
    pub chain_id: Id,
    pub supernet_id: Id,
    pub chain_name: String,
    pub vm_id: Id,
    pub genesis_data: Vec<u8>,
}
