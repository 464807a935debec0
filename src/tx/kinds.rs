//! Wire bodies for the fifteen transaction kinds the executor recognizes
//! (§6). Each struct is the typed payload the codec (A1) round-trips;
//! `Transaction` in `mod.rs` is the tagged union plus the credential set
//! that authorizes it.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::ids::{Id, NodeId};
use crate::supernet::{OwnerSpec, TransformationParams};
use crate::utxo::OutPoint;

/// A spend plus a credential (signers) authorizing it. Modeled after the
/// teacher's `TxInput`, generalized with an explicit signer list instead of
/// a single-key script since supernet authorization needs threshold
/// multisig (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxInput {
    pub outpoint: OutPoint,
    pub signers: Vec<VerifyingKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxOutput {
    pub asset_id: Id,
    pub amount: u64,
    pub owner: OwnerSpec,
    pub locktime: i64,
}

/// Inputs/outputs/fee common to every transaction kind, the way the
/// teacher's `Transaction` carries a shared `inputs`/`outputs` pair under
/// every specialization.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BaseTxFields {
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub memo: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddValidatorTx {
    pub base: BaseTxFields,
    pub node_id: NodeId,
    pub public_key: VerifyingKey,
    pub start_time: i64,
    pub end_time: i64,
    pub weight: u64,
    pub reward_owner: OwnerSpec,
    pub delegation_fee_ppm: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddDelegatorTx {
    pub base: BaseTxFields,
    pub validator_node_id: NodeId,
    pub start_time: i64,
    pub end_time: i64,
    pub weight: u64,
    pub reward_owner: OwnerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSupernetValidatorTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub node_id: NodeId,
    pub start_time: i64,
    pub end_time: i64,
    pub weight: u64,
    pub supernet_auth_signers: Vec<VerifyingKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveSupernetValidatorTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub node_id: NodeId,
    pub supernet_auth_signers: Vec<VerifyingKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPermissionlessValidatorTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub node_id: NodeId,
    pub public_key: Option<VerifyingKey>,
    pub start_time: i64,
    pub end_time: i64,
    pub weight: u64,
    pub reward_owner: OwnerSpec,
    pub delegation_fee_ppm: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddPermissionlessDelegatorTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub validator_node_id: NodeId,
    pub start_time: i64,
    pub end_time: i64,
    pub weight: u64,
    pub reward_owner: OwnerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSupernetTx {
    pub base: BaseTxFields,
    pub owner: OwnerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformSupernetTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub supernet_auth_signers: Vec<VerifyingKey>,
    pub initial_reward_pool_deposit: u64,
    pub params: TransformationParams,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferSupernetOwnershipTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub supernet_auth_signers: Vec<VerifyingKey>,
    pub new_owner: OwnerSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChainTx {
    pub base: BaseTxFields,
    pub supernet_id: Id,
    pub supernet_auth_signers: Vec<VerifyingKey>,
    pub chain_name: String,
    pub vm_id: Id,
    pub genesis_data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportTx {
    pub base: BaseTxFields,
    pub source_chain: Id,
    pub imported_inputs: Vec<TxInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTx {
    pub base: BaseTxFields,
    pub destination_chain: Id,
    pub exported_outputs: Vec<TxOutput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseTx {
    pub base: BaseTxFields,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardValidatorTx {
    pub validator_tx_id: Id,
}

/// Apricot-only: advances chain-time without a Banff header timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvanceTimeTx {
    pub new_chain_time: i64,
}
