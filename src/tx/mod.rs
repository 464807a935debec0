//! C4 — Transaction Executor.
//!
//! A `Transaction` is syntactically verified in isolation, then semantically
//! verified and applied against a running `Diff` (§6: "syntactic verify →
//! semantic verify against running diff → apply to running diff"). A
//! failure at any stage aborts the containing block with that
//! transaction's error; the VM itself stays healthy (§7's propagation
//! policy).

pub mod executor;
pub mod kinds;

use serde::{Deserialize, Serialize};

use crate::ids::Id;

pub use kinds::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transaction {
    AddValidator(AddValidatorTx),
    AddDelegator(AddDelegatorTx),
    AddSupernetValidator(AddSupernetValidatorTx),
    RemoveSupernetValidator(RemoveSupernetValidatorTx),
    AddPermissionlessValidator(AddPermissionlessValidatorTx),
    AddPermissionlessDelegator(AddPermissionlessDelegatorTx),
    CreateSupernet(CreateSupernetTx),
    TransformSupernet(TransformSupernetTx),
    TransferSupernetOwnership(TransferSupernetOwnershipTx),
    CreateChain(CreateChainTx),
    Import(ImportTx),
    Export(ExportTx),
    Base(BaseTx),
    RewardValidator(RewardValidatorTx),
    AdvanceTime(AdvanceTimeTx),
}

impl Transaction {
    /// The transaction ID is the canonical hash of its encoded form, the
    /// way the teacher's `Transaction::txid` hashes the serialized
    /// transaction rather than carrying an independently-chosen ID.
    pub fn id(&self) -> Result<Id, crate::error::CodecError> {
        let bytes = crate::codec::encode(self)?;
        Ok(Id::from_canonical_bytes(&bytes))
    }

    pub fn is_proposal_kind(&self) -> bool {
        matches!(self, Transaction::RewardValidator(_))
    }

    pub fn is_apricot_time_advance(&self) -> bool {
        matches!(self, Transaction::AdvanceTime(_))
    }

    pub fn base_fields(&self) -> Option<&BaseTxFields> {
        match self {
            Transaction::AddValidator(tx) => Some(&tx.base),
            Transaction::AddDelegator(tx) => Some(&tx.base),
            Transaction::AddSupernetValidator(tx) => Some(&tx.base),
            Transaction::RemoveSupernetValidator(tx) => Some(&tx.base),
            Transaction::AddPermissionlessValidator(tx) => Some(&tx.base),
            Transaction::AddPermissionlessDelegator(tx) => Some(&tx.base),
            Transaction::CreateSupernet(tx) => Some(&tx.base),
            Transaction::TransformSupernet(tx) => Some(&tx.base),
            Transaction::TransferSupernetOwnership(tx) => Some(&tx.base),
            Transaction::CreateChain(tx) => Some(&tx.base),
            Transaction::Import(tx) => Some(&tx.base),
            Transaction::Export(tx) => Some(&tx.base),
            Transaction::Base(tx) => Some(&tx.base),
            Transaction::RewardValidator(_) | Transaction::AdvanceTime(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_deterministic_and_content_addressed() {
        let tx = Transaction::AdvanceTime(AdvanceTimeTx {
            new_chain_time: 100,
        });
        let other = Transaction::AdvanceTime(AdvanceTimeTx {
            new_chain_time: 200,
        });
        assert_eq!(tx.id().unwrap(), tx.id().unwrap());
        assert_ne!(tx.id().unwrap(), other.id().unwrap());
    }
}
