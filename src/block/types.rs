//! Block shapes for the platform VM (§4.4): a common header plus one of
//! five variants. `Apricot` is the pre-fork encoding (no header
//! timestamp on Standard blocks, time instead advanced by an explicit
//! `AdvanceTimeTx`); `Banff` carries the timestamp directly on the block.
//! Grounded on the teacher's `Block`/`BlockHeader` split, generalized from
//! one block shape to the tagged family §4.4 requires, the same way the
//! teacher's own `BlockV1`/current-format split shows a block format
//! growing a new field behind a version tag.

use serde::{Deserialize, Serialize};

use crate::ids::Id;
use crate::tx::Transaction;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockHeader {
    pub parent_id: Id,
    pub height: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Block {
    /// Ordinary block: advances chain-time (Banff) or is advanced by an
    /// `AdvanceTimeTx` inside its transaction list (Apricot), then executes
    /// every other transaction in order.
    Standard {
        header: BlockHeader,
        /// `None` for Apricot; Banff blocks carry the wall-clock chain-time
        /// they advance to directly.
        timestamp: Option<i64>,
        transactions: Vec<Transaction>,
    },
    /// Oracular: carries a single `RewardValidatorTx` and exposes a
    /// Commit/Abort child pair (§4.4.2).
    Proposal {
        header: BlockHeader,
        timestamp: Option<i64>,
        reward_validator_tx: crate::tx::RewardValidatorTx,
    },
    /// Only ever a child of a `Proposal` block.
    Commit {
        header: BlockHeader,
        proposal_block_id: Id,
    },
    /// Only ever a child of a `Proposal` block.
    Abort {
        header: BlockHeader,
        proposal_block_id: Id,
    },
    /// Apricot-only: one cross-chain import/export plus nothing else.
    Atomic {
        header: BlockHeader,
        transaction: Transaction,
    },
}

impl Block {
    pub fn header(&self) -> &BlockHeader {
        match self {
            Block::Standard { header, .. }
            | Block::Proposal { header, .. }
            | Block::Commit { header, .. }
            | Block::Abort { header, .. }
            | Block::Atomic { header, .. } => header,
        }
    }

    pub fn parent_id(&self) -> Id {
        self.header().parent_id
    }

    pub fn height(&self) -> u64 {
        self.header().height
    }

    /// The block's ID is the canonical hash of its encoded form (§3's
    /// "content-addressed" identifier convention, used identically for
    /// transactions).
    pub fn id(&self) -> Result<Id, crate::error::CodecError> {
        let bytes = crate::codec::encode(self)?;
        Ok(Id::from_canonical_bytes(&bytes))
    }

    pub fn is_oracle(&self) -> bool {
        matches!(self, Block::Proposal { .. })
    }

    pub fn is_option_block(&self) -> bool {
        matches!(self, Block::Commit { .. } | Block::Abort { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_the_codec() {
        let block = Block::Standard {
            header: BlockHeader {
                parent_id: crate::ids::PRIMARY_NETWORK_ID,
                height: 1,
            },
            timestamp: Some(1_000),
            transactions: vec![],
        };
        let bytes = crate::codec::encode(&block).unwrap();
        let back: Block = crate::codec::decode(&bytes).unwrap();
        assert_eq!(block.id().unwrap(), back.id().unwrap());
    }

    #[test]
    fn only_proposal_blocks_are_oracular() {
        let header = BlockHeader {
            parent_id: crate::ids::PRIMARY_NETWORK_ID,
            height: 1,
        };
        let standard = Block::Standard {
            header: header.clone(),
            timestamp: None,
            transactions: vec![],
        };
        assert!(!standard.is_oracle());
    }
}
