//! Structured error taxonomy for the platform VM.
//!
//! Split the way the teacher splits `AppError`/`StorageError`: a top-level
//! enum for everything a caller of the VM contract can observe, wrapping a
//! storage-local enum and a codec-local enum with `#[from]`. Fatal errors
//! (database I/O, version mismatches, invariant violations) are a distinct
//! variant so callers can tell "this block is invalid" apart from "this
//! process needs to abort".

use thiserror::Error;

use crate::ids::{Id, NodeId};

#[derive(Error, Debug)]
pub enum VmError {
    #[error("block height {actual} != parent height {parent} + 1")]
    IncorrectBlockHeight { parent: u64, actual: u64 },

    #[error("Apricot block issued after BanffTime")]
    ApricotBlockIssuedAfterFork,

    #[error("child block timestamp {child} is earlier than parent timestamp {parent}")]
    ChildBlockEarlierThanParent { parent: i64, child: i64 },

    #[error("child block timestamp {child} is beyond the sync bound (now={now}, bound={bound}s)")]
    ChildBlockBeyondSyncBound { now: i64, child: i64, bound: i64 },

    #[error("child block timestamp {child} is after the next staker change time {next_change}")]
    ChildBlockAfterStakerChangeTime { child: i64, next_change: i64 },

    #[error("Banff standard block at height {0} has no transactions and does not advance time")]
    BanffStandardBlockWithoutChanges(u64),

    #[error("block {0} is not an oracle block")]
    NotOracle(Id),

    #[error("delegator would push validator {0} over its maximum stake")]
    OverDelegated(NodeId),

    #[error("supernet authorization failed for supernet {0}")]
    Unauthorized(Id),

    #[error("insufficient funds: needed {needed}, have {have}")]
    InsufficientFunds { needed: u64, have: u64 },

    #[error("no spendable funds for address")]
    NoSpendableFunds,

    #[error("unexpected proposal tx type")]
    UnexpectedProposalTxType,

    #[error("unexpected staker tx type, expected a primary-network validator")]
    UnexpectedStakerTxType,

    #[error("{0} not found")]
    NotFound(String),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("no pending blocks to build")]
    NoPendingBlocks,

    #[error("target height {target} is above last accepted height {last_accepted}")]
    FutureHeight { target: u64, last_accepted: u64 },

    #[error("transaction {txid} failed: {reason}")]
    TxFailed { txid: Id, reason: String },

    #[error("fatal error, VM must abort: {0}")]
    Fatal(String),
}

impl VmError {
    /// Fatal errors are the only ones that should ever cause the embedding
    /// process to abort; everything else aborts just the block/tx in hand.
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::Fatal(_))
    }
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("diff version mismatch: expected parent {expected}, got {actual}")]
    VersionMismatch { expected: Id, actual: Id },

    #[error("commit conflict: base already advanced past {0}")]
    CommitConflict(Id),

    #[error("underlying storage error: {0}")]
    Storage(#[from] sled::Error),
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported codec version {found}, expected {expected}")]
    VersionMismatch { expected: u8, found: u8 },

    #[error("input too short to contain a version tag")]
    Truncated,

    #[error("bincode (de)serialization failed: {0}")]
    Bincode(#[from] Box<bincode::ErrorKind>),
}
