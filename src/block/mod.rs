//! Block construction and execution (§4.4–§4.6): the five block shapes
//! (`types`), the C5 state machine that verifies/accepts/rejects them
//! (`executor`), the C6 Commit/Abort candidate builder for Proposal blocks
//! (`option_block`), and the C7 builder that assembles new blocks out of the
//! mempool (`builder`).

pub mod builder;
pub mod executor;
pub mod option_block;
pub mod types;

pub use executor::{BlockExecutor, BlockStatus};
pub use types::{Block, BlockHeader};
