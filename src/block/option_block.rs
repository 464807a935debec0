//! C6 — Option-Block Builder.
//!
//! For a Proposal block's retiring validator, synthesizes the Commit/Abort
//! candidate pair and marks one preferred based on observed uptime (§4.4.4).
//! Grounded on the teacher's `consensus/snowman` preference hooks, which
//! likewise pick between two already-built children rather than building a
//! decision tree; the uptime threshold itself is this crate's own
//! (`UptimeCalculator`) in place of the teacher's masternode ping tracker.

use crate::block::types::{Block, BlockHeader};
use crate::config::VmConfig;
use crate::ids::Id;
use crate::staker::Staker;
use crate::supernet::Supernet;
use crate::uptime::UptimeCalculator;

pub struct OptionBlocks {
    pub preferred: Block,
    pub alternate: Block,
}

/// Build the Commit/Abort pair for `staker`'s retirement under
/// `proposal_block_id`, preferring Commit unless observed uptime over the
/// staking period falls short of the applicable requirement. Any uptime
/// lookup failure defaults to preferring Commit rather than propagating the
/// error — an option-block candidate set must always be produced.
pub fn build_options(
    proposal_block_id: Id,
    proposal_height: u64,
    staker: &Staker,
    supernet: Option<&Supernet>,
    cfg: &VmConfig,
    uptime: &dyn UptimeCalculator,
    now: i64,
) -> OptionBlocks {
    let requirement_ppm = supernet
        .and_then(|s| s.transformation.as_ref())
        .map(|t| t.uptime_requirement_ppm)
        .unwrap_or(cfg.staking.default_uptime_requirement_ppm);

    let prefers_commit = match uptime.uptime_ppm(staker.node_id, staker.start_time, now) {
        Ok(observed_ppm) => observed_ppm >= requirement_ppm,
        Err(_) => true,
    };

    let header = BlockHeader {
        parent_id: proposal_block_id,
        height: proposal_height + 1,
    };
    let commit = Block::Commit {
        header: header.clone(),
        proposal_block_id,
    };
    let abort = Block::Abort {
        header,
        proposal_block_id,
    };

    if prefers_commit {
        OptionBlocks {
            preferred: commit,
            alternate: abort,
        }
    } else {
        OptionBlocks {
            preferred: abort,
            alternate: commit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::NodeId;
    use crate::staker::Priority;
    use crate::uptime::{InMemoryUptimeCalculator, UptimeError};

    struct AlwaysFails;
    impl UptimeCalculator for AlwaysFails {
        fn connected(&self, _node_id: NodeId, _at: i64) {}
        fn disconnected(&self, _node_id: NodeId, _at: i64) {}
        fn uptime_ppm(&self, node_id: NodeId, _since: i64, _at: i64) -> Result<u64, UptimeError> {
            Err(UptimeError::NoRecord(node_id))
        }
    }

    fn validator(node: u8) -> Staker {
        let mut node_id = [0u8; 20];
        node_id[0] = node;
        Staker {
            tx_id: Id::from_canonical_bytes(b"validator"),
            node_id: NodeId(node_id),
            supernet_id: crate::ids::PRIMARY_NETWORK_ID,
            weight: 2_000_000,
            start_time: 1_000,
            end_time: 2_000,
            potential_reward: 1_000,
            priority: Priority::PrimaryValidatorCurrent,
            public_key: None,
            delegation_fee_ppm: 0,
            reward_owner: None,
        }
    }

    fn cfg() -> VmConfig {
        VmConfig::testnet()
    }

    #[test]
    fn uptime_lookup_failure_defaults_to_commit() {
        let proposal_id = Id::from_canonical_bytes(b"proposal");
        let staker = validator(1);
        let options = build_options(proposal_id, 10, &staker, None, &cfg(), &AlwaysFails, 2_000);
        assert!(matches!(options.preferred, Block::Commit { .. }));
        assert!(matches!(options.alternate, Block::Abort { .. }));
    }

    #[test]
    fn uptime_below_requirement_prefers_abort() {
        let proposal_id = Id::from_canonical_bytes(b"proposal");
        let staker = validator(2);
        let uptime = InMemoryUptimeCalculator::new();
        uptime.start_tracking(staker.node_id, staker.start_time);
        uptime.disconnected(staker.node_id, staker.start_time + 100);
        let c = cfg();
        let options = build_options(proposal_id, 10, &staker, None, &c, &uptime, staker.end_time);
        assert!(matches!(options.preferred, Block::Abort { .. }));
    }

    #[test]
    fn full_uptime_prefers_commit() {
        let proposal_id = Id::from_canonical_bytes(b"proposal");
        let staker = validator(3);
        let uptime = InMemoryUptimeCalculator::new();
        uptime.start_tracking(staker.node_id, staker.start_time);
        uptime.connected(staker.node_id, staker.start_time);
        let c = cfg();
        let options = build_options(proposal_id, 10, &staker, None, &c, &uptime, staker.end_time);
        assert!(matches!(options.preferred, Block::Commit { .. }));
    }
}
