//! C3 — Staker lifecycle types.
//!
//! A `Staker` is any validator or delegator, primary-network or supernet
//! (§3). The current/pending collections are each a total, process-wide
//! order over `(next_time, priority, tx_id)` — per §9's design note this is
//! a `BTreeSet` of ordering keys paired with a `HashMap` of payloads, not a
//! sort-on-read `Vec`, so iteration order is bit-exact and cheap to
//! maintain incrementally the way the teacher's `DashMap`-backed indices
//! are cheap to maintain incrementally.

use std::collections::{BTreeSet, HashMap};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};

use crate::ids::{Id, NodeId};
use crate::supernet::OwnerSpec;

/// Tie-break ordering for stakers sharing a `next_time`. The numeric order
/// is load-bearing: reward amounts and historical validator-set
/// reconstruction depend on processing ties in this exact order (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Priority {
    PrimaryValidatorPending = 0,
    PrimaryDelegatorPending = 1,
    SupernetValidatorPending = 2,
    PrimaryValidatorCurrent = 3,
    PrimaryDelegatorCurrent = 4,
    SupernetValidatorCurrent = 5,
}

impl Priority {
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Priority::PrimaryValidatorPending
                | Priority::PrimaryDelegatorPending
                | Priority::SupernetValidatorPending
        )
    }

    pub fn is_validator(&self) -> bool {
        matches!(
            self,
            Priority::PrimaryValidatorPending
                | Priority::PrimaryValidatorCurrent
                | Priority::SupernetValidatorPending
                | Priority::SupernetValidatorCurrent
        )
    }

    pub fn is_delegator(&self) -> bool {
        matches!(
            self,
            Priority::PrimaryDelegatorPending | Priority::PrimaryDelegatorCurrent
        )
    }

    pub fn is_supernet_validator(&self) -> bool {
        matches!(
            self,
            Priority::SupernetValidatorPending | Priority::SupernetValidatorCurrent
        )
    }

    pub fn to_current(self) -> Priority {
        match self {
            Priority::PrimaryValidatorPending => Priority::PrimaryValidatorCurrent,
            Priority::PrimaryDelegatorPending => Priority::PrimaryDelegatorCurrent,
            Priority::SupernetValidatorPending => Priority::SupernetValidatorCurrent,
            current => current,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Staker {
    pub tx_id: Id,
    pub node_id: NodeId,
    pub supernet_id: Id,
    pub weight: u64,
    pub start_time: i64,
    pub end_time: i64,
    /// Set at promotion time by invoking C1 (`crate::reward`); zero until
    /// then.
    pub potential_reward: u64,
    pub priority: Priority,
    /// Only primary-network validators carry a BLS-equivalent public key
    /// (modeled here by the same `ed25519_dalek::VerifyingKey` the teacher
    /// uses for its masternode identity, since BLS itself is out of scope).
    pub public_key: Option<VerifyingKey>,
    /// Parts-per-million of `potential_reward` withheld for delegators on
    /// removal (only meaningful for validators).
    pub delegation_fee_ppm: u64,
    /// Where `potential_reward` is paid on removal. `None` for
    /// permissioned supernet validators, which carry no staking economics
    /// and therefore no payout (§3: only primary-network and transformed-
    /// supernet stakers earn rewards).
    pub reward_owner: Option<OwnerSpec>,
}

impl Staker {
    /// `next_time` per §3: `end_time` for current stakers, `start_time`
    /// for pending ones.
    pub fn next_time(&self) -> i64 {
        if self.priority.is_pending() {
            self.start_time
        } else {
            self.end_time
        }
    }

    pub fn key(&self) -> StakerKey {
        StakerKey {
            next_time: self.next_time(),
            priority: self.priority,
            tx_id: self.tx_id,
        }
    }

    pub fn identity(&self) -> (Id, NodeId) {
        (self.supernet_id, self.node_id)
    }
}

/// The ordering key for the indexed staker sets: `(next_time, priority,
/// tx_id)` ascending, exactly per §4.2's tie-break semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StakerKey {
    pub next_time: i64,
    pub priority: Priority,
    pub tx_id: Id,
}

/// One of the two indexed staker collections (current or pending).
///
/// A validator and its delegators legitimately share an `(supernet_id,
/// node_id)` identity — that pair names a *slot*, not a unique staker — so
/// payloads are stored by the globally-unique `tx_id`, with a secondary
/// index tracking which `tx_id` (if any) is the validator occupying a given
/// slot. Invariant 1 (§3): a node appears at most once across `current ∪
/// pending` for a given supernet is about that validator slot, and is
/// enforced by callers composing two `StakerSet`s together
/// (`crate::state::diff`), not by this type alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StakerSet {
    order: BTreeSet<StakerKey>,
    by_tx_id: HashMap<Id, Staker>,
    validator_by_identity: HashMap<(Id, NodeId), Id>,
}

impl StakerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_tx_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tx_id.is_empty()
    }

    pub fn insert(&mut self, staker: Staker) {
        let key = staker.key();
        let identity = staker.identity();
        let tx_id = staker.tx_id;
        if staker.priority.is_validator() {
            self.validator_by_identity.insert(identity, tx_id);
        }
        self.order.insert(key);
        self.by_tx_id.insert(tx_id, staker);
    }

    /// Removes the staker with this `tx_id`, wherever it sits (validator or
    /// delegator slot). Delegators of the same identity are untouched.
    pub fn remove_by_tx_id(&mut self, tx_id: &Id) -> Option<Staker> {
        let staker = self.by_tx_id.remove(tx_id)?;
        self.order.remove(&staker.key());
        if staker.priority.is_validator() {
            let identity = staker.identity();
            if self.validator_by_identity.get(&identity) == Some(tx_id) {
                self.validator_by_identity.remove(&identity);
            }
        }
        Some(staker)
    }

    pub fn get_by_tx_id(&self, tx_id: &Id) -> Option<&Staker> {
        self.by_tx_id.get(tx_id)
    }

    /// The `tx_id` of the validator occupying this identity's slot, if any.
    pub fn validator_tx_id(&self, identity: &(Id, NodeId)) -> Option<Id> {
        self.validator_by_identity.get(identity).copied()
    }

    /// The validator occupying this identity's slot, if any. Does not see
    /// delegators sharing the identity.
    pub fn get_validator(&self, identity: &(Id, NodeId)) -> Option<&Staker> {
        let tx_id = self.validator_by_identity.get(identity)?;
        self.by_tx_id.get(tx_id)
    }

    pub fn contains_validator(&self, identity: &(Id, NodeId)) -> bool {
        self.validator_by_identity.contains_key(identity)
    }

    /// The earliest staker-change event, in `(next_time, priority, tx_id)`
    /// order.
    pub fn peek_head(&self) -> Option<&Staker> {
        let key = self.order.iter().next()?;
        self.by_tx_id.get(&key.tx_id)
    }

    /// Iterate in `(next_time, priority, tx_id)` order.
    pub fn iter_ordered(&self) -> impl Iterator<Item = &Staker> {
        self.order
            .iter()
            .filter_map(move |key| self.by_tx_id.get(&key.tx_id))
    }

    pub fn values(&self) -> impl Iterator<Item = &Staker> {
        self.by_tx_id.values()
    }

    /// Current weight of a primary validator plus all its current
    /// delegators, for invariant 3 / `OverDelegated` checks.
    pub fn validator_and_delegator_weight(&self, node_id: &NodeId, supernet_id: &Id) -> u64 {
        self.by_tx_id
            .values()
            .filter(|s| &s.node_id == node_id && &s.supernet_id == supernet_id)
            .map(|s| s.weight)
            .sum()
    }

    /// Current delegators backing `node_id` on `supernet_id`. Used to
    /// pro-rate a retiring validator's withheld delegator share (§4.4.3).
    pub fn delegators_of(&self, node_id: &NodeId, supernet_id: &Id) -> Vec<&Staker> {
        self.by_tx_id
            .values()
            .filter(|s| {
                &s.node_id == node_id && &s.supernet_id == supernet_id && s.priority.is_delegator()
            })
            .collect()
    }
}

/// The earliest upcoming staker-change event across both collections,
/// per §4.4.1's `nextStakerChangeTime`: the soonest pending promotion, or
/// the soonest removal of a delegator / supernet validator. Primary-network
/// validators are excluded from the removal side because their departure
/// requires a `RewardValidatorTx` via a Proposal block, not a timestamp
/// advance (§4.2 step 2).
pub fn next_staker_change_time(current: &StakerSet, pending: &StakerSet) -> Option<i64> {
    let next_promotion = pending.peek_head().map(|s| s.start_time);
    let next_removal = current
        .iter_ordered()
        .find(|s| s.priority.is_delegator() || s.priority.is_supernet_validator())
        .map(|s| s.end_time);
    match (next_promotion, next_removal) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staker(tx: u8, supernet: u8, node: u8, next: i64, priority: Priority) -> Staker {
        let mut tx_id = [0u8; 32];
        tx_id[0] = tx;
        let mut supernet_id = [0u8; 32];
        supernet_id[0] = supernet;
        let mut node_id = [0u8; 20];
        node_id[0] = node;
        Staker {
            tx_id: Id(tx_id),
            node_id: NodeId(node_id),
            supernet_id: Id(supernet_id),
            weight: 100,
            start_time: if priority.is_pending() { next } else { 0 },
            end_time: if priority.is_pending() { next + 1000 } else { next },
            potential_reward: 0,
            priority,
            public_key: None,
            delegation_fee_ppm: 0,
            reward_owner: None,
        }
    }

    #[test]
    fn iterates_in_next_time_then_priority_then_txid_order() {
        let mut set = StakerSet::new();
        set.insert(staker(2, 1, 1, 100, Priority::PrimaryValidatorPending));
        set.insert(staker(1, 1, 2, 100, Priority::PrimaryValidatorPending));
        set.insert(staker(3, 1, 3, 50, Priority::PrimaryValidatorPending));

        let order: Vec<u8> = set.iter_ordered().map(|s| s.tx_id.0[0]).collect();
        // next_time=50 sorts first, then the two next_time=100 entries tie
        // on priority and break on tx_id ascending (1 before 2).
        assert_eq!(order, vec![3, 1, 2]);
    }

    #[test]
    fn remove_by_tx_id_drops_from_every_index() {
        let mut set = StakerSet::new();
        let s = staker(1, 1, 1, 100, Priority::PrimaryValidatorCurrent);
        let identity = s.identity();
        let tx_id = s.tx_id;
        set.insert(s);
        assert!(set.remove_by_tx_id(&tx_id).is_some());
        assert!(set.get_by_tx_id(&tx_id).is_none());
        assert!(!set.contains_validator(&identity));
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn validator_and_delegators_coexist_at_the_same_identity() {
        let mut set = StakerSet::new();
        let v = staker(1, 1, 1, 100, Priority::PrimaryValidatorCurrent);
        let identity = v.identity();
        let validator_tx_id = v.tx_id;
        set.insert(v);
        set.insert(staker(2, 1, 1, 150, Priority::PrimaryDelegatorCurrent));
        set.insert(staker(3, 1, 1, 200, Priority::PrimaryDelegatorCurrent));

        assert_eq!(set.len(), 3);
        assert_eq!(set.validator_tx_id(&identity), Some(validator_tx_id));
        assert_eq!(set.delegators_of(&identity.1, &identity.0).len(), 2);

        set.remove_by_tx_id(&validator_tx_id);
        assert!(!set.contains_validator(&identity));
        assert_eq!(set.delegators_of(&identity.1, &identity.0).len(), 2);
    }

    #[test]
    fn next_staker_change_time_skips_primary_validators_on_the_removal_side() {
        let mut current = StakerSet::new();
        // A current primary validator ending at 100 must not count as the
        // next removal event; only the delegator at 200 should.
        current.insert(staker(1, 0, 1, 100, Priority::PrimaryValidatorCurrent));
        current.insert(staker(2, 0, 2, 200, Priority::PrimaryDelegatorCurrent));
        let pending = StakerSet::new();
        assert_eq!(next_staker_change_time(&current, &pending), Some(200));
    }

    #[test]
    fn next_staker_change_time_prefers_the_earlier_of_promotion_and_removal() {
        let mut current = StakerSet::new();
        current.insert(staker(1, 0, 1, 500, Priority::PrimaryDelegatorCurrent));
        let mut pending = StakerSet::new();
        pending.insert(staker(2, 0, 2, 50, Priority::PrimaryValidatorPending));
        assert_eq!(next_staker_change_time(&current, &pending), Some(50));
    }

    #[test]
    fn validator_and_delegator_weight_sums_same_node_and_supernet() {
        let mut set = StakerSet::new();
        let mut v = staker(1, 1, 1, 100, Priority::PrimaryValidatorCurrent);
        v.weight = 2_000;
        set.insert(v);
        let mut d = staker(2, 1, 1, 100, Priority::PrimaryDelegatorCurrent);
        d.weight = 500;
        set.insert(d);

        let node_id = NodeId([1u8; 20]);
        let supernet_id = Id([1u8; 32]);
        assert_eq!(
            set.validator_and_delegator_weight(&node_id, &supernet_id),
            2_500
        );
    }
}
