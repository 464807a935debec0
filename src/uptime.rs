//! A4 — Uptime Manager.
//!
//! Tracks connected time per node since a validator's stake began, and
//! answers the fraction the option-block builder (C6) needs. Grounded on
//! the teacher's `heartbeat_attestation`-driven liveness tracking,
//! generalized to the simple "seconds connected / seconds eligible" ratio
//! this spec calls for rather than the teacher's VDF-backed proofs (VDFs
//! are part of the consensus machinery this crate treats as out of scope).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::ids::NodeId;

#[derive(Debug, Clone, Copy, Default)]
struct Tracking {
    connected_since: Option<i64>,
    accumulated_connected_secs: i64,
    tracking_started_at: i64,
}

/// `Connected`/`Disconnected`/`ConnectedSupernet` land here (§6), forwarded
/// by the VM without interpretation.
pub trait UptimeCalculator: Send + Sync {
    fn connected(&self, node_id: NodeId, at: i64);
    fn disconnected(&self, node_id: NodeId, at: i64);
    /// Fraction of `[since, at]` the node was observed connected, in
    /// parts-per-million. `Err` models "uptime lookup failed" (§4.4.4 step
    /// 4): corrupted tracking state, or a node never observed at all.
    fn uptime_ppm(&self, node_id: NodeId, since: i64, at: i64) -> Result<u64, UptimeError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UptimeError {
    #[error("no uptime record for node {0}")]
    NoRecord(NodeId),
    #[error("uptime window is empty or inverted (since={since}, at={at})")]
    InvalidWindow { since: i64, at: i64 },
}

pub struct InMemoryUptimeCalculator {
    tracking: RwLock<HashMap<NodeId, Tracking>>,
}

impl InMemoryUptimeCalculator {
    pub fn new() -> Self {
        Self {
            tracking: RwLock::new(HashMap::new()),
        }
    }

    /// Call once a validator's stake becomes current, so its uptime window
    /// starts at the right chain-time rather than whenever the process
    /// happened to notice it.
    pub fn start_tracking(&self, node_id: NodeId, at: i64) {
        self.tracking.write().entry(node_id).or_insert(Tracking {
            connected_since: None,
            accumulated_connected_secs: 0,
            tracking_started_at: at,
        });
    }
}

impl Default for InMemoryUptimeCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl UptimeCalculator for InMemoryUptimeCalculator {
    fn connected(&self, node_id: NodeId, at: i64) {
        let mut guard = self.tracking.write();
        let entry = guard.entry(node_id).or_insert(Tracking {
            connected_since: None,
            accumulated_connected_secs: 0,
            tracking_started_at: at,
        });
        if entry.connected_since.is_none() {
            entry.connected_since = Some(at);
        }
    }

    fn disconnected(&self, node_id: NodeId, at: i64) {
        let mut guard = self.tracking.write();
        if let Some(entry) = guard.get_mut(&node_id) {
            if let Some(since) = entry.connected_since.take() {
                entry.accumulated_connected_secs += (at - since).max(0);
            }
        }
    }

    fn uptime_ppm(&self, node_id: NodeId, since: i64, at: i64) -> Result<u64, UptimeError> {
        if at <= since {
            return Err(UptimeError::InvalidWindow { since, at });
        }
        let guard = self.tracking.read();
        let entry = guard.get(&node_id).ok_or(UptimeError::NoRecord(node_id))?;

        let mut connected = entry.accumulated_connected_secs;
        if let Some(connected_since) = entry.connected_since {
            connected += (at - connected_since.max(since)).max(0);
        }
        let window = (at - since).max(1);
        Ok(((connected.max(0) as u128 * 1_000_000) / window as u128) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fully_connected_window_reports_100_percent() {
        let calc = InMemoryUptimeCalculator::new();
        let node = NodeId([1u8; 20]);
        calc.start_tracking(node, 0);
        calc.connected(node, 0);
        assert_eq!(calc.uptime_ppm(node, 0, 1_000).unwrap(), 1_000_000);
    }

    #[test]
    fn partial_connection_is_prorated() {
        let calc = InMemoryUptimeCalculator::new();
        let node = NodeId([2u8; 20]);
        calc.start_tracking(node, 0);
        calc.connected(node, 0);
        calc.disconnected(node, 500);
        assert_eq!(calc.uptime_ppm(node, 0, 1_000).unwrap(), 500_000);
    }

    #[test]
    fn unknown_node_is_a_lookup_failure() {
        let calc = InMemoryUptimeCalculator::new();
        let err = calc.uptime_ppm(NodeId([9u8; 20]), 0, 100).unwrap_err();
        assert!(matches!(err, UptimeError::NoRecord(_)));
    }
}
