//! Pending-ping bookkeeping with timeout audit.

use std::collections::HashMap;
use std::time::Duration;

use strand_types::NodeId;
use tokio::time::Instant;

/// One outstanding ping, keyed by its transaction id.
#[derive(Debug, Clone)]
pub struct PendingProbe {
    /// The node the ping was addressed to.
    pub peer: NodeId,
    /// Caller-supplied text, reported back on success or failure.
    pub text: String,
    /// When the ping was sent.
    pub sent_at: Instant,
}

/// Table of in-flight pings.
///
/// Entries leave the table exactly once: either settled by a matching
/// response or expired by the periodic audit.
#[derive(Debug, Default)]
pub struct ProbeTracker {
    pending: HashMap<u32, PendingProbe>,
}

impl ProbeTracker {
    /// Record a freshly sent ping.
    pub fn record(&mut self, txn_id: u32, peer: NodeId, text: String) {
        self.pending.insert(
            txn_id,
            PendingProbe {
                peer,
                text,
                sent_at: Instant::now(),
            },
        );
    }

    /// Settle the probe matching a response, if it is still pending.
    pub fn settle(&mut self, txn_id: u32) -> Option<PendingProbe> {
        self.pending.remove(&txn_id)
    }

    /// Remove and return every probe older than `timeout` as of `now`.
    pub fn expire(&mut self, now: Instant, timeout: Duration) -> Vec<(u32, PendingProbe)> {
        let expired: Vec<u32> = self
            .pending
            .iter()
            .filter(|(_, probe)| probe.sent_at + timeout <= now)
            .map(|(txn_id, _)| *txn_id)
            .collect();
        expired
            .into_iter()
            .filter_map(|txn_id| self.pending.remove(&txn_id).map(|p| (txn_id, p)))
            .collect()
    }

    /// Drop every pending probe (node shutdown or leave).
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of in-flight pings.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
