//! Outstanding-packet tracking and batch-triggered reputation updates.
//!
//! Every packet forwarded through a neighbor is recorded here until the
//! neighbor's delivery is acknowledged. Once `transmission_size × batch_size`
//! packets have been sent, the number still outstanding decides whether the
//! neighbor's reputation goes up, stays, or goes down.

use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::store::ReputationStore;

/// Default number of outstanding packet ids kept per neighbor.
pub const DEFAULT_LEDGER_CAPACITY: usize = 100;

/// Forwarding record for one neighbor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransmissionRecord {
    /// Unacknowledged packet ids, oldest first.
    outstanding: VecDeque<u64>,
    /// Packets sent since the last batch boundary.
    sent_count: u32,
    /// Batches completed so far.
    batch_count: u32,
}

impl TransmissionRecord {
    /// Unacknowledged packet ids, oldest first.
    pub fn outstanding(&self) -> impl Iterator<Item = u64> + '_ {
        self.outstanding.iter().copied()
    }

    /// Number of unacknowledged packets.
    #[must_use]
    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    /// Packets sent since the last batch boundary.
    #[must_use]
    pub const fn sent_count(&self) -> u32 {
        self.sent_count
    }

    /// Batches completed so far.
    #[must_use]
    pub const fn batch_count(&self) -> u32 {
        self.batch_count
    }
}

/// How a neighbor performed over a completed batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchVerdict {
    /// Every packet was acknowledged; reputation goes up by one.
    Delivered,
    /// A single packet is missing and within tolerance; no change.
    Tolerated,
    /// Some loss; reputation goes down by one.
    Degraded,
    /// Loss above the expected level; reputation goes down by two.
    Failed,
}

/// Summary of one batch reputation update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchUpdate {
    /// Batches completed by this update.
    pub batches: u32,
    /// Packets still outstanding when the batch closed.
    pub outstanding: usize,
    /// Loss tolerance for the processed packets.
    pub threshold: u32,
    /// Classification of the batch.
    pub verdict: BatchVerdict,
    /// Reputation before the update.
    pub reputation_before: u32,
    /// Reputation after the update.
    pub reputation_after: u32,
}

/// Result of recording a forwarded packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The packet was recorded. Carries the batch update it triggered, if any.
    Accepted {
        /// Batch update triggered by this packet.
        batch: Option<BatchUpdate>,
    },
    /// The packet id is already outstanding for this neighbor.
    Duplicate,
    /// Too many packets are outstanding for this neighbor.
    Congested,
}

impl RecordOutcome {
    /// Check if the packet was recorded.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Per-neighbor forwarding ledger.
#[derive(Debug, Clone)]
pub struct TransmissionLedger {
    /// Maximum outstanding ids per neighbor.
    capacity: usize,
    /// Records by neighbor.
    records: HashMap<Ipv4Addr, TransmissionRecord>,
}

impl TransmissionLedger {
    /// Create a ledger with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LEDGER_CAPACITY)
    }

    /// Create a ledger holding at most `capacity` outstanding ids per neighbor.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            records: HashMap::new(),
        }
    }

    /// Record a packet forwarded through `node`.
    ///
    /// Duplicate ids and neighbors already at capacity are rejected without
    /// touching the record. An accepted packet may complete a batch, in which
    /// case the neighbor's reputation in `store` is updated.
    pub fn record(
        &mut self,
        node: Ipv4Addr,
        pkt_id: u64,
        transmission_size: u32,
        batch_size: u32,
        store: &mut ReputationStore,
    ) -> RecordOutcome {
        let capacity = self.capacity;
        let record = self.records.entry(node).or_default();

        if record.outstanding.iter().take(capacity).any(|id| *id == pkt_id) {
            debug!(node = %node, pkt_id, "Duplicate packet id rejected");
            return RecordOutcome::Duplicate;
        }
        if record.outstanding.len() >= capacity {
            debug!(
                node = %node,
                pkt_id,
                outstanding = record.outstanding.len(),
                "Ledger full, packet rejected"
            );
            return RecordOutcome::Congested;
        }

        record.outstanding.push_back(pkt_id);
        record.sent_count = record.sent_count.saturating_add(1);

        let batch = self.update_rep_values(node, transmission_size, batch_size, store);
        RecordOutcome::Accepted { batch }
    }

    /// Close any completed batches for `node` and adjust its reputation.
    ///
    /// Does nothing until `transmission_size × batch_size` packets have been
    /// sent since the last boundary.
    pub fn update_rep_values(
        &mut self,
        node: Ipv4Addr,
        transmission_size: u32,
        batch_size: u32,
        store: &mut ReputationStore,
    ) -> Option<BatchUpdate> {
        let window = transmission_size.saturating_mul(batch_size);
        if window == 0 {
            return None;
        }

        let record = self.records.get_mut(&node)?;
        if record.sent_count < window {
            return None;
        }

        let batches = record.sent_count / window;
        let processed = batches.saturating_mul(window);
        let entry = store.get(node);
        let threshold = (processed as f32 * entry.loss_estimate).floor() as u32;
        let outstanding = record.outstanding.len();

        let verdict = match outstanding {
            0 => BatchVerdict::Delivered,
            1 if threshold != 1 => BatchVerdict::Tolerated,
            k if k > threshold as usize => BatchVerdict::Failed,
            _ => BatchVerdict::Degraded,
        };

        let reputation_after = match verdict {
            BatchVerdict::Delivered => entry.reputation.saturating_add(1),
            BatchVerdict::Tolerated => entry.reputation,
            BatchVerdict::Degraded => entry.reputation.saturating_sub(1),
            BatchVerdict::Failed => entry.reputation.saturating_sub(2),
        };
        store.update(node, reputation_after, entry.loss_estimate, true);
        let reputation_after = store.reputation(node);

        record.sent_count -= processed;
        let drained = (processed as usize).min(record.outstanding.len());
        record.outstanding.drain(..drained);
        record.batch_count = record.batch_count.saturating_add(batches);

        info!(
            node = %node,
            batches,
            outstanding,
            threshold,
            verdict = ?verdict,
            from = entry.reputation,
            to = reputation_after,
            "Batch complete"
        );

        Some(BatchUpdate {
            batches,
            outstanding,
            threshold,
            verdict,
            reputation_before: entry.reputation,
            reputation_after,
        })
    }

    /// Mark a packet as delivered. Returns whether it was outstanding.
    pub fn acknowledge(&mut self, node: &Ipv4Addr, pkt_id: u64) -> bool {
        let Some(record) = self.records.get_mut(node) else {
            return false;
        };
        let Some(index) = record.outstanding.iter().position(|id| *id == pkt_id) else {
            return false;
        };
        record.outstanding.remove(index);
        debug!(node = %node, pkt_id, "Packet acknowledged");
        true
    }

    /// Forget a neighbor. No-op if absent.
    pub fn delete(&mut self, node: &Ipv4Addr) {
        self.records.remove(node);
    }

    /// Record for a neighbor, if any.
    #[must_use]
    pub fn get(&self, node: &Ipv4Addr) -> Option<&TransmissionRecord> {
        self.records.get(node)
    }

    /// Maximum outstanding ids per neighbor.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of tracked neighbors.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.records.len()
    }
}

impl Default for TransmissionLedger {
    fn default() -> Self {
        Self::new()
    }
}
