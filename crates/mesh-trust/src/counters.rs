//! Per-node traffic counters and telemetry snapshots.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

/// Running traffic counters for one node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCounters {
    /// Data packets handed to the next hop.
    pub packets_sent: u64,
    /// Data packets received for forwarding or delivery.
    pub packets_received: u64,
    /// Data packets dropped by the trust or admission logic.
    pub packets_dropped: u64,
    /// Data packets originated locally.
    pub packets_generated: u64,
    /// Reputation advertisements broadcast.
    pub reputation_broadcasts_sent: u64,
    /// Reputation advertisements received.
    pub reputation_broadcasts_received: u64,
}

impl NodeCounters {
    /// Count a sent packet.
    pub fn inc_sent(&mut self) {
        self.packets_sent = self.packets_sent.saturating_add(1);
    }

    /// Count a received packet.
    pub fn inc_received(&mut self) {
        self.packets_received = self.packets_received.saturating_add(1);
    }

    /// Count a dropped packet.
    pub fn inc_dropped(&mut self) {
        self.packets_dropped = self.packets_dropped.saturating_add(1);
    }

    /// Count a locally generated packet.
    pub fn inc_generated(&mut self) {
        self.packets_generated = self.packets_generated.saturating_add(1);
    }

    /// Count an advertisement broadcast.
    pub fn inc_broadcast_sent(&mut self) {
        self.reputation_broadcasts_sent = self.reputation_broadcasts_sent.saturating_add(1);
    }

    /// Count a received advertisement.
    pub fn inc_broadcast_received(&mut self) {
        self.reputation_broadcasts_received =
            self.reputation_broadcasts_received.saturating_add(1);
    }

    /// Share of received packets that were dropped, in `[0, 1]`.
    #[must_use]
    pub fn drop_ratio(&self) -> f64 {
        if self.packets_received == 0 {
            return 0.0;
        }
        (self.packets_dropped as f64 / self.packets_received as f64).min(1.0)
    }
}

/// Point-in-time view of a node for telemetry collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReport {
    /// Node address.
    pub address: Ipv4Addr,
    /// Probability of following the social norm.
    pub delta: f64,
    /// Current drop factor.
    pub drop_factor: f32,
    /// Gate samples drawn so far.
    pub gate_samples: usize,
    /// Traffic counters.
    pub counters: NodeCounters,
    /// Reputation of every known neighbor.
    pub reputations: BTreeMap<Ipv4Addr, u32>,
}

impl NodeReport {
    /// Serialize to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
