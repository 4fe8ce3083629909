//! Per-node trust controller combining every component.

use std::net::Ipv4Addr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::admission::AdmissionController;
use crate::codec::Advertisement;
use crate::config::TrustConfig;
use crate::counters::{NodeCounters, NodeReport};
use crate::decision::{RepAction, TrustDecisionEngine};
use crate::drop_factor::{DropFactor, DropFactorAdapter};
use crate::error::TrustResult;
use crate::ledger::{BatchUpdate, RecordOutcome, TransmissionLedger};
use crate::lifecycle::{GateHistory, LifecycleMonitor};
use crate::merge::{MergeReport, ReputationMerger};
use crate::store::ReputationStore;

/// Why a packet was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The trust decision for the flow was EVIL.
    Untrusted,
    /// The admission filter dropped the packet.
    Throttled,
    /// The packet id is already outstanding for the next hop.
    Duplicate,
    /// Too many packets are outstanding for the next hop.
    Congested,
}

/// Result of running a packet through the forwarding pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardVerdict {
    /// Hand the packet to the next hop.
    Forward {
        /// Action chosen for the flow.
        action: RepAction,
        /// Batch update triggered by recording the packet.
        batch: Option<BatchUpdate>,
    },
    /// Drop the packet.
    Drop(DropReason),
}

impl ForwardVerdict {
    /// Check if the packet is forwarded.
    #[must_use]
    pub const fn is_forwarded(&self) -> bool {
        matches!(self, Self::Forward { .. })
    }
}

/// Trust and adaptive-forwarding state owned by one node.
///
/// The routing layer drives it: [`forward`](Self::forward) for every data
/// packet, [`acknowledge`](Self::acknowledge) when a next hop confirms
/// delivery, and [`advertisement`](Self::advertisement) /
/// [`receive_advertisement`](Self::receive_advertisement) for gossip.
#[derive(Debug)]
pub struct TrustNode {
    /// This node's address.
    address: Ipv4Addr,
    /// Configuration.
    config: TrustConfig,
    /// Reputation of every known node, self included.
    store: ReputationStore,
    /// Outstanding packets per next hop.
    ledger: TransmissionLedger,
    /// Local admission filter.
    admission: AdmissionController,
    /// Forwarding decisions and gate history.
    engine: TrustDecisionEngine,
    /// Node-wide drop factor.
    drop_factor: DropFactor,
    /// Drop factor correction.
    adapter: DropFactorAdapter,
    /// Traffic counters.
    counters: NodeCounters,
    /// Random source for gate samples and node parameters.
    rng: StdRng,
}

impl TrustNode {
    /// Create a node with the given address and configuration.
    pub fn new(address: Ipv4Addr, config: TrustConfig) -> TrustResult<Self> {
        config.validate()?;

        let rng = config
            .rng_seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        let engine = TrustDecisionEngine::new(
            config.reputation,
            0.0,
            GateHistory::with_capacity(config.gate_history_len),
        );

        let mut node = Self {
            address,
            store: ReputationStore::from_config(&config.reputation),
            ledger: TransmissionLedger::with_capacity(config.ledger_capacity),
            admission: AdmissionController::new(),
            engine,
            drop_factor: DropFactor::ZERO,
            adapter: DropFactorAdapter::new(config.drop_factor_step),
            counters: NodeCounters::default(),
            rng,
            config,
        };
        node.reset_stats();
        Ok(node)
    }

    /// Reinitialize per-lifetime state.
    ///
    /// Seeds the node's own reputation entry at the default value, draws a
    /// fresh delta and drop factor (unless fixed by configuration), clears the
    /// gate history and zeroes the counters. Neighbor tables are kept.
    pub fn reset_stats(&mut self) {
        self.store.delete(&self.address);
        self.store.get(self.address);

        let delta = match self.config.delta {
            Some(delta) => delta,
            None => self.rng.gen_range(0.0..=1.0),
        };
        self.drop_factor = match self.config.drop_factor {
            Some(value) => DropFactor::new(value),
            None => DropFactor::random(&mut self.rng, self.config.zero_drop_probability),
        };
        self.engine.reset(delta);
        self.counters = NodeCounters::default();

        info!(
            node = %self.address,
            delta,
            drop_factor = self.drop_factor.value(),
            "Node stats reset"
        );
    }

    // ==================== Routing Layer Operations ====================

    /// Decide the action for relayed traffic from `src` to `dst`.
    pub fn decide(&mut self, src: Ipv4Addr, dst: Ipv4Addr) -> RepAction {
        self.engine
            .decide(src, dst, self.address, &mut self.store, &mut self.rng)
    }

    /// Run the admission filter for the next packet through `neighbor`.
    pub fn check_and_advance(&mut self, neighbor: Ipv4Addr) -> bool {
        self.admission.check_and_advance(
            neighbor,
            self.config.transmission_size,
            self.drop_factor,
        )
    }

    /// Record a packet forwarded through `neighbor`.
    pub fn record(&mut self, neighbor: Ipv4Addr, pkt_id: u64) -> RecordOutcome {
        self.ledger.record(
            neighbor,
            pkt_id,
            self.config.transmission_size,
            self.config.batch_size,
            &mut self.store,
        )
    }

    /// Mark a packet forwarded through `neighbor` as delivered.
    pub fn acknowledge(&mut self, neighbor: Ipv4Addr, pkt_id: u64) -> bool {
        self.ledger.acknowledge(&neighbor, pkt_id)
    }

    /// Full per-packet pipeline for a packet from `src` to `dst` via `next_hop`.
    pub fn forward(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        next_hop: Ipv4Addr,
        pkt_id: u64,
    ) -> ForwardVerdict {
        if src == self.address {
            self.counters.inc_generated();
        } else {
            self.counters.inc_received();
        }

        let action = self.decide(src, dst);
        let verdict = match action {
            RepAction::Evil => ForwardVerdict::Drop(DropReason::Untrusted),
            RepAction::Bad if !self.check_and_advance(next_hop) => {
                ForwardVerdict::Drop(DropReason::Throttled)
            }
            RepAction::Good | RepAction::Bad => match self.record(next_hop, pkt_id) {
                RecordOutcome::Accepted { batch } => ForwardVerdict::Forward { action, batch },
                RecordOutcome::Duplicate => ForwardVerdict::Drop(DropReason::Duplicate),
                RecordOutcome::Congested => ForwardVerdict::Drop(DropReason::Congested),
            },
        };

        if verdict.is_forwarded() {
            self.counters.inc_sent();
        } else {
            self.counters.inc_dropped();
        }
        debug!(
            node = %self.address,
            src = %src,
            dst = %dst,
            next_hop = %next_hop,
            pkt_id,
            verdict = ?verdict,
            "Packet processed"
        );
        verdict
    }

    // ==================== Gossip ====================

    /// Encode the reputation table for broadcast.
    pub fn advertisement(&mut self) -> Vec<u8> {
        let payload = Advertisement::from_snapshot(&self.store.snapshot()).encode();
        self.counters.inc_broadcast_sent();
        payload
    }

    /// Decode and merge an advertisement received from `from`.
    ///
    /// A malformed advertisement is discarded as a whole and leaves the
    /// reputation table untouched.
    pub fn receive_advertisement(
        &mut self,
        from: Ipv4Addr,
        payload: &[u8],
    ) -> TrustResult<MergeReport> {
        self.counters.inc_broadcast_received();

        let advertisement = Advertisement::decode(payload).inspect_err(|e| {
            warn!(from = %from, error = %e, "Discarding malformed advertisement");
        })?;

        Ok(ReputationMerger::merge(
            &advertisement.to_map(),
            from,
            self.address,
            &mut self.store,
            &mut self.drop_factor,
            &self.adapter,
        ))
    }

    // ==================== Lifecycle ====================

    /// Whether the gate history says this node should leave the network.
    #[must_use]
    pub fn should_depart(&self) -> bool {
        LifecycleMonitor::should_depart(self.engine.history())
    }

    /// Drop every per-neighbor table entry for a departed neighbor.
    pub fn forget_neighbor(&mut self, neighbor: Ipv4Addr) {
        self.store.delete(&neighbor);
        self.ledger.delete(&neighbor);
        self.admission.delete(&neighbor);
        info!(node = %self.address, neighbor = %neighbor, "Neighbor forgotten");
    }

    // ==================== Accessors ====================

    /// This node's address.
    #[must_use]
    pub const fn address(&self) -> Ipv4Addr {
        self.address
    }

    /// Configuration.
    #[must_use]
    pub const fn config(&self) -> &TrustConfig {
        &self.config
    }

    /// Reputation table.
    #[must_use]
    pub const fn store(&self) -> &ReputationStore {
        &self.store
    }

    /// Forwarding ledger.
    #[must_use]
    pub const fn ledger(&self) -> &TransmissionLedger {
        &self.ledger
    }

    /// Admission filter.
    #[must_use]
    pub const fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Decision engine.
    #[must_use]
    pub const fn engine(&self) -> &TrustDecisionEngine {
        &self.engine
    }

    /// Current drop factor.
    #[must_use]
    pub const fn drop_factor(&self) -> DropFactor {
        self.drop_factor
    }

    /// Traffic counters.
    #[must_use]
    pub const fn counters(&self) -> &NodeCounters {
        &self.counters
    }

    /// Snapshot for telemetry.
    #[must_use]
    pub fn report(&self) -> NodeReport {
        NodeReport {
            address: self.address,
            delta: self.engine.delta(),
            drop_factor: self.drop_factor.value(),
            gate_samples: self.engine.history().len(),
            counters: self.counters,
            reputations: self.store.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RepRecord;
    use crate::error::TrustError;
    use crate::ledger::BatchVerdict;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const SRC: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const DST: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);
    const HOP: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 4);

    fn node_with(delta: f64, drop_factor: f32) -> TrustNode {
        let config = TrustConfig::builder()
            .delta(delta)
            .drop_factor(drop_factor)
            .rng_seed(11)
            .build();
        TrustNode::new(LOCAL, config).unwrap()
    }

    fn advertise(entries: &[(Ipv4Addr, u32)]) -> Vec<u8> {
        entries
            .iter()
            .map(|(node, reputation)| RepRecord::new(*node, *reputation))
            .collect::<Advertisement>()
            .encode()
    }

    // ==================== Creation Tests ====================

    #[test]
    fn test_new_seeds_self_entry() {
        let node = node_with(1.0, 0.0);

        assert_eq!(node.store().len(), 1);
        assert_eq!(node.store().peek(&LOCAL).unwrap().reputation, 10);
        assert!(node.engine().history().is_empty());
        assert_eq!(*node.counters(), NodeCounters::default());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = TrustConfig::builder().batch_size(0).build();
        assert!(matches!(
            TrustNode::new(LOCAL, config),
            Err(TrustError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_drawn_parameters_are_in_range() {
        for seed in 0..20 {
            let config = TrustConfig::builder().rng_seed(seed).build();
            let node = TrustNode::new(LOCAL, config).unwrap();
            assert!((0.0..=1.0).contains(&node.engine().delta()));
            assert!((0.0..=1.0).contains(&node.drop_factor().value()));
        }
    }

    #[test]
    fn test_seeded_nodes_are_reproducible() {
        let config = TrustConfig::builder().rng_seed(99).build();
        let a = TrustNode::new(LOCAL, config.clone()).unwrap();
        let b = TrustNode::new(LOCAL, config).unwrap();

        assert!((a.engine().delta() - b.engine().delta()).abs() < f64::EPSILON);
        assert_eq!(a.drop_factor(), b.drop_factor());
    }

    #[test]
    fn test_reset_restores_self_reputation() {
        let mut node = node_with(1.0, 0.0);
        node.receive_advertisement(SRC, &advertise(&[(LOCAL, 0)]))
            .unwrap();
        assert_eq!(node.store().peek(&LOCAL).unwrap().reputation, 5);

        node.reset_stats();
        assert_eq!(node.store().peek(&LOCAL).unwrap().reputation, 10);
        assert_eq!(node.counters().reputation_broadcasts_received, 0);
    }

    // ==================== Forwarding Tests ====================

    #[test]
    fn test_self_originated_traffic_is_forwarded() {
        let mut node = node_with(0.0, 1.0);

        let verdict = node.forward(LOCAL, DST, HOP, 1);

        assert!(verdict.is_forwarded());
        assert_eq!(node.counters().packets_generated, 1);
        assert_eq!(node.counters().packets_sent, 1);
        assert_eq!(node.ledger().get(&HOP).unwrap().outstanding_count(), 1);
    }

    #[test]
    fn test_defecting_node_drops_relayed_traffic() {
        let mut node = node_with(0.0, 0.0);

        let verdict = node.forward(SRC, DST, HOP, 1);

        assert_eq!(verdict, ForwardVerdict::Drop(DropReason::Untrusted));
        assert_eq!(node.counters().packets_received, 1);
        assert_eq!(node.counters().packets_dropped, 1);
        assert!(node.ledger().get(&HOP).is_none());
    }

    #[test]
    fn test_bad_flow_goes_through_admission() {
        let mut node = node_with(1.0, 1.0);
        // Middling source reputation puts the flow on the BAD rung.
        node.receive_advertisement(HOP, &advertise(&[(SRC, 2)]))
            .unwrap();
        assert_eq!(node.store().peek(&SRC).unwrap().reputation, 2);
        node.receive_advertisement(HOP, &advertise(&[(SRC, 10)]))
            .unwrap();
        assert_eq!(node.store().peek(&SRC).unwrap().reputation, 6);

        // First sighting of the next hop is admitted, the rest are throttled.
        let first = node.forward(SRC, DST, HOP, 1);
        assert_eq!(
            first,
            ForwardVerdict::Forward {
                action: RepAction::Bad,
                batch: None
            }
        );
        assert_eq!(
            node.forward(SRC, DST, HOP, 2),
            ForwardVerdict::Drop(DropReason::Throttled)
        );
    }

    #[test]
    fn test_duplicate_packet_is_dropped() {
        let mut node = node_with(1.0, 0.0);

        assert!(node.forward(SRC, DST, HOP, 5).is_forwarded());
        assert_eq!(
            node.forward(SRC, DST, HOP, 5),
            ForwardVerdict::Drop(DropReason::Duplicate)
        );
        assert_eq!(node.counters().packets_sent, 1);
        assert_eq!(node.counters().packets_dropped, 1);
    }

    #[test]
    fn test_unacknowledged_next_hop_loses_reputation() {
        let mut node = node_with(1.0, 0.0);

        let mut last = None;
        for id in 1..=10 {
            last = Some(node.forward(LOCAL, DST, HOP, id));
        }

        let Some(ForwardVerdict::Forward {
            batch: Some(update), ..
        }) = last
        else {
            unreachable!("tenth packet closes the batch");
        };
        assert_eq!(update.verdict, BatchVerdict::Failed);
        assert_eq!(node.store().peek(&HOP).unwrap().reputation, 8);
    }

    #[test]
    fn test_packet_in_flight_at_batch_close_costs_one() {
        let mut node = node_with(1.0, 0.0);

        // Packet 10 closes the batch before it can be acknowledged.
        for id in 1..=10 {
            node.forward(LOCAL, DST, HOP, id);
            node.acknowledge(HOP, id);
        }
        assert_eq!(node.store().peek(&HOP).unwrap().reputation, 9);
        assert_eq!(node.ledger().get(&HOP).unwrap().batch_count(), 1);
        assert_eq!(node.ledger().get(&HOP).unwrap().outstanding_count(), 0);
    }

    // ==================== Gossip Tests ====================

    #[test]
    fn test_advertisement_contains_table() {
        let mut node = node_with(1.0, 0.0);
        node.decide(SRC, DST);

        let payload = node.advertisement();
        let decoded = Advertisement::decode(&payload).unwrap().to_map();

        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.get(&LOCAL), Some(&10));
        assert_eq!(node.counters().reputation_broadcasts_sent, 1);
    }

    #[test]
    fn test_malformed_advertisement_is_discarded() {
        let mut node = node_with(1.0, 0.0);

        let err = node.receive_advertisement(SRC, &[10, 0, 0, 9, 0]).unwrap_err();

        assert!(matches!(err, TrustError::LengthMismatch { .. }));
        assert_eq!(node.store().len(), 1);
        assert_eq!(node.counters().reputation_broadcasts_received, 1);
    }

    #[test]
    fn test_dispute_lowers_drop_factor() {
        let mut node = node_with(1.0, 0.5);
        let report = node
            .receive_advertisement(SRC, &advertise(&[(LOCAL, 3)]))
            .unwrap();

        assert!(report.disputed);
        assert!((node.drop_factor().value() - 0.45).abs() < 1e-6);
    }

    // ==================== Lifecycle Tests ====================

    #[test]
    fn test_forget_neighbor_clears_tables() {
        let mut node = node_with(0.4, 0.4);
        node.forward(LOCAL, DST, HOP, 1);
        node.check_and_advance(HOP);

        node.forget_neighbor(HOP);

        assert!(node.store().peek(&HOP).is_none());
        assert!(node.ledger().get(&HOP).is_none());
        assert!(node.admission().position(&HOP).is_none());
    }

    #[test]
    fn test_always_defecting_node_does_not_depart() {
        // A flat trend never triggers departure, even at full defection.
        let mut node = node_with(0.0, 0.0);
        for _ in 0..150 {
            node.decide(SRC, DST);
        }
        assert!(node.engine().history().is_full());
        assert!(!node.should_depart());
    }

    #[test]
    fn test_report_snapshot() {
        let mut node = node_with(1.0, 0.0);
        node.forward(SRC, DST, HOP, 1);

        let report = node.report();
        assert_eq!(report.address, LOCAL);
        assert_eq!(report.gate_samples, 1);
        assert_eq!(report.counters.packets_sent, 1);
        assert!(report.reputations.contains_key(&SRC));
    }
}
