//! Social-norm forwarding decisions.

use std::net::Ipv4Addr;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReputationConfig;
use crate::lifecycle::{Gate, GateHistory};
use crate::store::ReputationStore;

/// Forwarding posture for a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepAction {
    /// Forward everything.
    Good,
    /// Forward partially; the admission filter decides per packet.
    Bad,
    /// Drop everything.
    Evil,
}

impl RepAction {
    /// Check if this action forwards every packet.
    #[must_use]
    pub const fn forwards_all(&self) -> bool {
        matches!(self, Self::Good)
    }

    /// Check if this action drops every packet.
    #[must_use]
    pub const fn drops_all(&self) -> bool {
        matches!(self, Self::Evil)
    }
}

/// Decides how the local node treats relayed traffic.
///
/// Self-originated traffic is always forwarded. For relayed traffic a gate
/// sample is drawn first; a defecting gate drops everything, otherwise the
/// reputations of source, destination and the local node pick the action.
#[derive(Debug, Clone)]
pub struct TrustDecisionEngine {
    /// Thresholds for the reputation ladder.
    thresholds: ReputationConfig,
    /// Probability of following the social norm.
    delta: f64,
    /// Gate samples drawn so far.
    history: GateHistory,
}

impl TrustDecisionEngine {
    /// Create an engine with the given thresholds, delta and history.
    #[must_use]
    pub const fn new(thresholds: ReputationConfig, delta: f64, history: GateHistory) -> Self {
        Self {
            thresholds,
            delta,
            history,
        }
    }

    /// Decide the action for a packet from `src` to `dst` relayed by `local`.
    pub fn decide(
        &mut self,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        local: Ipv4Addr,
        store: &mut ReputationStore,
        rng: &mut dyn RngCore,
    ) -> RepAction {
        if src == local {
            return RepAction::Good;
        }

        if self.history.sample(self.delta, rng) == Gate::Defect {
            debug!(src = %src, dst = %dst, "Gate defected, dropping flow");
            return RepAction::Evil;
        }

        let src_rep = store.reputation(src);
        let dst_rep = store.reputation(dst);
        let local_rep = store.reputation(local);
        let action = self.ladder(src_rep, dst_rep, local_rep);

        debug!(
            src = %src,
            dst = %dst,
            src_rep,
            dst_rep,
            local_rep,
            action = ?action,
            "Flow decision"
        );
        action
    }

    /// Map three reputations onto an action.
    #[must_use]
    pub fn ladder(&self, src_rep: u32, dst_rep: u32, local_rep: u32) -> RepAction {
        let reps = [src_rep, dst_rep, local_rep];
        if reps.iter().all(|rep| *rep > self.thresholds.high) {
            RepAction::Good
        } else if reps.iter().any(|rep| *rep < self.thresholds.low) {
            RepAction::Evil
        } else {
            RepAction::Bad
        }
    }

    /// Probability of following the social norm.
    #[must_use]
    pub const fn delta(&self) -> f64 {
        self.delta
    }

    /// Gate samples drawn so far.
    #[must_use]
    pub const fn history(&self) -> &GateHistory {
        &self.history
    }

    /// Replace delta and clear the gate history.
    pub fn reset(&mut self, delta: f64) {
        self.delta = delta;
        self.history.clear();
    }
}
