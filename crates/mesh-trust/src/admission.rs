//! Trust-independent local admission filter.
//!
//! Each neighbor gets a counter that walks through a window of
//! `transmission_size` packets. The first `transmission_size - drops` slots of
//! every window are forwarded and the rest are dropped, where `drops` is the
//! drop factor's share of the window. This approximates a lossy link no matter
//! what the trust decision for the flow was.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::drop_factor::DropFactor;

/// Per-neighbor packet admission counters.
#[derive(Debug, Clone, Default)]
pub struct AdmissionController {
    /// Position in the current window, by neighbor.
    counters: HashMap<Ipv4Addr, u32>,
}

impl AdmissionController {
    /// Create an empty controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether the next packet through `node` is forwarded, and advance
    /// the neighbor's window position.
    ///
    /// A neighbor seen for the first time is always forwarded.
    pub fn check_and_advance(
        &mut self,
        node: Ipv4Addr,
        transmission_size: u32,
        drop_factor: DropFactor,
    ) -> bool {
        let Some(counter) = self.counters.get_mut(&node) else {
            self.counters.insert(node, 1);
            return true;
        };

        let position = *counter;
        let drops = drop_factor.drops_per_window(transmission_size);
        let forward = position.saturating_add(drops) < transmission_size;

        let next = position.saturating_add(1);
        *counter = if next >= transmission_size { 0 } else { next };

        debug!(
            node = %node,
            position,
            drops,
            forward,
            "Admission check"
        );
        forward
    }

    /// Current window position for a neighbor.
    #[must_use]
    pub fn position(&self, node: &Ipv4Addr) -> Option<u32> {
        self.counters.get(node).copied()
    }

    /// Forget a neighbor. No-op if absent.
    pub fn delete(&mut self, node: &Ipv4Addr) {
        self.counters.remove(node);
    }

    /// Number of tracked neighbors.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.counters.len()
    }
}
