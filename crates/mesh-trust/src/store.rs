//! Per-neighbor reputation and loss-estimate table.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReputationConfig;

/// Reputation state for one neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationEntry {
    /// Current reputation (higher is better).
    pub reputation: u32,
    /// Expected fraction of packets lost on the link, in `[0, 1]`.
    pub loss_estimate: f32,
}

impl ReputationEntry {
    /// Create an entry with the given values.
    #[must_use]
    pub const fn new(reputation: u32, loss_estimate: f32) -> Self {
        Self {
            reputation,
            loss_estimate,
        }
    }
}

/// Reputation table keyed by neighbor address.
///
/// Entries are created on first query and live until explicitly deleted.
#[derive(Debug, Clone)]
pub struct ReputationStore {
    /// Scale and defaults.
    config: ReputationConfig,
    /// Entries by neighbor.
    entries: BTreeMap<Ipv4Addr, ReputationEntry>,
}

impl ReputationStore {
    /// Create an empty store with default reputation settings.
    #[must_use]
    pub fn new() -> Self {
        Self::from_config(&ReputationConfig::default())
    }

    /// Create from configuration.
    #[must_use]
    pub fn from_config(config: &ReputationConfig) -> Self {
        Self {
            config: *config,
            entries: BTreeMap::new(),
        }
    }

    /// The entry a neighbor receives on first contact.
    #[must_use]
    pub const fn default_entry(&self) -> ReputationEntry {
        ReputationEntry::new(self.config.initial, self.config.initial_loss_estimate)
    }

    /// Get the entry for a node, inserting the default entry if absent.
    pub fn get(&mut self, node: Ipv4Addr) -> ReputationEntry {
        let default = self.default_entry();
        *self.entries.entry(node).or_insert(default)
    }

    /// Get the entry for a node without creating one.
    #[must_use]
    pub fn peek(&self, node: &Ipv4Addr) -> Option<ReputationEntry> {
        self.entries.get(node).copied()
    }

    /// Convenience accessor for the reputation value (creates the entry if absent).
    pub fn reputation(&mut self, node: Ipv4Addr) -> u32 {
        self.get(node).reputation
    }

    /// Insert or update the reputation for a node.
    ///
    /// A new entry takes both `reputation` and `loss_estimate`. For an
    /// existing entry the supplied loss estimate is ignored and the stored one
    /// is kept; the new reputation is written only when `overwrite` is set.
    pub fn update(&mut self, node: Ipv4Addr, reputation: u32, loss_estimate: f32, overwrite: bool) {
        let reputation = self.config.clamp(reputation);

        if let Some(existing) = self.entries.get_mut(&node) {
            let candidate = ReputationEntry::new(reputation, existing.loss_estimate);
            if overwrite {
                debug!(
                    node = %node,
                    old = existing.reputation,
                    new = candidate.reputation,
                    "Reputation updated"
                );
                *existing = candidate;
            }
            return;
        }

        let entry = ReputationEntry::new(reputation, loss_estimate.clamp(0.0, 1.0));
        debug!(node = %node, reputation = entry.reputation, "Reputation entry created");
        self.entries.insert(node, entry);
    }

    /// Remove a node's entry. Returns the removed entry, if any.
    pub fn delete(&mut self, node: &Ipv4Addr) -> Option<ReputationEntry> {
        self.entries.remove(node)
    }

    /// Reputation values for every known node, in address order.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<Ipv4Addr, u32> {
        self.entries
            .iter()
            .map(|(node, entry)| (*node, entry.reputation))
            .collect()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&Ipv4Addr, &ReputationEntry)> {
        self.entries.iter()
    }

    /// Number of tracked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reputation scale in use.
    #[must_use]
    pub const fn config(&self) -> &ReputationConfig {
        &self.config
    }
}

impl Default for ReputationStore {
    fn default() -> Self {
        Self::new()
    }
}
