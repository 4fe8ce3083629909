//! Merge-on-receive for reputation advertisements.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::drop_factor::{DropFactor, DropFactorAdapter};
use crate::store::ReputationStore;

/// What a merge changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Entries averaged into an existing reputation.
    pub averaged: usize,
    /// Entries for neighbors not known before.
    pub inserted: usize,
    /// Entries skipped because they describe the sender.
    pub skipped: usize,
    /// Whether the sender rated the local node below its own view.
    pub disputed: bool,
}

/// Folds a neighbor's advertised reputations into the local store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReputationMerger;

impl ReputationMerger {
    /// Merge `received`, advertised by `from`, into `store`.
    ///
    /// Entries about `from` itself are ignored. Known neighbors end up with the
    /// integer mean of the advertised and local reputation; unknown neighbors
    /// are inserted with the advertised value and a zero loss estimate. When the
    /// sender rates `local` lower than `local` rates itself, the drop factor is
    /// lowered one step.
    pub fn merge(
        received: &BTreeMap<Ipv4Addr, u32>,
        from: Ipv4Addr,
        local: Ipv4Addr,
        store: &mut ReputationStore,
        drop_factor: &mut DropFactor,
        adapter: &DropFactorAdapter,
    ) -> MergeReport {
        let mut report = MergeReport::default();

        for (&node, &advertised) in received {
            if node == from {
                report.skipped += 1;
                continue;
            }
            let value = store.config().clamp(advertised);

            if node == local {
                let own = store.reputation(local);
                if value < own {
                    warn!(
                        from = %from,
                        advertised = value,
                        own,
                        "Neighbor disputes our reputation"
                    );
                    adapter.change_to_good(drop_factor);
                    report.disputed = true;
                }
            }

            match store.peek(&node) {
                Some(existing) => {
                    let merged = (value + existing.reputation) / 2;
                    store.update(node, merged, existing.loss_estimate, true);
                    report.averaged += 1;
                }
                None => {
                    store.update(node, value, 0.0, true);
                    report.inserted += 1;
                }
            }
        }

        debug!(
            from = %from,
            averaged = report.averaged,
            inserted = report.inserted,
            "Advertisement merged"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
    const SENDER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 2);
    const OTHER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 3);

    fn merge(
        received: &[(Ipv4Addr, u32)],
        store: &mut ReputationStore,
        drop_factor: &mut DropFactor,
    ) -> MergeReport {
        let received: BTreeMap<_, _> = received.iter().copied().collect();
        ReputationMerger::merge(
            &received,
            SENDER,
            LOCAL,
            store,
            drop_factor,
            &DropFactorAdapter::default(),
        )
    }

    #[test]
    fn test_known_neighbor_is_averaged() {
        let mut store = ReputationStore::new();
        store.update(OTHER, 9, 0.3, true);
        let mut drop_factor = DropFactor::ZERO;

        let report = merge(&[(OTHER, 4)], &mut store, &mut drop_factor);

        assert_eq!(report.averaged, 1);
        let entry = store.peek(&OTHER).unwrap();
        assert_eq!(entry.reputation, 6);
        assert!((entry.loss_estimate - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn test_unknown_neighbor_is_inserted() {
        let mut store = ReputationStore::new();
        let mut drop_factor = DropFactor::ZERO;

        let report = merge(&[(OTHER, 3)], &mut store, &mut drop_factor);

        assert_eq!(report.inserted, 1);
        let entry = store.peek(&OTHER).unwrap();
        assert_eq!(entry.reputation, 3);
        assert!(entry.loss_estimate.abs() < f32::EPSILON);
    }

    #[test]
    fn test_sender_entry_is_ignored() {
        let mut store = ReputationStore::new();
        let mut drop_factor = DropFactor::ZERO;

        let report = merge(&[(SENDER, 0)], &mut store, &mut drop_factor);

        assert_eq!(report.skipped, 1);
        assert!(store.peek(&SENDER).is_none());
    }

    #[test]
    fn test_dispute_lowers_drop_factor() {
        let mut store = ReputationStore::new();
        store.update(LOCAL, 10, 0.1, true);
        let mut drop_factor = DropFactor::new(0.5);

        let report = merge(&[(LOCAL, 6)], &mut store, &mut drop_factor);

        assert!(report.disputed);
        assert!((drop_factor.value() - 0.45).abs() < 1e-6);
        // The self entry is merged like any other.
        assert_eq!(store.reputation(LOCAL), 8);
    }

    #[test]
    fn test_agreement_leaves_drop_factor() {
        let mut store = ReputationStore::new();
        store.update(LOCAL, 7, 0.1, true);
        let mut drop_factor = DropFactor::new(0.5);

        let report = merge(&[(LOCAL, 9)], &mut store, &mut drop_factor);

        assert!(!report.disputed);
        assert!((drop_factor.value() - 0.5).abs() < f32::EPSILON);
        assert_eq!(store.reputation(LOCAL), 8);
    }

    #[test]
    fn test_equal_self_rating_is_not_a_dispute() {
        let mut store = ReputationStore::new();
        store.update(LOCAL, 7, 0.1, true);
        let mut drop_factor = DropFactor::new(0.5);

        let report = merge(&[(LOCAL, 7)], &mut store, &mut drop_factor);

        assert!(!report.disputed);
        assert!((drop_factor.value() - 0.5).abs() < f32::EPSILON);
        assert_eq!(store.reputation(LOCAL), 7);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let mut store = ReputationStore::new();
        store.update(OTHER, 10, 0.1, true);
        let mut drop_factor = DropFactor::ZERO;

        merge(&[(OTHER, u32::MAX)], &mut store, &mut drop_factor);
        assert_eq!(store.reputation(OTHER), 10);
    }
}
