//! Gate sampling history and departure analysis.
//!
//! Each relayed decision draws a gate sample: whether the node keeps following
//! the social norm or defects. Samples accumulate over the node's lifetime in
//! a bounded, append-only history. A history whose recent half defects more
//! often than its older half, with defection overall in the majority, signals
//! that the node is about to leave the network.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default number of gate samples kept over a node's lifetime.
pub const DEFAULT_GATE_HISTORY_LEN: usize = 100;

/// Outcome of one gate sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gate {
    /// The node has checked out and drops everything (sample value 0).
    Defect,
    /// The node follows the social norm (sample value 1).
    Follow,
}

impl Gate {
    /// Numeric form used in telemetry.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Defect => 0,
            Self::Follow => 1,
        }
    }
}

/// Append-only, bounded history of gate samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateHistory {
    samples: Vec<Gate>,
    capacity: usize,
}

impl GateHistory {
    /// Create an empty history with the default length.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_GATE_HISTORY_LEN)
    }

    /// Create an empty history holding at most `capacity` samples.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Draw the next gate sample.
    ///
    /// While there is room, a fresh Bernoulli(`delta`) sample is appended and
    /// returned. Once the history is full the last recorded sample is returned
    /// and nothing is written.
    pub fn sample<R: Rng + ?Sized>(&mut self, delta: f64, rng: &mut R) -> Gate {
        if self.is_full() {
            return self.samples.last().copied().unwrap_or(Gate::Follow);
        }

        let probability = if delta.is_nan() { 0.0 } else { delta.clamp(0.0, 1.0) };
        let gate = if rng.gen_bool(probability) {
            Gate::Follow
        } else {
            Gate::Defect
        };
        self.samples.push(gate);
        debug!(index = self.samples.len() - 1, gate = ?gate, "Gate sampled");
        gate
    }

    /// Append a known sample. Returns `false` and leaves the history unchanged
    /// when it is already full.
    pub fn push(&mut self, gate: Gate) -> bool {
        if self.is_full() {
            return false;
        }
        self.samples.push(gate);
        true
    }

    /// Recorded samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> &[Gate] {
        &self.samples
    }

    /// Most recent sample.
    #[must_use]
    pub fn last(&self) -> Option<Gate> {
        self.samples.last().copied()
    }

    /// Number of recorded samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether no sample has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Whether the history has reached its capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    /// Maximum number of samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop every sample.
    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for GateHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Defection counts for the two halves of a full history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefectionTrend {
    /// Defections in the older half.
    pub early: usize,
    /// Defections in the recent half.
    pub recent: usize,
}

/// Decides node departure from the gate history trend.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleMonitor;

impl LifecycleMonitor {
    /// Defection counts per half, or `None` while the history is not full.
    #[must_use]
    pub fn trend(history: &GateHistory) -> Option<DefectionTrend> {
        if !history.is_full() {
            return None;
        }
        let (early, recent) = history.samples().split_at(history.capacity() / 2);
        let defections = |half: &[Gate]| half.iter().filter(|g| **g == Gate::Defect).count();
        Some(DefectionTrend {
            early: defections(early),
            recent: defections(recent),
        })
    }

    /// Whether the node should depart: defections are in the majority and
    /// increasing from the older to the recent half.
    #[must_use]
    pub fn should_depart(history: &GateHistory) -> bool {
        let Some(trend) = Self::trend(history) else {
            return false;
        };
        let depart =
            trend.early + trend.recent > history.capacity() / 2 && trend.recent > trend.early;
        if depart {
            info!(
                early = trend.early,
                recent = trend.recent,
                "Defection trend rising, node should depart"
            );
        }
        depart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn history_from(early_defects: usize, recent_defects: usize) -> GateHistory {
        let mut history = GateHistory::new();
        for i in 0..50 {
            history.push(if i < early_defects { Gate::Defect } else { Gate::Follow });
        }
        for i in 0..50 {
            history.push(if i < recent_defects { Gate::Defect } else { Gate::Follow });
        }
        history
    }

    // ==================== Sampling Tests ====================

    #[test]
    fn test_sample_appends_until_full() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut history = GateHistory::with_capacity(10);

        for expected_len in 1..=10 {
            history.sample(0.5, &mut rng);
            assert_eq!(history.len(), expected_len);
        }
        assert!(history.is_full());
    }

    #[test]
    fn test_sample_when_full_returns_last_without_writing() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut history = GateHistory::with_capacity(4);
        for _ in 0..4 {
            history.sample(0.5, &mut rng);
        }
        let before = history.clone();
        let last = history.last().unwrap();

        for _ in 0..20 {
            assert_eq!(history.sample(0.5, &mut rng), last);
        }
        assert_eq!(history, before);
    }

    #[test]
    fn test_sample_respects_certain_delta() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut history = GateHistory::with_capacity(20);
        for _ in 0..10 {
            assert_eq!(history.sample(1.0, &mut rng), Gate::Follow);
        }
        for _ in 0..10 {
            assert_eq!(history.sample(0.0, &mut rng), Gate::Defect);
        }
    }

    #[test]
    fn test_push_rejects_overflow() {
        let mut history = GateHistory::with_capacity(2);
        assert!(history.push(Gate::Follow));
        assert!(history.push(Gate::Defect));
        assert!(!history.push(Gate::Follow));
        assert_eq!(history.samples(), &[Gate::Follow, Gate::Defect]);
    }

    #[test]
    fn test_gate_numeric_form() {
        assert_eq!(Gate::Defect.as_u8(), 0);
        assert_eq!(Gate::Follow.as_u8(), 1);
    }

    // ==================== Departure Tests ====================

    #[test]
    fn test_no_departure_before_full() {
        let mut history = GateHistory::new();
        for _ in 0..99 {
            history.push(Gate::Defect);
        }
        assert!(!LifecycleMonitor::should_depart(&history));
        assert!(LifecycleMonitor::trend(&history).is_none());
    }

    #[test]
    fn test_departure_on_rising_defection() {
        let history = history_from(20, 40);
        assert_eq!(
            LifecycleMonitor::trend(&history),
            Some(DefectionTrend { early: 20, recent: 40 })
        );
        assert!(LifecycleMonitor::should_depart(&history));
    }

    #[test]
    fn test_no_departure_when_defection_is_falling() {
        assert!(!LifecycleMonitor::should_depart(&history_from(40, 20)));
    }

    #[test]
    fn test_no_departure_without_majority() {
        // 50 defections is not more than half.
        assert!(!LifecycleMonitor::should_depart(&history_from(10, 40)));
    }

    #[test]
    fn test_no_departure_when_trend_flat() {
        assert!(!LifecycleMonitor::should_depart(&history_from(30, 30)));
    }

    #[test]
    fn test_clear() {
        let mut history = history_from(0, 0);
        assert!(history.is_full());
        history.clear();
        assert!(history.is_empty());
    }
}
