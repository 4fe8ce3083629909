//! Trust controller configuration.

use serde::{Deserialize, Serialize};

use crate::error::{TrustError, TrustResult};

/// Reputation scale and decision thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReputationConfig {
    /// Lowest reputation a neighbor can have.
    pub min: u32,
    /// Highest reputation a neighbor can have.
    pub max: u32,
    /// Reputation assigned to a neighbor on first contact.
    pub initial: u32,
    /// Below this, any party in a flow makes the node drop everything.
    pub low: u32,
    /// Above this, for every party in a flow, the node forwards everything.
    pub high: u32,
    /// Loss estimate assigned to a neighbor on first contact.
    pub initial_loss_estimate: f32,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            min: 0,
            max: 10,
            initial: 10,
            low: 4,
            high: 8,
            initial_loss_estimate: 0.1,
        }
    }
}

impl ReputationConfig {
    /// Clamp a reputation value into `[min, max]`.
    #[must_use]
    pub fn clamp(&self, reputation: u32) -> u32 {
        reputation.clamp(self.min, self.max)
    }
}

/// Main trust controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustConfig {
    /// Packets per transmission window.
    pub transmission_size: u32,
    /// Transmissions per batch; reputations are reconsidered once per batch.
    pub batch_size: u32,
    /// Reputation scale settings.
    pub reputation: ReputationConfig,
    /// Maximum outstanding (unacknowledged) packet ids per neighbor.
    pub ledger_capacity: usize,
    /// Number of gate samples a node keeps over its lifetime.
    pub gate_history_len: usize,
    /// Probability of following the social norm for the next batch.
    /// Drawn uniformly at node creation when `None`.
    pub delta: Option<f64>,
    /// Local drop factor. Drawn at node creation when `None`.
    pub drop_factor: Option<f32>,
    /// Chance that a drawn drop factor is forced to zero.
    pub zero_drop_probability: f64,
    /// Amount removed from the drop factor when a peer disputes our reputation.
    pub drop_factor_step: f32,
    /// Seed for the node's random source. Entropy-seeded when `None`.
    pub rng_seed: Option<u64>,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self {
            transmission_size: 5,
            batch_size: 2,
            reputation: ReputationConfig::default(),
            ledger_capacity: 100,
            gate_history_len: 100,
            delta: None,
            drop_factor: None,
            zero_drop_probability: 0.1,
            drop_factor_step: 0.05,
            rng_seed: None,
        }
    }
}

impl TrustConfig {
    /// Create a new builder for trust configuration.
    #[must_use]
    pub fn builder() -> TrustConfigBuilder {
        TrustConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration document.
    ///
    /// Missing fields are not filled in; the document must be complete.
    pub fn from_json(json: &str) -> TrustResult<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TrustError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Packets per batch window (`transmission_size × batch_size`).
    #[must_use]
    pub const fn batch_window(&self) -> u32 {
        self.transmission_size.saturating_mul(self.batch_size)
    }

    /// Check the configuration for values the controller cannot work with.
    pub fn validate(&self) -> TrustResult<()> {
        if self.transmission_size == 0 {
            return Err(TrustError::InvalidConfig(
                "transmission_size must be positive".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(TrustError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.ledger_capacity == 0 {
            return Err(TrustError::InvalidConfig(
                "ledger_capacity must be positive".into(),
            ));
        }
        if self.gate_history_len < 2 {
            return Err(TrustError::InvalidConfig(
                "gate_history_len must be at least 2".into(),
            ));
        }

        let rep = &self.reputation;
        if !(rep.min <= rep.low && rep.low <= rep.high && rep.high <= rep.max) {
            return Err(TrustError::InvalidConfig(format!(
                "reputation thresholds out of order: min={} low={} high={} max={}",
                rep.min, rep.low, rep.high, rep.max
            )));
        }
        if rep.initial < rep.min || rep.initial > rep.max {
            return Err(TrustError::InvalidConfig(format!(
                "initial reputation {} outside [{}, {}]",
                rep.initial, rep.min, rep.max
            )));
        }
        if !(0.0..=1.0).contains(&rep.initial_loss_estimate) {
            return Err(TrustError::InvalidConfig(
                "initial_loss_estimate must be within [0, 1]".into(),
            ));
        }

        if let Some(delta) = self.delta {
            if !(0.0..=1.0).contains(&delta) {
                return Err(TrustError::InvalidConfig("delta must be within [0, 1]".into()));
            }
        }
        if let Some(drop_factor) = self.drop_factor {
            if !(0.0..=1.0).contains(&drop_factor) {
                return Err(TrustError::InvalidConfig(
                    "drop_factor must be within [0, 1]".into(),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.zero_drop_probability) {
            return Err(TrustError::InvalidConfig(
                "zero_drop_probability must be within [0, 1]".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.drop_factor_step) {
            return Err(TrustError::InvalidConfig(
                "drop_factor_step must be within [0, 1]".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for `TrustConfig`.
#[derive(Debug, Clone, Default)]
pub struct TrustConfigBuilder {
    config: TrustConfig,
}

impl TrustConfigBuilder {
    /// Set the transmission size.
    #[must_use]
    pub const fn transmission_size(mut self, size: u32) -> Self {
        self.config.transmission_size = size;
        self
    }

    /// Set the batch size.
    #[must_use]
    pub const fn batch_size(mut self, size: u32) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set reputation configuration.
    #[must_use]
    pub const fn reputation(mut self, config: ReputationConfig) -> Self {
        self.config.reputation = config;
        self
    }

    /// Set the outstanding packet capacity per neighbor.
    #[must_use]
    pub const fn ledger_capacity(mut self, capacity: usize) -> Self {
        self.config.ledger_capacity = capacity;
        self
    }

    /// Set the gate history length.
    #[must_use]
    pub const fn gate_history_len(mut self, len: usize) -> Self {
        self.config.gate_history_len = len;
        self
    }

    /// Fix delta instead of drawing it.
    #[must_use]
    pub const fn delta(mut self, delta: f64) -> Self {
        self.config.delta = Some(delta);
        self
    }

    /// Fix the drop factor instead of drawing it.
    #[must_use]
    pub const fn drop_factor(mut self, drop_factor: f32) -> Self {
        self.config.drop_factor = Some(drop_factor);
        self
    }

    /// Set the chance that a drawn drop factor is zero.
    #[must_use]
    pub const fn zero_drop_probability(mut self, probability: f64) -> Self {
        self.config.zero_drop_probability = probability;
        self
    }

    /// Set the drop factor correction step.
    #[must_use]
    pub const fn drop_factor_step(mut self, step: f32) -> Self {
        self.config.drop_factor_step = step;
        self
    }

    /// Seed the node's random source.
    #[must_use]
    pub const fn rng_seed(mut self, seed: u64) -> Self {
        self.config.rng_seed = Some(seed);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> TrustConfig {
        self.config
    }
}
