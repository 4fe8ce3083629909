//! Node-wide drop factor and its self-correction.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Fraction of each transmission window the node drops locally, in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct DropFactor(f32);

impl DropFactor {
    /// A drop factor that never drops.
    pub const ZERO: Self = Self(0.0);

    /// Create a drop factor, clamping into `[0, 1]`.
    #[must_use]
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// Draw a drop factor uniformly from `[0, 1]`, forced to zero with
    /// probability `zero_probability`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R, zero_probability: f64) -> Self {
        let value: f32 = rng.gen_range(0.0..=1.0);
        if rng.gen_bool(zero_probability.clamp(0.0, 1.0)) {
            return Self::ZERO;
        }
        Self::new(value)
    }

    /// Current value.
    #[must_use]
    pub const fn value(self) -> f32 {
        self.0
    }

    /// Packets dropped out of every `transmission_size` window.
    #[must_use]
    pub fn drops_per_window(self, transmission_size: u32) -> u32 {
        (self.0 * transmission_size as f32).floor() as u32
    }
}

impl Default for DropFactor {
    fn default() -> Self {
        Self::ZERO
    }
}

/// Lowers the drop factor when peers report this node's reputation as worse
/// than it believes it to be.
#[derive(Debug, Clone, Copy)]
pub struct DropFactorAdapter {
    step: f32,
}

impl DropFactorAdapter {
    /// Create an adapter moving in steps of `step`.
    #[must_use]
    pub const fn new(step: f32) -> Self {
        Self { step }
    }

    /// Step size.
    #[must_use]
    pub const fn step(&self) -> f32 {
        self.step
    }

    /// Reduce the drop factor by one step, never below zero.
    pub fn change_to_good(&self, drop_factor: &mut DropFactor) {
        let before = drop_factor.value();
        *drop_factor = DropFactor::new((before - self.step).max(0.0));
        info!(
            from = before,
            to = drop_factor.value(),
            "Drop factor lowered after reputation dispute"
        );
    }
}

impl Default for DropFactorAdapter {
    fn default() -> Self {
        Self::new(0.05)
    }
}
