//! Limiter Effect
//!
//! Brickwall safety limiter at the end of the mastering chain. Near-zero
//! attack, configurable release, and a final hard clamp so the output can
//! never exceed the ceiling whatever the upstream automation does.

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum ceiling in dB
const MIN_CEILING_DB: f32 = -12.0;
/// Maximum ceiling in dB
const MAX_CEILING_DB: f32 = 0.0;

/// Minimum release time in ms
const MIN_RELEASE_MS: f32 = 10.0;
/// Maximum release time in ms
const MAX_RELEASE_MS: f32 = 1000.0;

/// Very fast attack time for brickwall limiting (0.1ms)
pub const ATTACK_MS: f32 = 0.1;

// ============================================================================
// Helper Functions
// ============================================================================

/// Calculate envelope coefficient from time constant
#[inline]
fn time_to_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    (-1.0 / (time_ms * sample_rate / 1000.0)).exp()
}

// ============================================================================
// Limiter Effect
// ============================================================================

/// Brickwall limiter effect
///
/// # Parameters
/// - `ceiling_db`: Maximum output level (-12 to 0 dB)
/// - `release_ms`: Release time for gain recovery (10 to 1000 ms)
///
/// # Example
/// ```ignore
/// use ambiente::dsp::Limiter;
///
/// let mut limiter = Limiter::new(-0.3);
/// limiter.set_release_ms(120.0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Limiter {
    params: EffectParams,
    ceiling_db: f32,
    release_ms: f32,
    #[serde(skip)]
    envelope: f32,
    #[serde(skip)]
    sample_rate: f32,
    #[serde(skip)]
    ceiling_linear: f32,
    #[serde(skip)]
    attack_coeff: f32,
    #[serde(skip)]
    release_coeff: f32,
    /// Output peak of the last processed block (linear)
    #[serde(skip)]
    last_peak: f32,
    /// Highest output peak since the last reset (linear)
    #[serde(skip)]
    max_peak: f32,
}

impl Limiter {
    /// Create a new limiter with specified ceiling
    ///
    /// # Arguments
    /// * `ceiling_db` - Maximum output level (-12 to 0 dB)
    pub fn new(ceiling_db: f32) -> Self {
        let clamped_ceiling = ceiling_db.clamp(MIN_CEILING_DB, MAX_CEILING_DB);
        let mut limiter = Self {
            params: EffectParams::named("limiter"),
            ceiling_db: clamped_ceiling,
            release_ms: 100.0,
            envelope: 0.0,
            sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE as f32,
            ceiling_linear: db_to_linear(clamped_ceiling),
            attack_coeff: 0.0,
            release_coeff: 0.0,
            last_peak: 0.0,
            max_peak: 0.0,
        };
        limiter.update_coefficients();
        limiter
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    pub fn ceiling_linear(&self) -> f32 {
        self.ceiling_linear
    }

    /// Set release time in milliseconds
    pub fn set_release_ms(&mut self, ms: f32) {
        self.release_ms = ms.clamp(MIN_RELEASE_MS, MAX_RELEASE_MS);
        self.release_coeff = time_to_coeff(self.release_ms, self.sample_rate);
    }

    pub fn release_ms(&self) -> f32 {
        self.release_ms
    }

    /// Current gain reduction in dB (>= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        self.envelope
    }

    /// Output peak of the last processed block (linear)
    pub fn last_peak(&self) -> f32 {
        self.last_peak
    }

    /// Highest output peak since construction or reset (linear)
    pub fn max_peak(&self) -> f32 {
        self.max_peak
    }

    fn update_coefficients(&mut self) {
        self.attack_coeff = time_to_coeff(ATTACK_MS, self.sample_rate);
        self.release_coeff = time_to_coeff(self.release_ms, self.sample_rate);
        self.ceiling_linear = db_to_linear(self.ceiling_db);
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(-0.3)
    }
}

impl Effect for Limiter {
    impl_effect_common!("limiter", "Limiter");

    fn process(&mut self, buffer: &mut AudioBuffer, _start_time: f64) {
        if !self.params.enabled {
            return;
        }

        let num_channels = buffer.num_channels();
        let mut block_peak = 0.0_f32;

        for i in 0..buffer.num_samples() {
            let peak = (0..num_channels)
                .map(|ch| buffer.samples[ch][i].abs())
                .fold(0.0_f32, f32::max);

            let target_gain_reduction = if peak > self.ceiling_linear {
                (linear_to_db(peak) - self.ceiling_db).max(0.0)
            } else {
                0.0
            };

            let coeff = if target_gain_reduction > self.envelope {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.envelope = coeff * self.envelope + (1.0 - coeff) * target_gain_reduction;

            let gain_linear = db_to_linear(-self.envelope);
            let ceiling = self.ceiling_linear;
            for ch in 0..num_channels {
                let sample = &mut buffer.samples[ch][i];
                *sample = (*sample * gain_linear).clamp(-ceiling, ceiling);
                block_peak = block_peak.max(sample.abs());
            }
        }

        self.last_peak = block_peak;
        self.max_peak = self.max_peak.max(block_peak);
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.envelope = 0.0;
        self.last_peak = 0.0;
        self.max_peak = 0.0;
    }

    fn get_params(&self) -> Value {
        json!({
            "ceiling_db": self.ceiling_db,
            "release_ms": self.release_ms,
            "attack_ms": ATTACK_MS,
            "enabled": self.params.enabled
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
