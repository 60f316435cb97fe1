//! Master gain stage
//!
//! Last stage of the mastering chain. Its `AudioParam` is what fades,
//! mute, ducking and the amplifier all automate.

use crate::dsp::effect::{Effect, EffectParams};
use crate::dsp::param::AudioParam;
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum master gain (linear)
pub const MIN_MASTER_GAIN: f32 = 0.0;

/// Maximum master gain (linear); leaves room for the doubled amplifier level
pub const MAX_MASTER_GAIN: f32 = 2.0;

// ============================================================================
// Master Gain
// ============================================================================

/// Sample-accurate automated output gain
#[derive(Debug, Clone)]
pub struct MasterGain {
    params: EffectParams,
    gain: AudioParam,
    sample_rate: f64,
}

impl MasterGain {
    /// Create a master gain stage holding `gain` (linear)
    pub fn new(gain: f32) -> Self {
        Self {
            params: EffectParams::named("master_gain"),
            gain: AudioParam::new(gain, MIN_MASTER_GAIN, MAX_MASTER_GAIN),
            sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE as f64,
        }
    }

    /// The automatable gain
    pub fn param(&self) -> &AudioParam {
        &self.gain
    }

    pub fn param_mut(&mut self) -> &mut AudioParam {
        &mut self.gain
    }
}

impl Default for MasterGain {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Effect for MasterGain {
    impl_effect_common!("master_gain", "Master Gain");

    fn process(&mut self, buffer: &mut AudioBuffer, start_time: f64) {
        if !self.params.enabled {
            return;
        }

        let num_samples = buffer.num_samples();
        let automating = self.gain.is_automating(start_time);
        let held = self.gain.value_at(start_time);

        for i in 0..num_samples {
            let g = if automating {
                self.gain.value_at(start_time + i as f64 / self.sample_rate)
            } else {
                held
            };
            for channel in buffer.samples.iter_mut() {
                channel[i] *= g;
            }
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn reset(&mut self) {
        // Gain automation is owned by the engine lifecycle
    }

    fn get_params(&self) -> Value {
        json!({
            "gain": self.gain.target(),
            "enabled": self.params.enabled
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
