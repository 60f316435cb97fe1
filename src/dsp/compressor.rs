//! Glue compressor
//!
//! Feed-forward compressor with stereo-linked peak detection, soft knee and
//! attack/release smoothing. Sits between saturation and the limiter in the
//! mastering chain.

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::buffer::{db_to_linear, linear_to_db};
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Floor used when converting silence to dB
const SILENCE_DB: f32 = -96.0;

/// Compressor settings with their valid ranges
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressorSettings {
    /// Threshold level in dB (-60 to 0 dB)
    pub threshold_db: f32,
    /// Compression ratio (1.0 to 20.0)
    pub ratio: f32,
    /// Attack time in milliseconds (0.1 to 100 ms)
    pub attack_ms: f32,
    /// Release time in milliseconds (10 to 1000 ms)
    pub release_ms: f32,
    /// Knee width in dB (0 = hard knee, up to 12 dB)
    pub knee_db: f32,
    /// Makeup gain in dB (0 to 24 dB)
    pub makeup_gain_db: f32,
}

impl Default for CompressorSettings {
    fn default() -> Self {
        Self {
            threshold_db: -18.0,
            ratio: 3.0,
            attack_ms: 20.0,
            release_ms: 250.0,
            knee_db: 6.0,
            makeup_gain_db: 0.0,
        }
    }
}

impl CompressorSettings {
    /// Clamp settings to valid ranges
    pub fn clamp(&mut self) {
        self.threshold_db = self.threshold_db.clamp(-60.0, 0.0);
        self.ratio = self.ratio.clamp(1.0, 20.0);
        self.attack_ms = self.attack_ms.clamp(0.1, 100.0);
        self.release_ms = self.release_ms.clamp(10.0, 1000.0);
        self.knee_db = self.knee_db.clamp(0.0, 12.0);
        self.makeup_gain_db = self.makeup_gain_db.clamp(0.0, 24.0);
    }
}

/// Compressor dynamics processor
#[derive(Debug, Clone)]
pub struct Compressor {
    params: EffectParams,
    settings: CompressorSettings,
    sample_rate: f64,
    attack_coeff: f32,
    release_coeff: f32,
    /// Smoothed gain reduction in dB (<= 0)
    gain_reduction_db: f32,
}

impl Compressor {
    pub fn new(settings: CompressorSettings) -> Self {
        let mut settings = settings;
        settings.clamp();
        let mut compressor = Self {
            params: EffectParams::named("compressor"),
            settings,
            sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE as f64,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            gain_reduction_db: 0.0,
        };
        compressor.update_coefficients();
        compressor
    }

    pub fn settings(&self) -> &CompressorSettings {
        &self.settings
    }

    /// Current gain reduction in dB for metering (<= 0)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }

    /// One-pole smoothing coefficients from the attack/release times
    fn update_coefficients(&mut self) {
        let attack_samples = (self.settings.attack_ms / 1000.0) * self.sample_rate as f32;
        let release_samples = (self.settings.release_ms / 1000.0) * self.sample_rate as f32;

        self.attack_coeff = if attack_samples > 0.0 {
            (-1.0 / attack_samples).exp()
        } else {
            0.0
        };
        self.release_coeff = if release_samples > 0.0 {
            (-1.0 / release_samples).exp()
        } else {
            0.0
        };
    }

    /// Gain reduction (dB, <= 0) for a given input level in dB
    pub fn compute_gain_reduction_db(&self, input_db: f32) -> f32 {
        let threshold = self.settings.threshold_db;
        let ratio = self.settings.ratio;
        let knee = self.settings.knee_db;

        if knee > 0.0 {
            let knee_start = threshold - knee / 2.0;
            let knee_end = threshold + knee / 2.0;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold + (input_db - threshold) / ratio) - input_db
            } else {
                // Quadratic interpolation meeting both straight segments
                let over = input_db - knee_start;
                (1.0 / ratio - 1.0) * over * over / (2.0 * knee)
            }
        } else if input_db <= threshold {
            0.0
        } else {
            (threshold + (input_db - threshold) / ratio) - input_db
        }
    }
}

impl Default for Compressor {
    fn default() -> Self {
        Self::new(CompressorSettings::default())
    }
}

impl Effect for Compressor {
    impl_effect_common!("compressor", "Glue Compressor");

    fn process(&mut self, buffer: &mut AudioBuffer, _start_time: f64) {
        if !self.params.enabled {
            return;
        }

        let num_channels = buffer.num_channels();
        let makeup = self.settings.makeup_gain_db;

        for i in 0..buffer.num_samples() {
            let peak = (0..num_channels)
                .map(|ch| buffer.samples[ch][i].abs())
                .fold(0.0_f32, f32::max);
            let input_db = if peak > 0.0 {
                linear_to_db(peak)
            } else {
                SILENCE_DB
            };

            let target = self.compute_gain_reduction_db(input_db);
            // Reduction deepening is the attack phase
            let coeff = if target < self.gain_reduction_db {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain_reduction_db = coeff * self.gain_reduction_db + (1.0 - coeff) * target;

            let gain = db_to_linear(self.gain_reduction_db + makeup);
            for ch in 0..num_channels {
                buffer.samples[ch][i] *= gain;
            }
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.gain_reduction_db = 0.0;
    }

    fn get_params(&self) -> Value {
        json!({
            "threshold_db": self.settings.threshold_db,
            "ratio": self.settings.ratio,
            "attack_ms": self.settings.attack_ms,
            "release_ms": self.settings.release_ms,
            "knee_db": self.settings.knee_db,
            "makeup_gain_db": self.settings.makeup_gain_db,
            "enabled": self.params.enabled
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;
    use approx::assert_relative_eq;

    fn hard_knee(threshold_db: f32, ratio: f32) -> Compressor {
        Compressor::new(CompressorSettings {
            threshold_db,
            ratio,
            knee_db: 0.0,
            ..Default::default()
        })
    }

    fn constant(value: f32, len: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(len, ChannelLayout::Stereo);
        for ch in 0..2 {
            buffer.channel_mut(ch).fill(value);
        }
        buffer
    }

    #[test]
    fn test_gain_computer_hard_knee() {
        let comp = hard_knee(-20.0, 4.0);
        assert_eq!(comp.compute_gain_reduction_db(-30.0), 0.0);
        assert_relative_eq!(comp.compute_gain_reduction_db(-8.0), -9.0);
    }

    #[test]
    fn test_gain_computer_soft_knee_is_continuous() {
        let comp = Compressor::new(CompressorSettings {
            threshold_db: -20.0,
            ratio: 4.0,
            knee_db: 6.0,
            ..Default::default()
        });
        let below = comp.compute_gain_reduction_db(-23.0001);
        let above = comp.compute_gain_reduction_db(-22.9999);
        assert!((below - above).abs() < 1e-3);
        let end_in = comp.compute_gain_reduction_db(-17.0001);
        let end_out = comp.compute_gain_reduction_db(-16.9999);
        assert!((end_in - end_out).abs() < 1e-2);
    }

    #[test]
    fn test_process_below_threshold_is_unity() {
        let mut comp = hard_knee(-6.0, 4.0);
        comp.prepare(16000.0);
        let mut buffer = constant(0.1, 1600);
        comp.process(&mut buffer, 0.0);
        assert_relative_eq!(buffer.channel(0)[1599], 0.1, epsilon = 1e-6);
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_process_above_threshold_reduces() {
        let mut comp = hard_knee(-20.0, 4.0);
        comp.prepare(16000.0);
        let mut buffer = constant(0.9, 16000);
        comp.process(&mut buffer, 0.0);
        assert!(buffer.channel(0)[15999] < 0.3);
        assert!(comp.gain_reduction_db() < -10.0);

        comp.reset();
        assert_eq!(comp.gain_reduction_db(), 0.0);
    }

    #[test]
    fn test_settings_are_clamped() {
        let comp = Compressor::new(CompressorSettings {
            ratio: 100.0,
            attack_ms: 0.0,
            ..Default::default()
        });
        assert_eq!(comp.settings().ratio, 20.0);
        assert_eq!(comp.settings().attack_ms, 0.1);
    }
}
