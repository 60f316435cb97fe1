//! Reverb send (Freeverb)
//!
//! Algorithmic room used as the engines' reverb send:
//! - 8 parallel lowpass-feedback comb filters per channel
//! - 4 series allpass filters per channel for diffusion
//! - Pre-delay and stereo width
//!
//! `process` replaces the buffer with the wet signal only.

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Freeverb Constants
// ============================================================================

/// Reference sample rate for Freeverb delays
const REFERENCE_SAMPLE_RATE: f64 = 44100.0;

/// Comb filter delays at 44100 Hz (8 filters)
const COMB_DELAYS: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];

/// Allpass filter delays at 44100 Hz (4 filters)
const ALLPASS_DELAYS: [usize; 4] = [556, 441, 341, 225];

/// Stereo spread offset in samples (for right channel)
const STEREO_SPREAD: usize = 23;

/// Fixed gain for allpass filters (standard Freeverb value)
const ALLPASS_GAIN: f32 = 0.5;

/// Scale factor for room size parameter to feedback
const ROOM_SCALE: f32 = 0.28;

/// Offset for room size parameter to feedback
const ROOM_OFFSET: f32 = 0.7;

/// Scale factor for damping parameter
const DAMP_SCALE: f32 = 0.4;

/// Input attenuation applied before the comb bank
const FIXED_INPUT_GAIN: f32 = 0.015;

/// Maximum pre-delay time in milliseconds
const MAX_PRE_DELAY_MS: f32 = 100.0;

// ============================================================================
// Parameters
// ============================================================================

/// Reverb send parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverbParams {
    /// Room size: 0 (tiny) to 1 (huge hall)
    pub room_size: f32,
    /// Damping: 0 (bright) to 1 (dark)
    pub damping: f32,
    /// Stereo width: 0 (mono) to 1 (full stereo)
    pub width: f32,
    /// Pre-delay in milliseconds: 0 to 100
    pub pre_delay_ms: f32,
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.8,
            damping: 0.5,
            width: 1.0,
            pre_delay_ms: 20.0,
        }
    }
}

impl ReverbParams {
    /// Clamp parameters to valid ranges
    pub fn clamp(&mut self) {
        self.room_size = self.room_size.clamp(0.0, 1.0);
        self.damping = self.damping.clamp(0.0, 1.0);
        self.width = self.width.clamp(0.0, 1.0);
        self.pre_delay_ms = self.pre_delay_ms.clamp(0.0, MAX_PRE_DELAY_MS);
    }
}

// ============================================================================
// Filter Building Blocks
// ============================================================================

/// Lowpass-feedback comb filter
#[derive(Debug, Clone)]
struct CombFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
    filter_state: f32,
    feedback: f32,
    damp1: f32,
    damp2: f32,
}

impl CombFilter {
    fn new(delay_size: usize) -> Self {
        // Power-of-two size for mask wrapping
        let size = delay_size.next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
            filter_state: 0.0,
            feedback: 0.5,
            damp1: 0.5,
            damp2: 0.5,
        }
    }

    fn set_coefficients(&mut self, feedback: f32, damp1: f32, damp2: f32) {
        self.feedback = feedback;
        self.damp1 = damp1;
        self.damp2 = damp2;
    }

    #[inline]
    fn process(&mut self, input: f32, delay: usize) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - delay) & self.mask;
        let output = self.buffer[read_pos];

        self.filter_state = output * self.damp1 + self.filter_state * self.damp2;
        self.buffer[self.write_pos] = input + self.filter_state * self.feedback;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
        self.write_pos = 0;
    }
}

/// Schroeder allpass for diffusion
#[derive(Debug, Clone)]
struct AllpassFilter {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
}

impl AllpassFilter {
    fn new(delay_size: usize) -> Self {
        let size = delay_size.next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay: usize) -> f32 {
        let read_pos = (self.write_pos + self.mask + 1 - delay) & self.mask;
        let delayed = self.buffer[read_pos];

        let output = delayed - ALLPASS_GAIN * input;
        self.buffer[self.write_pos] = input + ALLPASS_GAIN * output;
        self.write_pos = (self.write_pos + 1) & self.mask;

        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// Pre-delay line
#[derive(Debug, Clone)]
struct PreDelayBuffer {
    buffer: Vec<f32>,
    write_pos: usize,
    mask: usize,
}

impl PreDelayBuffer {
    fn new(max_size: usize) -> Self {
        let size = max_size.next_power_of_two();
        Self {
            buffer: vec![0.0; size],
            write_pos: 0,
            mask: size - 1,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay_samples: usize) -> f32 {
        self.buffer[self.write_pos] = input;
        let read_pos = (self.write_pos + self.mask + 1 - delay_samples) & self.mask;
        let output = self.buffer[read_pos];
        self.write_pos = (self.write_pos + 1) & self.mask;
        output
    }

    fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

/// One channel of the Freeverb network
#[derive(Debug, Clone)]
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
    comb_delays: [usize; 8],
    allpass_delays: [usize; 4],
    pre_delay: PreDelayBuffer,
}

impl Tank {
    fn new(sample_rate: f64, spread: usize) -> Self {
        let scale = sample_rate / REFERENCE_SAMPLE_RATE;
        let scaled = |d: usize| (((d + spread) as f64 * scale) as usize).max(1);

        let mut comb_delays = [0usize; 8];
        for (slot, &d) in comb_delays.iter_mut().zip(COMB_DELAYS.iter()) {
            *slot = scaled(d);
        }
        let mut allpass_delays = [0usize; 4];
        for (slot, &d) in allpass_delays.iter_mut().zip(ALLPASS_DELAYS.iter()) {
            *slot = scaled(d);
        }

        let max_pre_delay = ((MAX_PRE_DELAY_MS / 1000.0) as f64 * sample_rate) as usize + 1;
        Self {
            combs: comb_delays.iter().map(|&d| CombFilter::new(d + 1)).collect(),
            allpasses: allpass_delays
                .iter()
                .map(|&d| AllpassFilter::new(d + 1))
                .collect(),
            comb_delays,
            allpass_delays,
            pre_delay: PreDelayBuffer::new(max_pre_delay.max(2)),
        }
    }

    fn set_coefficients(&mut self, feedback: f32, damp1: f32, damp2: f32) {
        for comb in &mut self.combs {
            comb.set_coefficients(feedback, damp1, damp2);
        }
    }

    #[inline]
    fn process(&mut self, input: f32, pre_delay_samples: usize) -> f32 {
        let delayed = if pre_delay_samples > 0 {
            self.pre_delay.process(input, pre_delay_samples)
        } else {
            input
        };

        let mut out = 0.0;
        for (comb, &delay) in self.combs.iter_mut().zip(self.comb_delays.iter()) {
            out += comb.process(delayed, delay);
        }
        for (allpass, &delay) in self.allpasses.iter_mut().zip(self.allpass_delays.iter()) {
            out = allpass.process(out, delay);
        }
        out
    }

    fn clear(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::clear);
        self.allpasses.iter_mut().for_each(AllpassFilter::clear);
        self.pre_delay.clear();
    }
}

// ============================================================================
// Reverb Send
// ============================================================================

/// Freeverb reverb send (wet output only)
#[derive(Debug, Clone)]
pub struct Reverb {
    params: EffectParams,
    settings: ReverbParams,
    sample_rate: f64,
    left: Tank,
    right: Tank,
    pre_delay_samples: usize,
}

impl Reverb {
    pub fn new(settings: ReverbParams) -> Self {
        let mut settings = settings;
        settings.clamp();
        let sample_rate = crate::engine::buffer::DEFAULT_SAMPLE_RATE as f64;
        let mut reverb = Self {
            params: EffectParams::named("reverb"),
            settings,
            sample_rate,
            left: Tank::new(sample_rate, 0),
            right: Tank::new(sample_rate, STEREO_SPREAD),
            pre_delay_samples: 0,
        };
        reverb.update_coefficients();
        reverb
    }

    pub fn settings(&self) -> &ReverbParams {
        &self.settings
    }

    fn update_coefficients(&mut self) {
        let feedback = self.settings.room_size * ROOM_SCALE + ROOM_OFFSET;
        let damp1 = 1.0 - self.settings.damping * DAMP_SCALE;
        let damp2 = self.settings.damping * DAMP_SCALE;
        self.left.set_coefficients(feedback, damp1, damp2);
        self.right.set_coefficients(feedback, damp1, damp2);
        self.pre_delay_samples =
            ((self.settings.pre_delay_ms / 1000.0) as f64 * self.sample_rate) as usize;
    }
}

impl Default for Reverb {
    fn default() -> Self {
        Self::new(ReverbParams::default())
    }
}

impl Effect for Reverb {
    impl_effect_common!("reverb", "Reverb");

    fn process(&mut self, buffer: &mut AudioBuffer, _start_time: f64) {
        if !self.params.enabled || buffer.num_channels() == 0 {
            buffer.clear();
            return;
        }

        let stereo = buffer.num_channels() > 1;
        let width = self.settings.width;
        // Same-side and cross-side contributions
        let wet1 = (1.0 + width) / 2.0;
        let wet2 = (1.0 - width) / 2.0;

        for i in 0..buffer.num_samples() {
            let in_l = buffer.samples[0][i];
            let in_r = if stereo { buffer.samples[1][i] } else { in_l };
            let input = (in_l + in_r) * 0.5 * FIXED_INPUT_GAIN;

            let out_l = self.left.process(input, self.pre_delay_samples);
            let out_r = self.right.process(input, self.pre_delay_samples);

            buffer.samples[0][i] = out_l * wet1 + out_r * wet2;
            if stereo {
                buffer.samples[1][i] = out_r * wet1 + out_l * wet2;
            }
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.left = Tank::new(sample_rate, 0);
        self.right = Tank::new(sample_rate, STEREO_SPREAD);
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.left.clear();
        self.right.clear();
    }

    fn get_params(&self) -> Value {
        json!({
            "room_size": self.settings.room_size,
            "damping": self.settings.damping,
            "width": self.settings.width,
            "pre_delay_ms": self.settings.pre_delay_ms,
            "enabled": self.params.enabled
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::buffer::ChannelLayout;

    fn impulse(len: usize, sr: u32) -> AudioBuffer {
        let mut buffer = AudioBuffer::with_sample_rate(len, ChannelLayout::Stereo, sr);
        buffer.channel_mut(0)[0] = 1.0;
        buffer.channel_mut(1)[0] = 1.0;
        buffer
    }

    #[test]
    fn test_comb_filter_delays_input() {
        let mut comb = CombFilter::new(8);
        comb.set_coefficients(0.5, 1.0, 0.0);
        assert_eq!(comb.process(1.0, 4), 0.0);
        for _ in 0..3 {
            comb.process(0.0, 4);
        }
        assert_eq!(comb.process(0.0, 4), 1.0);
    }

    #[test]
    fn test_allpass_filter_first_output() {
        let mut allpass = AllpassFilter::new(4);
        assert_eq!(allpass.process(1.0, 2), -ALLPASS_GAIN);
    }

    #[test]
    fn test_impulse_produces_tail() {
        let mut reverb = Reverb::default();
        reverb.prepare(16000.0);
        let mut buffer = impulse(16000, 16000);
        reverb.process(&mut buffer, 0.0);
        let late: f32 = buffer.channel(0)[4000..].iter().map(|s| s.abs()).sum();
        assert!(late > 0.0);
        assert!(buffer.is_finite());
    }

    #[test]
    fn test_output_is_wet_only() {
        let mut reverb = Reverb::new(ReverbParams {
            pre_delay_ms: 10.0,
            ..Default::default()
        });
        reverb.prepare(16000.0);
        let mut buffer = impulse(32, 16000);
        reverb.process(&mut buffer, 0.0);
        assert_eq!(buffer.channel(0)[0], 0.0);
    }

    #[test]
    fn test_reset_silences_tail() {
        let mut reverb = Reverb::default();
        reverb.prepare(16000.0);
        let mut buffer = impulse(2000, 16000);
        reverb.process(&mut buffer, 0.0);
        reverb.reset();
        let mut silent = AudioBuffer::with_sample_rate(4000, ChannelLayout::Stereo, 16000);
        reverb.process(&mut silent, 0.0);
        assert_eq!(silent.peak(), 0.0);
    }

    #[test]
    fn test_params_are_clamped() {
        let reverb = Reverb::new(ReverbParams {
            room_size: 3.0,
            pre_delay_ms: 500.0,
            ..Default::default()
        });
        assert_eq!(reverb.settings().room_size, 1.0);
        assert_eq!(reverb.settings().pre_delay_ms, 100.0);
        assert_eq!(reverb.effect_type(), "reverb");
    }
}
