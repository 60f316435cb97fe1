//! Feedback delay send
//!
//! Stereo delay used as a send effect: `process` replaces the buffer with
//! the wet signal only. Feedback is an `AudioParam` so the interaction
//! modulator can sweep it; a one-pole low-pass in the feedback path darkens
//! each repeat.

use crate::dsp::effect::{Effect, EffectParams};
use crate::dsp::param::AudioParam;
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde_json::{json, Value};
use std::f32::consts::PI;

// ============================================================================
// Constants
// ============================================================================

/// Shortest delay time in milliseconds
const MIN_DELAY_MS: f32 = 1.0;

/// Longest delay time in milliseconds
const MAX_DELAY_MS: f32 = 2000.0;

/// Feedback ceiling, below 1.0 so repeats always die out
pub const MAX_FEEDBACK: f32 = 0.95;

// ============================================================================
// Feedback Delay
// ============================================================================

/// Stereo feedback delay (wet output only)
#[derive(Debug, Clone)]
pub struct FeedbackDelay {
    params: EffectParams,
    /// Delay time in milliseconds (1-2000)
    delay_time_ms: f32,
    /// Automatable feedback amount (0-0.95)
    feedback: AudioParam,
    /// Cross-feed repeats between channels
    ping_pong: bool,
    /// Low-pass frequency on the feedback path (Hz)
    filter_freq: f32,
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    sample_rate: f32,
    filter_state_l: f32,
    filter_state_r: f32,
}

impl FeedbackDelay {
    /// Create a delay with the given time and starting feedback
    ///
    /// # Arguments
    /// * `delay_time_ms` - Delay time in milliseconds (clamped to 1-2000)
    /// * `feedback` - Feedback amount (clamped to 0-0.95)
    pub fn new(delay_time_ms: f32, feedback: f32) -> Self {
        let mut delay = Self {
            params: EffectParams::named("delay"),
            delay_time_ms: delay_time_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS),
            feedback: AudioParam::new(feedback, 0.0, MAX_FEEDBACK),
            ping_pong: true,
            filter_freq: 3200.0,
            buffer_l: Vec::new(),
            buffer_r: Vec::new(),
            write_pos: 0,
            sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE as f32,
            filter_state_l: 0.0,
            filter_state_r: 0.0,
        };
        delay.resize_buffers();
        delay
    }

    pub fn delay_time_ms(&self) -> f32 {
        self.delay_time_ms
    }

    /// The automatable feedback amount
    pub fn feedback(&self) -> &AudioParam {
        &self.feedback
    }

    pub fn feedback_mut(&mut self) -> &mut AudioParam {
        &mut self.feedback
    }

    pub fn set_ping_pong(&mut self, enabled: bool) {
        self.ping_pong = enabled;
    }

    /// Set the feedback low-pass frequency (200-20000 Hz)
    pub fn set_filter_freq(&mut self, freq: f32) {
        self.filter_freq = freq.clamp(200.0, 20000.0);
    }

    fn delay_samples(&self) -> usize {
        ((self.delay_time_ms * self.sample_rate / 1000.0) as usize).max(1)
    }

    fn resize_buffers(&mut self) {
        let size = self.delay_samples() + 1;
        self.buffer_l = vec![0.0; size];
        self.buffer_r = vec![0.0; size];
        self.write_pos = 0;
    }

    /// One-pole lowpass coefficient: 1 - exp(-2*PI*fc/fs)
    fn calc_filter_coeff(&self) -> f32 {
        1.0 - (-2.0 * PI * self.filter_freq / self.sample_rate).exp()
    }
}

impl Default for FeedbackDelay {
    fn default() -> Self {
        Self::new(375.0, 0.3)
    }
}

impl Effect for FeedbackDelay {
    impl_effect_common!("delay", "Feedback Delay");

    fn process(&mut self, buffer: &mut AudioBuffer, start_time: f64) {
        if !self.params.enabled || buffer.num_channels() == 0 {
            buffer.clear();
            return;
        }

        let size = self.buffer_l.len();
        let delay_samples = self.delay_samples().min(size - 1);
        let coeff = self.calc_filter_coeff();
        let stereo = buffer.num_channels() > 1;

        for i in 0..buffer.num_samples() {
            let t = start_time + i as f64 / self.sample_rate as f64;
            let feedback = self.feedback.value_at(t);

            let in_l = buffer.samples[0][i];
            let in_r = if stereo { buffer.samples[1][i] } else { in_l };

            let read_pos = (self.write_pos + size - delay_samples) % size;
            let delayed_l = self.buffer_l[read_pos];
            let delayed_r = self.buffer_r[read_pos];

            self.filter_state_l += coeff * (delayed_l * feedback - self.filter_state_l);
            self.filter_state_r += coeff * (delayed_r * feedback - self.filter_state_r);

            if self.ping_pong {
                // Mono input enters on the left, repeats alternate sides
                self.buffer_l[self.write_pos] = (in_l + in_r) * 0.5 + self.filter_state_r;
                self.buffer_r[self.write_pos] = self.filter_state_l;
            } else {
                self.buffer_l[self.write_pos] = in_l + self.filter_state_l;
                self.buffer_r[self.write_pos] = in_r + self.filter_state_r;
            }

            buffer.samples[0][i] = delayed_l;
            if stereo {
                buffer.samples[1][i] = delayed_r;
            }

            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate as f32;
        self.resize_buffers();
        self.filter_state_l = 0.0;
        self.filter_state_r = 0.0;
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
        self.filter_state_l = 0.0;
        self.filter_state_r = 0.0;
    }

    fn get_params(&self) -> Value {
        json!({
            "delay_time_ms": self.delay_time_ms,
            "feedback": self.feedback.target(),
            "ping_pong": self.ping_pong,
            "filter_freq": self.filter_freq,
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

    fn impulse(len: usize) -> AudioBuffer {
        let mut buffer = AudioBuffer::with_sample_rate(len, ChannelLayout::Stereo, 1000);
        buffer.channel_mut(0)[0] = 1.0;
        buffer.channel_mut(1)[0] = 1.0;
        buffer
    }

    #[test]
    fn test_delay_outputs_wet_only() {
        let mut delay = FeedbackDelay::new(10.0, 0.0);
        delay.prepare(1000.0);
        delay.set_ping_pong(false);
        let mut buffer = impulse(30);
        delay.process(&mut buffer, 0.0);
        assert_eq!(buffer.channel(0)[0], 0.0);
        assert_eq!(buffer.channel(0)[10], 1.0);
    }

    #[test]
    fn test_feedback_produces_decaying_repeats() {
        let mut delay = FeedbackDelay::new(10.0, 0.5);
        delay.prepare(1000.0);
        delay.set_ping_pong(false);
        delay.set_filter_freq(20000.0);
        let mut buffer = impulse(60);
        delay.process(&mut buffer, 0.0);
        let first = buffer.channel(0)[10];
        let second_window = buffer.channel(0)[15..30]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(second_window > 0.0);
        assert!(second_window < first);
    }

    #[test]
    fn test_ping_pong_alternates() {
        let mut delay = FeedbackDelay::new(10.0, 0.8);
        delay.prepare(1000.0);
        delay.set_filter_freq(20000.0);
        let mut buffer = impulse(40);
        delay.process(&mut buffer, 0.0);
        assert!(buffer.channel(0)[10] > 0.0);
        assert_eq!(buffer.channel(1)[10], 0.0);
        let right_tail: f32 = buffer.channel(1)[11..25].iter().map(|s| s.abs()).sum();
        assert!(right_tail > 0.0);
    }

    #[test]
    fn test_feedback_is_clamped() {
        let mut delay = FeedbackDelay::default();
        delay.feedback_mut().set_value(3.0);
        assert_eq!(delay.feedback().value_at(0.0), MAX_FEEDBACK);
    }

    #[test]
    fn test_disabled_outputs_silence() {
        let mut delay = FeedbackDelay::new(5.0, 0.5);
        delay.set_enabled(false);
        let mut buffer = impulse(10);
        delay.process(&mut buffer, 0.0);
        assert_eq!(buffer.peak(), 0.0);
    }
}
