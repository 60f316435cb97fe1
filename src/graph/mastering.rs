//! Mastering chain
//!
//! Fixed stage order shared by every engine:
//! low shelf → peaking → high shelf → saturation → compressor → limiter →
//! master gain. Only the coefficients differ between engines.

use serde_json::Value;
use tracing::debug;

use crate::config::MasteringConfig;
use crate::dsp::{Compressor, Effect, EqBand, Limiter, MasterGain, Saturation};
use crate::engine::AudioBuffer;

/// Stage names in processing order
pub const STAGE_ORDER: [&str; 7] = [
    "low_shelf",
    "peaking",
    "high_shelf",
    "saturation",
    "compressor",
    "limiter",
    "master_gain",
];

/// dB swing of the bass and treble sliders around their midpoint
const SHELF_RANGE_DB: f32 = 24.0;

/// dB swing of the mid slider around its midpoint
const MID_RANGE_DB: f32 = 18.0;

/// Map three slider values in [0, 1] to (bass, mid, treble) dB offsets
///
/// `mid_bias_db` is added to the mid band so the neutral position cuts.
/// Non-finite slider values read as the neutral midpoint.
pub fn eq_offsets(bass: f32, mid: f32, treble: f32, mid_bias_db: f32) -> (f32, f32, f32) {
    let slider = |v: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.5 };
    let (bass, mid, treble) = (slider(bass), slider(mid), slider(treble));
    (
        (bass - 0.5) * SHELF_RANGE_DB,
        (mid - 0.5) * MID_RANGE_DB + mid_bias_db,
        (treble - 0.5) * SHELF_RANGE_DB,
    )
}

/// Per-engine mastering chain
#[derive(Debug, Clone)]
pub struct MasteringChain {
    low_shelf: EqBand,
    mid: EqBand,
    high_shelf: EqBand,
    saturation: Saturation,
    compressor: Compressor,
    limiter: Limiter,
    master_gain: MasterGain,
    mid_bias_db: f32,
    eq_time_constant: f64,
}

impl MasteringChain {
    /// Build the chain from `config`, prepared for `sample_rate`
    ///
    /// The master gain starts at 0; the engine lifecycle fades it in.
    pub fn new(config: &MasteringConfig, sample_rate: f64) -> Self {
        let mut limiter = Limiter::new(config.limiter_ceiling_db);
        limiter.set_release_ms(config.limiter_release_ms);

        let mut chain = Self {
            low_shelf: EqBand::low_shelf(config.low_shelf_hz, 0.0),
            mid: EqBand::peaking(config.mid_hz, config.mid_bias_db, config.mid_q),
            high_shelf: EqBand::high_shelf(config.high_shelf_hz, 0.0),
            saturation: Saturation::new(config.saturation, config.drive),
            compressor: Compressor::new(config.compressor.clone()),
            limiter,
            master_gain: MasterGain::new(0.0),
            mid_bias_db: config.mid_bias_db,
            eq_time_constant: config.eq_time_constant,
        };
        chain.for_each_stage_mut(|stage| stage.prepare(sample_rate));
        chain
    }

    fn for_each_stage_mut(&mut self, mut f: impl FnMut(&mut dyn Effect)) {
        f(&mut self.low_shelf);
        f(&mut self.mid);
        f(&mut self.high_shelf);
        f(&mut self.saturation);
        f(&mut self.compressor);
        f(&mut self.limiter);
        f(&mut self.master_gain);
    }

    /// Stages in processing order
    pub fn stages(&self) -> [&dyn Effect; 7] {
        [
            &self.low_shelf,
            &self.mid,
            &self.high_shelf,
            &self.saturation,
            &self.compressor,
            &self.limiter,
            &self.master_gain,
        ]
    }

    /// Ramp the three EQ bands to the slider values (each in [0, 1])
    pub fn set_global_eq(&mut self, bass: f32, mid: f32, treble: f32, now: f64) {
        let (bass_db, mid_db, treble_db) = eq_offsets(bass, mid, treble, self.mid_bias_db);
        let tau = self.eq_time_constant;
        self.low_shelf.set_gain_db(bass_db, now, tau);
        self.mid.set_gain_db(mid_db, now, tau);
        self.high_shelf.set_gain_db(treble_db, now, tau);
        debug!(bass_db, mid_db, treble_db, "global eq");
    }

    /// The three EQ bands (low shelf, peaking, high shelf)
    pub fn eq_bands(&self) -> [&EqBand; 3] {
        [&self.low_shelf, &self.mid, &self.high_shelf]
    }

    pub fn master_gain(&self) -> &MasterGain {
        &self.master_gain
    }

    pub fn master_gain_mut(&mut self) -> &mut MasterGain {
        &mut self.master_gain
    }

    pub fn limiter(&self) -> &Limiter {
        &self.limiter
    }

    /// Run every stage over `buffer`
    pub fn process(&mut self, buffer: &mut AudioBuffer, start_time: f64) {
        self.for_each_stage_mut(|stage| stage.process(buffer, start_time));
    }

    /// Clear filter and dynamics state, keeping automation
    pub fn reset(&mut self) {
        self.for_each_stage_mut(|stage| stage.reset());
    }

    /// Type and parameters of every stage, for metering
    pub fn describe(&self) -> Vec<Value> {
        self.stages()
            .iter()
            .map(|stage| {
                serde_json::json!({
                    "type": stage.effect_type(),
                    "name": stage.display_name(),
                    "params": stage.get_params(),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ChannelLayout;
    use approx::assert_relative_eq;
    use test_case::test_case;

    #[test]
    fn test_stage_order_is_fixed() {
        let chain = MasteringChain::new(&MasteringConfig::default(), 16000.0);
        let names: Vec<&str> = chain.stages().iter().map(|s| s.effect_type()).collect();
        assert_eq!(names, STAGE_ORDER.to_vec());
    }

    #[test_case(0.5, 0.5, 0.5, (0.0, -2.0, 0.0) ; "neutral")]
    #[test_case(1.0, 1.0, 1.0, (12.0, 7.0, 12.0) ; "full")]
    #[test_case(0.0, 0.0, 0.0, (-12.0, -11.0, -12.0) ; "zero")]
    #[test_case(f32::NAN, 2.0, -1.0, (0.0, 7.0, -12.0) ; "out of range")]
    fn test_eq_offsets(bass: f32, mid: f32, treble: f32, expected: (f32, f32, f32)) {
        let (b, m, t) = eq_offsets(bass, mid, treble, -2.0);
        assert_relative_eq!(b, expected.0);
        assert_relative_eq!(m, expected.1);
        assert_relative_eq!(t, expected.2);
    }

    #[test]
    fn test_global_eq_is_ramped() {
        let mut chain = MasteringChain::new(&MasteringConfig::default(), 16000.0);
        chain.set_global_eq(1.0, 0.5, 0.5, 1.0);
        let bass = chain.eq_bands()[0].gain_db();
        assert_eq!(bass.value_at(1.0), 0.0);
        assert!(bass.value_at(1.05) > 0.0 && bass.value_at(1.05) < 12.0);
        assert_eq!(bass.target(), 12.0);
    }

    #[test]
    fn test_output_never_exceeds_ceiling() {
        let mut chain = MasteringChain::new(&MasteringConfig::default(), 16000.0);
        chain.master_gain_mut().param_mut().set_value(1.0);
        chain.set_global_eq(1.0, 1.0, 1.0, 0.0);
        let mut buffer = AudioBuffer::with_sample_rate(1600, ChannelLayout::Stereo, 16000);
        for (i, s) in buffer.channel_mut(0).iter_mut().enumerate() {
            *s = if i % 2 == 0 { 4.0 } else { -4.0 };
        }
        chain.process(&mut buffer, 0.0);
        let ceiling = chain.limiter().ceiling_linear();
        assert!(buffer.peak() <= ceiling + 1e-6);
        assert!(chain.limiter().max_peak() <= ceiling + 1e-6);
    }

    #[test]
    fn test_master_gain_starts_silent() {
        let mut chain = MasteringChain::new(&MasteringConfig::default(), 16000.0);
        let mut buffer = AudioBuffer::with_sample_rate(64, ChannelLayout::Stereo, 16000);
        buffer.channel_mut(0).fill(0.5);
        chain.process(&mut buffer, 0.0);
        assert_eq!(buffer.peak(), 0.0);
        assert_eq!(chain.describe().len(), 7);
    }
}
