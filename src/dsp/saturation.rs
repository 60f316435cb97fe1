//! Saturation Effect
//!
//! Waveshaping stage of the mastering chain. Provides Tape, Tube,
//! Transistor, HardClip and Arctan curves.

use crate::dsp::effect::{Effect, EffectParams};
use crate::engine::buffer::db_to_linear;
use crate::engine::AudioBuffer;
use crate::impl_effect_common;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum drive (0.0 = no saturation)
const MIN_DRIVE: f32 = 0.0;

/// Maximum drive (1.0 = full saturation)
const MAX_DRIVE: f32 = 1.0;

/// Minimum output gain in dB
const MIN_OUTPUT_GAIN_DB: f32 = -24.0;

/// Maximum output gain in dB
const MAX_OUTPUT_GAIN_DB: f32 = 24.0;

// ============================================================================
// Saturation Type
// ============================================================================

/// Types of saturation waveshaping
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaturationType {
    /// Soft saturation with slight asymmetry, emulates magnetic tape
    Tape,
    /// Even harmonics emphasis, emulates vacuum tube warmth
    Tube,
    /// Odd harmonics with harder edge, emulates transistor clipping
    Transistor,
    /// Hard digital clipping at threshold
    HardClip,
    /// Normalised arctangent curve, unity at full scale
    #[default]
    Arctan,
}

impl SaturationType {
    /// Get display name for the saturation type
    pub fn display_name(&self) -> &'static str {
        match self {
            SaturationType::Tape => "Tape",
            SaturationType::Tube => "Tube",
            SaturationType::Transistor => "Transistor",
            SaturationType::HardClip => "Hard Clip",
            SaturationType::Arctan => "Arctan",
        }
    }

    /// Get string identifier
    pub fn to_str(&self) -> &'static str {
        match self {
            SaturationType::Tape => "tape",
            SaturationType::Tube => "tube",
            SaturationType::Transistor => "transistor",
            SaturationType::HardClip => "hard_clip",
            SaturationType::Arctan => "arctan",
        }
    }
}

// ============================================================================
// Waveshaping Functions
// ============================================================================

/// Tape saturation: soft saturation with slight asymmetry
#[inline]
fn waveshape_tape(x: f32, drive: f32) -> f32 {
    let gain = 1.0 + drive * 4.0;
    let shaped = (x * gain).tanh();
    let asymmetry = 0.1 * drive;
    shaped + asymmetry * shaped * shaped
}

/// Tube saturation: x / (1 + |x|^(1 + drive))
#[inline]
fn waveshape_tube(x: f32, drive: f32) -> f32 {
    let exp = 1.0 + drive;
    x / (1.0 + x.abs().powf(exp))
}

/// Transistor saturation: harder clipping with odd harmonics
#[inline]
fn waveshape_transistor(x: f32, drive: f32) -> f32 {
    let driven = x * (1.0 + drive * 3.0);
    driven / (1.0 + driven.abs())
}

/// Hard clip: amplifies then clamps to [-1, 1]
#[inline]
fn waveshape_hardclip(x: f32, drive: f32) -> f32 {
    (x * (1.0 + drive * 10.0)).clamp(-1.0, 1.0)
}

/// Arctan: atan(k*x) / atan(k), maps ±1 to ±1 for any drive
#[inline]
fn waveshape_arctan(x: f32, drive: f32) -> f32 {
    let k = 1.0 + drive * 9.0;
    (k * x).atan() / k.atan()
}

// ============================================================================
// Saturation Effect
// ============================================================================

/// Waveshaping saturation stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Saturation {
    params: EffectParams,
    drive: f32,
    saturation_type: SaturationType,
    output_gain_db: f32,
    #[serde(skip)]
    output_gain_linear: f32,
}

impl Saturation {
    /// Create a saturation stage
    ///
    /// # Arguments
    /// * `saturation_type` - Curve to apply
    /// * `drive` - Amount of saturation (0.0 to 1.0)
    pub fn new(saturation_type: SaturationType, drive: f32) -> Self {
        Self {
            params: EffectParams::named("saturation"),
            drive: drive.clamp(MIN_DRIVE, MAX_DRIVE),
            saturation_type,
            output_gain_db: 0.0,
            output_gain_linear: 1.0,
        }
    }

    /// Set drive amount (0.0 to 1.0)
    pub fn set_drive(&mut self, drive: f32) {
        self.drive = drive.clamp(MIN_DRIVE, MAX_DRIVE);
    }

    pub fn drive(&self) -> f32 {
        self.drive
    }

    pub fn saturation_type(&self) -> SaturationType {
        self.saturation_type
    }

    /// Set output gain in dB (-24 to +24)
    pub fn set_output_gain(&mut self, db: f32) {
        self.output_gain_db = db.clamp(MIN_OUTPUT_GAIN_DB, MAX_OUTPUT_GAIN_DB);
        self.output_gain_linear = db_to_linear(self.output_gain_db);
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain_db
    }

    /// Apply the selected curve to one sample
    #[inline]
    pub fn waveshape(&self, x: f32) -> f32 {
        match self.saturation_type {
            SaturationType::Tape => waveshape_tape(x, self.drive),
            SaturationType::Tube => waveshape_tube(x, self.drive),
            SaturationType::Transistor => waveshape_transistor(x, self.drive),
            SaturationType::HardClip => waveshape_hardclip(x, self.drive),
            SaturationType::Arctan => waveshape_arctan(x, self.drive),
        }
    }
}

impl Default for Saturation {
    fn default() -> Self {
        Self::new(SaturationType::Arctan, 0.2)
    }
}

impl Effect for Saturation {
    impl_effect_common!("saturation", "Saturation");

    fn process(&mut self, buffer: &mut AudioBuffer, _start_time: f64) {
        if !self.params.enabled {
            return;
        }

        let gain = self.output_gain_linear;
        for channel in buffer.samples.iter_mut() {
            for sample in channel.iter_mut() {
                *sample = self.waveshape(*sample) * gain;
            }
        }
    }

    fn prepare(&mut self, _sample_rate: f64) {
        self.output_gain_linear = db_to_linear(self.output_gain_db);
    }

    fn reset(&mut self) {
        // Stateless waveshaper
    }

    fn get_params(&self) -> Value {
        json!({
            "type": self.saturation_type.to_str(),
            "drive": self.drive,
            "output_gain_db": self.output_gain_db,
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
    use approx::assert_relative_eq;
    use test_case::test_case;

    fn ramp_buffer() -> AudioBuffer {
        let mut buffer = AudioBuffer::new(201, ChannelLayout::Stereo);
        for ch in 0..2 {
            for (i, s) in buffer.channel_mut(ch).iter_mut().enumerate() {
                *s = -1.0 + i as f32 / 100.0;
            }
        }
        buffer
    }

    #[test_case(SaturationType::Tape ; "tape")]
    #[test_case(SaturationType::Tube ; "tube")]
    #[test_case(SaturationType::Transistor ; "transistor")]
    #[test_case(SaturationType::HardClip ; "hardclip")]
    #[test_case(SaturationType::Arctan ; "arctan")]
    fn test_zero_maps_to_zero(saturation_type: SaturationType) {
        let sat = Saturation::new(saturation_type, 0.7);
        assert_relative_eq!(sat.waveshape(0.0), 0.0);
    }

    #[test]
    fn test_arctan_unity_at_full_scale() {
        for drive in [0.0, 0.3, 1.0] {
            let sat = Saturation::new(SaturationType::Arctan, drive);
            assert_relative_eq!(sat.waveshape(1.0), 1.0, epsilon = 1e-6);
            assert_relative_eq!(sat.waveshape(-1.0), -1.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_arctan_is_monotonic_and_bounded() {
        let mut sat = Saturation::new(SaturationType::Arctan, 0.5);
        let mut buffer = ramp_buffer();
        sat.process(&mut buffer, 0.0);
        let out = buffer.channel(0);
        for pair in out.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        assert!(buffer.peak() <= 1.0 + 1e-6);
    }

    #[test]
    fn test_drive_clamping() {
        let mut sat = Saturation::default();
        sat.set_drive(4.0);
        assert_eq!(sat.drive(), 1.0);
        sat.set_output_gain(60.0);
        assert_eq!(sat.output_gain(), 24.0);
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut sat = Saturation::new(SaturationType::HardClip, 1.0);
        sat.set_enabled(false);
        let mut buffer = ramp_buffer();
        let original = buffer.clone();
        sat.process(&mut buffer, 0.0);
        assert_eq!(buffer.channel(0), original.channel(0));
    }

    #[test]
    fn test_get_params() {
        let sat = Saturation::new(SaturationType::Tube, 0.25);
        let params = sat.get_params();
        assert_eq!(params["type"], "tube");
        assert_eq!(sat.effect_type(), "saturation");
    }
}
