//! EQ band stage
//!
//! One biquad band with an automatable gain. The mastering chain uses three
//! of these (low shelf, peaking, high shelf). Gain is smoothed through an
//! `AudioParam`; coefficients are refreshed every `COEFF_REFRESH_FRAMES` so a
//! gain ramp never produces a step in the filter response.

use super::biquad::{BiquadCoeffs, BiquadState, FilterType};
use super::effect::{Effect, EffectParams};
use super::param::AudioParam;
use crate::engine::AudioBuffer;
use serde_json::{json, Value};

// ============================================================================
// Constants
// ============================================================================

/// Minimum band gain in dB
pub const MIN_GAIN_DB: f32 = -24.0;

/// Maximum band gain in dB
pub const MAX_GAIN_DB: f32 = 24.0;

/// Frames between coefficient refreshes while the gain is moving
pub const COEFF_REFRESH_FRAMES: usize = 32;

/// Default shelf slope
const SHELF_Q: f32 = 0.707;

// ============================================================================
// EQ Band
// ============================================================================

/// Single EQ band with smoothed gain
#[derive(Debug, Clone)]
pub struct EqBand {
    params: EffectParams,
    filter_type: FilterType,
    frequency: f32,
    q: f32,
    gain_db: AudioParam,
    sample_rate: f64,
    coeffs: BiquadCoeffs,
    coeff_gain_db: f32,
    states: Vec<BiquadState>,
}

impl EqBand {
    /// Create a band of any type with a static starting gain
    pub fn new(filter_type: FilterType, frequency: f32, gain_db: f32, q: f32) -> Self {
        let id = match filter_type {
            FilterType::LowShelf => "low_shelf",
            FilterType::HighShelf => "high_shelf",
            _ => "peaking",
        };
        let mut band = Self {
            params: EffectParams::named(id),
            filter_type,
            frequency,
            q,
            gain_db: AudioParam::new(gain_db, MIN_GAIN_DB, MAX_GAIN_DB),
            sample_rate: crate::engine::buffer::DEFAULT_SAMPLE_RATE as f64,
            coeffs: BiquadCoeffs::bypass(),
            coeff_gain_db: f32::NAN,
            states: vec![BiquadState::default(); 2],
        };
        band.refresh_coefficients(band.gain_db.value_at(0.0));
        band
    }

    /// Create a low shelf band
    pub fn low_shelf(frequency: f32, gain_db: f32) -> Self {
        Self::new(FilterType::LowShelf, frequency, gain_db, SHELF_Q)
    }

    /// Create a peaking band
    pub fn peaking(frequency: f32, gain_db: f32, q: f32) -> Self {
        Self::new(FilterType::Peak, frequency, gain_db, q)
    }

    /// Create a high shelf band
    pub fn high_shelf(frequency: f32, gain_db: f32) -> Self {
        Self::new(FilterType::HighShelf, frequency, gain_db, SHELF_Q)
    }

    pub fn filter_type(&self) -> FilterType {
        self.filter_type
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    /// The automatable gain in dB
    pub fn gain_db(&self) -> &AudioParam {
        &self.gain_db
    }

    /// Smoothly move the gain to `gain_db` starting at graph time `now`
    pub fn set_gain_db(&mut self, gain_db: f32, now: f64, time_constant: f64) {
        self.gain_db.set_target(gain_db, now, time_constant);
    }

    /// Coefficients currently applied
    pub fn coefficients(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    fn refresh_coefficients(&mut self, gain_db: f32) {
        if (gain_db - self.coeff_gain_db).abs() < 1e-4 {
            return;
        }
        self.coeffs = BiquadCoeffs::calculate(
            self.filter_type,
            self.sample_rate,
            self.frequency as f64,
            gain_db as f64,
            self.q as f64,
        );
        self.coeff_gain_db = gain_db;
    }
}

impl Effect for EqBand {
    fn process(&mut self, buffer: &mut AudioBuffer, start_time: f64) {
        if !self.params.enabled {
            return;
        }

        let num_channels = buffer.num_channels();
        let num_samples = buffer.num_samples();
        if self.states.len() < num_channels {
            self.states.resize_with(num_channels, BiquadState::default);
        }

        let mut offset = 0;
        while offset < num_samples {
            let end = (offset + COEFF_REFRESH_FRAMES).min(num_samples);
            let t = start_time + offset as f64 / self.sample_rate;
            self.refresh_coefficients(self.gain_db.value_at(t));

            if !self.coeffs.is_bypass() {
                for ch in 0..num_channels {
                    let state = &mut self.states[ch];
                    for sample in &mut buffer.channel_mut(ch)[offset..end] {
                        *sample = state.process(*sample as f64, &self.coeffs) as f32;
                    }
                }
            }
            offset = end;
        }
    }

    fn prepare(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.coeff_gain_db = f32::NAN;
        self.refresh_coefficients(self.gain_db.target());
    }

    fn reset(&mut self) {
        for state in &mut self.states {
            state.reset();
        }
    }

    fn effect_type(&self) -> &'static str {
        match self.filter_type {
            FilterType::LowShelf => "low_shelf",
            FilterType::HighShelf => "high_shelf",
            _ => "peaking",
        }
    }

    fn display_name(&self) -> &str {
        match self.filter_type {
            FilterType::LowShelf => "Low Shelf",
            FilterType::HighShelf => "High Shelf",
            _ => "Peaking EQ",
        }
    }

    fn id(&self) -> &str {
        &self.params.id
    }

    fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.params.enabled = enabled;
    }

    fn get_params(&self) -> Value {
        json!({
            "frequency": self.frequency,
            "q": self.q,
            "gain_db": self.gain_db.target(),
            "enabled": self.params.enabled
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
