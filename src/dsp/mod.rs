//! DSP building blocks
//!
//! Automatable parameters and the effects the engine graphs are built from.
//! All effects implement the `Effect` trait for uniform processing.

mod biquad;
mod compressor;
mod delay;
mod effect;
mod eq;
mod gain;
mod limiter;
mod param;
mod reverb;
mod saturation;

pub use biquad::{BiquadCoeffs, BiquadState, FilterType};
pub use compressor::{Compressor, CompressorSettings};
pub use delay::{FeedbackDelay, MAX_FEEDBACK};
pub use effect::{Effect, EffectParams};
pub use eq::{EqBand, COEFF_REFRESH_FRAMES, MAX_GAIN_DB, MIN_GAIN_DB};
pub use gain::{MasterGain, MAX_MASTER_GAIN, MIN_MASTER_GAIN};
pub use limiter::Limiter;
pub use param::AudioParam;
pub use reverb::{Reverb, ReverbParams};
pub use saturation::{Saturation, SaturationType};
