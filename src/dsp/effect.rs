//! Effect trait definition
//!
//! Base trait for every stage of the mastering chain and the send effects.

use crate::engine::AudioBuffer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters common to all effects
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectParams {
    /// Identifier for this effect instance
    pub id: String,
    /// Whether the effect is enabled
    pub enabled: bool,
}

impl EffectParams {
    /// Enabled parameters with the given instance id
    pub fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            enabled: true,
        }
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::named("")
    }
}

/// Base trait for all DSP effects
///
/// Effects process audio buffers in-place. `start_time` is the graph time of
/// the buffer's first frame, so automated parameters can be evaluated per
/// sample.
pub trait Effect: Send {
    /// Process audio buffer in-place
    fn process(&mut self, buffer: &mut AudioBuffer, start_time: f64);

    /// Prepare the effect for processing at `sample_rate`
    fn prepare(&mut self, sample_rate: f64);

    /// Reset effect state
    ///
    /// Clears any internal buffers/state (e.g., filter history, delay lines).
    fn reset(&mut self);

    /// Get the effect type identifier
    fn effect_type(&self) -> &'static str;

    /// Get human-readable display name
    fn display_name(&self) -> &str;

    /// Get the instance ID
    fn id(&self) -> &str;

    /// Check if effect is enabled
    fn is_enabled(&self) -> bool;

    /// Enable or disable the effect
    fn set_enabled(&mut self, enabled: bool);

    /// Get all parameters as JSON (for metering and the CLI)
    fn get_params(&self) -> Value;
}

/// Helper macro to implement common Effect trait methods
#[macro_export]
macro_rules! impl_effect_common {
    ($effect_type:expr, $display_name:expr) => {
        fn effect_type(&self) -> &'static str {
            $effect_type
        }

        fn display_name(&self) -> &str {
            $display_name
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
    };
}
