//! Runtime configuration
//!
//! `AmbienteConfig` is the process-level configuration loaded from JSON.
//! `EngineProfile` carries every tunable constant of one engine; each
//! composition supplies a default profile and `EngineOverrides` patch it.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dsp::{CompressorSettings, SaturationType};
use crate::engine::buffer::{DEFAULT_RENDER_QUANTUM, DEFAULT_SAMPLE_RATE};
use crate::engine::context::{MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
use crate::engine::{Domain, EngineId};
use crate::error::{AmbienteError, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay between the outgoing fade-out and the incoming fade-in
pub const DEFAULT_HANDOFF_DELAY_MS: u64 = 500;

/// Default seed for all generative decisions
pub const DEFAULT_SEED: u64 = 0x0A3B_1E47;

/// Smallest render quantum accepted
const MIN_RENDER_QUANTUM: usize = 16;

/// Largest render quantum accepted
const MAX_RENDER_QUANTUM: usize = 4096;

/// Highest nominal level; the amplifier doubles it to unity at most
pub const MAX_NOMINAL_GAIN: f32 = 0.5;

// ============================================================================
// Mastering
// ============================================================================

/// Per-engine coefficients of the mastering chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringConfig {
    /// Low shelf corner frequency (Hz)
    pub low_shelf_hz: f32,
    /// Peaking band center frequency (Hz)
    pub mid_hz: f32,
    /// Peaking band Q
    pub mid_q: f32,
    /// High shelf corner frequency (Hz)
    pub high_shelf_hz: f32,
    /// Static offset added to the mid band, negative to keep the mix clear
    pub mid_bias_db: f32,
    pub saturation: SaturationType,
    /// Saturation drive (0-1)
    pub drive: f32,
    pub compressor: CompressorSettings,
    pub limiter_ceiling_db: f32,
    pub limiter_release_ms: f32,
    /// Time constant of EQ gain changes (seconds)
    pub eq_time_constant: f64,
}

impl Default for MasteringConfig {
    fn default() -> Self {
        Self {
            low_shelf_hz: 120.0,
            mid_hz: 900.0,
            mid_q: 0.8,
            high_shelf_hz: 6000.0,
            mid_bias_db: -2.0,
            saturation: SaturationType::Arctan,
            drive: 0.15,
            compressor: CompressorSettings::default(),
            limiter_ceiling_db: -0.3,
            limiter_release_ms: 120.0,
            eq_time_constant: 0.1,
        }
    }
}

impl MasteringConfig {
    /// Same chain with the EQ voiced for one engine
    pub fn with_eq(
        mut self,
        low_shelf_hz: f32,
        mid_hz: f32,
        mid_q: f32,
        high_shelf_hz: f32,
        mid_bias_db: f32,
    ) -> Self {
        self.low_shelf_hz = low_shelf_hz;
        self.mid_hz = mid_hz;
        self.mid_q = mid_q;
        self.high_shelf_hz = high_shelf_hz;
        self.mid_bias_db = mid_bias_db;
        self
    }

    /// Same chain with drive, compression and limiter release retuned
    pub fn with_dynamics(
        mut self,
        drive: f32,
        threshold_db: f32,
        ratio: f32,
        limiter_release_ms: f32,
    ) -> Self {
        self.drive = drive;
        self.compressor.threshold_db = threshold_db;
        self.compressor.ratio = ratio;
        self.limiter_release_ms = limiter_release_ms;
        self
    }

    fn validate(&self, field: impl Fn(&str) -> String) -> Result<()> {
        for (name, hz) in [
            ("mastering.low_shelf_hz", self.low_shelf_hz),
            ("mastering.mid_hz", self.mid_hz),
            ("mastering.high_shelf_hz", self.high_shelf_hz),
        ] {
            if !(20.0..=20_000.0).contains(&hz) {
                return Err(AmbienteError::invalid_config(
                    field(name),
                    "must be within 20-20000 Hz",
                ));
            }
        }
        if self.low_shelf_hz >= self.high_shelf_hz {
            return Err(AmbienteError::invalid_config(
                field("mastering.low_shelf_hz"),
                "must be below high_shelf_hz",
            ));
        }
        if !(0.1..=10.0).contains(&self.mid_q) {
            return Err(AmbienteError::invalid_config(
                field("mastering.mid_q"),
                "must be within 0.1-10",
            ));
        }
        if !(0.0..=1.0).contains(&self.drive) {
            return Err(AmbienteError::invalid_config(
                field("mastering.drive"),
                "must be within 0-1",
            ));
        }
        if self.limiter_ceiling_db > 0.0 {
            return Err(AmbienteError::invalid_config(
                field("mastering.limiter_ceiling_db"),
                "must not exceed 0 dBFS",
            ));
        }
        Ok(())
    }
}

/// Optional patch of individual mastering coefficients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteringOverrides {
    pub low_shelf_hz: Option<f32>,
    pub mid_hz: Option<f32>,
    pub mid_q: Option<f32>,
    pub high_shelf_hz: Option<f32>,
    pub mid_bias_db: Option<f32>,
    pub drive: Option<f32>,
    pub compressor_threshold_db: Option<f32>,
    pub compressor_ratio: Option<f32>,
    pub limiter_ceiling_db: Option<f32>,
    pub limiter_release_ms: Option<f32>,
}

impl MasteringOverrides {
    pub fn apply(&self, mastering: &mut MasteringConfig) {
        let patch = |slot: &mut f32, value: Option<f32>| {
            if let Some(v) = value {
                *slot = v;
            }
        };
        patch(&mut mastering.low_shelf_hz, self.low_shelf_hz);
        patch(&mut mastering.mid_hz, self.mid_hz);
        patch(&mut mastering.mid_q, self.mid_q);
        patch(&mut mastering.high_shelf_hz, self.high_shelf_hz);
        patch(&mut mastering.mid_bias_db, self.mid_bias_db);
        patch(&mut mastering.drive, self.drive);
        patch(&mut mastering.compressor.threshold_db, self.compressor_threshold_db);
        patch(&mut mastering.compressor.ratio, self.compressor_ratio);
        patch(&mut mastering.limiter_ceiling_db, self.limiter_ceiling_db);
        patch(&mut mastering.limiter_release_ms, self.limiter_release_ms);
    }
}

// ============================================================================
// Interaction
// ============================================================================

/// Mapping of interaction signals onto graph parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Pan excursion at |x| = 1 (0-1)
    pub pan_depth: f32,
    /// Low-pass cutoff at y = -1 (Hz)
    pub cutoff_min_hz: f32,
    /// Low-pass cutoff at y = 1 (Hz)
    pub cutoff_max_hz: f32,
    /// Delay feedback at y = -1
    pub feedback_min: f32,
    /// Delay feedback at y = 1
    pub feedback_max: f32,
    /// Time constant of interaction ramps (seconds)
    pub smoothing: f64,
    /// Velocity (units per second) needed to fire a gesture
    pub velocity_threshold: f32,
    /// Velocity mapped to full gesture intensity
    pub velocity_full_scale: f32,
    /// Minimum time between two gestures (ms)
    pub min_trigger_interval_ms: f64,
    /// Index of the bus the interaction low-pass acts on
    pub filtered_bus: usize,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            pan_depth: 0.8,
            cutoff_min_hz: 200.0,
            cutoff_max_hz: 800.0,
            feedback_min: 0.15,
            feedback_max: 0.55,
            smoothing: 0.2,
            velocity_threshold: 1.5,
            velocity_full_scale: 8.0,
            min_trigger_interval_ms: 120.0,
            filtered_bus: 0,
        }
    }
}

// ============================================================================
// Sends
// ============================================================================

/// Delay and reverb send levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendConfig {
    pub delay_time_ms: f32,
    pub delay_feedback: f32,
    /// Level of the delay return (0-1)
    pub delay_send: f32,
    pub reverb_room_size: f32,
    pub reverb_damping: f32,
    /// Level of the reverb return (0-1)
    pub reverb_send: f32,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            delay_time_ms: 375.0,
            delay_feedback: 0.3,
            delay_send: 0.2,
            reverb_room_size: 0.8,
            reverb_damping: 0.5,
            reverb_send: 0.35,
        }
    }
}

// ============================================================================
// Engine Profile
// ============================================================================

/// Every tunable constant of one engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    pub tempo_bpm: f64,
    /// Master gain when audible, not muted and not ducked
    pub nominal_gain: f32,
    /// Fraction of the nominal gain kept while narration plays
    pub duck_ratio: f32,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub mute_ramp_secs: f64,
    pub duck_ramp_secs: f64,
    /// Sub-mix bus names, in index order
    pub buses: Vec<String>,
    pub mastering: MasteringConfig,
    pub interaction: InteractionConfig,
    pub sends: SendConfig,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            tempo_bpm: 80.0,
            nominal_gain: 0.2,
            duck_ratio: 0.3,
            fade_in_secs: 2.0,
            fade_out_secs: 1.8,
            mute_ramp_secs: 0.3,
            duck_ramp_secs: 0.6,
            buses: vec!["Main".to_string(), "Texture".to_string()],
            mastering: MasteringConfig::default(),
            interaction: InteractionConfig::default(),
            sends: SendConfig::default(),
        }
    }
}

impl EngineProfile {
    /// Profile with the given tempo, level and bus names
    pub fn new(tempo_bpm: f64, nominal_gain: f32, buses: &[&str]) -> Self {
        Self {
            tempo_bpm,
            nominal_gain,
            buses: buses.iter().map(|b| b.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Check ranges; `engine` names the profile in errors
    pub fn validate(&self, engine: EngineId) -> Result<()> {
        let field = |name: &str| format!("engines.{}.{}", engine, name);

        if !(20.0..=300.0).contains(&self.tempo_bpm) {
            return Err(AmbienteError::invalid_config(
                field("tempo_bpm"),
                format!("{} is outside 20-300 BPM", self.tempo_bpm),
            ));
        }
        if !(0.0..=MAX_NOMINAL_GAIN).contains(&self.nominal_gain) {
            return Err(AmbienteError::invalid_config(
                field("nominal_gain"),
                format!("must be within 0-{}", MAX_NOMINAL_GAIN),
            ));
        }
        if !(0.0..=1.0).contains(&self.duck_ratio) {
            return Err(AmbienteError::invalid_config(
                field("duck_ratio"),
                "must be within 0-1",
            ));
        }
        for (name, secs) in [
            ("fade_in_secs", self.fade_in_secs),
            ("fade_out_secs", self.fade_out_secs),
            ("mute_ramp_secs", self.mute_ramp_secs),
            ("duck_ramp_secs", self.duck_ramp_secs),
        ] {
            if !(0.0..=30.0).contains(&secs) {
                return Err(AmbienteError::invalid_config(
                    field(name),
                    "must be within 0-30 seconds",
                ));
            }
        }
        if self.buses.is_empty() || self.buses.len() > 4 {
            return Err(AmbienteError::invalid_config(
                field("buses"),
                "an engine needs between 1 and 4 buses",
            ));
        }
        if self.interaction.cutoff_min_hz >= self.interaction.cutoff_max_hz {
            return Err(AmbienteError::invalid_config(
                field("interaction.cutoff_min_hz"),
                "must be below cutoff_max_hz",
            ));
        }
        if self.interaction.filtered_bus >= self.buses.len() {
            return Err(AmbienteError::invalid_config(
                field("interaction.filtered_bus"),
                format!("there are only {} buses", self.buses.len()),
            ));
        }
        self.mastering.validate(field)?;
        if self.interaction.velocity_full_scale <= 0.0 {
            return Err(AmbienteError::invalid_config(
                field("interaction.velocity_full_scale"),
                "must be positive",
            ));
        }
        Ok(())
    }
}

/// Optional per-engine overrides from the configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOverrides {
    pub tempo_bpm: Option<f64>,
    pub nominal_gain: Option<f32>,
    pub duck_ratio: Option<f32>,
    pub fade_in_secs: Option<f64>,
    pub fade_out_secs: Option<f64>,
    /// Replaces the engine's derived seed
    pub seed: Option<u64>,
    pub mastering: MasteringOverrides,
}

impl EngineOverrides {
    /// Patch `profile` with every value that is set
    pub fn apply(&self, profile: &mut EngineProfile) {
        if let Some(tempo) = self.tempo_bpm {
            profile.tempo_bpm = tempo;
        }
        if let Some(gain) = self.nominal_gain {
            profile.nominal_gain = gain;
        }
        if let Some(ratio) = self.duck_ratio {
            profile.duck_ratio = ratio;
        }
        if let Some(secs) = self.fade_in_secs {
            profile.fade_in_secs = secs;
        }
        if let Some(secs) = self.fade_out_secs {
            profile.fade_out_secs = secs;
        }
        self.mastering.apply(&mut profile.mastering);
    }
}

// ============================================================================
// Process Configuration
// ============================================================================

/// Process-level configuration
///
/// # Example
/// ```ignore
/// use ambiente::config::AmbienteConfig;
///
/// let config = AmbienteConfig::from_json_str(r#"{ "handoff_delay_ms": 400 }"#)?;
/// assert_eq!(config.route(Domain::Marketing), EngineId::Relationship);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbienteConfig {
    pub sample_rate: u32,
    /// Frames rendered per graph step
    pub render_quantum: usize,
    pub handoff_delay_ms: u64,
    pub seed: u64,
    /// Domain → engine routing; missing domains use their default engine
    pub routes: BTreeMap<Domain, EngineId>,
    pub engines: BTreeMap<EngineId, EngineOverrides>,
}

impl Default for AmbienteConfig {
    fn default() -> Self {
        let routes = Domain::ALL
            .iter()
            .map(|d| (*d, d.default_engine()))
            .collect();
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            render_quantum: DEFAULT_RENDER_QUANTUM,
            handoff_delay_ms: DEFAULT_HANDOFF_DELAY_MS,
            seed: DEFAULT_SEED,
            routes,
            engines: BTreeMap::new(),
        }
    }
}

impl AmbienteConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: AmbienteConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading configuration");
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate) {
            return Err(AmbienteError::invalid_config(
                "sample_rate",
                format!(
                    "{} Hz is outside {}-{} Hz",
                    self.sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            ));
        }
        if !(MIN_RENDER_QUANTUM..=MAX_RENDER_QUANTUM).contains(&self.render_quantum) {
            return Err(AmbienteError::invalid_config(
                "render_quantum",
                format!(
                    "must be within {}-{} frames",
                    MIN_RENDER_QUANTUM, MAX_RENDER_QUANTUM
                ),
            ));
        }
        if self.handoff_delay_ms > 10_000 {
            return Err(AmbienteError::invalid_config(
                "handoff_delay_ms",
                "must not exceed 10000 ms",
            ));
        }
        for (engine, overrides) in &self.engines {
            let mut profile = EngineProfile::default();
            overrides.apply(&mut profile);
            profile.validate(*engine)?;
        }
        Ok(())
    }

    /// Engine that plays `domain`
    pub fn route(&self, domain: Domain) -> EngineId {
        self.routes
            .get(&domain)
            .copied()
            .unwrap_or_else(|| domain.default_engine())
    }

    /// Seed for one engine's generator
    pub fn seed_for(&self, engine: EngineId) -> u64 {
        self.engines
            .get(&engine)
            .and_then(|o| o.seed)
            .unwrap_or_else(|| self.seed ^ engine.seed_salt())
    }

    /// Overrides for one engine (empty when none are configured)
    pub fn overrides_for(&self, engine: EngineId) -> EngineOverrides {
        self.engines.get(&engine).cloned().unwrap_or_default()
    }

    pub fn handoff_delay_secs(&self) -> f64 {
        self.handoff_delay_ms as f64 / 1000.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_routes_alias_marketing() {
        let config = AmbienteConfig::default();
        assert_eq!(config.route(Domain::Marketing), EngineId::Relationship);
        assert_eq!(config.route(Domain::Home), EngineId::Ambient);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = AmbienteConfig::from_json_str(r#"{ "handoff_delay_ms": 400 }"#).unwrap();
        assert_eq!(config.handoff_delay_ms, 400);
        assert_eq!(config.sample_rate, DEFAULT_SAMPLE_RATE);
        assert_eq!(config.route(Domain::Tarot), EngineId::Tarot);
    }

    #[test]
    fn test_routes_from_json() {
        let config =
            AmbienteConfig::from_json_str(r#"{ "routes": { "marketing": "tarot" } }"#).unwrap();
        assert_eq!(config.route(Domain::Marketing), EngineId::Tarot);
        // Domains missing from the table fall back to their own engine
        assert_eq!(config.route(Domain::Geometry), EngineId::Geometry);
    }

    #[test]
    fn test_invalid_sample_rate_names_field() {
        let err = AmbienteConfig::from_json_str(r#"{ "sample_rate": 100 }"#).unwrap_err();
        match err {
            AmbienteError::InvalidConfig { field, .. } => assert_eq!(field, "sample_rate"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_override_rejected() {
        let json = r#"{ "engines": { "geometry": { "nominal_gain": 3.0 } } }"#;
        let err = AmbienteConfig::from_json_str(json).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("engines.geometry.nominal_gain"));
    }

    #[test]
    fn test_malformed_json_is_serialization_error() {
        let err = AmbienteConfig::from_json_str("{ not json").unwrap_err();
        assert_eq!(err.error_code(), "SERIALIZATION_ERROR");
    }

    #[test]
    fn test_overrides_apply() {
        let mut profile = EngineProfile::default();
        EngineOverrides {
            tempo_bpm: Some(128.0),
            duck_ratio: Some(0.25),
            ..Default::default()
        }
        .apply(&mut profile);
        assert_eq!(profile.tempo_bpm, 128.0);
        assert_eq!(profile.duck_ratio, 0.25);
        assert_eq!(profile.nominal_gain, EngineProfile::default().nominal_gain);
    }

    #[test]
    fn test_mastering_overrides_patch_single_fields() {
        let json = r#"{ "engines": { "tarot": { "mastering": { "mid_hz": 1400.0, "compressor_ratio": 2.0 } } } }"#;
        let config = AmbienteConfig::from_json_str(json).unwrap();
        let mut profile = EngineProfile::default();
        config.overrides_for(EngineId::Tarot).apply(&mut profile);
        assert_eq!(profile.mastering.mid_hz, 1400.0);
        assert_eq!(profile.mastering.compressor.ratio, 2.0);
        assert_eq!(profile.mastering.low_shelf_hz, MasteringConfig::default().low_shelf_hz);
    }

    #[test]
    fn test_mastering_override_above_full_scale_rejected() {
        let json = r#"{ "engines": { "tantra": { "mastering": { "limiter_ceiling_db": 3.0 } } } }"#;
        let err = AmbienteConfig::from_json_str(json).unwrap_err();
        assert!(err
            .to_string()
            .contains("engines.tantra.mastering.limiter_ceiling_db"));
    }

    #[test]
    fn test_nominal_gain_leaves_room_for_amplifier() {
        let mut profile = EngineProfile::default();
        profile.nominal_gain = MAX_NOMINAL_GAIN;
        assert!(profile.validate(EngineId::Tantra).is_ok());
        profile.nominal_gain = 0.8;
        assert!(profile.validate(EngineId::Tantra).is_err());
    }

    #[test]
    fn test_filtered_bus_must_exist() {
        let mut profile = EngineProfile::new(90.0, 0.2, &["A", "B"]);
        profile.interaction.filtered_bus = 2;
        assert!(profile.validate(EngineId::Ambient).is_err());
    }

    #[test]
    fn test_seed_per_engine() {
        let mut config = AmbienteConfig::default();
        assert_ne!(
            config.seed_for(EngineId::Ambient),
            config.seed_for(EngineId::Tarot)
        );
        config.engines.insert(
            EngineId::Tarot,
            EngineOverrides {
                seed: Some(7),
                ..Default::default()
            },
        );
        assert_eq!(config.seed_for(EngineId::Tarot), 7);
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ambiente.json");
        std::fs::write(&path, r#"{ "seed": 42, "render_quantum": 256 }"#).unwrap();
        let config = AmbienteConfig::from_file(&path).unwrap();
        assert_eq!(config.seed, 42);
        assert_eq!(config.render_quantum, 256);

        let missing = AmbienteConfig::from_file(&dir.path().join("missing.json")).unwrap_err();
        assert_eq!(missing.error_code(), "IO_ERROR");
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = EngineProfile::new(90.0, 0.2, &["A", "B", "C"]);
        assert!(profile.validate(EngineId::Ambient).is_ok());
        profile.buses.clear();
        assert!(profile.validate(EngineId::Ambient).is_err());
    }
}
