//! Medicine engine
//!
//! Nature soundscape for healing content: rain and birdsong, a resting
//! heartbeat, slow breath, singing bowls and a distant flute. The healing
//! mode retunes the bowls and flute and sets the rain colour.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compose::harmony::PENTATONIC_MINOR;
use crate::compose::{instruments, Composition, LayerSpec, Scale, StepContext};
use crate::config::{EngineProfile, MasteringConfig};
use crate::dsp::FilterType;
use crate::engine::EngineId;
use crate::graph::{Envelope, NoiseColor, NoteEvent, Tone};

use super::{intensity, routed, MedicineEngine};

const BUS_NATURE: usize = 0;
const BUS_LIFE: usize = 1;
const BUS_SPIRIT: usize = 2;
const BUS_INSTRUMENTS: usize = 3;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("rain"),
    LayerSpec::off("birds"),
    LayerSpec::on("heartbeat"),
    LayerSpec::off("breath"),
    LayerSpec::on("bowl"),
    LayerSpec::off("flute"),
];

/// Healing preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingMode {
    #[default]
    Calm,
    Focus,
    Sleep,
    Restore,
}

impl HealingMode {
    pub const ALL: [HealingMode; 4] = [
        HealingMode::Calm,
        HealingMode::Focus,
        HealingMode::Sleep,
        HealingMode::Restore,
    ];

    /// Fundamental of the singing bowl (Hz)
    pub fn bowl_hz(&self) -> f32 {
        match self {
            HealingMode::Calm => 216.0,
            HealingMode::Focus => 264.0,
            HealingMode::Sleep => 198.0,
            HealingMode::Restore => 264.0 * 0.8,
        }
    }

    fn scale(&self) -> Scale {
        match self {
            HealingMode::Calm => Scale::new(57, PENTATONIC_MINOR),
            HealingMode::Focus => Scale::new(60, PENTATONIC_MINOR),
            HealingMode::Sleep => Scale::new(55, PENTATONIC_MINOR),
            HealingMode::Restore => Scale::new(53, PENTATONIC_MINOR),
        }
    }

    fn rain(&self) -> (NoiseColor, (FilterType, f32, f32)) {
        match self {
            HealingMode::Sleep => (NoiseColor::Brown, (FilterType::LowPass, 700.0, 0.7)),
            HealingMode::Focus => (NoiseColor::Pink, (FilterType::BandPass, 2400.0, 0.5)),
            _ => (NoiseColor::Pink, (FilterType::LowPass, 1600.0, 0.7)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MedicineComposition {
    mode: HealingMode,
}

impl MedicineComposition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> HealingMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: HealingMode) {
        self.mode = mode;
    }

    fn bowl(&self, time: f64, level: f32) -> Vec<NoteEvent> {
        routed(instruments::bell(time, self.mode.bowl_hz(), level), BUS_SPIRIT)
    }

    /// Two or three rising chirps
    fn chirp(&self, time: f64, rng: &mut StdRng) -> Vec<NoteEvent> {
        let base = rng.gen_range(2600.0..4200.0_f32);
        let pan = rng.gen_range(-0.9..0.9);
        let notes = rng.gen_range(2..=3);
        (0..notes)
            .map(|i| {
                let f = base * (1.0 + 0.06 * i as f32);
                NoteEvent::new(
                    time + i as f64 * 0.09,
                    Tone::sine(f).glide(f * 1.3, 0.06),
                    Envelope::perc(0.08),
                )
                .velocity(0.12)
                .pan(pan)
                .bus(BUS_NATURE)
            })
            .collect()
    }
}

impl Composition for MedicineComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Medicine
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(
            60.0,
            0.2,
            &["Natureza", "Vida", "Espírito", "Instrumentos"],
        );
        profile.fade_in_secs = 3.0;
        profile.fade_out_secs = 2.0;
        profile.duck_ratio = 0.25;
        profile.sends.reverb_room_size = 0.9;
        profile.sends.reverb_send = 0.45;
        profile.interaction.filtered_bus = BUS_LIFE;
        profile.mastering = MasteringConfig::default()
            .with_eq(140.0, 800.0, 0.6, 5500.0, -2.5)
            .with_dynamics(0.08, -22.0, 2.0, 200.0);
        profile
    }

    fn layers(&self) -> &'static [LayerSpec] {
        LAYERS
    }

    fn on_step(&mut self, ctx: &mut StepContext<'_>) {
        let step = ctx.step;
        let bar_len = step.bar_duration();

        if step.is_downbeat() {
            if step.bar % 2 == 0 {
                let (color, filter) = self.mode.rain();
                ctx.emit(
                    "rain",
                    instruments::noise_bed(step.time, color, bar_len * 2.0, 0.3, filter)
                        .bus(BUS_NATURE),
                );
                if ctx.chance(0.7) {
                    ctx.emit_all("bowl", self.bowl(step.time, 0.4));
                }
            }
            ctx.emit(
                "breath",
                instruments::noise_bed(
                    step.time,
                    NoiseColor::White,
                    bar_len * 0.4,
                    0.12,
                    (FilterType::BandPass, 650.0, 1.5),
                )
                .bus(BUS_LIFE),
            );
        }

        if step.is_beat() {
            ctx.emit_all(
                "heartbeat",
                routed(instruments::heartbeat(step.time, 0.5), BUS_LIFE),
            );
        } else if ctx.is_enabled("birds") && ctx.chance(0.08) {
            let chirps = self.chirp(step.time, ctx.rng);
            ctx.emit_all("birds", chirps);
        }

        if step.step % 8 == 0 && ctx.chance(0.3) {
            let degree = ctx.rng.gen_range(5..12);
            let length = step.duration * ctx.rng.gen_range(4.0..8.0);
            let frequency = self.mode.scale().degree(degree);
            let melody = instruments::flute(step.time, frequency, length, 0.25);
            ctx.emit_all("flute", routed(melody, BUS_INSTRUMENTS));
        }
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, _rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        out.extend(self.bowl(time, 0.2 + 0.4 * intensity));
    }
}

impl MedicineEngine {
    /// Switch healing preset; takes effect on the next emission
    pub fn set_mode(&mut self, mode: HealingMode) {
        self.composition_mut().set_mode(mode);
    }

    /// Strike the singing bowl
    pub fn strike_bowl(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, _| c.bowl(now, 0.2 + 0.6 * level));
    }
}
