//! Ambient (Home) engine
//!
//! Slow drone and pad beds under a coloured-noise texture, with sparse
//! high shimmer. The biome picks the scale, the chords and the texture.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compose::harmony::{DORIAN, MAJOR, MINOR, PENTATONIC_MAJOR};
use crate::compose::{
    instruments, AdvanceRule, ChordProgression, Composition, LayerSpec, Scale, StepContext,
};
use crate::config::{EngineProfile, MasteringConfig};
use crate::dsp::FilterType;
use crate::engine::EngineId;
use crate::graph::{NoiseColor, NoteEvent};

use super::{intensity, routed, HomeEngine};

const BUS_DRONE: usize = 0;
const BUS_TEXTURE: usize = 1;
const BUS_SHIMMER: usize = 2;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("drone"),
    LayerSpec::on("pad"),
    LayerSpec::on("shimmer"),
    LayerSpec::off("texture"),
];

/// Ambience preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    #[default]
    Forest,
    Ocean,
    Night,
    Dawn,
}

impl Biome {
    pub const ALL: [Biome; 4] = [Biome::Forest, Biome::Ocean, Biome::Night, Biome::Dawn];

    fn scale(&self) -> Scale {
        match self {
            Biome::Forest => Scale::new(50, DORIAN),
            Biome::Ocean => Scale::new(45, MINOR),
            Biome::Night => Scale::new(43, MINOR),
            Biome::Dawn => Scale::new(48, MAJOR),
        }
    }

    /// Noise colour and filter of the texture bed
    fn texture(&self) -> (NoiseColor, (FilterType, f32, f32)) {
        match self {
            Biome::Forest => (NoiseColor::Pink, (FilterType::BandPass, 1800.0, 0.6)),
            Biome::Ocean => (NoiseColor::Brown, (FilterType::LowPass, 500.0, 0.7)),
            Biome::Night => (NoiseColor::Pink, (FilterType::HighPass, 3500.0, 0.7)),
            Biome::Dawn => (NoiseColor::White, (FilterType::BandPass, 2600.0, 1.2)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AmbientComposition {
    biome: Biome,
    scale: Scale,
    chords: ChordProgression,
}

impl AmbientComposition {
    pub fn new() -> Self {
        let biome = Biome::default();
        let scale = biome.scale();
        Self {
            biome,
            scale,
            chords: ChordProgression::new(
                scale.progression(&[0, 5, 3, 4]),
                AdvanceRule::Probability(0.25),
            ),
        }
    }

    pub fn biome(&self) -> Biome {
        self.biome
    }

    /// Switch preset; the next bar picks up the new scale
    pub fn set_biome(&mut self, biome: Biome) {
        self.biome = biome;
        self.scale = biome.scale();
        self.chords.set_chords(self.scale.progression(&[0, 5, 3, 4]));
    }

    fn chime(&self, time: f64, level: f32, rng: &mut StdRng) -> NoteEvent {
        let degree = rng.gen_range(0..PENTATONIC_MAJOR.len() as i32) + 14;
        let shimmer = Scale::new(self.scale.root_midi, PENTATONIC_MAJOR);
        instruments::chime(time, shimmer.degree(degree), level)
            .pan(rng.gen_range(-0.7..0.7))
            .bus(BUS_SHIMMER)
    }
}

impl Default for AmbientComposition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition for AmbientComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Ambient
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(60.0, 0.22, &["Drone", "Textura", "Brilho"]);
        profile.fade_in_secs = 2.5;
        profile.sends.reverb_send = 0.5;
        profile.sends.delay_send = 0.15;
        profile.interaction.filtered_bus = BUS_DRONE;
        profile.mastering = MasteringConfig::default()
            .with_eq(100.0, 700.0, 0.7, 7000.0, -1.5)
            .with_dynamics(0.1, -20.0, 2.5, 180.0);
        profile
    }

    fn layers(&self) -> &'static [LayerSpec] {
        LAYERS
    }

    fn on_start(&mut self, _rng: &mut StdRng) {
        self.chords.reset();
    }

    fn on_step(&mut self, ctx: &mut StepContext<'_>) {
        let step = ctx.step;
        let bar_len = step.bar_duration();

        if step.is_downbeat() {
            self.chords.on_bar(step.bar, &mut *ctx.rng);

            if step.bar % 2 == 0 {
                let root = self.scale.root(-1);
                ctx.emit_all(
                    "drone",
                    routed(instruments::drone(step.time, root, bar_len * 2.0, 0.45), BUS_DRONE),
                );
                let (color, filter) = self.biome.texture();
                ctx.emit(
                    "texture",
                    instruments::noise_bed(step.time, color, bar_len * 2.0, 0.2, filter)
                        .bus(BUS_TEXTURE),
                );
            }

            let chord = self.chords.current().to_vec();
            ctx.emit_all(
                "pad",
                routed(instruments::pad(step.time, &chord, bar_len * 1.1, 0.3), BUS_DRONE),
            );
        }

        if !step.is_beat() && ctx.chance(0.06) {
            let level = ctx.rng.gen_range(0.15..0.35);
            let note = self.chime(step.time, level, ctx.rng);
            ctx.emit("shimmer", note);
        }
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        out.push(self.chime(time, 0.5 * intensity, rng));
    }

    fn chord_index(&self) -> Option<usize> {
        Some(self.chords.index())
    }
}

impl HomeEngine {
    /// Switch the ambience preset
    pub fn set_biome(&mut self, biome: Biome) {
        self.composition_mut().set_biome(biome);
    }

    /// Single high chime, louder with `level`
    pub fn play_chime(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, rng| vec![c.chime(now, 0.2 + 0.5 * level, rng)]);
    }
}
