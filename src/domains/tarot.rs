//! Tarot engine
//!
//! Dark drones, a distant choir and scattered bells. The arcana selects the
//! mode; card interactions play a swish and a revealed chord.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compose::harmony::{DORIAN, MINOR, PHRYGIAN};
use crate::compose::{
    instruments, AdvanceRule, ChordProgression, Composition, LayerSpec, Scale, StepContext,
};
use crate::config::{EngineProfile, MasteringConfig};
use crate::dsp::FilterType;
use crate::engine::EngineId;
use crate::graph::{Envelope, NoiseColor, NoteEvent, Tone, Waveform};

use super::{intensity, routed, TarotEngine};

const BUS_MYSTERY: usize = 0;
const BUS_CARDS: usize = 1;
const BUS_COSMOS: usize = 2;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("drone"),
    LayerSpec::on("choir"),
    LayerSpec::on("bells"),
    LayerSpec::off("pulse"),
];

/// Deck section being read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Arcana {
    #[default]
    Major,
    Cups,
    Wands,
    Swords,
    Pentacles,
}

impl Arcana {
    pub const ALL: [Arcana; 5] = [
        Arcana::Major,
        Arcana::Cups,
        Arcana::Wands,
        Arcana::Swords,
        Arcana::Pentacles,
    ];

    fn scale(&self) -> Scale {
        match self {
            Arcana::Major => Scale::new(50, PHRYGIAN),
            Arcana::Cups => Scale::new(53, DORIAN),
            Arcana::Wands => Scale::new(52, DORIAN),
            Arcana::Swords => Scale::new(47, PHRYGIAN),
            Arcana::Pentacles => Scale::new(45, MINOR),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TarotComposition {
    arcana: Arcana,
    scale: Scale,
    chords: ChordProgression,
    cards_revealed: u32,
}

impl TarotComposition {
    pub fn new() -> Self {
        let arcana = Arcana::default();
        let scale = arcana.scale();
        Self {
            arcana,
            scale,
            chords: ChordProgression::new(
                scale.progression(&[0, 1, 5, 3]),
                AdvanceRule::Probability(0.2),
            ),
            cards_revealed: 0,
        }
    }

    pub fn arcana(&self) -> Arcana {
        self.arcana
    }

    pub fn cards_revealed(&self) -> u32 {
        self.cards_revealed
    }

    pub fn set_arcana(&mut self, arcana: Arcana) {
        self.arcana = arcana;
        self.scale = arcana.scale();
        self.chords.set_chords(self.scale.progression(&[0, 1, 5, 3]));
    }

    /// Filtered noise sweep of a card turning over
    fn flip(&self, time: f64) -> Vec<NoteEvent> {
        let envelope = Envelope::new(0.02, 0.15, 0.0, 0.02);
        vec![NoteEvent::new(time, Tone::noise(NoiseColor::White), envelope)
            .velocity(0.25)
            .filter(FilterType::BandPass, 2800.0, 1.5)
            .bus(BUS_CARDS)]
    }

    /// Bell arpeggio of the current chord, two octaves up
    fn reveal(&mut self, time: f64, level: f32) -> Vec<NoteEvent> {
        self.cards_revealed += 1;
        self.chords
            .current()
            .iter()
            .enumerate()
            .flat_map(|(i, &f)| instruments::bell(time + i as f64 * 0.09, f * 4.0, level))
            .map(|e| e.bus(BUS_CARDS))
            .collect()
    }
}

impl Default for TarotComposition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition for TarotComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Tarot
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(66.0, 0.2, &["Mistério", "Cartas", "Cosmos"]);
        profile.fade_in_secs = 2.5;
        profile.sends.reverb_room_size = 0.92;
        profile.sends.reverb_send = 0.5;
        profile.interaction.filtered_bus = BUS_MYSTERY;
        profile.mastering = MasteringConfig::default()
            .with_eq(110.0, 1500.0, 1.2, 7500.0, -3.5)
            .with_dynamics(0.14, -19.0, 3.0, 220.0);
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
                    routed(instruments::drone(step.time, root, bar_len * 2.0, 0.4), BUS_MYSTERY),
                );
            }
            // Choir: soft saw cluster through a vowel-like band-pass
            let choir: Vec<NoteEvent> = self
                .chords
                .current()
                .iter()
                .map(|&f| {
                    let tone = Tone::osc(Waveform::Saw, f);
                    NoteEvent::new(step.time, tone, Envelope::pad(1.5, 2.0))
                        .duration(bar_len)
                        .velocity(0.12)
                        .filter(FilterType::BandPass, 800.0, 1.2)
                        .bus(BUS_COSMOS)
                })
                .collect();
            ctx.emit_all("choir", choir);
        }

        if step.step % 2 == 0 && ctx.chance(0.12) {
            let degree = ctx.rng.gen_range(7..14);
            let pan = ctx.rng.gen_range(-0.7..0.7);
            let bells = instruments::bell(step.time, self.scale.degree(degree), 0.22)
                .into_iter()
                .map(|e| e.pan(pan).bus(BUS_COSMOS));
            ctx.emit_all("bells", bells);
        }

        if step.step == 0 || step.step == 10 {
            ctx.emit(
                "pulse",
                instruments::kick(step.time, 0.35)
                    .filter(FilterType::LowPass, 200.0, 0.7)
                    .bus(BUS_MYSTERY),
            );
        }
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        let degree = rng.gen_range(14..21);
        out.extend(routed(
            instruments::bell(time, self.scale.degree(degree), 0.15 + 0.3 * intensity),
            BUS_COSMOS,
        ));
    }

    fn chord_index(&self) -> Option<usize> {
        Some(self.chords.index())
    }
}

impl TarotEngine {
    /// Switch the deck section being read
    pub fn set_arcana(&mut self, arcana: Arcana) {
        self.composition_mut().set_arcana(arcana);
    }

    /// Swish of a card turning over
    pub fn card_flip(&mut self) {
        self.trigger(|c, now, _| c.flip(now));
    }

    /// Bell arpeggio announcing a revealed card
    pub fn reveal_card(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, _| c.reveal(now, 0.2 + 0.5 * level));
    }
}
