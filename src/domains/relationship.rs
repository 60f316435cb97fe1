//! Relationship engine (also plays the Marketing domain)
//!
//! Warm pads over a slow heartbeat with a wandering pluck melody. The mood
//! picks scale and tempo.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compose::harmony::{DORIAN, MAJOR, MINOR, PENTATONIC_MAJOR};
use crate::compose::{
    instruments, AdvanceRule, ChordProgression, Composition, LayerSpec, Scale, StepContext,
};
use crate::config::{EngineProfile, MasteringConfig};
use crate::engine::EngineId;
use crate::graph::NoteEvent;

use super::{intensity, routed, RelationshipEngine};

const BUS_WARMTH: usize = 0;
const BUS_HARMONY: usize = 1;
const BUS_PULSE: usize = 2;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("heartbeat"),
    LayerSpec::on("pad"),
    LayerSpec::on("melody"),
    LayerSpec::off("bass"),
    LayerSpec::off("sparkle"),
];

/// Emotional colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    #[default]
    Tender,
    Playful,
    Passionate,
    Serene,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Tender, Mood::Playful, Mood::Passionate, Mood::Serene];

    pub fn tempo_bpm(&self) -> f64 {
        match self {
            Mood::Tender => 72.0,
            Mood::Playful => 96.0,
            Mood::Passionate => 84.0,
            Mood::Serene => 64.0,
        }
    }

    fn scale(&self) -> Scale {
        match self {
            Mood::Tender => Scale::new(53, MAJOR),
            Mood::Playful => Scale::new(55, MAJOR),
            Mood::Passionate => Scale::new(52, MINOR),
            Mood::Serene => Scale::new(50, DORIAN),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipComposition {
    mood: Mood,
    scale: Scale,
    chords: ChordProgression,
    /// Scale degree of the last melody note
    melody_degree: i32,
}

impl RelationshipComposition {
    pub fn new() -> Self {
        let mood = Mood::default();
        let scale = mood.scale();
        Self {
            mood,
            scale,
            chords: ChordProgression::new(
                scale.progression(&[0, 3, 5, 4]),
                AdvanceRule::Probability(0.35),
            ),
            melody_degree: 7,
        }
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn set_mood(&mut self, mood: Mood) {
        self.mood = mood;
        self.scale = mood.scale();
        self.chords.set_chords(self.scale.progression(&[0, 3, 5, 4]));
    }

    /// Two chimes a third apart, the second answering the first
    fn connection(&self, time: f64, level: f32) -> Vec<NoteEvent> {
        let call = self.scale.degree(self.melody_degree + 7);
        let answer = self.scale.degree(self.melody_degree + 9);
        vec![
            instruments::chime(time, call, level).pan(-0.4).bus(BUS_WARMTH),
            instruments::chime(time + 0.18, answer, level * 0.8)
                .pan(0.4)
                .bus(BUS_WARMTH),
        ]
    }
}

impl Default for RelationshipComposition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition for RelationshipComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Relationship
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(
            Mood::default().tempo_bpm(),
            0.2,
            &["Calor", "Harmonia", "Pulso"],
        );
        profile.duck_ratio = 0.28;
        profile.interaction.filtered_bus = BUS_HARMONY;
        profile.mastering = MasteringConfig::default()
            .with_eq(120.0, 1000.0, 0.8, 6500.0, -1.5)
            .with_dynamics(0.12, -18.0, 2.5, 140.0);
        profile
    }

    fn layers(&self) -> &'static [LayerSpec] {
        LAYERS
    }

    fn on_start(&mut self, _rng: &mut StdRng) {
        self.chords.reset();
        self.melody_degree = 7;
    }

    fn on_step(&mut self, ctx: &mut StepContext<'_>) {
        let step = ctx.step;
        let bar_len = step.bar_duration();

        if step.is_downbeat() {
            self.chords.on_bar(step.bar, &mut *ctx.rng);
            let chord = self.chords.current().to_vec();
            ctx.emit_all(
                "pad",
                routed(instruments::pad(step.time, &chord, bar_len * 1.2, 0.3), BUS_HARMONY),
            );
        }

        if step.step == 0 || step.step == 8 {
            ctx.emit_all(
                "heartbeat",
                routed(instruments::heartbeat(step.time, 0.45), BUS_PULSE),
            );
            let root = self.chords.current().first().copied().unwrap_or(110.0) * 0.5;
            ctx.emit(
                "bass",
                instruments::bass(step.time, root, step.duration * 6.0, 0.4).bus(BUS_PULSE),
            );
        }

        if step.step % 2 == 0 && ctx.is_enabled("melody") && ctx.chance(0.3) {
            let delta = ctx.rng.gen_range(-2..=2);
            self.melody_degree = (self.melody_degree + delta).clamp(4, 14);
            let frequency = self.scale.degree(self.melody_degree);
            ctx.emit(
                "melody",
                instruments::pluck(step.time, frequency, 0.35).bus(BUS_WARMTH),
            );
        }

        if ctx.chance(0.05) {
            let sparkle = Scale::new(self.scale.root_midi, PENTATONIC_MAJOR);
            let degree = ctx.rng.gen_range(10..16);
            let pan = ctx.rng.gen_range(-0.8..0.8);
            ctx.emit(
                "sparkle",
                instruments::chime(step.time, sparkle.degree(degree), 0.18)
                    .pan(pan)
                    .bus(BUS_WARMTH),
            );
        }
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, _rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        out.extend(self.connection(time, 0.2 + 0.3 * intensity));
    }

    fn chord_index(&self) -> Option<usize> {
        Some(self.chords.index())
    }
}

impl RelationshipEngine {
    /// Switch mood: retunes the harmony and moves the tempo
    pub fn set_mood(&mut self, mood: Mood) {
        self.composition_mut().set_mood(mood);
        self.set_tempo(mood.tempo_bpm());
    }

    /// Call-and-answer chime pair
    pub fn play_connection(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, _| c.connection(now, 0.2 + 0.5 * level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::LayerSet;
    use crate::domains::testing::run_bars;

    #[test]
    fn test_melody_stays_in_range() {
        let mut comp = RelationshipComposition::new();
        let layers = LayerSet::new(LAYERS);
        let (_, stats) = run_bars(&mut comp, &layers, 8, 21);
        assert!((4..=14).contains(&comp.melody_degree));
        assert!(stats.count("melody") > 0);
        assert_eq!(stats.count("bass"), 0);
        assert_eq!(stats.count("sparkle"), 0);
    }

    #[test]
    fn test_mood_changes_tempo_and_scale() {
        let mut comp = RelationshipComposition::new();
        comp.set_mood(Mood::Passionate);
        assert_eq!(comp.mood(), Mood::Passionate);
        assert_eq!(comp.scale.intervals, MINOR);
        assert!(Mood::Playful.tempo_bpm() > Mood::Serene.tempo_bpm());
    }

    #[test]
    fn test_connection_answers_later() {
        let comp = RelationshipComposition::new();
        let pair = comp.connection(2.0, 0.5);
        assert_eq!(pair.len(), 2);
        assert!(pair[1].time > pair[0].time);
    }
}
