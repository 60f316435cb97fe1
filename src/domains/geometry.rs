//! Geometry engine
//!
//! Driving minor-key electronica. Every eighth bar is a drop bar: the kick
//! thins out, the bass turns into sliding glitch notes, hats roll into the
//! next phrase and pad/arp density changes. Chords move every eight bars,
//! so each chord spans one full phrase including its drop.

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::compose::harmony::MINOR;
use crate::compose::{
    instruments, AdvanceRule, ChordProgression, Composition, LayerSpec, Scale, StepContext,
    StepInfo,
};
use crate::config::{EngineProfile, MasteringConfig};
use crate::engine::EngineId;
use crate::graph::NoteEvent;

use super::{intensity, routed, GeometryEngine};

const BUS_BASE: usize = 0;
const BUS_HARMONY: usize = 1;
const BUS_MELODY: usize = 2;

/// Bars per phrase; the last one is the drop
pub const PHRASE_BARS: u64 = 8;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("pulse"),
    LayerSpec::on("bass"),
    LayerSpec::on("hats"),
    LayerSpec::off("pad"),
    LayerSpec::off("arp"),
];

/// Bass rhythm inside a bar (sixteenth steps)
const BASS_STEPS: [u32; 3] = [0, 6, 10];

/// Arp pattern over the chord tones, one entry per eighth note
const ARP_PATTERN: [usize; 8] = [0, 1, 2, 1, 0, 2, 1, 2];

/// Selectable generative layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryLayer {
    Pulse,
    Bass,
    Hats,
    Pad,
    Arp,
}

impl GeometryLayer {
    pub const ALL: [GeometryLayer; 5] = [
        GeometryLayer::Pulse,
        GeometryLayer::Bass,
        GeometryLayer::Hats,
        GeometryLayer::Pad,
        GeometryLayer::Arp,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryLayer::Pulse => "pulse",
            GeometryLayer::Bass => "bass",
            GeometryLayer::Hats => "hats",
            GeometryLayer::Pad => "pad",
            GeometryLayer::Arp => "arp",
        }
    }
}

/// Whether `bar` is the drop bar closing its phrase
pub fn is_drop_bar(bar: u64) -> bool {
    bar % PHRASE_BARS == PHRASE_BARS - 1
}

#[derive(Debug, Clone)]
pub struct GeometryComposition {
    scale: Scale,
    chords: ChordProgression,
}

impl GeometryComposition {
    pub fn new() -> Self {
        let scale = Scale::new(45, MINOR);
        Self {
            scale,
            chords: ChordProgression::new(
                scale.progression(&[0, 5, 2, 6]),
                AdvanceRule::EveryBars(PHRASE_BARS as u32),
            ),
        }
    }

    pub fn chords(&self) -> &ChordProgression {
        &self.chords
    }

    fn bass_root(&self) -> f32 {
        self.chords.current().first().copied().unwrap_or(110.0) * 0.5
    }

    fn pulse(&self, ctx: &mut StepContext<'_>, step: StepInfo, drop: bool) {
        let hit = if drop {
            step.step == 0
        } else {
            step.is_beat()
        };
        if hit {
            ctx.emit("pulse", instruments::kick(step.time, 0.9).bus(BUS_BASE));
        }
    }

    fn bass(&self, ctx: &mut StepContext<'_>, step: StepInfo, drop: bool) {
        let root = self.bass_root();
        if drop {
            if step.step == 0 || (step.step % 4 == 0 && ctx.chance(0.5)) {
                let length = step.duration * 3.0;
                ctx.emit(
                    "bass",
                    instruments::glitch_bass(step.time, root, length, 0.6).bus(BUS_BASE),
                );
            }
        } else if BASS_STEPS.contains(&step.step) {
            let length = step.duration * 2.5;
            ctx.emit(
                "bass",
                instruments::bass(step.time, root, length, 0.55).bus(BUS_BASE),
            );
        }
    }

    fn hats(&self, ctx: &mut StepContext<'_>, step: StepInfo, drop: bool) {
        if drop && step.step >= 8 {
            // Roll into the next phrase, rising in level
            let level = 0.2 + 0.04 * (step.step - 8) as f32;
            ctx.emit(
                "hats",
                instruments::hat(step.time, level, false)
                    .pan(if step.step % 2 == 0 { -0.3 } else { 0.3 })
                    .bus(BUS_BASE),
            );
        } else if step.step % 4 == 2 && ctx.chance(0.9) {
            let open = step.step == 14 && ctx.chance(0.3);
            ctx.emit("hats", instruments::hat(step.time, 0.35, open).bus(BUS_BASE));
        }
    }

    fn pad(&self, ctx: &mut StepContext<'_>, step: StepInfo, drop: bool) {
        let (chance, length) = if drop {
            (0.5, step.bar_duration() * 0.5)
        } else {
            (1.0, step.bar_duration() * 1.05)
        };
        if step.is_downbeat() && ctx.chance(chance) {
            let chord = self.chords.current().to_vec();
            ctx.emit_all(
                "pad",
                routed(instruments::pad(step.time, &chord, length, 0.35), BUS_HARMONY),
            );
        }
    }

    fn arp(&self, ctx: &mut StepContext<'_>, step: StepInfo, drop: bool) {
        if step.step % 2 != 0 {
            return;
        }
        let chance = if drop { 0.3 } else { 0.8 };
        if !ctx.chance(chance) {
            return;
        }
        let chord = self.chords.current();
        if chord.is_empty() {
            return;
        }
        let tone = ARP_PATTERN[(step.step / 2) as usize % ARP_PATTERN.len()] % chord.len();
        let frequency = chord[tone] * 2.0;
        let pan = (step.step as f32 / 7.5) - 1.0;
        ctx.emit(
            "arp",
            instruments::pluck(step.time, frequency, 0.3)
                .pan(pan * 0.5)
                .bus(BUS_MELODY),
        );
    }

    /// Scatter of high notes whose count follows `level`
    fn stardust(&self, time: f64, level: f32, rng: &mut StdRng) -> Vec<NoteEvent> {
        let count = 2 + (level * 3.0).round() as i32;
        (0..count)
            .map(|i| {
                let degree = rng.gen_range(14..21);
                let at = time + i as f64 * 0.045;
                instruments::chime(at, self.scale.degree(degree), 0.25 + 0.35 * level)
                    .pan(rng.gen_range(-0.8..0.8))
                    .bus(BUS_MELODY)
            })
            .collect()
    }
}

impl Default for GeometryComposition {
    fn default() -> Self {
        Self::new()
    }
}

impl Composition for GeometryComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Geometry
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(118.0, 0.18, &["Base", "Harmonia", "Melodia"]);
        profile.fade_out_secs = 1.5;
        profile.sends.delay_time_ms = 60_000.0 / 118.0 * 0.75;
        profile.sends.delay_send = 0.25;
        profile.interaction.min_trigger_interval_ms = 100.0;
        profile.interaction.filtered_bus = BUS_HARMONY;
        // Punchier: more drive, faster limiter
        profile.mastering = MasteringConfig::default()
            .with_eq(90.0, 1200.0, 1.0, 8000.0, -3.0)
            .with_dynamics(0.25, -16.0, 4.0, 80.0);
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
        if step.is_downbeat() {
            self.chords.on_bar(step.bar, &mut *ctx.rng);
        }
        let drop = is_drop_bar(step.bar);

        self.pulse(ctx, step, drop);
        self.bass(ctx, step, drop);
        self.hats(ctx, step, drop);
        self.pad(ctx, step, drop);
        self.arp(ctx, step, drop);
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        out.extend(self.stardust(time, intensity, rng));
    }

    fn chord_index(&self) -> Option<usize> {
        Some(self.chords.index())
    }
}

impl GeometryEngine {
    /// Toggle one generative layer
    ///
    /// # Returns
    /// The layer's new state
    pub fn select_layer(&mut self, layer: GeometryLayer) -> Option<bool> {
        self.toggle_layer(layer.as_str())
    }

    /// Burst of sparkling notes
    pub fn trigger_stardust(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, rng| c.stardust(now, level, rng));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::LayerSet;
    use crate::domains::testing::run_bars;
    use crate::graph::Tone;
    use rand::SeedableRng;

    fn all_layers() -> LayerSet {
        let mut layers = LayerSet::new(LAYERS);
        for layer in GeometryLayer::ALL {
            layers.set(layer.as_str(), true);
        }
        layers
    }

    fn bar_of(event: &NoteEvent, bar_len: f64) -> u64 {
        ((event.time - 0.05) / bar_len + 1e-9).floor() as u64
    }

    #[test]
    fn test_drop_bar_rule() {
        assert!(!is_drop_bar(0));
        assert!(is_drop_bar(7));
        assert!(!is_drop_bar(8));
        assert!(is_drop_bar(15));
    }

    #[test]
    fn test_drop_bar_thins_kick_and_glitches_bass() {
        let mut comp = GeometryComposition::new();
        let bar_len = 60.0 / 118.0 * 4.0;
        let (events, _) = run_bars(&mut comp, &all_layers(), 8, 11);

        let kicks = |bar: u64| {
            events
                .iter()
                .filter(|e| e.layer == Some("pulse") && bar_of(e, bar_len) == bar)
                .count()
        };
        assert_eq!(kicks(0), 4);
        assert_eq!(kicks(7), 1);

        let glitch = events.iter().any(|e| {
            e.layer == Some("bass")
                && bar_of(e, bar_len) == 7
                && matches!(e.tone, Tone::Osc { glide_to: Some(_), .. })
        });
        let plain = events
            .iter()
            .filter(|e| e.layer == Some("bass") && bar_of(e, bar_len) < 7)
            .all(|e| matches!(e.tone, Tone::Osc { glide_to: None, .. }));
        assert!(glitch);
        assert!(plain);
    }

    #[test]
    fn test_drop_bar_hat_roll() {
        let mut comp = GeometryComposition::new();
        let bar_len = 60.0 / 118.0 * 4.0;
        let (events, _) = run_bars(&mut comp, &all_layers(), 8, 5);
        let hats_in_drop = events
            .iter()
            .filter(|e| e.layer == Some("hats") && bar_of(e, bar_len) == 7)
            .count();
        assert!(hats_in_drop >= 8);
    }

    #[test]
    fn test_chord_changes_once_per_phrase() {
        let mut comp = GeometryComposition::new();
        let layers = LayerSet::new(LAYERS);
        run_bars(&mut comp, &layers, 8, 1);
        assert_eq!(comp.chord_index(), Some(0));
        let mut comp = GeometryComposition::new();
        run_bars(&mut comp, &layers, 9, 1);
        assert_eq!(comp.chord_index(), Some(1));
    }

    #[test]
    fn test_stardust_scales_with_level() {
        let comp = GeometryComposition::new();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(comp.stardust(0.0, 0.3, &mut rng).len(), 3);
        assert_eq!(comp.stardust(0.0, 1.0, &mut rng).len(), 5);
    }
}
