//! Tantra engine
//!
//! A four-string tanpura cycle under optional chakra tones. Each chakra
//! control toggles its own layer; the crown is not a layer but the
//! engine-wide amplifier.

use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::compose::{instruments, midi_to_hz, Composition, LayerSpec, StepContext};
use crate::config::{EngineProfile, MasteringConfig};
use crate::engine::EngineId;
use crate::graph::{Envelope, NoteEvent, Tone, Waveform};

use super::{intensity, routed, TantraEngine};

const BUS_BODY: usize = 0;
const BUS_BREATH: usize = 1;
const BUS_ENERGY: usize = 2;

/// Tonic of the tanpura (C#3)
const SA_MIDI: f32 = 49.0;

const LAYERS: &[LayerSpec] = &[
    LayerSpec::on("tanpura"),
    LayerSpec::off("root"),
    LayerSpec::off("sacral"),
    LayerSpec::off("solar"),
    LayerSpec::off("heart"),
    LayerSpec::off("throat"),
    LayerSpec::off("third_eye"),
];

/// Tanpura string order over one bar: Pa, Sa', Sa', low Sa (semitones)
const TANPURA_CYCLE: [f32; 4] = [7.0, 12.0, 12.0, 0.0];

/// Energy centre
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chakra {
    Root,
    Sacral,
    Solar,
    Heart,
    Throat,
    ThirdEye,
    Crown,
}

impl Chakra {
    pub const ALL: [Chakra; 7] = [
        Chakra::Root,
        Chakra::Sacral,
        Chakra::Solar,
        Chakra::Heart,
        Chakra::Throat,
        Chakra::ThirdEye,
        Chakra::Crown,
    ];

    /// Layer toggled by this chakra; the crown has none
    pub fn layer(&self) -> Option<&'static str> {
        match self {
            Chakra::Root => Some("root"),
            Chakra::Sacral => Some("sacral"),
            Chakra::Solar => Some("solar"),
            Chakra::Heart => Some("heart"),
            Chakra::Throat => Some("throat"),
            Chakra::ThirdEye => Some("third_eye"),
            Chakra::Crown => None,
        }
    }

    /// Tone of the chakra (Hz)
    pub fn frequency(&self) -> f32 {
        match self {
            Chakra::Root => 396.0,
            Chakra::Sacral => 417.0,
            Chakra::Solar => 528.0,
            Chakra::Heart => 639.0,
            Chakra::Throat => 741.0,
            Chakra::ThirdEye => 852.0,
            Chakra::Crown => 963.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TantraComposition {
    /// Last chakra touched, used to voice the bell
    focus: Option<Chakra>,
}

impl TantraComposition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> Option<Chakra> {
        self.focus
    }

    fn bell(&self, time: f64, level: f32) -> Vec<NoteEvent> {
        let frequency = self
            .focus
            .map(|c| c.frequency())
            .unwrap_or_else(|| midi_to_hz(SA_MIDI + 24.0));
        routed(instruments::bell(time, frequency, level), BUS_BREATH)
    }

    fn tanpura(time: f64, semitones: f32, bar_len: f64) -> NoteEvent {
        NoteEvent::new(
            time,
            Tone::osc(Waveform::Saw, midi_to_hz(SA_MIDI + semitones)),
            Envelope::new(0.01, bar_len * 0.9, 0.0, 0.3),
        )
        .velocity(0.3)
        .filter(crate::dsp::FilterType::LowPass, 1200.0, 2.5)
        .bus(BUS_BODY)
    }
}

impl Composition for TantraComposition {
    fn engine_id(&self) -> EngineId {
        EngineId::Tantra
    }

    fn profile(&self) -> EngineProfile {
        let mut profile = EngineProfile::new(60.0, 0.25, &["Corpo", "Respiração", "Energia"]);
        profile.fade_in_secs = 3.0;
        profile.duck_ratio = 0.3;
        profile.sends.reverb_send = 0.4;
        profile.interaction.filtered_bus = BUS_BODY;
        profile.mastering = MasteringConfig::default()
            .with_eq(80.0, 600.0, 0.9, 5000.0, -2.0)
            .with_dynamics(0.18, -20.0, 3.0, 160.0);
        profile
    }

    fn layers(&self) -> &'static [LayerSpec] {
        LAYERS
    }

    fn on_step(&mut self, ctx: &mut StepContext<'_>) {
        let step = ctx.step;
        let bar_len = step.bar_duration();

        if step.is_beat() {
            let string = TANPURA_CYCLE[(step.step / 4) as usize % TANPURA_CYCLE.len()];
            ctx.emit("tanpura", Self::tanpura(step.time, string, bar_len));
        }

        if step.is_downbeat() {
            for chakra in Chakra::ALL {
                let Some(layer) = chakra.layer() else {
                    continue;
                };
                let tone = NoteEvent::new(
                    step.time,
                    Tone::sine(chakra.frequency() * 0.5),
                    Envelope::pad(1.5, 2.0),
                )
                .duration(bar_len)
                .velocity(0.12)
                .bus(BUS_ENERGY);
                ctx.emit(layer, tone);
            }
        }
    }

    fn on_gesture(&mut self, time: f64, intensity: f32, _rng: &mut StdRng, out: &mut Vec<NoteEvent>) {
        out.extend(self.bell(time, 0.2 + 0.4 * intensity));
    }

    fn amplifier_drone(&self, time: f64) -> Option<NoteEvent> {
        Some(
            NoteEvent::new(time, Tone::sine(midi_to_hz(SA_MIDI - 24.0)), Envelope::pad(3.0, 3.0))
                .velocity(0.35)
                .bus(BUS_BODY),
        )
    }
}

impl TantraEngine {
    /// Touch a chakra: toggles its layer, the crown toggles the amplifier
    ///
    /// # Returns
    /// The new state of the layer or amplifier
    pub fn activate_chakra(&mut self, chakra: Chakra) -> bool {
        self.composition_mut().focus = Some(chakra);
        match chakra.layer() {
            Some(layer) => self.toggle_layer(layer).unwrap_or(false),
            None => {
                let on = !self.is_amplified();
                self.set_amplifier(on);
                self.is_amplified()
            }
        }
    }

    /// Ring a bell tuned to the last chakra touched
    pub fn ring_bell(&mut self, level: f32) {
        let level = intensity(level);
        self.trigger(|c, now, _| c.bell(now, 0.2 + 0.6 * level));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::LayerSet;
    use crate::domains::testing::run_bars;

    #[test]
    fn test_crown_has_no_layer() {
        assert_eq!(Chakra::Crown.layer(), None);
        let layers = LayerSet::new(LAYERS);
        for chakra in Chakra::ALL {
            if let Some(layer) = chakra.layer() {
                assert!(layers.contains(layer));
            }
        }
    }

    #[test]
    fn test_only_enabled_chakras_sound() {
        let mut comp = TantraComposition::new();
        let mut layers = LayerSet::new(LAYERS);
        layers.set("heart", true);
        let (_, stats) = run_bars(&mut comp, &layers, 3, 4);
        assert_eq!(stats.count("heart"), 3);
        assert_eq!(stats.count("root"), 0);
        assert_eq!(stats.count("tanpura"), 12);
    }

    #[test]
    fn test_amplifier_drone_is_sustained() {
        let comp = TantraComposition::new();
        let drone = comp.amplifier_drone(1.0).unwrap();
        assert_eq!(drone.duration, None);
        assert_eq!(drone.end_time(), None);
    }
}
