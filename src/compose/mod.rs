//! Generative composition
//!
//! The `Composition` trait is what differs between engines: which layers
//! exist, what each layer emits on every sixteenth-note step, and how the
//! engine answers interaction gestures. Everything else (lifecycle, graph,
//! scheduling) is shared by `Engine<C>`.

pub mod harmony;
pub mod instruments;
pub mod layers;
pub mod sequencer;

pub use harmony::{midi_to_hz, AdvanceRule, ChordProgression, Scale};
pub use layers::{EmissionStats, LayerSet, LayerSpec};
pub use sequencer::{Sequencer, SequencerState, StepInfo};

use rand::rngs::StdRng;
use rand::Rng;

use crate::config::EngineProfile;
use crate::engine::EngineId;
use crate::graph::NoteEvent;

/// What a composition sees for one step
pub struct StepContext<'a> {
    pub step: StepInfo,
    pub rng: &'a mut StdRng,
    layers: &'a LayerSet,
    events: &'a mut Vec<NoteEvent>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        step: StepInfo,
        layers: &'a LayerSet,
        rng: &'a mut StdRng,
        events: &'a mut Vec<NoteEvent>,
    ) -> Self {
        Self {
            step,
            rng,
            layers,
            events,
        }
    }

    pub fn is_enabled(&self, layer: &str) -> bool {
        self.layers.is_enabled(layer)
    }

    /// Queue `event` for `layer`; dropped when the layer is off
    ///
    /// # Returns
    /// true if the event was queued
    pub fn emit(&mut self, layer: &'static str, mut event: NoteEvent) -> bool {
        if !self.layers.is_enabled(layer) {
            return false;
        }
        event.layer = Some(layer);
        self.events.push(event);
        true
    }

    /// Queue several events for `layer`
    pub fn emit_all(&mut self, layer: &'static str, events: impl IntoIterator<Item = NoteEvent>) {
        for event in events {
            self.emit(layer, event);
        }
    }

    /// Random draw with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    /// Uniform pick from `items`
    pub fn pick<T: Copy>(&mut self, items: &[T]) -> Option<T> {
        if items.is_empty() {
            return None;
        }
        Some(items[self.rng.gen_range(0..items.len())])
    }
}

/// Engine-specific musical behaviour
pub trait Composition {
    fn engine_id(&self) -> EngineId;

    /// Default tunables for this engine
    fn profile(&self) -> EngineProfile;

    /// Layers and their default state
    fn layers(&self) -> &'static [LayerSpec];

    /// Called on every fade-in, before the first step
    fn on_start(&mut self, _rng: &mut StdRng) {}

    /// Decide the events of one step
    fn on_step(&mut self, ctx: &mut StepContext<'_>);

    /// Answer a velocity-gated gesture at graph time `time`
    fn on_gesture(&mut self, time: f64, intensity: f32, rng: &mut StdRng, out: &mut Vec<NoteEvent>);

    /// Drone played while the engine-wide amplifier is engaged
    fn amplifier_drone(&self, _time: f64) -> Option<NoteEvent> {
        None
    }

    /// Index of the current chord, when the engine uses a progression
    fn chord_index(&self) -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Envelope, Tone};
    use rand::SeedableRng;

    const SPECS: [LayerSpec; 2] = [LayerSpec::on("pad"), LayerSpec::off("arp")];

    fn step() -> StepInfo {
        StepInfo {
            step: 0,
            bar: 0,
            time: 1.0,
            duration: 0.125,
        }
    }

    #[test]
    fn test_emit_respects_layers() {
        let layers = LayerSet::new(&SPECS);
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = Vec::new();
        let mut ctx = StepContext::new(step(), &layers, &mut rng, &mut events);
        let note = NoteEvent::new(1.0, Tone::sine(220.0), Envelope::pluck(0.2));
        assert!(ctx.emit("pad", note.clone()));
        assert!(!ctx.emit("arp", note));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].layer, Some("pad"));
    }

    #[test]
    fn test_chance_extremes() {
        let layers = LayerSet::new(&SPECS);
        let mut rng = StdRng::seed_from_u64(1);
        let mut events = Vec::new();
        let mut ctx = StepContext::new(step(), &layers, &mut rng, &mut events);
        assert!(!ctx.chance(0.0));
        assert!(ctx.chance(1.0));
        assert!(ctx.chance(7.0));
        assert_eq!(ctx.pick::<u8>(&[]), None);
        assert_eq!(ctx.pick(&[4]), Some(4));
    }
}
