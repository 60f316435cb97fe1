//! Mixer panel adapter
//!
//! Forwards generic slider values to whichever engine is active. The panel
//! knows nothing about domain bus sets; it asks the engine for them.

use super::Orchestrator;

pub struct MixerPanel<'a> {
    orchestrator: &'a mut Orchestrator,
}

impl<'a> MixerPanel<'a> {
    pub fn new(orchestrator: &'a mut Orchestrator) -> Self {
        Self { orchestrator }
    }

    /// Bass, mid and treble in [0, 1]
    pub fn set_global_eq(&mut self, bass: f32, mid: f32, treble: f32) {
        if let Some(engine) = self.orchestrator.active_engine_mut() {
            engine.set_global_eq(bass, mid, treble);
        }
    }

    /// Volume in [0, 1] for one of the active engine's stems
    ///
    /// # Returns
    /// false if nothing is active or the name matched no bus
    pub fn set_stem_volume(&mut self, stem: &str, volume: f32) -> bool {
        match self.orchestrator.active_engine_mut() {
            Some(engine) => engine.set_stem_volume(stem, volume),
            None => false,
        }
    }

    /// Stem names of the active engine (empty when nothing is active)
    pub fn stem_names(&self) -> Vec<String> {
        self.orchestrator
            .active_engine()
            .map(|e| e.stem_names())
            .unwrap_or_default()
    }
}
