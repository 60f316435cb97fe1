//! Voice pool
//!
//! Owns every sounding voice of one engine. Voices render into the bus
//! buffers they were assigned to; finished voices are dropped after each
//! render. When the pool is full the oldest voice with a bounded lifetime
//! is stolen; held voices only go when nothing else is left.

use tracing::trace;

use crate::engine::AudioBuffer;
use crate::graph::source::{NoteEvent, Voice};

/// Maximum simultaneous voices per engine
pub const MAX_VOICES: usize = 64;

/// Handle to a started voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceId(u64);

#[derive(Debug, Clone)]
pub struct VoicePool {
    voices: Vec<(VoiceId, Voice)>,
    next_id: u64,
    sample_rate: f64,
}

impl VoicePool {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            next_id: 0,
            sample_rate,
        }
    }

    /// Start a voice for `event`
    pub fn start(&mut self, event: NoteEvent) -> VoiceId {
        if self.voices.len() >= MAX_VOICES {
            let victim = self
                .voices
                .iter()
                .position(|(_, v)| !v.is_sustained())
                .unwrap_or(0);
            let (stolen, _) = self.voices.remove(victim);
            trace!(voice = stolen.0, "voice stolen");
        }
        let id = VoiceId(self.next_id);
        self.next_id += 1;
        let seed = (self.next_id as u32).wrapping_mul(0x9E37_79B9);
        self.voices
            .push((id, Voice::new(event, seed, self.sample_rate)));
        id
    }

    /// Close the gate of one voice at graph time `at`
    pub fn release(&mut self, id: VoiceId, at: f64) -> bool {
        match self.voices.iter_mut().find(|(vid, _)| *vid == id) {
            Some((_, voice)) => {
                voice.release(at);
                true
            }
            None => false,
        }
    }

    /// Release every voice that would otherwise hold forever
    pub fn release_sustained(&mut self, at: f64) -> usize {
        let mut count = 0;
        for (_, voice) in self.voices.iter_mut().filter(|(_, v)| v.is_sustained()) {
            voice.release(at);
            count += 1;
        }
        count
    }

    /// Release every voice at `at`
    pub fn release_all(&mut self, at: f64) {
        for (_, voice) in &mut self.voices {
            voice.release(at);
        }
    }

    /// Drop every voice immediately
    pub fn clear(&mut self) {
        self.voices.clear();
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    pub fn is_active(&self, id: VoiceId) -> bool {
        self.voices.iter().any(|(vid, _)| *vid == id)
    }

    /// Render `frames` frames starting at `start_time` into `buses`
    ///
    /// Voices addressed to a bus that does not exist go to the last bus.
    pub fn render(&mut self, start_time: f64, frames: usize, buses: &mut [AudioBuffer]) {
        if buses.is_empty() {
            return;
        }
        let last = buses.len() - 1;
        for (_, voice) in &mut self.voices {
            let bus = &mut buses[voice.event().bus.min(last)];
            if let Some((left, right)) = bus.stereo_mut() {
                let n = frames.min(left.len());
                voice.render(start_time, self.sample_rate, &mut left[..n], &mut right[..n]);
            }
        }
        self.voices.retain(|(_, v)| !v.is_finished());
    }
}
