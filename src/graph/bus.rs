//! Bus mixer
//!
//! Named sub-mix buses that collect voices before the mastering chain. Each
//! bus has a smoothed gain in [0, 1]; unknown bus names are ignored.

use tracing::debug;

use crate::dsp::AudioParam;
use crate::engine::{AudioBuffer, ChannelLayout};

/// Time constant of stem volume changes (seconds)
pub const STEM_TIME_CONSTANT: f64 = 0.1;

/// Fixed set of named buses with per-bus gain
#[derive(Debug, Clone)]
pub struct BusMixer {
    names: Vec<String>,
    gains: Vec<AudioParam>,
    buffers: Vec<AudioBuffer>,
    /// Per-sample bus gain, reused across quanta
    gain_scratch: Vec<f32>,
    sample_rate: u32,
}

impl BusMixer {
    /// Create one bus per name, each at unity gain
    pub fn new(names: &[String], sample_rate: u32) -> Self {
        Self {
            names: names.to_vec(),
            gains: names.iter().map(|_| AudioParam::new(1.0, 0.0, 1.0)).collect(),
            buffers: names
                .iter()
                .map(|_| AudioBuffer::with_sample_rate(0, ChannelLayout::Stereo, sample_rate))
                .collect(),
            gain_scratch: Vec::new(),
            sample_rate,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Index of the bus called `name` (case-insensitive)
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names
            .iter()
            .position(|n| n.eq_ignore_ascii_case(name.trim()))
    }

    /// Gain parameter of one bus
    pub fn gain(&self, index: usize) -> Option<&AudioParam> {
        self.gains.get(index)
    }

    /// Ramp the named bus to `volume` starting at graph time `now`
    ///
    /// # Returns
    /// true if a bus matched, false if the name is unknown
    pub fn set_stem_volume(&mut self, name: &str, volume: f32, now: f64) -> bool {
        match self.index_of(name) {
            Some(index) => {
                self.gains[index].set_target(volume, now, STEM_TIME_CONSTANT);
                debug!(bus = %self.names[index], volume, "stem volume");
                true
            }
            None => {
                debug!(bus = name, "ignoring unknown bus");
                false
            }
        }
    }

    /// Zero every bus buffer and size it to `frames`
    pub fn clear(&mut self, frames: usize) {
        for buffer in &mut self.buffers {
            if buffer.num_samples() == frames {
                buffer.clear();
            } else {
                buffer.reset_len(frames);
            }
        }
    }

    /// Bus buffers voices render into
    pub fn buffers_mut(&mut self) -> &mut [AudioBuffer] {
        &mut self.buffers
    }

    /// Sum every bus into `out` (overwriting it), applying bus gains
    pub fn mixdown(&mut self, start_time: f64, out: &mut AudioBuffer) {
        out.clear();
        let sample_rate = self.sample_rate as f64;
        let frames = out.num_samples();
        self.gain_scratch.resize(frames, 0.0);
        let gain = &mut self.gain_scratch[..frames];

        for (buffer, param) in self.buffers.iter().zip(self.gains.iter()) {
            param.fill(start_time, sample_rate, gain);
            for (dst, src) in out.samples.iter_mut().zip(buffer.samples.iter()) {
                for ((d, s), g) in dst.iter_mut().zip(src.iter()).zip(gain.iter()) {
                    *d += s * g;
                }
            }
        }
    }
}
