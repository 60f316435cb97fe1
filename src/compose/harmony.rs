//! Scales and chord progressions

use rand::Rng;

/// Frequency of a MIDI note number (A4 = 69 = 440 Hz)
pub fn midi_to_hz(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

pub const MAJOR: &[i32] = &[0, 2, 4, 5, 7, 9, 11];
pub const MINOR: &[i32] = &[0, 2, 3, 5, 7, 8, 10];
pub const DORIAN: &[i32] = &[0, 2, 3, 5, 7, 9, 10];
pub const PENTATONIC_MINOR: &[i32] = &[0, 3, 5, 7, 10];
pub const PENTATONIC_MAJOR: &[i32] = &[0, 2, 4, 7, 9];
pub const PHRYGIAN: &[i32] = &[0, 1, 3, 5, 7, 8, 10];

/// A root note and a set of intervals
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub root_midi: i32,
    pub intervals: &'static [i32],
}

impl Scale {
    pub const fn new(root_midi: i32, intervals: &'static [i32]) -> Self {
        Self {
            root_midi,
            intervals,
        }
    }

    /// Frequency of scale `degree`; degrees past the scale length climb octaves
    pub fn degree(&self, degree: i32) -> f32 {
        let len = self.intervals.len().max(1) as i32;
        let octave = degree.div_euclid(len);
        let step = self
            .intervals
            .get(degree.rem_euclid(len) as usize)
            .copied()
            .unwrap_or(0);
        midi_to_hz((self.root_midi + octave * 12 + step) as f32)
    }

    /// Frequency of the root shifted by `octaves`
    pub fn root(&self, octaves: i32) -> f32 {
        midi_to_hz((self.root_midi + octaves * 12) as f32)
    }

    /// Stacked thirds built on `degree`
    pub fn triad(&self, degree: i32) -> Vec<f32> {
        vec![
            self.degree(degree),
            self.degree(degree + 2),
            self.degree(degree + 4),
        ]
    }

    /// One triad per entry of `degrees`
    pub fn progression(&self, degrees: &[i32]) -> Vec<Vec<f32>> {
        degrees.iter().map(|&d| self.triad(d)).collect()
    }
}

/// When a progression moves to its next chord
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AdvanceRule {
    /// On every bar that is a multiple of n (bar 0 excluded)
    EveryBars(u32),
    /// With probability p at the start of each bar
    Probability(f64),
}

/// Ordered list of chords (sets of fundamental frequencies)
#[derive(Debug, Clone, PartialEq)]
pub struct ChordProgression {
    chords: Vec<Vec<f32>>,
    index: usize,
    rule: AdvanceRule,
}

impl ChordProgression {
    pub fn new(chords: Vec<Vec<f32>>, rule: AdvanceRule) -> Self {
        Self {
            chords,
            index: 0,
            rule,
        }
    }

    /// Frequencies of the current chord (empty if there are no chords)
    pub fn current(&self) -> &[f32] {
        self.chords
            .get(self.index)
            .map(|c| c.as_slice())
            .unwrap_or(&[])
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.chords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chords.is_empty()
    }

    pub fn rule(&self) -> AdvanceRule {
        self.rule
    }

    /// Move to the next chord, wrapping to the first
    pub fn advance(&mut self) -> usize {
        if !self.chords.is_empty() {
            self.index = (self.index + 1) % self.chords.len();
        }
        self.index
    }

    /// Apply the advance rule at the start of `bar`
    ///
    /// # Returns
    /// true if the chord changed
    pub fn on_bar(&mut self, bar: u64, rng: &mut impl Rng) -> bool {
        if self.chords.len() < 2 {
            return false;
        }
        let advance = match self.rule {
            AdvanceRule::EveryBars(n) => n > 0 && bar > 0 && bar % n as u64 == 0,
            AdvanceRule::Probability(p) => rng.gen_bool(p.clamp(0.0, 1.0)),
        };
        if advance {
            self.advance();
        }
        advance
    }

    /// Replace the chords, keeping the index valid
    pub fn set_chords(&mut self, chords: Vec<Vec<f32>>) {
        self.chords = chords;
        if self.index >= self.chords.len() {
            self.index = 0;
        }
    }

    /// Restart at the first chord
    pub fn reset(&mut self) {
        self.index = 0;
    }
}
