//! Tone and noise sources
//!
//! A `NoteEvent` describes one scheduled sound: when it starts, what
//! generates it, its envelope and where it goes. A `Voice` renders one
//! event sample by sample, staying silent until the event's start time so
//! events can be scheduled ahead of the render cursor.

use std::f32::consts::PI;

use crate::dsp::{BiquadCoeffs, BiquadState, FilterType};

// ============================================================================
// Generators
// ============================================================================

/// Periodic oscillator shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    /// Value at `phase` in [0, 1)
    #[inline]
    pub fn sample(&self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Triangle => 4.0 * (phase - 0.5).abs() - 1.0,
            Waveform::Saw => 2.0 * phase - 1.0,
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }
}

/// Noise spectrum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseColor {
    White,
    Pink,
    Brown,
}

/// What a voice generates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tone {
    Osc {
        waveform: Waveform,
        frequency: f32,
        /// Exponential glide target, reached after `glide_time`
        glide_to: Option<f32>,
        glide_time: f64,
        detune_cents: f32,
    },
    Noise {
        color: NoiseColor,
    },
}

impl Tone {
    /// Plain oscillator at `frequency`
    pub fn osc(waveform: Waveform, frequency: f32) -> Self {
        Tone::Osc {
            waveform,
            frequency,
            glide_to: None,
            glide_time: 0.0,
            detune_cents: 0.0,
        }
    }

    pub fn sine(frequency: f32) -> Self {
        Self::osc(Waveform::Sine, frequency)
    }

    pub fn noise(color: NoiseColor) -> Self {
        Tone::Noise { color }
    }

    /// Add an exponential pitch glide (no effect on noise)
    pub fn glide(self, to: f32, time: f64) -> Self {
        match self {
            Tone::Osc {
                waveform,
                frequency,
                detune_cents,
                ..
            } => Tone::Osc {
                waveform,
                frequency,
                glide_to: Some(to),
                glide_time: time,
                detune_cents,
            },
            noise => noise,
        }
    }

    /// Detune by `cents` (no effect on noise)
    pub fn detune(self, cents: f32) -> Self {
        match self {
            Tone::Osc {
                waveform,
                frequency,
                glide_to,
                glide_time,
                ..
            } => Tone::Osc {
                waveform,
                frequency,
                glide_to,
                glide_time,
                detune_cents: cents,
            },
            noise => noise,
        }
    }
}

// ============================================================================
// Envelope
// ============================================================================

/// Linear ADSR envelope (times in seconds)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    /// Sustain level (0-1); 0 makes the note end after attack + decay
    pub sustain: f32,
    pub release: f64,
}

impl Envelope {
    pub fn new(attack: f64, decay: f64, sustain: f32, release: f64) -> Self {
        Self {
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(0.0),
        }
    }

    /// Fast attack, no sustain
    pub fn pluck(decay: f64) -> Self {
        Self::new(0.005, decay, 0.0, 0.05)
    }

    /// Percussive hit
    pub fn perc(decay: f64) -> Self {
        Self::new(0.001, decay, 0.0, 0.01)
    }

    /// Slow swell that holds until released
    pub fn pad(attack: f64, release: f64) -> Self {
        Self::new(attack, 0.0, 1.0, release)
    }

    /// Level `t` seconds after note start, ignoring release
    pub fn gate_level(&self, t: f64) -> f32 {
        if t < 0.0 {
            return 0.0;
        }
        if t < self.attack {
            return (t / self.attack) as f32;
        }
        let t = t - self.attack;
        if t < self.decay {
            let progress = (t / self.decay) as f32;
            return 1.0 + (self.sustain - 1.0) * progress;
        }
        self.sustain
    }

    /// Level `t` seconds after note start with the gate closing at `release_at`
    ///
    /// The release ramps linearly from whatever level the gate had reached.
    pub fn level(&self, t: f64, release_at: Option<f64>) -> f32 {
        match release_at {
            Some(r) if t >= r => {
                if self.release <= 0.0 {
                    return 0.0;
                }
                let from = self.gate_level(r);
                let progress = ((t - r) / self.release).min(1.0) as f32;
                from * (1.0 - progress)
            }
            _ => self.gate_level(t),
        }
    }

    /// Whether a note released at `release_at` has gone silent by `t`
    pub fn is_finished(&self, t: f64, release_at: Option<f64>) -> bool {
        if let Some(r) = release_at {
            if t >= r + self.release {
                return true;
            }
        }
        self.sustain <= 0.0 && t >= self.attack + self.decay
    }
}

// ============================================================================
// Note Event
// ============================================================================

/// Per-voice filter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterSpec {
    pub kind: FilterType,
    pub frequency: f32,
    pub q: f32,
}

/// One scheduled sound
#[derive(Debug, Clone, PartialEq)]
pub struct NoteEvent {
    /// Graph time the note starts
    pub time: f64,
    /// Gate length; `None` holds until released
    pub duration: Option<f64>,
    pub tone: Tone,
    pub envelope: Envelope,
    /// Peak amplitude (0-1)
    pub velocity: f32,
    /// Stereo position (-1 left, 1 right)
    pub pan: f32,
    /// Index of the bus the voice feeds
    pub bus: usize,
    /// Layer that emitted the note, if any
    pub layer: Option<&'static str>,
    pub filter: Option<FilterSpec>,
}

impl NoteEvent {
    pub fn new(time: f64, tone: Tone, envelope: Envelope) -> Self {
        Self {
            time,
            duration: None,
            tone,
            envelope,
            velocity: 1.0,
            pan: 0.0,
            bus: 0,
            layer: None,
            filter: None,
        }
    }

    pub fn duration(mut self, secs: f64) -> Self {
        self.duration = Some(secs.max(0.0));
        self
    }

    pub fn velocity(mut self, velocity: f32) -> Self {
        self.velocity = velocity.clamp(0.0, 1.0);
        self
    }

    pub fn pan(mut self, pan: f32) -> Self {
        self.pan = pan.clamp(-1.0, 1.0);
        self
    }

    pub fn bus(mut self, bus: usize) -> Self {
        self.bus = bus;
        self
    }

    pub fn filter(mut self, kind: FilterType, frequency: f32, q: f32) -> Self {
        self.filter = Some(FilterSpec { kind, frequency, q });
        self
    }

    /// Graph time the note is silent again, when known up front
    pub fn end_time(&self) -> Option<f64> {
        match self.duration {
            Some(d) => Some(self.time + d + self.envelope.release),
            None if self.envelope.sustain <= 0.0 => {
                Some(self.time + self.envelope.attack + self.envelope.decay)
            }
            None => None,
        }
    }
}

// ============================================================================
// Voice
// ============================================================================

/// Noise generator state
#[derive(Debug, Clone, Copy)]
struct NoiseState {
    seed: u32,
    b0: f32,
    b1: f32,
    b2: f32,
    brown: f32,
}

impl NoiseState {
    fn new(seed: u32) -> Self {
        Self {
            seed: seed.max(1),
            b0: 0.0,
            b1: 0.0,
            b2: 0.0,
            brown: 0.0,
        }
    }

    /// xorshift32 white noise in [-1, 1)
    #[inline]
    fn white(&mut self) -> f32 {
        let mut x = self.seed;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.seed = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    fn next(&mut self, color: NoiseColor) -> f32 {
        let white = self.white();
        match color {
            NoiseColor::White => white,
            NoiseColor::Pink => {
                // Paul Kellet's economy filter
                self.b0 = 0.99765 * self.b0 + white * 0.099_046;
                self.b1 = 0.963 * self.b1 + white * 0.296_516_4;
                self.b2 = 0.57 * self.b2 + white * 1.052_691_3;
                (self.b0 + self.b1 + self.b2 + white * 0.1848) * 0.25
            }
            NoiseColor::Brown => {
                self.brown = (self.brown + 0.02 * white) / 1.02;
                self.brown * 3.5
            }
        }
    }
}

/// Renders one `NoteEvent`
#[derive(Debug, Clone)]
pub struct Voice {
    event: NoteEvent,
    /// Absolute graph time the gate closes
    release_at: Option<f64>,
    phase: f32,
    noise: NoiseState,
    coeffs: Option<BiquadCoeffs>,
    filter: BiquadState,
    gain_l: f32,
    gain_r: f32,
    finished: bool,
}

impl Voice {
    /// Voice for `event`; `seed` varies the noise between voices
    pub fn new(event: NoteEvent, seed: u32, sample_rate: f64) -> Self {
        let release_at = event.duration.map(|d| event.time + d);
        let coeffs = event.filter.map(|f| {
            BiquadCoeffs::calculate(f.kind, sample_rate, f.frequency as f64, 0.0, f.q as f64)
        });
        // Equal-power pan law
        let angle = (event.pan + 1.0) * PI / 4.0;
        Self {
            gain_l: angle.cos() * event.velocity,
            gain_r: angle.sin() * event.velocity,
            release_at,
            phase: 0.0,
            noise: NoiseState::new(seed),
            coeffs,
            filter: BiquadState::default(),
            finished: false,
            event,
        }
    }

    pub fn event(&self) -> &NoteEvent {
        &self.event
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Whether the voice holds until explicitly released
    pub fn is_sustained(&self) -> bool {
        self.release_at.is_none() && self.event.envelope.sustain > 0.0
    }

    /// Close the gate at graph time `at` (never later than an earlier release)
    pub fn release(&mut self, at: f64) {
        let at = at.max(self.event.time);
        self.release_at = Some(match self.release_at {
            Some(existing) => existing.min(at),
            None => at,
        });
    }

    #[inline]
    fn frequency_at(&self, t: f64) -> f32 {
        match self.event.tone {
            Tone::Osc {
                frequency,
                glide_to,
                glide_time,
                detune_cents,
                ..
            } => {
                let base = match glide_to {
                    Some(to) if glide_time > 0.0 && frequency > 0.0 && to > 0.0 => {
                        let progress = (t / glide_time).min(1.0) as f32;
                        frequency * (to / frequency).powf(progress)
                    }
                    Some(to) => to,
                    None => frequency,
                };
                base * 2.0_f32.powf(detune_cents / 1200.0)
            }
            Tone::Noise { .. } => 0.0,
        }
    }

    /// Add this voice into `left`/`right`, whose first frame is at `start_time`
    pub fn render(&mut self, start_time: f64, sample_rate: f64, left: &mut [f32], right: &mut [f32]) {
        if self.finished {
            return;
        }
        let frames = left.len().min(right.len());
        let start = self.event.time;
        let release_rel = self.release_at.map(|r| r - start);

        for i in 0..frames {
            let t = start_time + i as f64 / sample_rate;
            if t < start {
                continue;
            }
            let rel = t - start;
            let env = self.event.envelope.level(rel, release_rel);

            let raw = match self.event.tone {
                Tone::Osc { waveform, .. } => {
                    let value = waveform.sample(self.phase);
                    self.phase += self.frequency_at(rel) / sample_rate as f32;
                    self.phase -= self.phase.floor();
                    value
                }
                Tone::Noise { color } => self.noise.next(color),
            };

            let filtered = match &self.coeffs {
                Some(coeffs) => self.filter.process(raw as f64, coeffs) as f32,
                None => raw,
            };

            let sample = filtered * env;
            left[i] += sample * self.gain_l;
            right[i] += sample * self.gain_r;
        }

        let end = start_time + frames as f64 / sample_rate;
        if end > start && self.event.envelope.is_finished(end - start, release_rel) {
            self.finished = true;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
