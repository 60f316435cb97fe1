//! Instrument builders shared by the compositions
//!
//! Each builder returns ready-to-schedule note events; callers set the bus
//! and pan, and the step context stamps the emitting layer.

use crate::dsp::FilterType;
use crate::graph::{Envelope, NoiseColor, NoteEvent, Tone, Waveform};

/// Pitch-dropping sine kick
pub fn kick(time: f64, velocity: f32) -> NoteEvent {
    NoteEvent::new(time, Tone::sine(150.0).glide(45.0, 0.12), Envelope::perc(0.35))
        .velocity(velocity)
}

/// High-passed noise hat; open hats ring longer
pub fn hat(time: f64, velocity: f32, open: bool) -> NoteEvent {
    let decay = if open { 0.22 } else { 0.05 };
    NoteEvent::new(time, Tone::noise(NoiseColor::White), Envelope::perc(decay))
        .velocity(velocity)
        .filter(FilterType::HighPass, 7000.0, 0.9)
}

/// Low-passed saw bass held for `duration`
pub fn bass(time: f64, frequency: f32, duration: f64, velocity: f32) -> NoteEvent {
    NoteEvent::new(
        time,
        Tone::osc(Waveform::Saw, frequency),
        Envelope::new(0.01, 0.12, 0.7, 0.12),
    )
    .duration(duration)
    .velocity(velocity)
    .filter(FilterType::LowPass, 420.0, 1.2)
}

/// Bass that slides down an octave (glitch substitution)
pub fn glitch_bass(time: f64, frequency: f32, duration: f64, velocity: f32) -> NoteEvent {
    NoteEvent::new(
        time,
        Tone::osc(Waveform::Square, frequency).glide(frequency * 0.5, duration),
        Envelope::new(0.005, 0.05, 0.6, 0.05),
    )
    .duration(duration)
    .velocity(velocity)
    .filter(FilterType::LowPass, 900.0, 4.0)
}

/// Two slightly detuned triangle voices per chord tone
pub fn pad(time: f64, chord: &[f32], duration: f64, velocity: f32) -> Vec<NoteEvent> {
    let per_voice = velocity / (chord.len().max(1) as f32 * 2.0).sqrt();
    chord
        .iter()
        .flat_map(|&freq| {
            [-7.0_f32, 7.0].into_iter().map(move |cents| {
                NoteEvent::new(
                    time,
                    Tone::osc(Waveform::Triangle, freq).detune(cents),
                    Envelope::new(1.2, 0.0, 1.0, 1.8),
                )
                .duration(duration)
                .velocity(per_voice)
                .pan(cents / 14.0)
                .filter(FilterType::LowPass, 1400.0, 0.7)
            })
        })
        .collect()
}

/// Short plucked triangle
pub fn pluck(time: f64, frequency: f32, velocity: f32) -> NoteEvent {
    NoteEvent::new(time, Tone::osc(Waveform::Triangle, frequency), Envelope::pluck(0.45))
        .velocity(velocity)
        .filter(FilterType::LowPass, 3000.0, 0.8)
}

/// Fundamental plus an inharmonic partial, long decay
pub fn bell(time: f64, frequency: f32, velocity: f32) -> Vec<NoteEvent> {
    vec![
        NoteEvent::new(time, Tone::sine(frequency), Envelope::perc(2.5)).velocity(velocity),
        NoteEvent::new(time, Tone::sine(frequency * 2.76), Envelope::perc(1.2))
            .velocity(velocity * 0.4),
    ]
}

/// Sine root with a filtered saw fifth
pub fn drone(time: f64, frequency: f32, duration: f64, velocity: f32) -> Vec<NoteEvent> {
    let envelope = Envelope::new(2.5, 0.0, 1.0, 3.0);
    vec![
        NoteEvent::new(time, Tone::sine(frequency), envelope)
            .duration(duration)
            .velocity(velocity),
        NoteEvent::new(time, Tone::osc(Waveform::Saw, frequency * 1.5), envelope)
            .duration(duration)
            .velocity(velocity * 0.3)
            .filter(FilterType::LowPass, 300.0, 0.7),
    ]
}

/// Filtered noise bed (rain, wind, breath)
pub fn noise_bed(
    time: f64,
    color: NoiseColor,
    duration: f64,
    velocity: f32,
    filter: (FilterType, f32, f32),
) -> NoteEvent {
    NoteEvent::new(time, Tone::noise(color), Envelope::new(1.5, 0.0, 1.0, 2.0))
        .duration(duration)
        .velocity(velocity)
        .filter(filter.0, filter.1, filter.2)
}

/// Lub-dub heartbeat: two low thumps a quarter second apart
pub fn heartbeat(time: f64, velocity: f32) -> Vec<NoteEvent> {
    let thump = |t: f64, v: f32| {
        NoteEvent::new(t, Tone::sine(62.0).glide(40.0, 0.1), Envelope::perc(0.18))
            .velocity(v)
            .filter(FilterType::LowPass, 180.0, 0.7)
    };
    vec![thump(time, velocity), thump(time + 0.25, velocity * 0.7)]
}

/// Bright sine chime
pub fn chime(time: f64, frequency: f32, velocity: f32) -> NoteEvent {
    NoteEvent::new(time, Tone::sine(frequency), Envelope::new(0.002, 1.6, 0.0, 0.05))
        .velocity(velocity)
}

/// Breathy sine lead with a slow swell
pub fn flute(time: f64, frequency: f32, duration: f64, velocity: f32) -> Vec<NoteEvent> {
    vec![
        NoteEvent::new(time, Tone::sine(frequency), Envelope::new(0.15, 0.1, 0.8, 0.4))
            .duration(duration)
            .velocity(velocity),
        NoteEvent::new(time, Tone::noise(NoiseColor::White), Envelope::new(0.1, 0.2, 0.2, 0.3))
            .duration(duration)
            .velocity(velocity * 0.15)
            .filter(FilterType::BandPass, frequency * 2.0, 2.0),
    ]
}
