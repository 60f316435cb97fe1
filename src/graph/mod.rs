//! Processing graph
//!
//! One `EngineGraph` per engine: voices feed named buses, one of which (the
//! filtered bus, usually the drone or pad) passes the interaction low-pass.
//! The bus mixdown is panned, picks up the delay and reverb returns, and
//! finally runs through the mastering chain.
//!
//! ```text
//! voices → buses ─ filtered bus → low-pass ─┐
//!                └ other buses ─────────────┴→ mixdown → pan ─┬──────────────┐
//!                                                            ├→ delay send ─┤
//!                                                            └→ reverb send ┴→ mastering → out
//! ```

pub mod bus;
pub mod interaction;
pub mod mastering;
pub mod source;
pub mod voices;

pub use bus::BusMixer;
pub use interaction::{InteractionModulator, InteractionUpdate, ModulationTargets};
pub use mastering::MasteringChain;
pub use source::{Envelope, FilterSpec, NoiseColor, NoteEvent, Tone, Voice, Waveform};
pub use voices::{VoiceId, VoicePool, MAX_VOICES};

use crate::config::EngineProfile;
use crate::dsp::{
    AudioParam, BiquadCoeffs, BiquadState, Effect, FeedbackDelay, FilterType, Reverb,
    ReverbParams, COEFF_REFRESH_FRAMES,
};
use crate::engine::{AudioBuffer, ChannelLayout};

/// Q of the interaction low-pass (Butterworth)
const CUTOFF_Q: f64 = 0.707;

/// Cutoff range of the interaction low-pass (Hz)
const MIN_CUTOFF_HZ: f32 = 20.0;
const MAX_CUTOFF_HZ: f32 = 20000.0;

/// Per-engine processing graph
#[derive(Debug, Clone)]
pub struct EngineGraph {
    sample_rate: u32,
    quantum: usize,
    voices: VoicePool,
    buses: BusMixer,
    mastering: MasteringChain,
    pan: AudioParam,
    cutoff: AudioParam,
    lowpass: [BiquadState; 2],
    lowpass_coeffs: BiquadCoeffs,
    lowpass_cutoff: f32,
    filtered_bus: usize,
    delay: FeedbackDelay,
    reverb: Reverb,
    delay_send: f32,
    reverb_send: f32,
    mix: AudioBuffer,
    scratch: AudioBuffer,
    last_peak: f32,
}

impl EngineGraph {
    /// Build the graph for `profile`
    ///
    /// # Arguments
    /// * `profile` - Bus names, mastering coefficients and send levels
    /// * `sample_rate` - Graph sample rate (Hz)
    /// * `quantum` - Frames processed per internal step
    pub fn new(profile: &EngineProfile, sample_rate: u32, quantum: usize) -> Self {
        let sr = sample_rate as f64;
        let sends = &profile.sends;

        let mut delay = FeedbackDelay::new(sends.delay_time_ms, sends.delay_feedback);
        delay.prepare(sr);
        let mut reverb = Reverb::new(ReverbParams {
            room_size: sends.reverb_room_size,
            damping: sends.reverb_damping,
            ..Default::default()
        });
        reverb.prepare(sr);

        let quantum = quantum.max(1);
        let interaction = &profile.interaction;
        let open_cutoff = interaction.cutoff_max_hz.clamp(MIN_CUTOFF_HZ, MAX_CUTOFF_HZ);

        let mut graph = Self {
            sample_rate,
            quantum,
            voices: VoicePool::new(sr),
            buses: BusMixer::new(&profile.buses, sample_rate),
            mastering: MasteringChain::new(&profile.mastering, sr),
            pan: AudioParam::new(0.0, -1.0, 1.0),
            cutoff: AudioParam::new(open_cutoff, MIN_CUTOFF_HZ, MAX_CUTOFF_HZ),
            lowpass: [BiquadState::default(); 2],
            lowpass_coeffs: BiquadCoeffs::bypass(),
            lowpass_cutoff: f32::NAN,
            filtered_bus: interaction.filtered_bus,
            delay,
            reverb,
            delay_send: sends.delay_send.clamp(0.0, 1.0),
            reverb_send: sends.reverb_send.clamp(0.0, 1.0),
            mix: AudioBuffer::with_sample_rate(quantum, ChannelLayout::Stereo, sample_rate),
            scratch: AudioBuffer::with_sample_rate(quantum, ChannelLayout::Stereo, sample_rate),
            last_peak: 0.0,
        };
        graph.refresh_lowpass(open_cutoff);
        graph
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn voices(&self) -> &VoicePool {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut VoicePool {
        &mut self.voices
    }

    pub fn buses(&self) -> &BusMixer {
        &self.buses
    }

    pub fn buses_mut(&mut self) -> &mut BusMixer {
        &mut self.buses
    }

    pub fn mastering(&self) -> &MasteringChain {
        &self.mastering
    }

    pub fn mastering_mut(&mut self) -> &mut MasteringChain {
        &mut self.mastering
    }

    /// The master gain automation
    pub fn master_gain(&self) -> &AudioParam {
        self.mastering.master_gain().param()
    }

    pub fn master_gain_mut(&mut self) -> &mut AudioParam {
        self.mastering.master_gain_mut().param_mut()
    }

    pub fn pan(&self) -> &AudioParam {
        &self.pan
    }

    pub fn cutoff(&self) -> &AudioParam {
        &self.cutoff
    }

    pub fn delay(&self) -> &FeedbackDelay {
        &self.delay
    }

    /// Peak of the last rendered quantum after mastering (linear)
    pub fn last_peak(&self) -> f32 {
        self.last_peak
    }

    /// Smoothly move the stereo balance
    pub fn set_pan(&mut self, pan: f32, now: f64, time_constant: f64) {
        self.pan.set_target(pan, now, time_constant);
    }

    /// Smoothly move the low-pass cutoff of the filtered bus
    pub fn set_cutoff(&mut self, cutoff_hz: f32, now: f64, time_constant: f64) {
        self.cutoff.set_target(cutoff_hz, now, time_constant);
    }

    /// Smoothly move the delay feedback
    pub fn set_feedback(&mut self, feedback: f32, now: f64, time_constant: f64) {
        self.delay.feedback_mut().set_target(feedback, now, time_constant);
    }

    /// Start a voice for `event`
    pub fn play(&mut self, event: NoteEvent) -> VoiceId {
        self.voices.start(event)
    }

    /// Drop every voice and clear effect tails
    pub fn silence(&mut self) {
        self.voices.clear();
        self.delay.reset();
        self.reverb.reset();
        self.mastering.reset();
        for state in &mut self.lowpass {
            state.reset();
        }
    }

    fn refresh_lowpass(&mut self, cutoff: f32) {
        if (cutoff - self.lowpass_cutoff).abs() < 0.5 {
            return;
        }
        self.lowpass_coeffs = BiquadCoeffs::calculate(
            FilterType::LowPass,
            self.sample_rate as f64,
            cutoff as f64,
            0.0,
            CUTOFF_Q,
        );
        self.lowpass_cutoff = cutoff;
    }

    /// Render `out.num_samples()` frames starting at graph time `start_time`
    /// and add them into `out`
    pub fn render(&mut self, start_time: f64, out: &mut AudioBuffer) {
        let total = out.num_samples();
        let sr = self.sample_rate as f64;
        let mut offset = 0;
        let mut peak = 0.0_f32;

        while offset < total {
            let frames = self.quantum.min(total - offset);
            let t0 = start_time + offset as f64 / sr;
            self.render_quantum(t0, frames);
            peak = peak.max(self.mix.peak());
            out.mix_from(&self.mix, offset, 1.0);
            offset += frames;
        }
        self.last_peak = peak;
    }

    fn render_quantum(&mut self, t0: f64, frames: usize) {
        let sr = self.sample_rate as f64;

        self.buses.clear(frames);
        self.voices.render(t0, frames, self.buses.buffers_mut());

        // Interaction low-pass on the filtered bus only
        let mut block_start = 0;
        while block_start < frames {
            let block_end = (block_start + COEFF_REFRESH_FRAMES).min(frames);
            let cutoff = self.cutoff.value_at(t0 + block_start as f64 / sr);
            self.refresh_lowpass(cutoff);
            if let Some(bus) = self.buses.buffers_mut().get_mut(self.filtered_bus) {
                for (channel, state) in bus.samples.iter_mut().zip(self.lowpass.iter_mut()) {
                    for sample in &mut channel[block_start..block_end] {
                        *sample = state.process(*sample as f64, &self.lowpass_coeffs) as f32;
                    }
                }
            }
            block_start = block_end;
        }

        if self.mix.num_samples() != frames {
            self.mix.reset_len(frames);
            self.scratch.reset_len(frames);
        }
        self.buses.mixdown(t0, &mut self.mix);

        // Balance
        if let Some((left, right)) = self.mix.stereo_mut() {
            for i in 0..frames {
                let p = self.pan.value_at(t0 + i as f64 / sr);
                left[i] *= (1.0 - p).min(1.0);
                right[i] *= (1.0 + p).min(1.0);
            }
        }

        // Sends return into the mix
        if self.delay_send > 0.0 {
            self.scratch.copy_from(&self.mix);
            self.delay.process(&mut self.scratch, t0);
            self.mix.mix_from(&self.scratch, 0, self.delay_send);
        }
        if self.reverb_send > 0.0 {
            self.scratch.copy_from(&self.mix);
            self.reverb.process(&mut self.scratch, t0);
            self.mix.mix_from(&self.scratch, 0, self.reverb_send);
        }

        self.mastering.process(&mut self.mix, t0);
    }
}

// ============================================================================
// Tests
// ============================================================================
