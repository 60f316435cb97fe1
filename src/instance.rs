//! Engine instance
//!
//! `Engine<C>` wraps one composition with everything every engine shares:
//! deferred graph construction, the fade/mute/duck lifecycle, the lookahead
//! tick loop, interaction mapping and metering. Public operations never
//! fail; if no audio context can be acquired the engine turns into a silent
//! no-op.
//!
//! Two clocks are involved. Host time (`HostClock`) fires the cooperative
//! timers; graph time (`AudioContext`) stamps every note and ramp.

use std::rc::Rc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compose::sequencer::TICK_INTERVAL;
use crate::compose::{Composition, EmissionStats, LayerSet, Sequencer, StepContext};
use crate::config::{AmbienteConfig, EngineOverrides, EngineProfile};
use crate::engine::buffer::{DEFAULT_RENDER_QUANTUM, DEFAULT_SAMPLE_RATE};
use crate::engine::{
    AudioBuffer, AudioContext, ContextFactory, ContextState, EngineId, HostClock, TimerQueue,
};
use crate::graph::{EngineGraph, InteractionModulator, NoteEvent, VoiceId};

/// Master gain sits after the limiter, so the ceiling holds only up to unity
const MAX_TARGET_GAIN: f32 = 1.0;

// ============================================================================
// Host
// ============================================================================

/// Shared services every engine is constructed with
#[derive(Clone)]
pub struct EngineHost {
    pub clock: Rc<dyn HostClock>,
    pub factory: Rc<dyn ContextFactory>,
    pub sample_rate: u32,
    pub render_quantum: usize,
    /// Base seed, mixed with each engine's id
    pub seed: u64,
}

impl EngineHost {
    pub fn new(clock: Rc<dyn HostClock>, factory: Rc<dyn ContextFactory>) -> Self {
        Self {
            clock,
            factory,
            sample_rate: DEFAULT_SAMPLE_RATE,
            render_quantum: DEFAULT_RENDER_QUANTUM,
            seed: crate::config::DEFAULT_SEED,
        }
    }

    /// Host using the rates and seed of `config`
    pub fn from_config(
        config: &AmbienteConfig,
        clock: Rc<dyn HostClock>,
        factory: Rc<dyn ContextFactory>,
    ) -> Self {
        Self {
            clock,
            factory,
            sample_rate: config.sample_rate,
            render_quantum: config.render_quantum,
            seed: config.seed,
        }
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Audible state of an engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    #[default]
    Idle,
    FadingIn,
    Active,
    FadingOut,
    /// No audio context could be acquired; every operation is a no-op
    Unavailable,
}

impl Lifecycle {
    /// Whether the engine is on its way to, or at, its nominal level
    pub fn is_audible(&self) -> bool {
        matches!(self, Lifecycle::FadingIn | Lifecycle::Active)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineTimer {
    SequencerTick,
    FadeInComplete,
    FadeOutComplete,
}

/// Serializable view of an engine for metering
#[derive(Debug, Clone, Serialize)]
pub struct EngineSnapshot {
    pub engine: EngineId,
    pub lifecycle: Lifecycle,
    pub context: Option<ContextState>,
    pub graph_time: f64,
    pub muted: bool,
    pub ducked: bool,
    pub amplified: bool,
    pub master_gain: f32,
    pub target_gain: f32,
    pub tempo_bpm: f64,
    pub enabled_layers: Vec<&'static str>,
    pub chord_index: Option<usize>,
    pub bar: u64,
    pub step: u32,
    pub active_voices: usize,
    pub emissions: EmissionStats,
    pub last_peak: f32,
}

// ============================================================================
// Engine
// ============================================================================

/// One domain's audio engine
pub struct Engine<C: Composition> {
    composition: C,
    profile: EngineProfile,
    host: EngineHost,
    context: Option<AudioContext>,
    graph: Option<EngineGraph>,
    sequencer: Sequencer,
    layers: LayerSet,
    modulator: InteractionModulator,
    timers: TimerQueue<EngineTimer>,
    rng: StdRng,
    lifecycle: Lifecycle,
    muted: bool,
    ducked: bool,
    amplified: bool,
    amplifier_voice: Option<VoiceId>,
    resume_requested: bool,
    stats: EmissionStats,
}

impl<C: Composition> Engine<C> {
    /// Construct with the composition's default profile
    ///
    /// Cheap: no audio resources are acquired until the first fade-in.
    pub fn new(composition: C, host: EngineHost) -> Self {
        let seed = host.seed ^ composition.engine_id().seed_salt();
        Self::with_overrides(composition, host, &EngineOverrides::default(), seed)
    }

    /// Construct with configuration overrides and an explicit seed
    ///
    /// Overrides that leave the profile invalid are rejected with a warning
    /// and the default profile is kept.
    pub fn with_overrides(
        composition: C,
        host: EngineHost,
        overrides: &EngineOverrides,
        seed: u64,
    ) -> Self {
        let id = composition.engine_id();
        let defaults = composition.profile();
        let mut profile = defaults.clone();
        overrides.apply(&mut profile);
        if let Err(err) = profile.validate(id) {
            warn!(engine = %id, error = %err, "ignoring engine overrides");
            profile = defaults;
        }

        Self {
            layers: LayerSet::new(composition.layers()),
            sequencer: Sequencer::new(profile.tempo_bpm),
            modulator: InteractionModulator::new(profile.interaction.clone()),
            timers: TimerQueue::new(),
            rng: StdRng::seed_from_u64(seed),
            lifecycle: Lifecycle::Idle,
            muted: false,
            ducked: false,
            amplified: false,
            amplifier_voice: None,
            resume_requested: false,
            stats: EmissionStats::default(),
            context: None,
            graph: None,
            composition,
            profile,
            host,
        }
    }

    pub fn id(&self) -> EngineId {
        self.composition.engine_id()
    }

    pub fn composition(&self) -> &C {
        &self.composition
    }

    pub fn profile(&self) -> &EngineProfile {
        &self.profile
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    pub fn layers(&self) -> &LayerSet {
        &self.layers
    }

    pub fn graph(&self) -> Option<&EngineGraph> {
        self.graph.as_ref()
    }

    pub fn context(&self) -> Option<&AudioContext> {
        self.context.as_ref()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn stats(&self) -> &EmissionStats {
        &self.stats
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_ducked(&self) -> bool {
        self.ducked
    }

    pub fn is_amplified(&self) -> bool {
        self.amplified
    }

    /// Pending sequencer tick timers (0 or 1)
    pub fn sequencer_timer_count(&self) -> usize {
        self.timers.count(EngineTimer::SequencerTick)
    }

    fn graph_time(&self) -> f64 {
        self.context
            .as_ref()
            .map(|c| c.current_time())
            .unwrap_or(0.0)
    }

    fn host_time(&self) -> f64 {
        self.host.clock.now()
    }

    /// Master gain the engine should sit at when audible
    ///
    /// Mute wins over everything; ducking scales the (possibly amplified)
    /// nominal level.
    pub fn target_gain(&self) -> f32 {
        if self.muted {
            return 0.0;
        }
        let mut gain = self.profile.nominal_gain;
        if self.amplified {
            gain *= 2.0;
        }
        if self.ducked {
            gain *= self.profile.duck_ratio;
        }
        gain.min(MAX_TARGET_GAIN)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Acquire the audio context and build the graph (once)
    ///
    /// # Returns
    /// false if the engine is unavailable
    pub fn activate(&mut self) -> bool {
        if self.lifecycle == Lifecycle::Unavailable {
            return false;
        }
        if self.graph.is_some() {
            return true;
        }

        let id = self.id();
        match self.host.factory.create(self.host.sample_rate) {
            Ok(mut context) => {
                if self.resume_requested {
                    context.resume();
                }
                let graph =
                    EngineGraph::new(&self.profile, context.sample_rate(), self.host.render_quantum);
                debug!(engine = %id, sample_rate = context.sample_rate(), "graph built");
                self.graph = Some(graph);
                self.context = Some(context);
                true
            }
            Err(err) => {
                warn!(engine = %id, error = %err, hint = err.recovery_hint(), "audio unavailable, engine stays silent");
                self.lifecycle = Lifecycle::Unavailable;
                false
            }
        }
    }

    /// Start the sequencer and ramp up to the target level
    ///
    /// Idempotent while fading in or active. Builds the graph on first use.
    pub fn fade_in(&mut self) {
        if !self.activate() {
            return;
        }
        if self.lifecycle.is_audible() {
            debug!(engine = %self.id(), "fade-in ignored, already audible");
            return;
        }

        let host_now = self.host_time();
        let now = self.graph_time();
        let fade = self.profile.fade_in_secs;

        self.timers.cancel_kind(EngineTimer::SequencerTick);
        self.timers.cancel_kind(EngineTimer::FadeInComplete);
        self.timers.cancel_kind(EngineTimer::FadeOutComplete);

        self.composition.on_start(&mut self.rng);
        self.sequencer.start(now);
        self.timers.schedule(host_now, EngineTimer::SequencerTick);

        let target = self.target_gain();
        if let Some(graph) = self.graph.as_mut() {
            graph.master_gain_mut().linear_ramp(target, now, fade);
        }
        self.timers
            .schedule(host_now + fade, EngineTimer::FadeInComplete);
        self.lifecycle = Lifecycle::FadingIn;

        if self.amplified {
            self.start_amplifier_drone();
        }
        debug!(engine = %self.id(), target, fade, "fading in");
    }

    /// Ramp down to silence, then stop the sequencer
    ///
    /// Idempotent: ignored unless the engine is fading in or active.
    pub fn fade_out(&mut self) {
        if !self.lifecycle.is_audible() {
            return;
        }
        let host_now = self.host_time();
        let now = self.graph_time();
        let fade = self.profile.fade_out_secs;

        if let Some(graph) = self.graph.as_mut() {
            graph.master_gain_mut().linear_ramp(0.0, now, fade);
        }
        self.timers.cancel_kind(EngineTimer::FadeInComplete);
        self.timers.cancel_kind(EngineTimer::FadeOutComplete);
        self.timers
            .schedule(host_now + fade, EngineTimer::FadeOutComplete);
        self.lifecycle = Lifecycle::FadingOut;
        debug!(engine = %self.id(), fade, "fading out");
    }

    fn finish_fade_out(&mut self) {
        let now = self.graph_time();
        self.sequencer.stop();
        self.timers.cancel_kind(EngineTimer::SequencerTick);
        if let Some(graph) = self.graph.as_mut() {
            let released = graph.voices_mut().release_sustained(now);
            debug!(released, "sustained voices released");
        }
        self.amplifier_voice = None;
        self.lifecycle = Lifecycle::Idle;
        debug!(engine = %self.id(), "idle");
    }

    /// Hard stop: cancel every timer, drop every voice, gain to zero
    pub fn stop_all(&mut self) {
        if self.lifecycle == Lifecycle::Unavailable {
            return;
        }
        self.timers.clear();
        self.sequencer.stop();
        self.amplifier_voice = None;
        if let Some(graph) = self.graph.as_mut() {
            graph.silence();
            graph.master_gain_mut().set_value(0.0);
        }
        self.lifecycle = Lifecycle::Idle;
        debug!(engine = %self.id(), "stopped");
    }

    /// Let the audio clock run (safe to call repeatedly)
    ///
    /// Before the graph exists the request is remembered and applied on
    /// activation.
    pub fn resume(&mut self) {
        self.resume_requested = true;
        if let Some(context) = self.context.as_mut() {
            if context.resume() {
                info!(engine = %self.id(), "audio clock resumed");
            }
        }
    }

    fn apply_gain_target(&mut self, ramp_secs: f64) {
        let audible = self.lifecycle.is_audible();
        let target = self.target_gain();
        // Silent engines only ever ramp further down
        if !audible && target > 0.0 {
            return;
        }
        let now = self.graph_time();
        if let Some(graph) = self.graph.as_mut() {
            graph.master_gain_mut().linear_ramp(target, now, ramp_secs);
        }
    }

    pub fn set_mute(&mut self, muted: bool) {
        if self.lifecycle == Lifecycle::Unavailable || self.muted == muted {
            return;
        }
        self.muted = muted;
        self.apply_gain_target(self.profile.mute_ramp_secs);
        debug!(engine = %self.id(), muted, "mute");
    }

    /// Lower the level while narration plays; mute still wins
    pub fn set_voice_ducking(&mut self, ducked: bool) {
        if self.lifecycle == Lifecycle::Unavailable || self.ducked == ducked {
            return;
        }
        self.ducked = ducked;
        self.apply_gain_target(self.profile.duck_ramp_secs);
        debug!(engine = %self.id(), ducked, "voice ducking");
    }

    /// Engage the engine-wide amplifier: doubled level plus a low drone
    pub fn set_amplifier(&mut self, on: bool) {
        if self.lifecycle == Lifecycle::Unavailable || self.amplified == on {
            return;
        }
        self.amplified = on;
        self.apply_gain_target(self.profile.duck_ramp_secs);
        if on {
            if self.lifecycle.is_audible() {
                self.start_amplifier_drone();
            }
        } else {
            self.stop_amplifier_drone();
        }
        debug!(engine = %self.id(), on, "amplifier");
    }

    fn start_amplifier_drone(&mut self) {
        if self.amplifier_drone_alive() {
            return;
        }
        let now = self.graph_time();
        if let (Some(graph), Some(mut drone)) =
            (self.graph.as_mut(), self.composition.amplifier_drone(now))
        {
            drone.layer = None;
            self.amplifier_voice = Some(graph.play(drone));
        }
    }

    /// Whether the amplifier drone voice is still sounding
    pub fn amplifier_drone_alive(&self) -> bool {
        match (self.amplifier_voice, self.graph.as_ref()) {
            (Some(id), Some(graph)) => graph.voices().is_active(id),
            _ => false,
        }
    }

    fn stop_amplifier_drone(&mut self) {
        let now = self.graph_time();
        if let (Some(id), Some(graph)) = (self.amplifier_voice.take(), self.graph.as_mut()) {
            graph.voices_mut().release(id, now);
        }
    }

    // ------------------------------------------------------------------------
    // Mixer
    // ------------------------------------------------------------------------

    /// Ramp the mastering EQ; no-op before the graph exists
    pub fn set_global_eq(&mut self, bass: f32, mid: f32, treble: f32) {
        let now = self.graph_time();
        if let Some(graph) = self.graph.as_mut() {
            graph.mastering_mut().set_global_eq(bass, mid, treble, now);
        }
    }

    /// Ramp one bus; unknown names and a missing graph are ignored
    pub fn set_stem_volume(&mut self, bus: &str, volume: f32) -> bool {
        let now = self.graph_time();
        match self.graph.as_mut() {
            Some(graph) => graph.buses_mut().set_stem_volume(bus, volume, now),
            None => false,
        }
    }

    pub fn stem_names(&self) -> Vec<String> {
        self.profile.buses.clone()
    }

    // ------------------------------------------------------------------------
    // Layers and tempo
    // ------------------------------------------------------------------------

    /// Flip one layer; takes effect on the next scheduled step
    pub fn toggle_layer(&mut self, key: &str) -> Option<bool> {
        let state = self.layers.toggle(key);
        match state {
            Some(on) => debug!(engine = %self.id(), layer = key, on, "layer toggled"),
            None => debug!(engine = %self.id(), layer = key, "unknown layer ignored"),
        }
        state
    }

    /// Force one layer on or off
    pub fn set_layer(&mut self, key: &str, on: bool) -> bool {
        self.layers.set(key, on)
    }

    /// Change tempo; only future steps move
    pub fn set_tempo(&mut self, tempo_bpm: f64) {
        self.profile.tempo_bpm = tempo_bpm;
        self.sequencer.set_tempo(tempo_bpm);
    }

    pub(crate) fn composition_mut(&mut self) -> &mut C {
        &mut self.composition
    }

    // ------------------------------------------------------------------------
    // Interaction
    // ------------------------------------------------------------------------

    /// Continuous 2D signal (each axis in [-1, 1]) at UI cadence
    pub fn update_interaction(&mut self, x: f32, y: f32) {
        if self.lifecycle == Lifecycle::Unavailable {
            return;
        }
        let update = self.modulator.update_position(x, y, self.host_time());
        let now = self.graph_time();
        let tau = self.modulator.config().smoothing;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_pan(update.targets.pan, now, tau);
            graph.set_cutoff(update.targets.cutoff_hz, now, tau);
            graph.set_feedback(update.targets.feedback, now, tau);
        }
        if let Some(intensity) = update.trigger {
            self.gesture(intensity);
        }
    }

    /// Scalar motion velocity (e.g. device shake)
    pub fn update_motion(&mut self, velocity: f32) {
        if self.lifecycle == Lifecycle::Unavailable {
            return;
        }
        if let Some(intensity) = self.modulator.update_velocity(velocity, self.host_time()) {
            self.gesture(intensity);
        }
    }

    /// Gestures fired so far
    pub fn gesture_count(&self) -> u64 {
        self.modulator.trigger_count()
    }

    fn gesture(&mut self, intensity: f32) {
        if !self.lifecycle.is_audible() || self.muted {
            return;
        }
        let now = self.graph_time();
        let mut events = Vec::new();
        self.composition
            .on_gesture(now, intensity, &mut self.rng, &mut events);
        self.play_events(events);
    }

    /// Build and play a one-shot at the current graph time
    ///
    /// Ignored until the graph exists.
    pub(crate) fn trigger(
        &mut self,
        build: impl FnOnce(&mut C, f64, &mut StdRng) -> Vec<NoteEvent>,
    ) {
        if self.graph.is_none() {
            return;
        }
        let now = self.graph_time();
        let events = build(&mut self.composition, now, &mut self.rng);
        self.play_events(events);
    }

    fn play_events(&mut self, events: Vec<NoteEvent>) {
        let Some(graph) = self.graph.as_mut() else {
            return;
        };
        for event in events {
            if let Some(layer) = event.layer {
                self.stats.record(layer);
            }
            graph.play(event);
        }
    }

    // ------------------------------------------------------------------------
    // Scheduling and rendering
    // ------------------------------------------------------------------------

    /// Fire every due timer
    pub fn poll(&mut self) {
        if self.lifecycle == Lifecycle::Unavailable {
            return;
        }
        let host_now = self.host_time();
        for (_, timer) in self.timers.pop_due(host_now) {
            match timer {
                EngineTimer::SequencerTick => {
                    self.tick();
                    if self.sequencer.is_running() {
                        self.timers
                            .schedule(host_now + TICK_INTERVAL, EngineTimer::SequencerTick);
                    }
                }
                EngineTimer::FadeInComplete => {
                    if self.lifecycle == Lifecycle::FadingIn {
                        self.lifecycle = Lifecycle::Active;
                        debug!(engine = %self.id(), "active");
                    }
                }
                EngineTimer::FadeOutComplete => self.finish_fade_out(),
            }
        }
        // A full pool can still steal the drone; bring it back
        if self.amplified && self.lifecycle.is_audible() && !self.amplifier_drone_alive() {
            self.amplifier_voice = None;
            self.start_amplifier_drone();
        }
    }

    fn tick(&mut self) {
        let now = self.graph_time();
        let steps = self.sequencer.due_steps(now);
        if steps.is_empty() {
            return;
        }
        let mut events = Vec::new();
        for step in steps {
            let mut ctx = StepContext::new(step, &self.layers, &mut self.rng, &mut events);
            self.composition.on_step(&mut ctx);
        }
        self.play_events(events);
    }

    /// Render into `out` (added, not overwritten) and advance the graph clock
    pub fn render(&mut self, out: &mut AudioBuffer) {
        let (Some(context), Some(graph)) = (self.context.as_mut(), self.graph.as_mut()) else {
            return;
        };
        if !context.is_running() {
            return;
        }
        let start = context.current_time();
        let gain = graph.master_gain();
        let silent = self.lifecycle == Lifecycle::Idle
            && graph.voices().active_count() == 0
            && gain.value_at(start) == 0.0
            && !gain.is_automating(start);
        if !silent {
            graph.render(start, out);
        }
        context.advance(out.num_samples());
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let now = self.graph_time();
        EngineSnapshot {
            engine: self.id(),
            lifecycle: self.lifecycle,
            context: self.context.as_ref().map(|c| c.state()),
            graph_time: now,
            muted: self.muted,
            ducked: self.ducked,
            amplified: self.amplified,
            master_gain: self
                .graph
                .as_ref()
                .map(|g| g.master_gain().value_at(now))
                .unwrap_or(0.0),
            target_gain: self.target_gain(),
            tempo_bpm: self.sequencer.tempo(),
            enabled_layers: self.layers.enabled(),
            chord_index: self.composition.chord_index(),
            bar: self.sequencer.bar(),
            step: self.sequencer.step(),
            active_voices: self
                .graph
                .as_ref()
                .map(|g| g.voices().active_count())
                .unwrap_or(0),
            emissions: self.stats.clone(),
            last_peak: self.graph.as_ref().map(|g| g.last_peak()).unwrap_or(0.0),
        }
    }
}

// ============================================================================
// Object-safe control surface
// ============================================================================

/// What the orchestrator and mixer panel need from any engine
pub trait EngineControl {
    fn id(&self) -> EngineId;
    fn lifecycle(&self) -> Lifecycle;
    fn fade_in(&mut self);
    fn fade_out(&mut self);
    fn stop_all(&mut self);
    fn resume(&mut self);
    fn set_mute(&mut self, muted: bool);
    fn set_voice_ducking(&mut self, ducked: bool);
    fn set_global_eq(&mut self, bass: f32, mid: f32, treble: f32);
    fn set_stem_volume(&mut self, bus: &str, volume: f32) -> bool;
    fn stem_names(&self) -> Vec<String>;
    fn layer_names(&self) -> Vec<&'static str>;
    fn toggle_layer(&mut self, key: &str) -> Option<bool>;
    fn update_interaction(&mut self, x: f32, y: f32);
    fn update_motion(&mut self, velocity: f32);
    fn poll(&mut self);
    fn render(&mut self, out: &mut AudioBuffer);
    fn snapshot(&self) -> EngineSnapshot;
    fn sequencer_timer_count(&self) -> usize;
}

impl<C: Composition> EngineControl for Engine<C> {
    fn id(&self) -> EngineId {
        Engine::id(self)
    }

    fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    fn fade_in(&mut self) {
        Engine::fade_in(self)
    }

    fn fade_out(&mut self) {
        Engine::fade_out(self)
    }

    fn stop_all(&mut self) {
        Engine::stop_all(self)
    }

    fn resume(&mut self) {
        Engine::resume(self)
    }

    fn set_mute(&mut self, muted: bool) {
        Engine::set_mute(self, muted)
    }

    fn set_voice_ducking(&mut self, ducked: bool) {
        Engine::set_voice_ducking(self, ducked)
    }

    fn set_global_eq(&mut self, bass: f32, mid: f32, treble: f32) {
        Engine::set_global_eq(self, bass, mid, treble)
    }

    fn set_stem_volume(&mut self, bus: &str, volume: f32) -> bool {
        Engine::set_stem_volume(self, bus, volume)
    }

    fn stem_names(&self) -> Vec<String> {
        Engine::stem_names(self)
    }

    fn layer_names(&self) -> Vec<&'static str> {
        self.layers.names()
    }

    fn toggle_layer(&mut self, key: &str) -> Option<bool> {
        Engine::toggle_layer(self, key)
    }

    fn update_interaction(&mut self, x: f32, y: f32) {
        Engine::update_interaction(self, x, y)
    }

    fn update_motion(&mut self, velocity: f32) {
        Engine::update_motion(self, velocity)
    }

    fn poll(&mut self) {
        Engine::poll(self)
    }

    fn render(&mut self, out: &mut AudioBuffer) {
        Engine::render(self, out)
    }

    fn snapshot(&self) -> EngineSnapshot {
        Engine::snapshot(self)
    }

    fn sequencer_timer_count(&self) -> usize {
        Engine::sequencer_timer_count(self)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::instruments;
    use crate::compose::LayerSpec;
    use crate::engine::{ChannelLayout, DefaultContextFactory, ManualClock, UnavailableContextFactory};
    use approx::assert_relative_eq;

    /// Plucks every beat on "tick", nothing else
    struct Metronome;

    const METRONOME_LAYERS: &[LayerSpec] = &[LayerSpec::on("tick"), LayerSpec::off("tock")];

    impl Composition for Metronome {
        fn engine_id(&self) -> EngineId {
            EngineId::Ambient
        }

        fn profile(&self) -> EngineProfile {
            let mut profile = EngineProfile::new(120.0, 0.25, &["Main", "Texture"]);
            profile.fade_in_secs = 1.0;
            profile.fade_out_secs = 1.5;
            profile
        }

        fn layers(&self) -> &'static [LayerSpec] {
            METRONOME_LAYERS
        }

        fn on_step(&mut self, ctx: &mut StepContext<'_>) {
            if ctx.step.is_beat() {
                let t = ctx.step.time;
                ctx.emit("tick", instruments::pluck(t, 440.0, 0.8));
                ctx.emit("tock", instruments::pluck(t, 220.0, 0.8));
            }
        }

        fn on_gesture(
            &mut self,
            time: f64,
            intensity: f32,
            _rng: &mut StdRng,
            out: &mut Vec<NoteEvent>,
        ) {
            out.push(instruments::chime(time, 880.0, intensity));
        }

        fn amplifier_drone(&self, time: f64) -> Option<NoteEvent> {
            Some(NoteEvent::new(
                time,
                crate::graph::Tone::sine(55.0),
                crate::graph::Envelope::pad(0.5, 1.0),
            ))
        }
    }

    struct Rig {
        clock: Rc<ManualClock>,
        engine: Engine<Metronome>,
    }

    impl Rig {
        fn new() -> Self {
            let clock = Rc::new(ManualClock::new());
            let mut host = EngineHost::new(clock.clone(), Rc::new(DefaultContextFactory));
            host.sample_rate = 16000;
            Self {
                clock,
                engine: Engine::new(Metronome, host),
            }
        }

        /// Advance host and graph time together in 25 ms steps
        fn run(&mut self, secs: f64) -> f32 {
            let mut peak = 0.0_f32;
            let steps = (secs / 0.025).round() as usize;
            for _ in 0..steps {
                self.clock.advance(0.025);
                self.engine.poll();
                let mut out = AudioBuffer::with_sample_rate(400, ChannelLayout::Stereo, 16000);
                self.engine.render(&mut out);
                peak = peak.max(out.peak());
            }
            peak
        }
    }

    #[test]
    fn test_construction_is_lazy() {
        let rig = Rig::new();
        assert!(rig.engine.graph().is_none());
        assert_eq!(rig.engine.lifecycle(), Lifecycle::Idle);
    }

    #[test]
    fn test_controls_before_activation_are_no_ops() {
        let mut rig = Rig::new();
        rig.engine.set_global_eq(1.0, 0.0, 1.0);
        assert!(!rig.engine.set_stem_volume("Main", 0.5));
        rig.engine.fade_out();
        rig.engine.update_interaction(0.5, 0.5);
        assert!(rig.engine.graph().is_none());
    }

    #[test]
    fn test_fade_in_reaches_nominal_gain() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        assert_eq!(rig.engine.lifecycle(), Lifecycle::FadingIn);
        let peak = rig.run(1.5);
        assert_eq!(rig.engine.lifecycle(), Lifecycle::Active);
        assert!(peak > 0.0);
        let snapshot = rig.engine.snapshot();
        assert_relative_eq!(snapshot.master_gain, 0.25, epsilon = 1e-6);
        assert!(snapshot.emissions.count("tick") > 0);
        assert_eq!(snapshot.emissions.count("tock"), 0);
    }

    #[test]
    fn test_fade_in_is_idempotent() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        rig.engine.fade_in();
        rig.run(0.1);
        rig.engine.fade_in();
        assert_eq!(rig.engine.sequencer_timer_count(), 1);
    }

    #[test]
    fn test_fade_out_goes_idle_and_stops_ticking() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        rig.run(1.0);
        rig.engine.fade_out();
        assert_eq!(rig.engine.lifecycle(), Lifecycle::FadingOut);
        rig.run(1.6);
        assert_eq!(rig.engine.lifecycle(), Lifecycle::Idle);
        assert_eq!(rig.engine.sequencer_timer_count(), 0);
        assert_eq!(rig.engine.snapshot().master_gain, 0.0);
    }

    #[test]
    fn test_mute_wins_over_ducking() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        rig.run(1.2);
        rig.engine.set_voice_ducking(true);
        assert_relative_eq!(rig.engine.target_gain(), 0.25 * 0.3, epsilon = 1e-6);
        rig.engine.set_mute(true);
        assert_eq!(rig.engine.target_gain(), 0.0);
        rig.engine.set_voice_ducking(false);
        assert_eq!(rig.engine.target_gain(), 0.0);
        rig.run(0.5);
        assert_eq!(rig.engine.snapshot().master_gain, 0.0);
    }

    #[test]
    fn test_unmute_while_idle_stays_silent() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.activate();
        rig.engine.set_mute(true);
        rig.engine.set_mute(false);
        assert_eq!(rig.run(0.5), 0.0);
    }

    #[test]
    fn test_amplifier_doubles_target() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        rig.run(1.2);
        let voices = rig.engine.snapshot().active_voices;
        rig.engine.set_amplifier(true);
        assert_relative_eq!(rig.engine.target_gain(), 0.5, epsilon = 1e-6);
        assert!(rig.engine.snapshot().active_voices > voices);
        rig.engine.set_amplifier(false);
        assert_relative_eq!(rig.engine.target_gain(), 0.25, epsilon = 1e-6);
    }

    #[test]
    fn test_unavailable_context_degrades_to_no_op() {
        let clock = Rc::new(ManualClock::new());
        let host = EngineHost::new(clock, Rc::new(UnavailableContextFactory::new("no device")));
        let mut engine = Engine::new(Metronome, host);
        engine.fade_in();
        assert_eq!(engine.lifecycle(), Lifecycle::Unavailable);
        engine.set_mute(true);
        engine.update_interaction(1.0, 1.0);
        engine.poll();
        let mut out = AudioBuffer::with_sample_rate(64, ChannelLayout::Stereo, 16000);
        engine.render(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(engine.sequencer_timer_count(), 0);
    }

    #[test]
    fn test_suspended_context_renders_nothing() {
        let mut rig = Rig::new();
        rig.engine.fade_in();
        assert_eq!(rig.run(1.0), 0.0);
        assert_eq!(rig.engine.snapshot().graph_time, 0.0);
        rig.engine.resume();
        assert!(rig.run(1.0) > 0.0);
    }

    #[test]
    fn test_gestures_only_when_audible() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.activate();
        rig.engine.update_motion(10.0);
        assert_eq!(rig.engine.snapshot().active_voices, 0);
        rig.engine.fade_in();
        rig.clock.advance(0.2);
        rig.engine.update_motion(10.0);
        assert!(rig.engine.snapshot().active_voices > 0);
    }

    #[test]
    fn test_stop_all_clears_everything() {
        let mut rig = Rig::new();
        rig.engine.resume();
        rig.engine.fade_in();
        rig.run(0.5);
        rig.engine.stop_all();
        let snapshot = rig.engine.snapshot();
        assert_eq!(snapshot.active_voices, 0);
        assert_eq!(snapshot.master_gain, 0.0);
        assert_eq!(rig.engine.sequencer_timer_count(), 0);
        assert_eq!(rig.engine.lifecycle(), Lifecycle::Idle);
    }
}
