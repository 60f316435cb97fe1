//! Shared test rig
//!
//! Advances a manual host clock in sequencer-tick steps and renders the
//! matching number of frames, so host time and graph time move together.

#![allow(dead_code)]

use std::rc::Rc;

use ambiente::engine::{
    AudioBuffer, ChannelLayout, ContextFactory, DefaultContextFactory, ManualClock,
    UnavailableContextFactory,
};
use ambiente::instance::{EngineControl, EngineHost};
use ambiente::{AmbienteConfig, Orchestrator};

pub const SAMPLE_RATE: u32 = 16000;
pub const STEP_SECS: f64 = 0.025;
pub const FRAMES_PER_STEP: usize = 400;

pub fn clock() -> Rc<ManualClock> {
    Rc::new(ManualClock::new())
}

pub fn host(clock: &Rc<ManualClock>) -> EngineHost {
    host_with(clock, Rc::new(DefaultContextFactory))
}

pub fn unavailable_host(clock: &Rc<ManualClock>) -> EngineHost {
    host_with(clock, Rc::new(UnavailableContextFactory::new("test: no audio")))
}

fn host_with(clock: &Rc<ManualClock>, factory: Rc<dyn ContextFactory>) -> EngineHost {
    let mut host = EngineHost::new(clock.clone(), factory);
    host.sample_rate = SAMPLE_RATE;
    host
}

pub fn config() -> AmbienteConfig {
    AmbienteConfig {
        sample_rate: SAMPLE_RATE,
        ..Default::default()
    }
}

pub fn orchestrator(clock: &Rc<ManualClock>) -> Orchestrator {
    Orchestrator::new(&config(), clock.clone(), Rc::new(DefaultContextFactory))
        .expect("default config is valid")
}

pub fn block() -> AudioBuffer {
    AudioBuffer::with_sample_rate(FRAMES_PER_STEP, ChannelLayout::Stereo, SAMPLE_RATE)
}

/// Run one engine for `secs`; returns the output peak
pub fn run_engine(clock: &ManualClock, engine: &mut dyn EngineControl, secs: f64) -> f32 {
    let mut peak = 0.0_f32;
    for _ in 0..steps(secs) {
        clock.advance(STEP_SECS);
        engine.poll();
        let mut out = block();
        engine.render(&mut out);
        assert!(out.is_finite(), "engine produced non-finite samples");
        peak = peak.max(out.peak());
    }
    peak
}

/// Run the orchestrator for `secs`; returns the output peak
pub fn run_orchestrator(clock: &ManualClock, orchestrator: &mut Orchestrator, secs: f64) -> f32 {
    let mut peak = 0.0_f32;
    let mut out = block();
    for _ in 0..steps(secs) {
        clock.advance(STEP_SECS);
        orchestrator.poll();
        orchestrator.render(&mut out);
        assert!(out.is_finite(), "orchestrator produced non-finite samples");
        peak = peak.max(out.peak());
    }
    peak
}

fn steps(secs: f64) -> usize {
    (secs / STEP_SECS).round() as usize
}
