//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;
use std::rc::Rc;

use anyhow::{bail, Context};
use tracing::{info, warn};

use crate::config::AmbienteConfig;
use crate::engine::buffer::linear_to_db;
use crate::engine::{
    AudioBuffer, ChannelLayout, DefaultContextFactory, Domain, ManualClock, SystemClock,
};
use crate::error::AmbienteError;
use crate::orchestrator::Orchestrator;

/// Host step of the simulator (one sequencer tick)
pub const SIM_STEP_SECS: f64 = 0.025;

/// Options of the `simulate` command
#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub domain: String,
    pub seconds: f64,
    pub toggles: Vec<String>,
    pub speak_at: Option<f64>,
    pub speak_for: f64,
    pub eq: Option<(f32, f32, f32)>,
}

/// Per-second meter line
#[derive(Debug, Clone, Copy, Default)]
struct Meter {
    peak: f32,
    sum_squares: f64,
    samples: usize,
}

impl Meter {
    fn add(&mut self, buffer: &AudioBuffer) {
        self.peak = self.peak.max(buffer.peak());
        for channel in &buffer.samples {
            self.sum_squares += channel.iter().map(|s| (*s as f64).powi(2)).sum::<f64>();
            self.samples += channel.len();
        }
    }

    fn rms(&self) -> f32 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.sum_squares / self.samples as f64).sqrt() as f32
    }
}

/// Load `path`, or the defaults when no file is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<AmbienteConfig> {
    match path {
        Some(path) => AmbienteConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(AmbienteConfig::default()),
    }
}

/// Print every domain with its engine, buses and layers.
pub fn list_domains(config: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let orchestrator = Orchestrator::new(
        &config,
        Rc::new(SystemClock::new()),
        Rc::new(DefaultContextFactory),
    )?;

    for domain in Domain::ALL {
        let id = config.route(domain);
        let engine = orchestrator.engines().get(id);
        let enabled = engine.snapshot().enabled_layers;
        let layers: Vec<String> = engine
            .layer_names()
            .into_iter()
            .map(|name| {
                if enabled.contains(&name) {
                    format!("{}*", name)
                } else {
                    name.to_string()
                }
            })
            .collect();

        println!("{:<13} -> {}", domain.as_str(), id);
        println!("    buses:  {}", engine.stem_names().join(", "));
        println!("    layers: {}", layers.join(", "));
    }
    Ok(())
}

/// Drive an orchestrator with a manual clock and print meters.
pub fn simulate(config: Option<&Path>, options: &SimulateOptions) -> anyhow::Result<()> {
    let config = load_config(config)?;
    let domain: Domain = options.domain.parse()?;
    if !(options.seconds.is_finite() && options.seconds > 0.0) {
        bail!("--seconds must be positive, got {}", options.seconds);
    }

    let clock = Rc::new(ManualClock::new());
    let mut orchestrator =
        Orchestrator::new(&config, clock.clone(), Rc::new(DefaultContextFactory))?;

    info!(%domain, seconds = options.seconds, "starting simulation");
    orchestrator.on_user_gesture();
    orchestrator.on_domain_change(domain);

    if let Some(engine) = orchestrator.active_engine_mut() {
        for key in &options.toggles {
            match engine.toggle_layer(key) {
                Some(on) => info!(layer = %key, on, "layer toggled"),
                None => {
                    return Err(AmbienteError::UnknownLayer {
                        engine: engine.id().to_string(),
                        key: key.clone(),
                    }
                    .into())
                }
            }
        }
    }

    let frames = (config.sample_rate as f64 * SIM_STEP_SECS).round() as usize;
    let mut buffer =
        AudioBuffer::with_sample_rate(frames, ChannelLayout::Stereo, config.sample_rate);
    let steps = (options.seconds / SIM_STEP_SECS).round() as u64;
    let steps_per_second = (1.0 / SIM_STEP_SECS).round() as u64;
    let speak_end = options.speak_at.map(|at| at + options.speak_for.max(0.0));
    let mut speaking = false;
    let mut eq_applied = false;
    let mut meter = Meter::default();

    for step in 1..=steps {
        clock.advance(SIM_STEP_SECS);
        let now = step as f64 * SIM_STEP_SECS;

        if let (Some(start), Some(end)) = (options.speak_at, speak_end) {
            let should_speak = now >= start && now < end;
            if should_speak != speaking {
                speaking = should_speak;
                orchestrator.set_speaking(speaking);
            }
        }

        orchestrator.poll();

        if let (Some((bass, mid, treble)), false) = (options.eq, eq_applied) {
            // The graph only exists once the hand-off has fired
            if orchestrator.active_engine().and_then(|e| e.snapshot().context).is_some() {
                orchestrator.mixer_panel().set_global_eq(bass, mid, treble);
                eq_applied = true;
            }
        }

        orchestrator.render(&mut buffer);
        if !buffer.is_finite() {
            warn!(time = now, "non-finite samples in output");
        }
        meter.add(&buffer);

        if step % steps_per_second == 0 || step == steps {
            let snapshot = orchestrator.active_engine().map(|e| e.snapshot());
            let (lifecycle, voices, gain) = snapshot
                .map(|s| (format!("{:?}", s.lifecycle), s.active_voices, s.master_gain))
                .unwrap_or_else(|| ("-".to_string(), 0, 0.0));
            println!(
                "t={:>6.2}s  peak {:>7.1} dBFS  rms {:>7.1} dBFS  gain {:.3}  {:<10} voices {:>2}{}",
                now,
                linear_to_db(meter.peak),
                linear_to_db(meter.rms()),
                gain,
                lifecycle,
                voices,
                if speaking { "  [narration]" } else { "" },
            );
            meter = Meter::default();
        }
    }

    println!("{}", serde_json::to_string_pretty(&orchestrator.snapshot())?);
    Ok(())
}
