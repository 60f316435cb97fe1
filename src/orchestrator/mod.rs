//! Orchestrator
//!
//! Owns the six engines and keeps exactly one of them audible. A domain
//! switch fades every other engine out at once and fades the target in
//! after a short hand-off delay, so the two fades overlap into a crossfade.
//! Narration state arrives over the `NarrationBus` and ducks whichever
//! engine is active.

pub mod mixer_panel;
pub mod narration;

pub use mixer_panel::MixerPanel;
pub use narration::NarrationBus;

use std::rc::Rc;
use std::sync::mpsc::Receiver;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AmbienteConfig;
use crate::domains::{
    AmbientComposition, GeometryComposition, GeometryEngine, HomeEngine, MedicineComposition,
    MedicineEngine, RelationshipComposition, RelationshipEngine, TantraComposition, TantraEngine,
    TarotComposition, TarotEngine,
};
use crate::engine::{AudioBuffer, ContextFactory, Domain, EngineId, HostClock, TimerId, TimerQueue};
use crate::error::Result;
use crate::instance::{Engine, EngineControl, EngineHost, EngineSnapshot};

// ============================================================================
// Engine set
// ============================================================================

/// One instance of every engine, with typed access for domain triggers
pub struct Engines {
    pub home: HomeEngine,
    pub geometry: GeometryEngine,
    pub medicine: MedicineEngine,
    pub tantra: TantraEngine,
    pub relationship: RelationshipEngine,
    pub tarot: TarotEngine,
}

impl Engines {
    /// Construct every engine (cheap; no audio resources yet)
    pub fn new(config: &AmbienteConfig, host: &EngineHost) -> Self {
        fn build<C: crate::compose::Composition>(
            composition: C,
            config: &AmbienteConfig,
            host: &EngineHost,
        ) -> Engine<C> {
            let id = composition.engine_id();
            Engine::with_overrides(
                composition,
                host.clone(),
                &config.overrides_for(id),
                config.seed_for(id),
            )
        }

        Self {
            home: build(AmbientComposition::new(), config, host),
            geometry: build(GeometryComposition::new(), config, host),
            medicine: build(MedicineComposition::new(), config, host),
            tantra: build(TantraComposition::new(), config, host),
            relationship: build(RelationshipComposition::new(), config, host),
            tarot: build(TarotComposition::new(), config, host),
        }
    }

    pub fn get(&self, id: EngineId) -> &dyn EngineControl {
        match id {
            EngineId::Ambient => &self.home,
            EngineId::Geometry => &self.geometry,
            EngineId::Medicine => &self.medicine,
            EngineId::Tantra => &self.tantra,
            EngineId::Relationship => &self.relationship,
            EngineId::Tarot => &self.tarot,
        }
    }

    pub fn get_mut(&mut self, id: EngineId) -> &mut dyn EngineControl {
        match id {
            EngineId::Ambient => &mut self.home,
            EngineId::Geometry => &mut self.geometry,
            EngineId::Medicine => &mut self.medicine,
            EngineId::Tantra => &mut self.tantra,
            EngineId::Relationship => &mut self.relationship,
            EngineId::Tarot => &mut self.tarot,
        }
    }

    /// Every engine, in `EngineId::ALL` order
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut dyn EngineControl> {
        let all: [&mut dyn EngineControl; 6] = [
            &mut self.home,
            &mut self.geometry,
            &mut self.medicine,
            &mut self.tantra,
            &mut self.relationship,
            &mut self.tarot,
        ];
        all.into_iter()
    }
}

// ============================================================================
// Orchestrator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OrchestratorTimer {
    HandOff(EngineId),
}

/// Serializable view of the whole subsystem
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorSnapshot {
    pub active_domain: Option<Domain>,
    pub active_engine: Option<EngineId>,
    pub speaking: bool,
    pub resumed: bool,
    pub engines: Vec<EngineSnapshot>,
}

pub struct Orchestrator {
    config: AmbienteConfig,
    clock: Rc<dyn HostClock>,
    engines: Engines,
    timers: TimerQueue<OrchestratorTimer>,
    handoff: Option<TimerId>,
    narration: NarrationBus,
    narration_rx: Receiver<bool>,
    speaking: bool,
    active_domain: Option<Domain>,
    active: Option<EngineId>,
    resumed: bool,
}

impl Orchestrator {
    /// Validate `config` and construct every engine
    ///
    /// # Example
    /// ```ignore
    /// let clock = Rc::new(SystemClock::new());
    /// let mut orchestrator =
    ///     Orchestrator::new(&AmbienteConfig::default(), clock, Rc::new(DefaultContextFactory))?;
    /// orchestrator.on_user_gesture();
    /// orchestrator.on_domain_change(Domain::Tarot);
    /// ```
    pub fn new(
        config: &AmbienteConfig,
        clock: Rc<dyn HostClock>,
        factory: Rc<dyn ContextFactory>,
    ) -> Result<Self> {
        config.validate()?;
        let host = EngineHost::from_config(config, clock.clone(), factory);
        let mut narration = NarrationBus::new();
        let narration_rx = narration.subscribe();

        Ok(Self {
            engines: Engines::new(config, &host),
            config: config.clone(),
            clock,
            timers: TimerQueue::new(),
            handoff: None,
            narration,
            narration_rx,
            speaking: false,
            active_domain: None,
            active: None,
            resumed: false,
        })
    }

    pub fn config(&self) -> &AmbienteConfig {
        &self.config
    }

    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    /// Typed access for domain-specific triggers and mode entries
    pub fn engines_mut(&mut self) -> &mut Engines {
        &mut self.engines
    }

    pub fn active_domain(&self) -> Option<Domain> {
        self.active_domain
    }

    /// Engine the current domain routes to
    pub fn active_engine_id(&self) -> Option<EngineId> {
        self.active
    }

    pub fn active_engine(&self) -> Option<&dyn EngineControl> {
        self.active.map(|id| self.engines.get(id))
    }

    pub fn active_engine_mut(&mut self) -> Option<&mut dyn EngineControl> {
        match self.active {
            Some(id) => Some(self.engines.get_mut(id)),
            None => None,
        }
    }

    /// Target and host due time of the pending hand-off, if any
    pub fn pending_handoff(&self) -> Option<(EngineId, f64)> {
        let id = self.handoff?;
        let due = self.timers.due_time(id)?;
        self.active.map(|engine| (engine, due))
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    pub fn mixer_panel(&mut self) -> MixerPanel<'_> {
        MixerPanel::new(self)
    }

    /// Switch the audible domain
    ///
    /// Every engine except the target starts fading out immediately; the
    /// target fades in after the hand-off delay.
    pub fn on_domain_change(&mut self, domain: Domain) {
        let target = self.config.route(domain);
        info!(domain = %domain, engine = %target, "domain change");

        for engine in self.engines.iter_mut() {
            if engine.id() != target {
                engine.fade_out();
            }
        }

        if let Some(id) = self.handoff.take() {
            self.timers.cancel(id);
        }
        let due = self.clock.now() + self.config.handoff_delay_secs();
        self.handoff = Some(self.timers.schedule(due, OrchestratorTimer::HandOff(target)));
        self.active_domain = Some(domain);
        self.active = Some(target);
    }

    /// Switch by domain tag (e.g. "marketing")
    pub fn on_domain_tag(&mut self, tag: &str) -> Result<()> {
        let domain: Domain = tag.parse()?;
        self.on_domain_change(domain);
        Ok(())
    }

    /// First user gesture anywhere: resume every engine's audio clock
    ///
    /// # Returns
    /// true the first time, false on every later call
    pub fn on_user_gesture(&mut self) -> bool {
        if self.resumed {
            return false;
        }
        self.resumed = true;
        for engine in self.engines.iter_mut() {
            engine.resume();
        }
        info!("first user gesture, audio clocks resumed");
        true
    }

    /// New receiver of narration speaking-state changes
    pub fn subscribe_narration(&mut self) -> Receiver<bool> {
        self.narration.subscribe()
    }

    /// Publish a narration state change (delivered on the next `poll`)
    pub fn set_speaking(&mut self, speaking: bool) {
        self.narration.publish(speaking);
    }

    fn drain_narration(&mut self) {
        let mut changed = None;
        while let Ok(speaking) = self.narration_rx.try_recv() {
            changed = Some(speaking);
        }
        if let Some(speaking) = changed {
            self.speaking = speaking;
            debug!(speaking, "narration state");
            if let Some(engine) = self.active_engine_mut() {
                engine.set_voice_ducking(speaking);
            }
        }
    }

    /// Deliver narration, fire due hand-offs, then poll every engine
    pub fn poll(&mut self) {
        self.drain_narration();

        let now = self.clock.now();
        for (id, timer) in self.timers.pop_due(now) {
            match timer {
                OrchestratorTimer::HandOff(target) => {
                    if self.handoff == Some(id) {
                        self.handoff = None;
                    }
                    let speaking = self.speaking;
                    let engine = self.engines.get_mut(target);
                    engine.set_voice_ducking(speaking);
                    engine.fade_in();
                    debug!(engine = %target, "hand-off");
                }
            }
        }

        for engine in self.engines.iter_mut() {
            engine.poll();
        }
    }

    /// Sum every engine into `out`
    pub fn render(&mut self, out: &mut AudioBuffer) {
        out.clear();
        for engine in self.engines.iter_mut() {
            engine.render(out);
        }
    }

    /// Hard stop of every engine and any pending hand-off
    pub fn stop_all(&mut self) {
        self.timers.clear();
        self.handoff = None;
        for engine in self.engines.iter_mut() {
            engine.stop_all();
        }
    }

    pub fn snapshot(&self) -> OrchestratorSnapshot {
        OrchestratorSnapshot {
            active_domain: self.active_domain,
            active_engine: self.active,
            speaking: self.speaking,
            resumed: self.resumed,
            engines: EngineId::ALL
                .iter()
                .map(|id| self.engines.get(*id).snapshot())
                .collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
