//! Engine lifecycle tests
//!
//! Drives whole engines through the shared rig: fades, mute, layer toggles,
//! interaction gating and degraded (no audio) operation.

mod common;

use ambiente::domains::{
    AmbientComposition, Biome, Chakra, GeometryComposition, GeometryEngine, GeometryLayer,
    HealingMode, HomeEngine, MedicineComposition, MedicineEngine, RelationshipComposition,
    RelationshipEngine, TantraComposition, TantraEngine, TarotComposition, TarotEngine,
};
use ambiente::engine::ManualClock;
use ambiente::graph::MAX_VOICES;
use ambiente::instance::{Engine, EngineControl, Lifecycle};
use std::rc::Rc;
use pretty_assertions::assert_eq;
use test_case::test_case;

use common::*;

fn geometry(clock: &Rc<ManualClock>) -> GeometryEngine {
    Engine::new(GeometryComposition::new(), host(clock))
}

// === Scheduler idempotence ===

#[test_case("in" ; "single fade in")]
#[test_case("in in in" ; "repeated fade in")]
#[test_case("in out" ; "in then out")]
#[test_case("in out in" ; "restart during fade out")]
#[test_case("out in out out in in" ; "mixed")]
#[test_case("in out wait in out wait" ; "full cycles")]
fn test_at_most_one_sequencer_timer(script: &str) {
    let clock = clock();
    let mut engine = geometry(&clock);
    engine.resume();

    for op in script.split_whitespace() {
        match op {
            "in" => engine.fade_in(),
            "out" => engine.fade_out(),
            "wait" => {
                run_engine(&clock, &mut engine, 2.5);
            }
            other => panic!("unknown op {}", other),
        }
        assert!(engine.sequencer_timer_count() <= 1);
        for _ in 0..8 {
            run_engine(&clock, &mut engine, STEP_SECS);
            assert!(engine.sequencer_timer_count() <= 1);
        }
    }
}

#[test]
fn test_fade_out_tears_down_timer() {
    let clock = clock();
    let mut engine = geometry(&clock);
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 3.0);
    assert_eq!(engine.lifecycle(), Lifecycle::Active);
    assert_eq!(engine.sequencer_timer_count(), 1);

    engine.fade_out();
    run_engine(&clock, &mut engine, 2.0);
    assert_eq!(engine.lifecycle(), Lifecycle::Idle);
    assert_eq!(engine.sequencer_timer_count(), 0);
    assert_eq!(engine.snapshot().master_gain, 0.0);
}

// === Mute ===

#[test]
fn test_mute_silences_under_interaction() {
    let clock = clock();
    let mut engine = geometry(&clock);
    engine.resume();
    engine.fade_in();
    assert!(run_engine(&clock, &mut engine, 3.0) > 0.0);

    engine.set_mute(true);
    let ramp = engine.profile().mute_ramp_secs;
    run_engine(&clock, &mut engine, ramp + 0.05);

    let mut peak = 0.0_f32;
    for i in 0..80 {
        let x = if i % 2 == 0 { -1.0 } else { 1.0 };
        engine.update_interaction(x, -x);
        engine.update_motion(50.0);
        peak = peak.max(run_engine(&clock, &mut engine, STEP_SECS));
        assert_eq!(engine.snapshot().master_gain, 0.0);
    }
    assert_eq!(peak, 0.0);
}

#[test]
fn test_unmute_restores_nominal_level() {
    let clock = clock();
    let mut engine = geometry(&clock);
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 3.0);
    engine.set_mute(true);
    run_engine(&clock, &mut engine, 0.5);
    engine.set_mute(false);
    run_engine(&clock, &mut engine, 0.5);
    let snapshot = engine.snapshot();
    assert!((snapshot.master_gain - engine.profile().nominal_gain).abs() < 1e-6);
}

// === Layers ===

#[test]
fn test_toggle_is_an_involution_for_every_engine() {
    let clock = clock();
    let mut engines: Vec<Box<dyn EngineControl>> = vec![
        Box::new(HomeEngine::new(AmbientComposition::new(), host(&clock))),
        Box::new(geometry(&clock)),
        Box::new(MedicineEngine::new(MedicineComposition::new(), host(&clock))),
        Box::new(TantraEngine::new(TantraComposition::new(), host(&clock))),
        Box::new(RelationshipEngine::new(RelationshipComposition::new(), host(&clock))),
        Box::new(TarotEngine::new(TarotComposition::new(), host(&clock))),
    ];

    for engine in engines.iter_mut() {
        let before = engine.snapshot().enabled_layers;
        for layer in engine.layer_names() {
            let first = engine.toggle_layer(layer);
            let second = engine.toggle_layer(layer);
            assert_eq!(first.map(|on| !on), second);
            assert_eq!(engine.snapshot().enabled_layers, before);
        }
        assert_eq!(engine.toggle_layer("no-such-layer"), None);
        assert_eq!(engine.snapshot().enabled_layers, before);
    }
}

#[test]
fn test_select_layer_toggles() {
    let clock = clock();
    let mut engine = geometry(&clock);
    assert_eq!(engine.select_layer(GeometryLayer::Arp), Some(true));
    assert_eq!(engine.select_layer(GeometryLayer::Arp), Some(false));
    assert_eq!(engine.select_layer(GeometryLayer::Pulse), Some(false));
}

#[test]
fn test_crown_is_amplifier_not_layer() {
    let clock = clock();
    let mut engine = TantraEngine::new(TantraComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 3.5);
    let layers = engine.snapshot().enabled_layers;
    let nominal = engine.target_gain();

    assert!(engine.activate_chakra(Chakra::Crown));
    assert!(engine.is_amplified());
    assert_eq!(engine.snapshot().enabled_layers, layers);
    assert!((engine.target_gain() - 2.0 * nominal).abs() < 1e-6);

    assert!(engine.activate_chakra(Chakra::Heart));
    assert!(engine.snapshot().enabled_layers.contains(&"heart"));

    assert!(!engine.activate_chakra(Chakra::Crown));
    assert!((engine.target_gain() - nominal).abs() < 1e-6);
}

#[test]
fn test_amplifier_drone_survives_full_pool() {
    let clock = clock();
    let mut engine = TantraEngine::new(TantraComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 1.0);
    engine.set_amplifier(true);
    assert!(engine.amplifier_drone_alive());

    for _ in 0..40 {
        engine.ring_bell(1.0);
    }
    assert_eq!(engine.snapshot().active_voices, MAX_VOICES);
    assert!(engine.is_amplified());
    assert!(engine.amplifier_drone_alive());

    run_engine(&clock, &mut engine, 0.5);
    assert!(engine.amplifier_drone_alive());
}

// === Interaction gating ===

#[test]
fn test_fast_motion_triggers_at_min_interval() {
    let clock = clock();
    let mut engine = geometry(&clock);
    let interval = engine.profile().interaction.min_trigger_interval_ms / 1000.0;
    let mut fired = Vec::new();
    let mut count = engine.gesture_count();

    // Alternate between opposite corners every 5 ms: >20 units per 150 ms
    for i in 0..300 {
        clock.advance(0.005);
        let x = if i % 2 == 0 { 1.0 } else { -1.0 };
        engine.update_interaction(x, x);
        if engine.gesture_count() > count {
            count = engine.gesture_count();
            fired.push(i as f64 * 0.005);
        }
    }

    assert!(fired.len() >= 5);
    for pair in fired.windows(2) {
        assert!(pair[1] - pair[0] >= interval - 1e-9);
    }
}

#[test]
fn test_gestures_play_only_while_audible() {
    let clock = clock();
    let mut engine = geometry(&clock);
    engine.resume();
    engine.trigger_stardust(1.0);
    assert_eq!(engine.snapshot().active_voices, 0);

    engine.fade_in();
    run_engine(&clock, &mut engine, 0.2);
    let before = engine.snapshot().active_voices;
    engine.trigger_stardust(1.0);
    assert_eq!(engine.snapshot().active_voices, before + 5);
}

// === Mode entries ===

#[test]
fn test_mode_entries_never_panic_before_activation() {
    let clock = clock();
    let mut home = HomeEngine::new(AmbientComposition::new(), host(&clock));
    for biome in Biome::ALL {
        home.set_biome(biome);
    }
    home.play_chime(0.7);
    let mut medicine = MedicineEngine::new(MedicineComposition::new(), host(&clock));
    medicine.set_mode(HealingMode::Sleep);
    medicine.strike_bowl(2.0);
    let mut tarot = TarotEngine::new(TarotComposition::new(), host(&clock));
    tarot.card_flip();
    tarot.reveal_card(0.5);
    assert_eq!(tarot.composition().cards_revealed(), 0);
    assert!(tarot.graph().is_none());
}

// === Degraded operation ===

#[test]
fn test_unavailable_audio_is_silent_no_op() {
    let clock = clock();
    let mut engine: GeometryEngine =
        Engine::new(GeometryComposition::new(), unavailable_host(&clock));
    engine.resume();
    engine.fade_in();
    engine.set_mute(true);
    engine.set_voice_ducking(true);
    engine.set_global_eq(1.0, 1.0, 1.0);
    assert!(!engine.set_stem_volume("Base", 0.5));
    engine.update_interaction(0.3, 0.3);
    engine.trigger_stardust(1.0);
    engine.fade_out();
    engine.stop_all();

    assert_eq!(engine.lifecycle(), Lifecycle::Unavailable);
    assert_eq!(run_engine(&clock, &mut engine, 1.0), 0.0);
    assert_eq!(engine.sequencer_timer_count(), 0);
    assert_eq!(engine.snapshot().context, None);
}

#[test]
fn test_stem_volume_matches_bus_names() {
    let clock = clock();
    let mut engine = geometry(&clock);
    assert!(!engine.set_stem_volume("Base", 0.5));
    engine.fade_in();
    assert!(engine.set_stem_volume("Base", 0.5));
    assert!(engine.set_stem_volume("melodia", 0.2));
    assert!(!engine.set_stem_volume("Vocals", 0.2));
    assert_eq!(engine.stem_names(), vec!["Base", "Harmonia", "Melodia"]);
}
