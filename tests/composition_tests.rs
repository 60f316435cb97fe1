//! Composition tests
//!
//! Layer gating, chord movement and one-shots observed through running
//! engines rather than bare compositions.

mod common;

use ambiente::compose::{AdvanceRule, ChordProgression, Scale};
use ambiente::domains::geometry::is_drop_bar;
use ambiente::domains::{
    Arcana, GeometryComposition, GeometryEngine, Mood, RelationshipComposition,
    RelationshipEngine, TarotComposition, TarotEngine,
};
use ambiente::instance::Engine;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;

use common::*;

/// Seconds until the sequencer has scheduled `steps` steps at `tempo_bpm`
fn secs_for_steps(steps: u32, tempo_bpm: f64) -> f64 {
    0.05 + steps as f64 * 60.0 / tempo_bpm / 4.0
}

#[test]
fn test_disabled_layer_stays_silent_for_96_steps() {
    let clock = clock();
    let mut engine: GeometryEngine = Engine::new(GeometryComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    assert!(!engine.layers().is_enabled("pad"));

    run_engine(&clock, &mut engine, secs_for_steps(96, 118.0));
    let snapshot = engine.snapshot();
    assert!(snapshot.bar >= 6);
    assert_eq!(engine.stats().count("pad"), 0);
    assert!(engine.stats().count("pulse") > 0);
    assert!(engine.stats().count("bass") > 0);
}

#[test]
fn test_layer_toggle_applies_to_next_steps() {
    let clock = clock();
    let mut engine: GeometryEngine = Engine::new(GeometryComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 2.0);

    let hats = engine.stats().count("hats");
    assert!(hats > 0);
    assert_eq!(engine.toggle_layer("hats"), Some(false));
    run_engine(&clock, &mut engine, 2.0);
    assert_eq!(engine.stats().count("hats"), hats);

    assert_eq!(engine.toggle_layer("arp"), Some(true));
    run_engine(&clock, &mut engine, 2.0);
    assert!(engine.stats().count("arp") > 0);
}

#[test]
fn test_geometry_chord_holds_for_a_phrase() {
    let clock = clock();
    let mut engine: GeometryEngine = Engine::new(GeometryComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();

    // Bars 0-7 share the first chord
    run_engine(&clock, &mut engine, secs_for_steps(16 * 7 + 8, 118.0));
    assert_eq!(engine.snapshot().bar, 7);
    assert_eq!(engine.snapshot().chord_index, Some(0));
    assert!(is_drop_bar(engine.snapshot().bar));

    run_engine(&clock, &mut engine, secs_for_steps(16, 118.0));
    assert_eq!(engine.snapshot().chord_index, Some(1));
}

#[test]
fn test_progression_wraps_around() {
    let scale = Scale::new(45, ambiente::compose::harmony::MINOR);
    let mut chords =
        ChordProgression::new(scale.progression(&[0, 5, 2, 6]), AdvanceRule::EveryBars(8));
    let mut rng = StdRng::seed_from_u64(7);
    let mut seen = Vec::new();
    for bar in 0..=32 {
        chords.on_bar(bar, &mut rng);
        if bar % 8 == 0 {
            seen.push(chords.index());
        }
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 0]);
    assert_eq!(chords.current().len(), 3);
}

#[test]
fn test_mood_change_moves_tempo() {
    let clock = clock();
    let mut engine: RelationshipEngine =
        Engine::new(RelationshipComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 1.0);

    engine.set_mood(Mood::Playful);
    assert_eq!(engine.snapshot().tempo_bpm, Mood::Playful.tempo_bpm());
    run_engine(&clock, &mut engine, 1.0);
    assert!(engine.stats().total() > 0);
}

#[test]
fn test_reveal_card_plays_arpeggio() {
    let clock = clock();
    let mut engine: TarotEngine = Engine::new(TarotComposition::new(), host(&clock));
    engine.resume();
    engine.fade_in();
    run_engine(&clock, &mut engine, 0.5);

    let voices = engine.snapshot().active_voices;
    engine.reveal_card(1.0);
    assert_eq!(engine.composition().cards_revealed(), 1);
    assert_eq!(engine.snapshot().active_voices, voices + 6);

    for arcana in Arcana::ALL {
        engine.set_arcana(arcana);
        engine.card_flip();
    }
    assert_eq!(engine.composition().arcana(), Arcana::Pentacles);
    assert!(run_engine(&clock, &mut engine, 1.0) > 0.0);
}
