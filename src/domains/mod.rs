//! Domain compositions
//!
//! One `Composition` per engine plus the typed entry points (mode switches
//! and one-shots) each engine exposes on top of the shared `Engine<C>`
//! surface.

pub mod geometry;
pub mod home;
pub mod medicine;
pub mod relationship;
pub mod tantra;
pub mod tarot;

pub use geometry::{GeometryComposition, GeometryLayer};
pub use home::{AmbientComposition, Biome};
pub use medicine::{HealingMode, MedicineComposition};
pub use relationship::{Mood, RelationshipComposition};
pub use tantra::{Chakra, TantraComposition};
pub use tarot::{Arcana, TarotComposition};

use crate::graph::NoteEvent;
use crate::instance::Engine;

pub type HomeEngine = Engine<AmbientComposition>;
pub type GeometryEngine = Engine<GeometryComposition>;
pub type MedicineEngine = Engine<MedicineComposition>;
pub type TantraEngine = Engine<TantraComposition>;
pub type RelationshipEngine = Engine<RelationshipComposition>;
pub type TarotEngine = Engine<TarotComposition>;

/// Send every event in `events` to `bus`
pub(crate) fn routed(events: Vec<NoteEvent>, bus: usize) -> Vec<NoteEvent> {
    events.into_iter().map(|e| e.bus(bus)).collect()
}

/// Clamp a one-shot intensity to the audible range
pub(crate) fn intensity(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
