//! Ambiente - Procedural Ambient Audio Engines
//!
//! Ambiente generates continuous, context-sensitive ambient music for six
//! thematic domains. Each domain has its own engine: a generative
//! composition scheduled ahead of a sample-accurate graph clock, rendered
//! through named buses and a shared mastering chain.
//!
//! # Architecture
//!
//! - `engine`: buffers, the graph clock, the host clock and cooperative timers
//! - `dsp`: automatable parameters and the mastering effects
//! - `graph`: voices, buses, mastering and interaction for one engine
//! - `compose`: layers, harmony, the lookahead sequencer and instruments
//! - `domains`: the six compositions and their trigger APIs
//! - `instance`: the shared engine lifecycle (`Engine<C>`)
//! - `orchestrator`: domain switching, crossfades and narration ducking

pub mod cli;
pub mod compose;
pub mod config;
pub mod domains;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod graph;
pub mod instance;
pub mod orchestrator;

pub use config::AmbienteConfig;
pub use engine::{Domain, EngineId};
pub use error::{AmbienteError, Result};
pub use instance::{Engine, EngineControl, Lifecycle};
pub use orchestrator::Orchestrator;
