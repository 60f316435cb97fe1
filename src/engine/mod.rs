//! Audio Engine Module
//!
//! Host-side plumbing shared by every synthesis engine:
//! - Audio buffer management
//! - Graph clock (`AudioContext`) and its factory
//! - Host wall clock and cooperative timers
//! - Domain / engine routing tags

pub mod buffer;
pub mod clock;
pub mod context;
pub mod domain;
pub mod timer;

pub use buffer::{AudioBuffer, ChannelLayout};
pub use clock::{HostClock, ManualClock, SystemClock};
pub use context::{
    AudioContext, ContextFactory, ContextState, DefaultContextFactory, UnavailableContextFactory,
};
pub use domain::{Domain, EngineId};
pub use timer::{TimerId, TimerQueue};
