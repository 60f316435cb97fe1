//! Graph clock for one engine
//!
//! An `AudioContext` counts rendered frames; its time is the timestamp base
//! for every scheduled note and parameter ramp. It starts suspended and only
//! advances while running, mirroring platforms that refuse to start audio
//! before a user gesture.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::error::{AmbienteError, Result};

/// Lowest sample rate a context accepts
pub const MIN_SAMPLE_RATE: u32 = 8000;

/// Highest sample rate a context accepts
pub const MAX_SAMPLE_RATE: u32 = 192_000;

/// Clock state of an audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// Created but not yet allowed to run
    #[default]
    Suspended,
    /// Clock advances as frames are rendered
    Running,
    /// Permanently stopped
    Closed,
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextState::Suspended => write!(f, "Suspended"),
            ContextState::Running => write!(f, "Running"),
            ContextState::Closed => write!(f, "Closed"),
        }
    }
}

/// Frame-counting audio clock
#[derive(Debug, Clone)]
pub struct AudioContext {
    sample_rate: u32,
    frames: u64,
    state: ContextState,
}

impl AudioContext {
    /// Create a suspended context at time zero
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frames: 0,
            state: ContextState::Suspended,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current graph time in seconds
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    /// Total frames rendered while running
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ContextState::Running
    }

    /// Start the clock
    ///
    /// # Returns
    /// true if the context transitioned to running, false if it already was
    /// running or has been closed
    pub fn resume(&mut self) -> bool {
        match self.state {
            ContextState::Suspended => {
                debug!(sample_rate = self.sample_rate, "audio context resumed");
                self.state = ContextState::Running;
                true
            }
            ContextState::Running | ContextState::Closed => false,
        }
    }

    /// Pause the clock; a closed context stays closed
    pub fn suspend(&mut self) {
        if self.state == ContextState::Running {
            self.state = ContextState::Suspended;
        }
    }

    pub fn close(&mut self) {
        self.state = ContextState::Closed;
    }

    /// Advance the clock by `frames` if running
    pub fn advance(&mut self, frames: usize) {
        if self.is_running() {
            self.frames += frames as u64;
        }
    }
}

/// Acquires audio contexts for engines
///
/// Engines call this once, on first activation; a failure degrades the
/// engine to a silent no-op.
pub trait ContextFactory {
    fn create(&self, sample_rate: u32) -> Result<AudioContext>;
}

/// Factory backed by the in-process frame clock
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultContextFactory;

impl ContextFactory for DefaultContextFactory {
    fn create(&self, sample_rate: u32) -> Result<AudioContext> {
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&sample_rate) {
            return Err(AmbienteError::ContextUnavailable {
                reason: format!(
                    "sample rate {} outside {}..={} Hz",
                    sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
                ),
            });
        }
        Ok(AudioContext::new(sample_rate))
    }
}

/// Factory for platforms without audio output; every request fails
#[derive(Debug, Clone, Default)]
pub struct UnavailableContextFactory {
    reason: String,
}

impl UnavailableContextFactory {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ContextFactory for UnavailableContextFactory {
    fn create(&self, _sample_rate: u32) -> Result<AudioContext> {
        Err(AmbienteError::ContextUnavailable {
            reason: if self.reason.is_empty() {
                "no audio output available".to_string()
            } else {
                self.reason.clone()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_context_starts_suspended() {
        let mut ctx = AudioContext::new(16000);
        assert_eq!(ctx.state(), ContextState::Suspended);
        ctx.advance(1600);
        assert_eq!(ctx.current_time(), 0.0);
    }

    #[test]
    fn test_context_advances_when_running() {
        let mut ctx = AudioContext::new(16000);
        assert!(ctx.resume());
        assert!(!ctx.resume());
        ctx.advance(1600);
        assert_relative_eq!(ctx.current_time(), 0.1);

        ctx.suspend();
        ctx.advance(1600);
        assert_relative_eq!(ctx.current_time(), 0.1);
    }

    #[test]
    fn test_closed_context_never_resumes() {
        let mut ctx = AudioContext::new(48000);
        ctx.close();
        assert!(!ctx.resume());
        assert_eq!(ctx.state().to_string(), "Closed");
    }

    #[test]
    fn test_default_factory_validates_sample_rate() {
        assert!(DefaultContextFactory.create(48000).is_ok());
        let err = DefaultContextFactory.create(100).unwrap_err();
        assert_eq!(err.error_code(), "CONTEXT_UNAVAILABLE");
    }

    #[test]
    fn test_unavailable_factory_always_fails() {
        let factory = UnavailableContextFactory::new("denied");
        let err = factory.create(48000).unwrap_err();
        assert!(err.to_string().contains("denied"));
    }
}
