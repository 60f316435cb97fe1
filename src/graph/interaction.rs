//! Interaction modulator
//!
//! Maps pointer/tilt/motion signals arriving at UI cadence onto graph
//! targets and gates velocity-driven one-shot gestures.

use crate::config::InteractionConfig;

/// Graph targets derived from one position sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModulationTargets {
    /// Stereo balance (-1 to 1)
    pub pan: f32,
    /// Shared low-pass cutoff (Hz)
    pub cutoff_hz: f32,
    /// Delay feedback amount
    pub feedback: f32,
}

/// Result of a position update
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionUpdate {
    pub targets: ModulationTargets,
    /// Velocity derived from the previous sample (units per second)
    pub velocity: f32,
    /// Gesture intensity in [0.3, 1.0] when a one-shot should fire
    pub trigger: Option<f32>,
}

/// Lowest intensity a gesture fires with
const MIN_TRIGGER_INTENSITY: f32 = 0.3;

/// Stateful mapper from interaction signals to graph targets
#[derive(Debug, Clone)]
pub struct InteractionModulator {
    config: InteractionConfig,
    last_position: Option<(f32, f32, f64)>,
    last_trigger: Option<f64>,
    triggers: u64,
}

impl InteractionModulator {
    pub fn new(config: InteractionConfig) -> Self {
        Self {
            config,
            last_position: None,
            last_trigger: None,
            triggers: 0,
        }
    }

    pub fn config(&self) -> &InteractionConfig {
        &self.config
    }

    /// Number of gestures fired so far
    pub fn trigger_count(&self) -> u64 {
        self.triggers
    }

    /// Map a normalised position (each axis in [-1, 1]) to graph targets
    pub fn map_position(&self, x: f32, y: f32) -> ModulationTargets {
        let x = if x.is_finite() { x.clamp(-1.0, 1.0) } else { 0.0 };
        let y = if y.is_finite() { y.clamp(-1.0, 1.0) } else { 0.0 };
        let amount = (y + 1.0) * 0.5;
        let c = &self.config;
        ModulationTargets {
            pan: (x * c.pan_depth).clamp(-1.0, 1.0),
            cutoff_hz: c.cutoff_min_hz + (c.cutoff_max_hz - c.cutoff_min_hz) * amount,
            feedback: c.feedback_min + (c.feedback_max - c.feedback_min) * amount,
        }
    }

    /// Feed a position sample taken at host time `host_time`
    ///
    /// Velocity is the raw distance to the previous sample over the
    /// elapsed time.
    pub fn update_position(&mut self, x: f32, y: f32, host_time: f64) -> InteractionUpdate {
        let targets = self.map_position(x, y);
        let velocity = match self.last_position {
            Some((px, py, pt)) if host_time > pt => {
                let distance = ((x - px).powi(2) + (y - py).powi(2)).sqrt();
                distance / (host_time - pt) as f32
            }
            _ => 0.0,
        };
        if x.is_finite() && y.is_finite() {
            self.last_position = Some((x, y, host_time));
        }
        let trigger = self.gate(velocity, host_time);
        InteractionUpdate {
            targets,
            velocity,
            trigger,
        }
    }

    /// Feed a scalar velocity (e.g. device motion); returns a gesture intensity
    pub fn update_velocity(&mut self, velocity: f32, host_time: f64) -> Option<f32> {
        self.gate(velocity, host_time)
    }

    fn gate(&mut self, velocity: f32, host_time: f64) -> Option<f32> {
        if !velocity.is_finite() || velocity < self.config.velocity_threshold {
            return None;
        }
        let interval = self.config.min_trigger_interval_ms / 1000.0;
        if let Some(last) = self.last_trigger {
            if host_time - last < interval {
                return None;
            }
        }
        self.last_trigger = Some(host_time);
        self.triggers += 1;
        let intensity = (velocity / self.config.velocity_full_scale).clamp(MIN_TRIGGER_INTENSITY, 1.0);
        Some(intensity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn modulator() -> InteractionModulator {
        InteractionModulator::new(InteractionConfig::default())
    }

    #[test]
    fn test_position_mapping() {
        let m = modulator();
        let low = m.map_position(-1.0, -1.0);
        assert_relative_eq!(low.cutoff_hz, 200.0);
        assert_relative_eq!(low.pan, -0.8);
        let high = m.map_position(1.0, 1.0);
        assert_relative_eq!(high.cutoff_hz, 800.0);
        assert_relative_eq!(high.feedback, m.config().feedback_max);
    }

    #[test]
    fn test_out_of_range_signal_is_clamped() {
        let m = modulator();
        assert_eq!(m.map_position(40.0, -9.0), m.map_position(1.0, -1.0));
        assert_eq!(m.map_position(f32::NAN, 0.0).pan, 0.0);
    }

    #[test]
    fn test_first_sample_has_no_velocity() {
        let mut m = modulator();
        let update = m.update_position(0.5, 0.5, 1.0);
        assert_eq!(update.velocity, 0.0);
        assert_eq!(update.trigger, None);
    }

    #[test]
    fn test_fast_motion_triggers_with_scaled_intensity() {
        let mut m = modulator();
        m.update_position(0.0, 0.0, 0.0);
        // 0.4 units in 0.1 s = 4 units/s, half of full scale
        let update = m.update_position(0.4, 0.0, 0.1);
        assert_relative_eq!(update.velocity, 4.0, epsilon = 1e-4);
        assert_relative_eq!(update.trigger.unwrap(), 0.5, epsilon = 1e-4);
    }

    #[test]
    fn test_intensity_floor() {
        let mut m = modulator();
        assert_relative_eq!(m.update_velocity(1.6, 0.0).unwrap(), 0.3);
        assert_relative_eq!(m.update_velocity(100.0, 1.0).unwrap(), 1.0);
    }

    #[test]
    fn test_min_interval_between_triggers() {
        let mut m = modulator();
        assert!(m.update_velocity(5.0, 0.0).is_some());
        assert!(m.update_velocity(5.0, 0.05).is_none());
        assert!(m.update_velocity(5.0, 0.119).is_none());
        assert!(m.update_velocity(5.0, 0.12).is_some());
        assert_eq!(m.trigger_count(), 2);
    }

    #[test]
    fn test_slow_motion_never_triggers() {
        let mut m = modulator();
        for i in 0..50 {
            assert!(m.update_velocity(1.0, i as f64).is_none());
        }
    }
}
