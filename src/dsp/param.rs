//! Automatable parameter
//!
//! An `AudioParam` holds one automation segment at a time. Every new
//! automation call starts from the value the parameter has at the call's
//! timestamp, so scheduled changes are continuous; only `set_value` jumps.

// ============================================================================
// Automation Segment
// ============================================================================

/// Elapsed time constants after which an exponential approach counts as settled
const SETTLE_TIME_CONSTANTS: f64 = 7.0;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Segment {
    /// Constant value
    Hold { value: f32 },
    /// Straight line from (start_time, start_value) to (end_time, end_value)
    Linear {
        start_time: f64,
        start_value: f32,
        end_time: f64,
        end_value: f32,
    },
    /// First-order approach towards `target`
    Approach {
        start_time: f64,
        start_value: f32,
        target: f32,
        time_constant: f64,
    },
}

// ============================================================================
// AudioParam
// ============================================================================

/// Sample-accurate automatable value with a clamp range
///
/// # Example
/// ```ignore
/// use ambiente::dsp::AudioParam;
///
/// let mut gain = AudioParam::new(0.0, 0.0, 1.0);
/// gain.linear_ramp(0.3, 0.0, 2.0);   // fade in over two seconds
/// assert!((gain.value_at(1.0) - 0.15).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioParam {
    segment: Segment,
    min: f32,
    max: f32,
}

impl AudioParam {
    /// Create a parameter holding `value`, clamped to `[min, max]`
    pub fn new(value: f32, min: f32, max: f32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            segment: Segment::Hold {
                value: value.clamp(min, max),
            },
            min,
            max,
        }
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// Value of the parameter at graph time `time`
    pub fn value_at(&self, time: f64) -> f32 {
        match self.segment {
            Segment::Hold { value } => value,
            Segment::Linear {
                start_time,
                start_value,
                end_time,
                end_value,
            } => {
                if time <= start_time {
                    start_value
                } else if time >= end_time {
                    end_value
                } else {
                    let progress = ((time - start_time) / (end_time - start_time)) as f32;
                    start_value + (end_value - start_value) * progress
                }
            }
            Segment::Approach {
                start_time,
                start_value,
                target,
                time_constant,
            } => {
                if time <= start_time {
                    start_value
                } else {
                    let decay = (-(time - start_time) / time_constant).exp() as f32;
                    target + (start_value - target) * decay
                }
            }
        }
    }

    /// Value the current automation is heading to
    pub fn target(&self) -> f32 {
        match self.segment {
            Segment::Hold { value } => value,
            Segment::Linear { end_value, .. } => end_value,
            Segment::Approach { target, .. } => target,
        }
    }

    /// Whether the parameter is still moving at `time`
    pub fn is_automating(&self, time: f64) -> bool {
        match self.segment {
            Segment::Hold { .. } => false,
            Segment::Linear { end_time, .. } => time < end_time,
            Segment::Approach {
                start_time,
                time_constant,
                ..
            } => time < start_time + time_constant * SETTLE_TIME_CONSTANTS,
        }
    }

    /// Jump to `value` immediately, cancelling any automation
    ///
    /// Non-finite values are ignored.
    pub fn set_value(&mut self, value: f32) {
        if !value.is_finite() {
            return;
        }
        self.segment = Segment::Hold {
            value: value.clamp(self.min, self.max),
        };
    }

    /// Freeze at the value held at `now`
    pub fn cancel(&mut self, now: f64) {
        let value = self.value_at(now);
        self.segment = Segment::Hold { value };
    }

    /// Ramp linearly from the value at `now` to `target` over `duration` seconds
    pub fn linear_ramp(&mut self, target: f32, now: f64, duration: f64) {
        if !target.is_finite() {
            return;
        }
        let target = target.clamp(self.min, self.max);
        if duration <= 0.0 {
            self.set_value(target);
            return;
        }
        self.segment = Segment::Linear {
            start_time: now,
            start_value: self.value_at(now),
            end_time: now + duration,
            end_value: target,
        };
    }

    /// Approach `target` exponentially from the value at `now`
    ///
    /// After one `time_constant` the parameter has covered ~63% of the
    /// distance.
    pub fn set_target(&mut self, target: f32, now: f64, time_constant: f64) {
        if !target.is_finite() {
            return;
        }
        let target = target.clamp(self.min, self.max);
        if time_constant <= 0.0 {
            self.set_value(target);
            return;
        }
        self.segment = Segment::Approach {
            start_time: now,
            start_value: self.value_at(now),
            target,
            time_constant,
        };
    }

    /// Fill `out` with per-sample values starting at `start_time`
    pub fn fill(&self, start_time: f64, sample_rate: f64, out: &mut [f32]) {
        match self.segment {
            Segment::Hold { value } => out.fill(value),
            _ => {
                for (i, v) in out.iter_mut().enumerate() {
                    *v = self.value_at(start_time + i as f64 / sample_rate);
                }
            }
        }
    }
}

impl Default for AudioParam {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_new_clamps_value() {
        let param = AudioParam::new(2.0, 0.0, 1.0);
        assert_eq!(param.value_at(0.0), 1.0);
        let swapped = AudioParam::new(0.5, 1.0, 0.0);
        assert_eq!(swapped.min(), 0.0);
        assert_eq!(swapped.max(), 1.0);
    }

    #[test]
    fn test_linear_ramp() {
        let mut param = AudioParam::new(0.0, 0.0, 1.0);
        param.linear_ramp(1.0, 1.0, 2.0);
        assert_eq!(param.value_at(0.5), 0.0);
        assert_relative_eq!(param.value_at(2.0), 0.5);
        assert_eq!(param.value_at(3.5), 1.0);
        assert!(param.is_automating(2.9));
        assert!(!param.is_automating(3.0));
    }

    #[test]
    fn test_set_target_approaches_exponentially() {
        let mut param = AudioParam::new(0.0, -24.0, 24.0);
        param.set_target(12.0, 0.0, 0.1);
        assert_relative_eq!(param.value_at(0.1), 12.0 * (1.0 - (-1.0f32).exp()), epsilon = 1e-4);
        assert!(param.value_at(1.0) > 11.99);
        assert_eq!(param.target(), 12.0);
    }

    #[test]
    fn test_retarget_mid_ramp_is_continuous() {
        let mut param = AudioParam::new(0.0, 0.0, 1.0);
        param.linear_ramp(1.0, 0.0, 1.0);
        let before = param.value_at(0.4);
        param.set_target(0.0, 0.4, 0.1);
        assert_relative_eq!(param.value_at(0.4), before);
        assert!(param.value_at(0.5) < before);
    }

    #[test]
    fn test_zero_duration_ramp_jumps() {
        let mut param = AudioParam::new(0.2, 0.0, 1.0);
        param.linear_ramp(0.8, 0.0, 0.0);
        assert_eq!(param.value_at(0.0), 0.8);
        param.set_target(5.0, 0.0, 0.0);
        assert_eq!(param.value_at(0.0), 1.0);
    }

    #[test]
    fn test_fill_matches_value_at() {
        let mut param = AudioParam::new(0.0, 0.0, 1.0);
        param.linear_ramp(1.0, 0.0, 0.001);
        let mut out = [0.0f32; 8];
        param.fill(0.0, 8000.0, &mut out);
        assert_eq!(out[0], 0.0);
        assert_relative_eq!(out[4], 0.5);
        assert_relative_eq!(out[7], 0.875, epsilon = 1e-5);
    }

    #[test]
    fn test_cancel_freezes_value() {
        let mut param = AudioParam::new(0.0, 0.0, 1.0);
        param.linear_ramp(1.0, 0.0, 1.0);
        param.cancel(0.25);
        assert_relative_eq!(param.value_at(10.0), 0.25);
    }

    #[test]
    fn test_non_finite_targets_are_ignored() {
        let mut param = AudioParam::new(0.5, 0.0, 1.0);
        param.set_value(f32::NAN);
        param.linear_ramp(f32::INFINITY, 0.0, 1.0);
        param.set_target(f32::NAN, 0.0, 0.1);
        assert_eq!(param.value_at(2.0), 0.5);
        assert!(!param.is_automating(0.0));
    }
}
