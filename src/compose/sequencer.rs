//! Lookahead step sequencer
//!
//! A coarse host timer calls `due_steps` every `TICK_INTERVAL`; each call
//! hands back every sixteenth-note step whose start time falls inside the
//! lookahead horizon of the graph clock. Steps carry exact graph times, so
//! timing stays sample-accurate however late the tick fires.

use tracing::debug;

/// Host timer cadence (seconds)
pub const TICK_INTERVAL: f64 = 0.025;

/// How far ahead of the graph clock steps are scheduled (seconds)
pub const LOOKAHEAD: f64 = 0.1;

/// Delay between `start` and the first step (seconds)
pub const START_OFFSET: f64 = 0.05;

/// Minimum distance between the graph clock and a newly scheduled step
pub const MIN_MARGIN: f64 = 0.005;

/// Sixteenth-note steps per bar
pub const STEPS_PER_BAR: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SequencerState {
    #[default]
    Uninitialized,
    Running,
    Stopped,
}

/// One step handed to the composition
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    /// Step within the bar (0-15)
    pub step: u32,
    pub bar: u64,
    /// Graph time of the step
    pub time: f64,
    /// Length of one step (seconds)
    pub duration: f64,
}

impl StepInfo {
    /// Whether this is the first step of a bar
    pub fn is_downbeat(&self) -> bool {
        self.step == 0
    }

    /// Whether the step falls on a quarter-note beat
    pub fn is_beat(&self) -> bool {
        self.step % 4 == 0
    }

    /// Length of one bar (seconds)
    pub fn bar_duration(&self) -> f64 {
        self.duration * STEPS_PER_BAR as f64
    }
}

#[derive(Debug, Clone)]
pub struct Sequencer {
    state: SequencerState,
    tempo_bpm: f64,
    step: u32,
    bar: u64,
    next_time: f64,
    skipped: u64,
}

impl Sequencer {
    pub fn new(tempo_bpm: f64) -> Self {
        Self {
            state: SequencerState::Uninitialized,
            tempo_bpm: tempo_bpm.max(1.0),
            step: 0,
            bar: 0,
            next_time: 0.0,
            skipped: 0,
        }
    }

    pub fn state(&self) -> SequencerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SequencerState::Running
    }

    pub fn tempo(&self) -> f64 {
        self.tempo_bpm
    }

    /// Change tempo; already scheduled steps keep their times
    pub fn set_tempo(&mut self, tempo_bpm: f64) {
        self.tempo_bpm = tempo_bpm.max(1.0);
    }

    /// Length of one sixteenth note (seconds)
    pub fn step_duration(&self) -> f64 {
        60.0 / self.tempo_bpm / 4.0
    }

    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn bar(&self) -> u64 {
        self.bar
    }

    /// Graph time of the next unscheduled step
    pub fn next_time(&self) -> f64 {
        self.next_time
    }

    /// Steps dropped because the loop fell behind
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Reset counters and schedule the first step shortly after `now`
    pub fn start(&mut self, now: f64) {
        self.state = SequencerState::Running;
        self.step = 0;
        self.bar = 0;
        self.skipped = 0;
        self.next_time = now + START_OFFSET;
        debug!(tempo = self.tempo_bpm, "sequencer started");
    }

    pub fn stop(&mut self) {
        if self.state == SequencerState::Running {
            debug!(bar = self.bar, step = self.step, "sequencer stopped");
        }
        self.state = SequencerState::Stopped;
    }

    fn advance(&mut self) {
        self.next_time += self.step_duration();
        self.step += 1;
        if self.step >= STEPS_PER_BAR {
            self.step = 0;
            self.bar += 1;
        }
    }

    /// Steps to schedule at graph time `now`
    ///
    /// Steps that would start less than `MIN_MARGIN` after `now` are skipped
    /// (the cursor still moves past them) rather than played late.
    pub fn due_steps(&mut self, now: f64) -> Vec<StepInfo> {
        if self.state != SequencerState::Running {
            return Vec::new();
        }

        let mut skipped = 0;
        while self.next_time < now + MIN_MARGIN {
            self.advance();
            skipped += 1;
        }
        if skipped > 0 {
            self.skipped += skipped;
            debug!(skipped, now, "sequencer resynchronised");
        }

        let mut steps = Vec::new();
        let duration = self.step_duration();
        while self.next_time < now + LOOKAHEAD {
            steps.push(StepInfo {
                step: self.step,
                bar: self.bar,
                time: self.next_time,
                duration,
            });
            self.advance();
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_duration() {
        let seq = Sequencer::new(120.0);
        assert_relative_eq!(seq.step_duration(), 0.125);
    }

    #[test]
    fn test_not_running_schedules_nothing() {
        let mut seq = Sequencer::new(120.0);
        assert!(seq.due_steps(0.0).is_empty());
        seq.start(0.0);
        seq.stop();
        assert!(seq.due_steps(1.0).is_empty());
        assert_eq!(seq.state(), SequencerState::Stopped);
    }

    #[test]
    fn test_lookahead_window() {
        let mut seq = Sequencer::new(120.0);
        seq.start(0.0);
        let steps = seq.due_steps(0.0);
        assert_eq!(steps.len(), 1);
        assert_relative_eq!(steps[0].time, START_OFFSET);
        // Next step at 0.175 is outside the horizon until now > 0.075
        assert!(seq.due_steps(0.05).is_empty());
        assert_eq!(seq.due_steps(0.1).len(), 1);
    }

    #[test]
    fn test_steps_are_monotonic_and_wrap_bars() {
        let mut seq = Sequencer::new(150.0);
        seq.start(0.0);
        let mut all = Vec::new();
        let mut now = 0.0;
        while all.len() < 40 {
            all.extend(seq.due_steps(now));
            now += TICK_INTERVAL;
        }
        for pair in all.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
        assert_eq!(all[16].step, 0);
        assert_eq!(all[16].bar, 1);
        assert_eq!(all[15].step, 15);
        assert_eq!(seq.skipped(), 0);
    }

    #[test]
    fn test_late_tick_skips_past_steps() {
        let mut seq = Sequencer::new(120.0);
        seq.start(0.0);
        let steps = seq.due_steps(1.0);
        assert!(seq.skipped() > 0);
        assert!(steps.iter().all(|s| s.time >= 1.0 + MIN_MARGIN));
        assert!(seq.next_time() >= 1.0 + MIN_MARGIN);
    }

    #[test]
    fn test_tempo_change_affects_future_steps() {
        let mut seq = Sequencer::new(120.0);
        seq.start(0.0);
        let first = seq.due_steps(0.0);
        seq.set_tempo(60.0);
        let next = seq.next_time();
        assert_relative_eq!(next, first[0].time + 0.125);
        assert_relative_eq!(seq.step_duration(), 0.25);
    }
}
