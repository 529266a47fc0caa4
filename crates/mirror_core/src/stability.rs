use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounds of one polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// Upper bound on samples taken before giving up.
    pub max_ticks: u32,
    /// Pause between two samples.
    pub tick_interval_ms: u64,
    /// Length of the run of identical samples that counts as settled.
    pub required_stable_ticks: u32,
}

impl PollPolicy {
    pub const fn new(max_ticks: u32, tick_interval_ms: u64, required_stable_ticks: u32) -> Self {
        Self {
            max_ticks,
            tick_interval_ms,
            required_stable_ticks,
        }
    }

    /// Waiting for the rendered turn count of a page to stop growing.
    pub const fn page_settle() -> Self {
        Self::new(40, 1_000, 4)
    }

    /// Waiting for a streamed answer to stop growing.
    pub const fn response() -> Self {
        Self::new(600, 1_000, 10)
    }

    /// Retrying the asynchronously rendered thread index.
    pub const fn thread_list() -> Self {
        Self::new(20, 3_000, 1)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Same bounds without any pause between ticks.
    pub const fn immediate(self) -> Self {
        Self {
            tick_interval_ms: 0,
            ..self
        }
    }
}

/// Outcome of a stabilization wait. Timing out is not an error: callers go on
/// with whatever was last observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Settled on the given (1-based) tick.
    Converged { tick: u32 },
    TimedOut,
    /// The stop flag was raised between ticks.
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The sample differs from the previous one (or is the first).
    Changed,
    /// The sample repeats the previous one.
    Repeated,
}

/// Run-length tracker behind every stabilization wait.
///
/// Holds the last sampled value and the length of the current run of
/// identical samples; settled once the run reaches the required length.
#[derive(Debug, Clone)]
pub struct StabilityTracker<T> {
    required: u32,
    last: Option<T>,
    run: u32,
}

impl<T: PartialEq> StabilityTracker<T> {
    pub fn new(required_stable_ticks: u32) -> Self {
        Self {
            required: required_stable_ticks.max(1),
            last: None,
            run: 0,
        }
    }

    pub fn observe(&mut self, value: T) -> Observation {
        if self.last.as_ref() == Some(&value) {
            self.run = self.run.saturating_add(1);
            Observation::Repeated
        } else {
            self.last = Some(value);
            self.run = 1;
            Observation::Changed
        }
    }

    pub fn is_settled(&self) -> bool {
        self.run >= self.required
    }

    pub fn last(&self) -> Option<&T> {
        self.last.as_ref()
    }

    pub fn run_length(&self) -> u32 {
        self.run
    }
}
