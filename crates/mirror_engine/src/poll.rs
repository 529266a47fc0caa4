use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use engine_logging::engine_trace;
use mirror_core::{PollPolicy, Stability, StabilityTracker};

use crate::{SampleError, SessionError};

/// Slice in which long waits re-check the stop flag.
const STOP_CHECK_SLICE: Duration = Duration::from_millis(100);

/// Cooperative cancellation shared by the producer and the engine. Checked
/// between ticks and between commands, never in the middle of a browser call.
#[derive(Debug, Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Samples until `required_stable_ticks` consecutive samples are identical,
/// for at most `max_ticks` samples.
///
/// A transient sample failure is a tick without a new observation: it neither
/// extends nor resets the current run. A session failure aborts the wait and
/// is handed back to the caller.
pub fn await_stability<T, S>(
    policy: &PollPolicy,
    stop: &StopFlag,
    mut sample: S,
) -> Result<Stability, SessionError>
where
    T: PartialEq,
    S: FnMut() -> Result<T, SampleError>,
{
    let mut tracker = StabilityTracker::new(policy.required_stable_ticks);
    for tick in 1..=policy.max_ticks {
        if stop.is_raised() {
            return Ok(Stability::Cancelled);
        }
        match sample() {
            Ok(value) => {
                tracker.observe(value);
                if tracker.is_settled() {
                    return Ok(Stability::Converged { tick });
                }
            }
            Err(SampleError::Transient(reason)) => {
                engine_trace!("poll tick {} skipped: {}", tick, reason);
            }
            Err(SampleError::Session(err)) => return Err(err),
        }
        if tick < policy.max_ticks {
            pause(policy.tick_interval());
        }
    }
    Ok(Stability::TimedOut)
}

/// Result of [`poll_until`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled<T> {
    Ready(T),
    Exhausted,
    Cancelled,
}

/// Retries `attempt` until it yields a value, for at most `max_ticks` tries.
pub fn poll_until<T, A>(
    policy: &PollPolicy,
    stop: &StopFlag,
    mut attempt: A,
) -> Result<Polled<T>, SessionError>
where
    A: FnMut() -> Result<Option<T>, SampleError>,
{
    for tick in 1..=policy.max_ticks {
        if stop.is_raised() {
            return Ok(Polled::Cancelled);
        }
        match attempt() {
            Ok(Some(value)) => return Ok(Polled::Ready(value)),
            Ok(None) => {}
            Err(SampleError::Transient(reason)) => {
                engine_trace!("attempt {} failed: {}", tick, reason);
            }
            Err(SampleError::Session(err)) => return Err(err),
        }
        if tick < policy.max_ticks {
            pause(policy.tick_interval());
        }
    }
    Ok(Polled::Exhausted)
}

/// Sleeps for `duration` in short slices; returns false if the stop flag was
/// raised before the time was up.
pub fn wait_unless_stopped(duration: Duration, stop: &StopFlag) -> bool {
    let deadline = Instant::now() + duration;
    loop {
        if stop.is_raised() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep((deadline - now).min(STOP_CHECK_SLICE));
    }
}

pub(crate) fn pause(duration: Duration) {
    if !duration.is_zero() {
        thread::sleep(duration);
    }
}
