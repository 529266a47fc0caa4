//! Mirror core: pure transcript domain, reconciliation and dispatcher state machine.
mod command;
mod event;
mod reconcile;
mod stability;
mod state;
mod stream;
mod thread;
mod turn;

pub use command::{Command, CommandParseError};
pub use event::{Event, STREAM_TERMINATOR};
pub use reconcile::{reconcile, Reconciliation, SyncKind};
pub use stability::{Observation, PollPolicy, Stability, StabilityTracker};
pub use state::{advance, DispatchState, Signal};
pub use stream::StreamAccumulator;
pub use thread::{ThreadId, ThreadSummary, NEW_THREAD};
pub use turn::{normalize_text, Role, Turn};
