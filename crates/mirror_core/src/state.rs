/// Lifecycle of the command dispatcher.
///
/// `Idle -> Executing -> Idle` for ordinary commands,
/// `Idle -> Executing -> Streaming -> Idle` for a send, any live state
/// `-> Faulted` on a session-fatal error, `Faulted -> Idle` once the session
/// was rebuilt, and `Idle -> Stopped` on a stop command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchState {
    #[default]
    Idle,
    Executing,
    Streaming,
    Faulted,
    Stopped,
}

/// Inputs that move the dispatcher between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// A command was pulled from the queue.
    Begin,
    /// A prompt was submitted and the answer is being followed.
    StreamOpened,
    /// The current command finished (successfully or not).
    Finished,
    /// The browser session is gone.
    SessionLost,
    /// A fresh session replaced the lost one.
    SessionRestored,
    /// A stop command was received.
    Stop,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchState::Stopped)
    }
}

/// Pure transition function. Signals that do not apply to the current state
/// leave it unchanged.
pub fn advance(state: DispatchState, signal: Signal) -> DispatchState {
    use DispatchState::{Executing, Faulted, Idle, Stopped, Streaming};
    match (state, signal) {
        (Stopped, _) => Stopped,
        (Idle, Signal::Begin) => Executing,
        (Executing, Signal::StreamOpened) => Streaming,
        (Executing | Streaming, Signal::Finished) => Idle,
        (Idle | Executing | Streaming, Signal::SessionLost) => Faulted,
        (Faulted, Signal::SessionRestored) => Idle,
        (Idle, Signal::Stop) => Stopped,
        (current, _) => current,
    }
}
