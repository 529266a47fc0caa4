use mirror_core::{advance, DispatchState, Signal};

#[test]
fn ordinary_command_returns_to_idle() {
    let state = advance(DispatchState::Idle, Signal::Begin);
    assert_eq!(state, DispatchState::Executing);
    assert_eq!(advance(state, Signal::Finished), DispatchState::Idle);
}

#[test]
fn send_passes_through_streaming() {
    let state = advance(DispatchState::Idle, Signal::Begin);
    let state = advance(state, Signal::StreamOpened);
    assert_eq!(state, DispatchState::Streaming);
    assert_eq!(advance(state, Signal::Finished), DispatchState::Idle);
}

#[test]
fn session_loss_faults_from_any_live_state_and_recovers_to_idle() {
    for live in [
        DispatchState::Idle,
        DispatchState::Executing,
        DispatchState::Streaming,
    ] {
        let faulted = advance(live, Signal::SessionLost);
        assert_eq!(faulted, DispatchState::Faulted);
        assert_eq!(advance(faulted, Signal::SessionRestored), DispatchState::Idle);
    }
}

#[test]
fn stop_is_only_accepted_from_idle_and_is_terminal() {
    assert_eq!(
        advance(DispatchState::Executing, Signal::Stop),
        DispatchState::Executing
    );
    let stopped = advance(DispatchState::Idle, Signal::Stop);
    assert!(stopped.is_terminal());
    for signal in [Signal::Begin, Signal::SessionLost, Signal::SessionRestored] {
        assert_eq!(advance(stopped, signal), DispatchState::Stopped);
    }
}

#[test]
fn inapplicable_signals_leave_state_unchanged() {
    assert_eq!(advance(DispatchState::Idle, Signal::Finished), DispatchState::Idle);
    assert_eq!(
        advance(DispatchState::Idle, Signal::StreamOpened),
        DispatchState::Idle
    );
    assert_eq!(
        advance(DispatchState::Faulted, Signal::Begin),
        DispatchState::Faulted
    );
}
