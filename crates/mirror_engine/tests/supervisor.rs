mod support;

use std::thread;
use std::time::{Duration, Instant};

use mirror_core::{Command, Event, ThreadSummary, Turn};
use mirror_engine::{
    DomTranscriptExtractor, EngineHandle, SessionError, SupervisorError, SupervisorReport,
};
use pretty_assertions::assert_eq;
use support::{init_logging, test_config, thread_url, FakeBrowser};
use tempfile::TempDir;

fn lines(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::SystemLine { text } => Some(text.clone()),
            _ => None,
        })
        .collect()
}

fn spawn(temp: &TempDir, browser: &FakeBrowser) -> EngineHandle {
    let config = test_config(&temp.path().join("cache"));
    EngineHandle::spawn(config, browser.clone(), DomTranscriptExtractor::new())
}

#[test]
fn startup_publishes_the_thread_list_and_stop_closes_the_browser() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    let threads = vec![ThreadSummary::new("Chat", thread_url("t1"))];
    browser.world().index = threads.clone();

    let engine = spawn(&temp, &browser);
    engine.send(Command::Stop);
    let events: Vec<Event> = engine.events().collect();
    let report = engine.join().unwrap();

    assert_eq!(report, SupervisorReport { restarts: 0 });
    assert!(events.contains(&Event::ThreadList { threads }));
    let world = browser.world();
    assert_eq!(world.opened, 1);
    assert_eq!(world.closed, 1);
}

#[test]
fn commands_run_in_order() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    let (a, b) = (thread_url("a"), thread_url("b"));
    {
        let mut world = browser.world();
        world.show(&a, vec![Turn::user("in a")]);
        world.show(&b, vec![Turn::user("in b")]);
    }

    let engine = spawn(&temp, &browser);
    engine.send(Command::Navigate { url: a.clone() });
    engine.send(Command::Navigate { url: b.clone() });
    engine.send(Command::Navigate { url: a.clone() });
    engine.send(Command::Stop);
    let _events: Vec<Event> = engine.events().collect();
    engine.join().unwrap();

    assert_eq!(browser.world().gotos, vec![a.clone(), b, a]);
}

#[test]
fn interrupted_command_is_replayed_once_after_restart() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    let (a, b) = (thread_url("a"), thread_url("b"));
    {
        let mut world = browser.world();
        world.show(&a, vec![Turn::user("in a")]);
        world.show(&b, vec![Turn::user("in b")]);
        world.inject("goto", 0, SessionError::lost("Target closed"));
    }

    let engine = spawn(&temp, &browser);
    engine.send(Command::Navigate { url: a.clone() });
    engine.send(Command::Navigate { url: b.clone() });
    engine.send(Command::Stop);
    let events: Vec<Event> = engine.events().collect();
    let report = engine.join().unwrap();

    assert_eq!(report.restarts, 1);
    let world = browser.world();
    assert_eq!(world.opened, 2);
    assert_eq!(world.closed, 2);
    assert_eq!(world.gotos, vec![a, b]);
    let lines = lines(&events);
    assert!(lines
        .iter()
        .any(|line| line.starts_with("[Warning] Lost connection to the browser")));
    assert!(lines
        .iter()
        .any(|line| line == "System: NAVIGATE will be retried after the restart."));
}

#[test]
fn command_failing_again_after_replay_is_dropped() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    let b = thread_url("b");
    {
        let mut world = browser.world();
        world.show(&b, vec![Turn::user("in b")]);
        world.inject("goto", 0, SessionError::lost("Target closed"));
        world.inject("goto", 0, SessionError::lost("Target closed"));
    }

    let engine = spawn(&temp, &browser);
    engine.send(Command::Navigate { url: thread_url("a") });
    engine.send(Command::Navigate { url: b.clone() });
    engine.send(Command::Stop);
    let events: Vec<Event> = engine.events().collect();
    let report = engine.join().unwrap();

    assert_eq!(report.restarts, 2);
    assert_eq!(browser.world().gotos, vec![b]);
    assert!(lines(&events)
        .iter()
        .any(|line| line.contains("dropping NAVIGATE")));
}

#[test]
fn submitted_prompt_is_never_sent_twice() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    {
        let mut world = browser.world();
        world.answer_frames = ["partial"].into_iter().map(String::from).collect();
        // The baseline read passes; the first poll after submitting fails.
        world.inject("last_assistant", 1, SessionError::lost("Target closed"));
    }

    let engine = spawn(&temp, &browser);
    engine.send(Command::Send { text: "once".into() });
    engine.send(Command::Stop);
    let _events: Vec<Event> = engine.events().collect();
    let report = engine.join().unwrap();

    assert_eq!(report.restarts, 1);
    assert_eq!(browser.world().prompts, vec!["once".to_string()]);
}

#[test]
fn launch_failures_use_up_the_restart_budget() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    browser.world().open_failures = 100;
    let mut config = test_config(&temp.path().join("cache"));
    config.max_restarts = Some(2);

    let engine = EngineHandle::spawn(config, browser.clone(), DomTranscriptExtractor::new());
    let events: Vec<Event> = engine.events().collect();
    let err = engine.join().unwrap_err();

    let lines = lines(&events);
    assert!(lines
        .iter()
        .any(|line| line.starts_with("[Warning] Could not start the browser")));
    assert!(!lines.iter().any(|line| line.contains("Lost connection")));

    match err {
        SupervisorError::RestartsExhausted { restarts, last } => {
            assert_eq!(restarts, 2);
            assert!(last.is_fatal());
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(browser.world().open_failures, 97);
}

#[test]
fn stop_flag_ends_a_waiting_engine() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();

    let engine = spawn(&temp, &browser);
    // Wait for the engine to reach its queue before stopping it.
    loop {
        match engine.recv_timeout(Duration::from_secs(5)) {
            Ok(Event::SystemLine { text }) if text.ends_with("synced.") => break,
            Ok(_) => continue,
            Err(err) => panic!("engine never became ready: {err}"),
        }
    }
    engine.stop();
    let _rest: Vec<Event> = engine.events().collect();

    assert_eq!(engine.join().unwrap().restarts, 0);
    assert_eq!(browser.world().closed, 1);
}

#[test]
fn finished_engine_leaves_its_events_buffered() {
    init_logging();
    let temp = TempDir::new().unwrap();
    let browser = FakeBrowser::new();
    let threads = vec![ThreadSummary::new("Chat", thread_url("t1"))];
    browser.world().index = threads.clone();

    let engine = spawn(&temp, &browser);
    engine.send(Command::Stop);
    let deadline = Instant::now() + Duration::from_secs(5);
    while !engine.is_finished() {
        assert!(Instant::now() < deadline, "engine did not stop");
        thread::sleep(Duration::from_millis(5));
    }
    let events: Vec<Event> = std::iter::from_fn(|| engine.try_recv()).collect();

    assert!(events.contains(&Event::ThreadList { threads }));
    assert_eq!(engine.try_recv(), None);
    assert_eq!(engine.join().unwrap().restarts, 0);
}
