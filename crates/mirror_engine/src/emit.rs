use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use engine_logging::{engine_info, engine_warn};
use mirror_core::{Event, Role, ThreadSummary, Turn, STREAM_TERMINATOR};

/// Frame around cached history replayed on thread entry.
pub const HISTORY_HEADER: &str = "----------------------------------------\n[History sync]";
pub const HISTORY_FOOTER: &str = "----------------------------------------\n";

/// Receives engine events. Implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: Event);
}

/// Forwards events over an unbounded channel; a gone receiver drops them.
pub struct ChannelEventSink {
    tx: mpsc::Sender<Event>,
}

impl ChannelEventSink {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory; used by tests and diagnostics.
#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(mut events) => events.drain(..).collect(),
            Err(poisoned) => poisoned.into_inner().drain(..).collect(),
        }
    }

    pub fn snapshot(&self) -> Vec<Event> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: Event) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

/// Typed front of an [`EventSink`]. System lines are mirrored to the log so
/// the log file carries the same diagnostics the operator sees.
#[derive(Clone)]
pub struct Emitter {
    sink: Arc<dyn EventSink>,
}

impl Emitter {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn system_line(&self, text: impl Into<String>) {
        let text = text.into();
        engine_info!("{}", text);
        self.sink.emit(Event::line(text));
    }

    pub fn system_warning(&self, text: impl Into<String>) {
        let text = text.into();
        engine_warn!("{}", text);
        self.sink.emit(Event::line(text));
    }

    pub fn system_append(&self, text: impl Into<String>) {
        self.sink.emit(Event::append(text));
    }

    pub fn turns(&self, turns: &[Turn]) {
        for turn in turns {
            self.sink.emit(Event::turn(turn));
        }
    }

    /// Replays cached history between a header and a footer.
    pub fn history(&self, turns: &[Turn]) {
        self.sink.emit(Event::separator(HISTORY_HEADER));
        self.turns(turns);
        self.sink.emit(Event::separator(HISTORY_FOOTER));
    }

    pub fn user_turn(&self, text: &str) {
        self.sink.emit(Event::turn(&Turn::user(text)));
    }

    pub fn stream_start(&self) {
        self.sink.emit(Event::StreamStart {
            role: Role::Assistant,
        });
    }

    pub fn stream_chunk(&self, text: impl Into<String>) {
        self.sink.emit(Event::chunk(text));
    }

    pub fn stream_end(&self) {
        self.sink.emit(Event::chunk(STREAM_TERMINATOR));
    }

    pub fn thread_list(&self, threads: Vec<ThreadSummary>) {
        self.sink.emit(Event::ThreadList { threads });
    }
}
