//! Mirror engine: browser sessions, thread cache, command dispatch and the
//! restart supervisor.
pub mod cache;
pub mod chromium;
mod config;
pub mod dispatch;
mod emit;
mod engine;
pub mod extract;
pub mod persist;
pub mod poll;
pub mod queue;
pub mod retention;
mod session;
pub mod supervisor;
mod types;

pub use cache::{CacheError, CacheStore};
pub use chromium::{BrowserSettings, ChromiumLauncher, ChromiumSession};
pub use config::{EngineConfig, DEFAULT_HOME_URL};
pub use dispatch::{Dispatcher, Fault, Flow, SyncMode};
pub use emit::{
    ChannelEventSink, Emitter, EventSink, RecordingSink, HISTORY_FOOTER, HISTORY_HEADER,
};
pub use engine::EngineHandle;
pub use extract::{parse_turns, DomTranscriptExtractor, TranscriptExtractor};
pub use persist::{AtomicFileWriter, PersistError};
pub use poll::{await_stability, poll_until, wait_unless_stopped, Polled, StopFlag};
pub use queue::{command_channel, CommandQueue, CommandSender, Next, Pending};
pub use retention::{sweep_expired, RETENTION};
pub use session::{AssistantSnapshot, BrowserSession, SessionFactory};
pub use supervisor::{Supervisor, SupervisorError, SupervisorReport};
pub use types::{sample_failure, SampleError, SessionError, SessionErrorKind};
