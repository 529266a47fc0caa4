use std::path::PathBuf;
use std::time::Duration;

use mirror_core::PollPolicy;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HOME_URL: &str = "https://chatgpt.com/";

/// Engine settings, passed by reference to every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Page opened when a session starts.
    pub home_url: String,
    /// Directory of the per-thread cache files.
    pub cache_dir: PathBuf,
    /// Waiting for a thread page to finish rendering its turns.
    pub page_settle: PollPolicy,
    /// Following a streamed answer until it stops growing.
    pub response: PollPolicy,
    /// Retrying the thread index until it renders.
    pub thread_list: PollPolicy,
    /// Pause between typing a prompt and submitting it.
    pub submit_settle_ms: u64,
    /// Fixed pause before a lost session is rebuilt.
    pub restart_delay_ms: u64,
    /// Restarts allowed before the supervisor gives up; `None` is unbounded.
    pub max_restarts: Option<u32>,
    /// Receive timeout of the command queue, bounding stop-flag latency.
    pub queue_poll_ms: u64,
    /// Maximum number of thread index entries reported.
    pub thread_list_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::default_with_cache(PathBuf::from("tmp"))
    }
}

impl EngineConfig {
    pub fn default_with_cache(cache_dir: PathBuf) -> Self {
        Self {
            home_url: DEFAULT_HOME_URL.to_string(),
            cache_dir,
            page_settle: PollPolicy::page_settle(),
            response: PollPolicy::response(),
            thread_list: PollPolicy::thread_list(),
            submit_settle_ms: 500,
            restart_delay_ms: 5_000,
            max_restarts: None,
            queue_poll_ms: 1_000,
            thread_list_limit: 50,
        }
    }

    pub fn submit_settle(&self) -> Duration {
        Duration::from_millis(self.submit_settle_ms)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }

    pub fn queue_poll(&self) -> Duration {
        Duration::from_millis(self.queue_poll_ms)
    }
}
