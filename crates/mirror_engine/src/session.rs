use mirror_core::ThreadSummary;

use crate::{EngineConfig, SessionError};

/// Rendered state of the assistant side of the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantSnapshot {
    /// Number of assistant turns currently rendered.
    pub count: usize,
    /// Raw text of the last assistant turn, if any.
    pub last_text: Option<String>,
}

/// One live, remotely controlled browser tab.
///
/// Every call blocks until the browser answered. Errors whose
/// [`SessionError::is_fatal`] is true mean the tab is gone.
pub trait BrowserSession {
    fn goto(&mut self, url: &str) -> Result<(), SessionError>;

    fn reload(&mut self) -> Result<(), SessionError>;

    fn current_url(&mut self) -> Result<String, SessionError>;

    /// Scrolls to the end of the conversation so lazily rendered turns mount.
    fn scroll_to_bottom(&mut self) -> Result<(), SessionError>;

    /// Number of conversation turns currently rendered.
    fn turn_count(&mut self) -> Result<usize, SessionError>;

    fn last_assistant(&mut self) -> Result<AssistantSnapshot, SessionError>;

    /// Types `text` into the prompt box without submitting it.
    fn fill_prompt(&mut self, text: &str) -> Result<(), SessionError>;

    fn submit_prompt(&mut self) -> Result<(), SessionError>;

    /// Entries of the thread index (sidebar), at most `limit`.
    fn thread_index(&mut self, limit: usize) -> Result<Vec<ThreadSummary>, SessionError>;

    /// Runs a page script and returns its JSON result.
    fn evaluate(&mut self, script: &str) -> Result<serde_json::Value, SessionError>;

    fn close(&mut self) -> Result<(), SessionError>;
}

/// Creates browser sessions for the supervisor, once per (re)start.
pub trait SessionFactory: Send {
    type Session: BrowserSession;

    /// Opens a session showing `config.home_url`.
    fn open(&mut self, config: &EngineConfig) -> Result<Self::Session, SessionError>;
}
