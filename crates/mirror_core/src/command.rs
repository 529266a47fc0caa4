use serde::{Deserialize, Serialize};

/// Operator command, consumed strictly FIFO by the engine.
///
/// Wire form: `{"kind": "NAVIGATE", "url": "..."}`, `{"kind": "SEND", "text": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    /// Point the browser at `url` and sync the thread it shows.
    Navigate {
        #[serde(default)]
        url: String,
    },
    /// Submit `text` as a new user turn and follow the streamed answer.
    Send {
        #[serde(default)]
        text: String,
    },
    /// Reload the page and rebuild the transcript from a fresh extraction.
    ReloadSimple {
        #[serde(default)]
        url: String,
    },
    /// Drop the thread's cache entry, then behave like `ReloadSimple`.
    ReloadAndInvalidate {
        #[serde(default)]
        url: String,
    },
    /// Delete every cache entry, then refresh the thread list.
    ClearAllCache,
    /// Query the remote thread index.
    FetchThreadList,
    /// Drain no further commands and shut the session down.
    Stop,
}

#[derive(Debug, thiserror::Error)]
#[error("malformed command: {0}")]
pub struct CommandParseError(#[from] serde_json::Error);

impl Command {
    pub fn from_json(raw: &str) -> Result<Self, CommandParseError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json(&self) -> String {
        // Serializing a plain enum of strings cannot fail.
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether the payload is usable. Commands with an empty url or text are
    /// ignored by the dispatcher instead of failing.
    pub fn is_actionable(&self) -> bool {
        match self {
            Command::Navigate { url }
            | Command::ReloadSimple { url }
            | Command::ReloadAndInvalidate { url } => !url.trim().is_empty(),
            Command::Send { text } => !text.trim().is_empty(),
            Command::ClearAllCache | Command::FetchThreadList | Command::Stop => true,
        }
    }

    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            Command::Navigate { .. } => "NAVIGATE",
            Command::Send { .. } => "SEND",
            Command::ReloadSimple { .. } => "RELOAD_SIMPLE",
            Command::ReloadAndInvalidate { .. } => "RELOAD_AND_INVALIDATE",
            Command::ClearAllCache => "CLEAR_ALL_CACHE",
            Command::FetchThreadList => "FETCH_THREAD_LIST",
            Command::Stop => "STOP",
        }
    }
}
