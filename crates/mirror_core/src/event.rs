use serde::{Deserialize, Serialize};

use crate::{Role, ThreadSummary, Turn};

/// Chunk appended to a stream once the response is complete.
pub const STREAM_TERMINATOR: &str = "\n\n";

/// Outbound notification to the display surface. Order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Event {
    /// A complete turn (or a system separator) appended to the transcript.
    TranscriptAppend { role: Role, text: String },
    /// A streamed turn begins; chunks follow.
    StreamStart { role: Role },
    /// Incremental text of the turn opened by the last `StreamStart`.
    StreamChunk { text: String },
    /// A new line in the system log.
    SystemLine { text: String },
    /// Text appended to the current system log line (progress markers).
    SystemAppend { text: String },
    /// The remote thread index.
    ThreadList { threads: Vec<ThreadSummary> },
}

impl Event {
    pub fn turn(turn: &Turn) -> Self {
        Event::TranscriptAppend {
            role: turn.role,
            text: turn.text.clone(),
        }
    }

    pub fn separator(text: impl Into<String>) -> Self {
        Event::TranscriptAppend {
            role: Role::System,
            text: text.into(),
        }
    }

    pub fn line(text: impl Into<String>) -> Self {
        Event::SystemLine { text: text.into() }
    }

    pub fn append(text: impl Into<String>) -> Self {
        Event::SystemAppend { text: text.into() }
    }

    pub fn chunk(text: impl Into<String>) -> Self {
        Event::StreamChunk { text: text.into() }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
