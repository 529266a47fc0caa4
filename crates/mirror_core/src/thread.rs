use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

/// Path segment that precedes a thread identifier, as in `/c/<id>`.
const THREAD_SEGMENT: &str = "c";

/// Display form of the sentinel used for pages that have no identifier yet.
pub const NEW_THREAD: &str = "new thread";

/// Identifier of a conversation thread.
///
/// `New` is the sentinel for a page that has not been assigned an identifier
/// by the remote yet; it is never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ThreadId {
    #[default]
    New,
    Known(String),
}

impl ThreadId {
    /// Derives the thread identifier from a navigable URL (`.../c/<id>`).
    pub fn from_url(url: &str) -> Self {
        let path = match Url::parse(url.trim()) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.trim().to_string(),
        };
        let segments: Vec<&str> = path.split('/').collect();
        segments
            .windows(2)
            .find_map(|pair| {
                if pair[0] != THREAD_SEGMENT {
                    return None;
                }
                let id: String = pair[1]
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                    .collect();
                (!id.is_empty()).then_some(ThreadId::Known(id))
            })
            .unwrap_or(ThreadId::New)
    }

    /// Cache key for the thread; `None` for the sentinel.
    pub fn key(&self) -> Option<&str> {
        match self {
            ThreadId::New => None,
            ThreadId::Known(id) => Some(id),
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ThreadId::New)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreadId::New => f.write_str(NEW_THREAD),
            ThreadId::Known(id) => f.write_str(id),
        }
    }
}

/// One entry of the remote thread index (sidebar).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub title: String,
    pub url: String,
}

impl ThreadSummary {
    /// Builds an entry, keeping only the first line of the link text as title.
    pub fn new(raw_title: &str, url: impl Into<String>) -> Self {
        let title = raw_title.lines().next().unwrap_or_default().trim().to_string();
        Self {
            title,
            url: url.into(),
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        ThreadId::from_url(&self.url)
    }
}
