use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    /// The browser, tab or connection is gone; the session must be rebuilt.
    Lost,
    /// The browser could not be started.
    Launch,
    /// Navigation or reload failed on a live session.
    Navigation,
    /// A page script failed or returned something unexpected.
    Script,
    /// Typing or submitting into the page failed.
    Input,
}

impl fmt::Display for SessionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionErrorKind::Lost => write!(f, "session lost"),
            SessionErrorKind::Launch => write!(f, "launch failed"),
            SessionErrorKind::Navigation => write!(f, "navigation failed"),
            SessionErrorKind::Script => write!(f, "script failed"),
            SessionErrorKind::Input => write!(f, "input failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SessionError {
    pub kind: SessionErrorKind,
    pub message: String,
}

impl SessionError {
    pub fn new(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn lost(message: impl Into<String>) -> Self {
        Self::new(SessionErrorKind::Lost, message)
    }

    /// Classifies a driver failure: anything mentioning a closed connection
    /// or a vanished target means the session is gone.
    pub fn from_driver(kind: SessionErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("closed") || lower.contains("target") {
            Self::new(SessionErrorKind::Lost, message)
        } else {
            Self::new(kind, message)
        }
    }

    /// Session-fatal errors unwind to the supervisor; the rest are local.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind, SessionErrorKind::Lost | SessionErrorKind::Launch)
    }
}

/// Failure of a single poll sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SampleError {
    /// Nothing usable this tick; the poll goes on.
    #[error("transient: {0}")]
    Transient(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl SampleError {
    pub fn transient(message: impl Into<String>) -> Self {
        SampleError::Transient(message.into())
    }
}

/// Maps a session error met while sampling: fatal ones abort the poll,
/// everything else only costs the tick.
pub fn sample_failure(err: SessionError) -> SampleError {
    if err.is_fatal() {
        SampleError::Session(err)
    } else {
        SampleError::Transient(err.to_string())
    }
}
