use serde::{Deserialize, Serialize};

/// Author of a turn as reported by the remote page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Role {
    /// Maps the page's author attribute onto a role; anything unrecognised is `Unknown`.
    pub fn from_author(author: &str) -> Self {
        match author.trim().to_ascii_lowercase().as_str() {
            "user" => Role::User,
            "assistant" => Role::Assistant,
            "system" => Role::System,
            _ => Role::Unknown,
        }
    }
}

/// One message unit of a thread. Text is always normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl AsRef<str>) -> Self {
        Self {
            role,
            text: normalize_text(text.as_ref()),
        }
    }

    pub fn user(text: impl AsRef<str>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl AsRef<str>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// Collapses runs of three or more newlines to exactly two and trims the ends.
pub fn normalize_text(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut newline_run = 0usize;
    for c in trimmed.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out
}
