/// Turns successive snapshots of a growing text into the chunks to display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamAccumulator {
    shown: String,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `current` and returns the part not shown yet, if any.
    ///
    /// When the snapshot does not extend what was shown (the remote rewrote
    /// the text) the delta is taken positionally, and a shrinking text yields
    /// nothing; already displayed text is never retracted.
    pub fn advance(&mut self, current: &str) -> Option<String> {
        if current == self.shown {
            return None;
        }
        let delta = match current.strip_prefix(self.shown.as_str()) {
            Some(suffix) => suffix.to_string(),
            None => current.chars().skip(self.shown.chars().count()).collect(),
        };
        self.shown = current.to_string();
        (!delta.is_empty()).then_some(delta)
    }

    pub fn shown(&self) -> &str {
        &self.shown
    }
}
