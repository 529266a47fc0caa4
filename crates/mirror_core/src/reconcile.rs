use crate::Turn;

/// How an observation related to the cached state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    /// Nothing was cached; every observed turn is new.
    Full,
    /// The observation grew by a suffix.
    Append,
    /// No growth; nothing to emit and the cache stays as it was.
    UpToDate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub kind: SyncKind,
    pub to_emit: Vec<Turn>,
    pub new_cache: Vec<Turn>,
}

impl Reconciliation {
    /// Whether the cache entry has to be rewritten.
    pub fn cache_changed(&self) -> bool {
        !matches!(self.kind, SyncKind::UpToDate) && !self.new_cache.is_empty()
    }
}

/// Pure suffix diff of freshly observed turns against the cached ones.
///
/// The remote is assumed to only ever append: extra observed turns are taken
/// as a contiguous suffix, and an observation that is not longer than the
/// cache never rewrites or shrinks it. Edits to historical turns are not
/// detected.
pub fn reconcile(cached: &[Turn], observed: &[Turn]) -> Reconciliation {
    if cached.is_empty() {
        return Reconciliation {
            kind: SyncKind::Full,
            to_emit: observed.to_vec(),
            new_cache: observed.to_vec(),
        };
    }

    if observed.len() > cached.len() {
        return Reconciliation {
            kind: SyncKind::Append,
            to_emit: observed[cached.len()..].to_vec(),
            new_cache: observed.to_vec(),
        };
    }

    Reconciliation {
        kind: SyncKind::UpToDate,
        to_emit: Vec::new(),
        new_cache: cached.to_vec(),
    }
}
