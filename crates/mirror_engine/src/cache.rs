use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_debug, engine_warn};
use mirror_core::{ThreadId, Turn};
use thiserror::Error;

use crate::persist::{AtomicFileWriter, PersistError};

const CACHE_EXTENSION: &str = "json";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("cache entry {path:?} is not a turn list: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to serialize turns: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// One JSON file per known thread holding its last reconciled turn list.
///
/// Only the engine thread touches the store. The new-thread sentinel has no
/// entry: loading it yields nothing and saving or removing it is a no-op.
#[derive(Debug, Clone)]
pub struct CacheStore {
    writer: AtomicFileWriter,
}

impl CacheStore {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }

    pub fn dir(&self) -> &Path {
        self.writer.dir()
    }

    /// Path of the entry for `thread`, if it can have one.
    pub fn entry_path(&self, thread: &ThreadId) -> Option<PathBuf> {
        thread.key().map(|key| self.dir().join(file_name(key)))
    }

    /// Cached turns of `thread`; an absent entry is an empty list.
    pub fn load(&self, thread: &ThreadId) -> Result<Vec<Turn>, CacheError> {
        let Some(path) = self.entry_path(thread) else {
            return Ok(Vec::new());
        };
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let turns: Vec<Turn> = serde_json::from_str(&content)
            .map_err(|source| CacheError::Corrupt { path: path.clone(), source })?;
        engine_debug!("Loaded {} cached turns from {:?}", turns.len(), path);
        Ok(turns)
    }

    /// Replaces the entry of `thread`. Returns false for the sentinel.
    pub fn save(&self, thread: &ThreadId, turns: &[Turn]) -> Result<bool, CacheError> {
        let Some(key) = thread.key() else {
            return Ok(false);
        };
        let content = serde_json::to_string_pretty(turns)?;
        let path = self.writer.write(&file_name(key), &content)?;
        engine_debug!("Saved {} turns to {:?}", turns.len(), path);
        Ok(true)
    }

    /// Deletes the entry of `thread`. Missing entries are not an error;
    /// returns whether a file was actually removed.
    pub fn remove(&self, thread: &ThreadId) -> Result<bool, CacheError> {
        let Some(path) = self.entry_path(thread) else {
            return Ok(false);
        };
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes every file in the cache directory, best effort. Returns how
    /// many were removed.
    pub fn clear(&self) -> usize {
        let entries = match fs::read_dir(self.dir()) {
            Ok(entries) => entries,
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    engine_warn!("Failed to list cache dir {:?}: {}", self.dir(), err);
                }
                return 0;
            }
        };
        entries
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| match fs::remove_file(entry.path()) {
                Ok(()) => true,
                Err(err) => {
                    engine_warn!("Failed to remove cache file {:?}: {}", entry.path(), err);
                    false
                }
            })
            .count()
    }
}

fn file_name(key: &str) -> String {
    format!("{key}.{CACHE_EXTENSION}")
}
