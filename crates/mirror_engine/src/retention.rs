use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use engine_logging::{engine_debug, engine_info, engine_warn};

/// Age after which cache and log files are deleted at startup.
pub const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Deletes regular files older than `max_age` from each directory, best
/// effort. Returns how many were removed.
pub fn sweep_expired(dirs: &[&Path], max_age: Duration) -> usize {
    sweep_expired_at(dirs, max_age, SystemTime::now())
}

pub fn sweep_expired_at(dirs: &[&Path], max_age: Duration, now: SystemTime) -> usize {
    let removed: usize = dirs
        .iter()
        .map(|dir| sweep_dir(dir, max_age, now))
        .sum();
    if removed > 0 {
        engine_info!("Retention sweep removed {} expired files", removed);
    }
    removed
}

fn sweep_dir(dir: &Path, max_age: Duration, now: SystemTime) -> usize {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            engine_debug!("Skipping retention sweep of {:?}: {}", dir, err);
            return 0;
        }
    };
    let mut removed = 0;
    for entry in entries.filter_map(Result::ok) {
        let Ok(meta) = entry.metadata() else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match fs::remove_file(entry.path()) {
            Ok(()) => removed += 1,
            Err(err) => engine_warn!("Failed to delete expired file {:?}: {}", entry.path(), err),
        }
    }
    removed
}
