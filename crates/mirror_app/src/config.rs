use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use engine_logging::LogSettings;
use mirror_engine::{BrowserSettings, EngineConfig};
use serde::{Deserialize, Serialize};

/// Everything the console reads at startup, from an optional RON file.
///
/// Relative directories are taken relative to `data_dir`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub data_dir: PathBuf,
    pub engine: EngineConfig,
    pub browser: BrowserSettings,
    pub log: LogSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            engine: EngineConfig::default(),
            browser: BrowserSettings::default(),
            log: LogSettings::default(),
        }
    }
}

impl AppConfig {
    /// Reads `path`, or returns the defaults when no file was given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: AppConfig = ron::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        Ok(config)
    }

    /// Anchors the cache, log and browser profile directories at `data_dir`.
    pub fn resolved(mut self) -> Self {
        let root = self.data_dir.clone();
        for dir in [
            &mut self.engine.cache_dir,
            &mut self.log.dir,
            &mut self.browser.user_data_dir,
        ] {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
        self
    }
}
