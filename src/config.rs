use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};

pub const DB_PATH_ENV: &str = "WORK_TRACKER_DB";
pub const LOG_LEVEL_ENV: &str = "WORK_TRACKER_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    pub database_path: PathBuf,
    pub log_level: String,
    /// Limits are in characters, not bytes.
    pub max_subject_len: usize,
    pub max_description_len: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("work-tracker.sqlite3"),
            log_level: "info".into(),
            max_subject_len: 200,
            max_description_len: 2000,
            default_page_size: 50,
            max_page_size: 500,
        }
    }
}

impl TrackerConfig {
    /// Reads a JSON config file. A missing file yields the defaults, and so
    /// does a file that fails to parse (with a warning).
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        match serde_json::from_str(&contents) {
            Ok(config) => Ok(config),
            Err(err) => {
                warn!(
                    "Ignoring malformed config at {}: {err}; using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Some(db_path) = non_empty_env(DB_PATH_ENV) {
            self.database_path = PathBuf::from(db_path);
        }
        if let Some(level) = non_empty_env(LOG_LEVEL_ENV) {
            self.log_level = level;
        }
        self
    }

    /// Requested page size, defaulted and clamped to the configured maximum.
    pub fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_page_size)
            .clamp(1, self.max_page_size.max(1))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
