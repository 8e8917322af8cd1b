//! Courier configuration.
//!
//! Loaded from `~/.courier/config.toml`. A missing file means defaults;
//! admission policy is not configured here — it lives in the database,
//! per dispatch group. This file only carries engine knobs.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Database file. Defaults to `~/.courier/courier.sqlite`.
    pub database: Option<PathBuf>,

    /// How long a claim waits for the database write lock before
    /// failing as retryable, in milliseconds.
    pub lock_wait_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: None,
            lock_wait_ms: 5_000,
        }
    }
}

impl Config {
    /// Loads config from `~/.courier/config.toml`.
    /// A missing file yields the defaults; an unreadable or invalid
    /// file is an error.
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Err("could not determine home directory".into());
        };

        let contents = match fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.courier/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".courier").join("config.toml"))
    }

    /// The lock wait as a duration.
    pub fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }
}
