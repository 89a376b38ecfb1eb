//! Global user preferences at `~/.odo/preference.yaml`.
//!
//! Loaded once per process and handed to the cluster client at construction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, ConfigError};

fn default_push_timeout_secs() -> u64 {
    240
}

fn default_poll_interval_ms() -> u64 {
    1000
}

/// User-wide settings shared by every component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preference {
    /// Upper bound on waiting for a component's pod to be running.
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,
    /// Interval between readiness polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Namespace used when a component does not name its project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl Default for Preference {
    fn default() -> Self {
        Self {
            push_timeout_secs: default_push_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            namespace: None,
        }
    }
}

impl Preference {
    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// `<home>/.odo/preference.yaml`
pub fn preference_path_at(home: &Path) -> PathBuf {
    home.join(".odo").join("preference.yaml")
}

/// Load preferences, falling back to defaults when the file is absent.
pub fn load_at(home: &Path) -> Result<Preference, ConfigError> {
    let path = preference_path_at(home);
    if !path.exists() {
        return Ok(Preference::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse { path, source: e })
}

/// `load_at` convenience wrapper rooted at `dirs::home_dir()`.
pub fn load() -> Result<Preference, ConfigError> {
    load_at(&dirs::home_dir().ok_or(ConfigError::HomeNotFound)?)
}
