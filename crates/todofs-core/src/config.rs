//! Configuration structures for todofs.
//!
//! - [`StoreConfig`] - Which file to manage and where to keep store state
//! - [`WatchConfig`] - File watcher settings (enablement, resume delay)
//! - [`Config`] - Root configuration combining all settings
//!
//! All configuration types implement [`Default`] and deserialize with
//! `#[serde(default)]`, so a config file only needs the keys it overrides.

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::types::LineEnding;

/// Name of the JSON file holding persisted store state inside `state_dir`.
const STATE_FILE_NAME: &str = "store-state.json";

/// Configuration for the task file and its persisted state.
///
/// # Examples
///
/// ```
/// use todofs_core::{LineEnding, StoreConfig};
///
/// let config = StoreConfig::default();
/// assert_eq!(config.todo_path, "todo.txt");
/// assert_eq!(config.line_ending, LineEnding::Lf);
/// assert_eq!(config.state_file(), ".todofs/store-state.json");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path of the plain-text task file.
    pub todo_path: Utf8PathBuf,

    /// Directory holding persisted store state (the pending-changes flag).
    pub state_dir: Utf8PathBuf,

    /// Directory receiving a backup copy before every save.
    /// `None` disables backups.
    pub backup_dir: Option<Utf8PathBuf>,

    /// Line separator used when writing.
    pub line_ending: LineEnding,
}

impl StoreConfig {
    /// Returns the path of the persisted state file.
    #[must_use]
    pub fn state_file(&self) -> Utf8PathBuf {
        self.state_dir.join(STATE_FILE_NAME)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            todo_path: Utf8PathBuf::from("todo.txt"),
            state_dir: Utf8PathBuf::from(".todofs"),
            backup_dir: None,
            line_ending: LineEnding::Lf,
        }
    }
}

/// Configuration for the file watcher.
///
/// # Examples
///
/// ```
/// use todofs_core::WatchConfig;
///
/// let config = WatchConfig::default();
/// assert!(config.enabled);
/// assert_eq!(config.resume_delay_ms, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Whether to watch the task file for external changes.
    pub enabled: bool,

    /// Delay after a save completes before change notifications resume.
    ///
    /// Must exceed the OS event-delivery latency, otherwise the store's own
    /// write is reported as an external change.
    pub resume_delay_ms: u64,
}

impl WatchConfig {
    /// Returns the resume delay as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn resume_delay(&self) -> Duration {
        Duration::from_millis(self.resume_delay_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resume_delay_ms: 1000,
        }
    }
}

/// Root configuration for todofs.
///
/// # Examples
///
/// ```
/// use todofs_core::Config;
///
/// let config = Config::default();
/// let json = serde_json::to_string_pretty(&config).unwrap();
/// assert!(json.contains("resume_delay_ms"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Task file configuration.
    pub store: StoreConfig,

    /// File watcher configuration.
    pub watch: WatchConfig,
}

impl Config {
    /// Loads a configuration from a JSON file.
    ///
    /// Missing keys fall back to their defaults. The result is validated.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::MissingFile(path.to_owned()));
        }
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks option values that serde alone cannot reject.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.resume_delay_ms == 0 {
            return Err(ConfigError::invalid_option(
                "watch.resume_delay_ms",
                "must be greater than zero",
            ));
        }
        if self.store.todo_path.file_name().is_none() {
            return Err(ConfigError::invalid_path(
                self.store.todo_path.clone(),
                "task file path has no file name",
            ));
        }
        Ok(())
    }
}
