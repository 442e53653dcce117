//! Engine configuration types.

use std::path::PathBuf;
use std::time::Duration;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::OpError;

/// Size of one copy chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Minimum time between two progress notifications with the same percentage.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

/// Number of `(copy N)` names tried before falling back to a timestamp.
pub const DEFAULT_MAX_COPY_PROBES: u32 = 10_000;

/// Buffer size of the executor's event channel.
pub const DEFAULT_CHANNEL_SIZE: usize = 100;

/// Configuration for the copy/move/trash engine.
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
pub struct EngineConfig {
    /// Home directory, used for `~` expansion and the default trash location.
    pub home: PathBuf,

    /// Trash root override (defaults to `<home>/.local/share/Trash`).
    #[builder(default, setter(into, strip_option))]
    #[serde(default)]
    pub trash_dir: Option<PathBuf>,

    /// Bytes read and written per copy chunk.
    #[builder(default = "DEFAULT_CHUNK_SIZE")]
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Progress throttle interval in milliseconds.
    #[builder(default = "DEFAULT_PROGRESS_INTERVAL_MS")]
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    /// Maximum `(copy N)` names tried for unique names.
    #[builder(default = "DEFAULT_MAX_COPY_PROBES")]
    #[serde(default = "default_max_copy_probes")]
    pub max_copy_probes: u32,

    /// Event channel capacity.
    #[builder(default = "DEFAULT_CHANNEL_SIZE")]
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

fn default_max_copy_probes() -> u32 {
    DEFAULT_MAX_COPY_PROBES
}

fn default_channel_size() -> usize {
    DEFAULT_CHANNEL_SIZE
}

impl EngineConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        match self.home {
            Some(ref home) if home.as_os_str().is_empty() => {
                return Err("Home directory cannot be empty".to_string());
            }
            None => return Err("Home directory is required".to_string()),
            _ => {}
        }
        if self.chunk_size == Some(0) {
            return Err("Chunk size must be positive".to_string());
        }
        if self.max_copy_probes == Some(0) {
            return Err("At least one copy name must be tried".to_string());
        }
        if self.channel_size == Some(0) {
            return Err("Channel size must be positive".to_string());
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Create a new engine config builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Create a config with defaults for the given home directory.
    pub fn new(home: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            trash_dir: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
            max_copy_probes: DEFAULT_MAX_COPY_PROBES,
            channel_size: DEFAULT_CHANNEL_SIZE,
        }
    }

    /// Create a config for the current user's home directory.
    pub fn from_env() -> Result<Self, OpError> {
        dirs::home_dir()
            .map(Self::new)
            .ok_or_else(|| OpError::invalid_path("~", "home directory could not be determined"))
    }

    /// Redirect the trash to another root.
    pub fn with_trash_dir(mut self, trash_dir: impl Into<PathBuf>) -> Self {
        self.trash_dir = Some(trash_dir.into());
        self
    }

    /// Root of the trash area.
    pub fn trash_root(&self) -> PathBuf {
        self.trash_dir
            .clone()
            .unwrap_or_else(|| self.home.join(".local").join("share").join("Trash"))
    }

    /// Directory holding trashed items.
    pub fn trash_files_dir(&self) -> PathBuf {
        self.trash_root().join("files")
    }

    /// Directory holding `.trashinfo` records.
    pub fn trash_info_dir(&self) -> PathBuf {
        self.trash_root().join("info")
    }

    /// Progress throttle interval.
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::builder()
            .home("/home/user")
            .chunk_size(4096usize)
            .trash_dir("/tmp/trash")
            .build()
            .unwrap();

        assert_eq!(config.home, PathBuf::from("/home/user"));
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.trash_root(), PathBuf::from("/tmp/trash"));
        assert_eq!(config.max_copy_probes, DEFAULT_MAX_COPY_PROBES);
    }

    #[test]
    fn test_config_rejects_invalid() {
        assert!(EngineConfig::builder().build().is_err());
        assert!(EngineConfig::builder().home("").build().is_err());
        assert!(
            EngineConfig::builder()
                .home("/home/user")
                .chunk_size(0usize)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_default_trash_layout() {
        let config = EngineConfig::new("/home/user");
        assert_eq!(
            config.trash_files_dir(),
            PathBuf::from("/home/user/.local/share/Trash/files")
        );
        assert_eq!(
            config.trash_info_dir(),
            PathBuf::from("/home/user/.local/share/Trash/info")
        );
        assert_eq!(config.progress_interval(), Duration::from_millis(100));
    }
}
