//! Runtime settings for the pipeline binary

use crate::error::{PipelineError, PipelineResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Pipeline settings. Every field has a default, so an empty YAML document
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database holding domain, ledger and semantic tables
    pub database_path: PathBuf,
    /// Seconds between capture cycles in `run`
    pub capture_interval_secs: u64,
    /// Max raw events reduced per backfill pass
    pub backfill_limit: usize,
    pub reduction_workers: usize,
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database_path: default_db_path(),
            capture_interval_secs: 60,
            backfill_limit: 100,
            reduction_workers: 4,
            queue_capacity: 1024,
        }
    }
}

impl PipelineConfig {
    /// Load from a YAML file; missing keys keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::Configuration(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml_str(&text)
            .map_err(|e| PipelineError::Configuration(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn capture_interval(&self) -> Duration {
        Duration::from_secs(self.capture_interval_secs.max(1))
    }
}

/// `~/.local/share/cognition/cognition.db` or the platform equivalent.
pub fn default_db_path() -> PathBuf {
    let data_dir = dirs::data_dir().unwrap_or_else(|| dirs::home_dir().unwrap_or_default().join(".local/share"));
    data_dir.join("cognition").join("cognition.db")
}
