//! Resource configuration file handling
//!
//! Optional YAML file with process-wide settings. Every field has a default so
//! the resource runs without any configuration at all.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("repo-resource-cache")
}

fn default_jobs() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

/// repo-resource configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// Working directory used by check to fetch the manifest repository
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Projects checked out concurrently when neither the source nor the
    /// manifest says otherwise
    #[serde(default = "default_jobs")]
    pub jobs: usize,

    /// Log filter used when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl ResourceConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            jobs: default_jobs(),
            log_level: default_log_level(),
        }
    }

    /// Override the cache directory
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    /// Load configuration from a specific path
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(crate::RepoResourceError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        tracing::debug!(path = %path.display(), "Loading resource configuration");

        let content = fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;

        if config.jobs == 0 {
            return Err(crate::RepoResourceError::Config(
                "jobs must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;

        Ok(())
    }
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self::new()
    }
}
