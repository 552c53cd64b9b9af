// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

use crate::retry::LockRetryPolicy;

pub const CONFIG_FILE: &str = "ctplot.toml";
pub const ENV_PREFIX: &str = "CTPLOT";

/// Runtime knobs for the aggregation core. Settings for individual plots arrive separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,
    /// Directory for averaged-data cache entries; unset or empty disables caching.
    #[serde(default)]
    pub cachedir: Option<PathBuf>,
    /// Upper bound on waiting for a cache lock. Zero waits forever.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,
    #[serde(default = "default_lock_poll_ms")]
    pub lock_poll_ms: u64,
    #[serde(default = "default_lock_poll_max_ms")]
    pub lock_poll_max_ms: u64,
    #[serde(default = "default_cache_batch_rows")]
    pub cache_batch_rows: usize,
    #[serde(default = "default_time_field")]
    pub time_field: String,
    #[serde(default = "default_progress_stride")]
    pub progress_stride: u64,
}

fn default_datadir() -> PathBuf {
    PathBuf::from("data")
}

fn default_lock_timeout_secs() -> u64 {
    300
}

fn default_lock_poll_ms() -> u64 {
    50
}

fn default_lock_poll_max_ms() -> u64 {
    2_000
}

fn default_cache_batch_rows() -> usize {
    4096
}

fn default_time_field() -> String {
    "time".to_string()
}

fn default_progress_stride() -> u64 {
    10_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            datadir: default_datadir(),
            cachedir: None,
            lock_timeout_secs: default_lock_timeout_secs(),
            lock_poll_ms: default_lock_poll_ms(),
            lock_poll_max_ms: default_lock_poll_max_ms(),
            cache_batch_rows: default_cache_batch_rows(),
            time_field: default_time_field(),
            progress_stride: default_progress_stride(),
        }
    }
}

impl AppConfig {
    /// Load from `ctplot.toml` (optional) overlaid with `CTPLOT_*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    /// Like [`AppConfig::load`] with an explicit file; a missing file leaves the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        log::debug!(
            "config: datadir={} cachedir={:?} lock_timeout={:?}",
            config.datadir.display(),
            config.cache_dir(),
            config.lock_timeout()
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_batch_rows == 0 {
            return Err(ConfigError::Message(
                "cache_batch_rows must be positive".to_string(),
            ));
        }
        if self.time_field.trim().is_empty() {
            return Err(ConfigError::Message("time_field is required".to_string()));
        }
        if self.progress_stride == 0 {
            return Err(ConfigError::Message(
                "progress_stride must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn with_cachedir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cachedir = Some(dir.into());
        self
    }

    pub fn with_datadir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.datadir = dir.into();
        self
    }

    pub fn datadir(&self) -> &Path {
        &self.datadir
    }

    /// Cache directory, if caching is enabled.
    pub fn cache_dir(&self) -> Option<&Path> {
        self.cachedir
            .as_deref()
            .filter(|dir| !dir.as_os_str().is_empty())
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        match self.lock_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn lock_policy(&self) -> LockRetryPolicy {
        LockRetryPolicy::new(
            self.lock_timeout(),
            self.lock_poll_ms,
            self.lock_poll_max_ms,
            0.2,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert!(config.cache_dir().is_none());
        assert_eq!(config.lock_timeout(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn empty_cachedir_disables_cache() {
        let config = AppConfig::default().with_cachedir("");
        assert!(config.cache_dir().is_none());
        let config = AppConfig::default().with_cachedir("/tmp/ctplot-cache");
        assert_eq!(config.cache_dir(), Some(Path::new("/tmp/ctplot-cache")));
    }

    #[test]
    fn zero_timeout_waits_forever() {
        let config = AppConfig {
            lock_timeout_secs: 0,
            ..AppConfig::default()
        };
        assert!(config.lock_timeout().is_none());
        assert!(config.lock_policy().timeout.is_none());
    }

    #[test]
    fn loads_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ctplot.toml");
        std::fs::write(
            &path,
            "datadir = \"/srv/tables\"\ncachedir = \"/srv/cache\"\nlock_timeout_secs = 0\n",
        )
        .unwrap();
        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.datadir(), Path::new("/srv/tables"));
        assert_eq!(config.cache_dir(), Some(Path::new("/srv/cache")));
        assert!(config.lock_timeout().is_none());
        assert_eq!(config.time_field, "time");

        let missing = AppConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.datadir(), Path::new("data"));
    }

    #[test]
    fn rejects_zero_batch_rows() {
        let config = AppConfig {
            cache_batch_rows: 0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
