//! Configuration loading and management.

use crate::defaults;
use crate::error::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub languages: LanguagesConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Language spoken into the STT stage.
    pub source: String,
    /// Languages the translate and TTS stages fan out to.
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"voxsync=debug"`.
    pub filter: String,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            source: defaults::SOURCE_LANG.to_string(),
            targets: defaults::TARGET_LANGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: defaults::LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    ///
    /// A file that exists but fails to parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Apply `VOXSYNC_*` environment overrides. Empty values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(source) = std::env::var(defaults::ENV_SOURCE_LANG)
            && !source.trim().is_empty()
        {
            self.languages.source = source.trim().to_string();
        }

        if let Ok(targets) = std::env::var(defaults::ENV_TARGET_LANGS) {
            let targets: Vec<String> = targets
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !targets.is_empty() {
                self.languages.targets = targets;
            }
        }

        if let Ok(filter) = std::env::var(defaults::ENV_LOG)
            && !filter.trim().is_empty()
        {
            self.log.filter = filter.trim().to_string();
        }

        self
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.languages.source.trim().is_empty() {
            return Err(SyncError::ConfigInvalidValue {
                key: "languages.source".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        if self.languages.targets.is_empty() {
            return Err(SyncError::ConfigInvalidValue {
                key: "languages.targets".to_string(),
                message: "at least one target language is required".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for lang in &self.languages.targets {
            if lang.trim().is_empty() {
                return Err(SyncError::ConfigInvalidValue {
                    key: "languages.targets".to_string(),
                    message: "language tags must not be empty".to_string(),
                });
            }
            if !seen.insert(lang.as_str()) {
                return Err(SyncError::ConfigInvalidValue {
                    key: "languages.targets".to_string(),
                    message: format!("duplicate language '{lang}'"),
                });
            }
        }
        Ok(())
    }

    /// Render as TOML, for `voxsync config show`.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| SyncError::ConfigInvalidValue {
            key: "config".to_string(),
            message: e.to_string(),
        })
    }

    /// Get default config file path (`~/.config/voxsync/config.toml`).
    #[cfg(feature = "cli")]
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("voxsync")
            .join("config.toml")
    }
}
