//! Daemon configuration, loaded from a TOML file with full defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::history::DEFAULT_HISTORY_FILE;

/// Looked for in the working directory when no `--config` path is given.
pub const DEFAULT_CONFIG_FILE: &str = "memwarden.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub monitor: MonitorConfig,
    pub guardian: GuardianConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7070".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Seconds between unattended evaluations.
    pub poll_interval_secs: u64,
    /// Where the usage history CSV lives. Relative paths resolve against the
    /// daemon's working directory.
    pub history_path: PathBuf,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            history_path: PathBuf::from(DEFAULT_HISTORY_FILE),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardianConfig {
    /// Arm autonomous cleanup at startup. Can still be toggled at runtime.
    pub start_enabled: bool,
    /// Minimum seconds between autonomous dispatches. 0 fires on every
    /// qualifying evaluation.
    pub cooldown_secs: u64,
}

impl Default for GuardianConfig {
    fn default() -> Self {
        Self {
            start_enabled: false,
            cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Directory the junk sweep operates on.
    pub junk_dir: PathBuf,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            junk_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads from `path` when given (the file must exist), otherwise from
    /// `memwarden.toml` in the working directory when present, otherwise
    /// built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.exists() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("invalid config {}", path.display()))
    }
}
