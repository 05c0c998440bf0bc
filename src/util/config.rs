//! Configuration file support.
//!
//! Two locations are consulted:
//! - Global: `~/.sdist-ports/config.toml` - User-wide defaults
//! - Project: `.sdist-ports/config.toml` - Overrides for the working directory
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::util::executor::DEFAULT_WORKERS;

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".sdist-ports";

/// Packaging configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Filesystem executor settings
    pub fs: FsConfig,

    /// Network settings
    pub net: NetConfig,

    /// Git fetch settings
    pub git: GitConfig,

    /// Archive download settings
    pub archive: ArchiveConfig,
}

/// Bounded executor settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsConfig {
    /// Maximum number of filesystem operations running at once
    pub workers: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        FsConfig {
            workers: DEFAULT_WORKERS,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent with downloads
    pub user_agent: String,
}

impl Default for NetConfig {
    fn default() -> Self {
        NetConfig {
            timeout_secs: 300,
            user_agent: concat!("sdist-ports/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Git fetch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Fetch only the tagged commit (depth 1)
    pub shallow: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        GitConfig { shallow: true }
    }
}

/// Archive download settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Bytes read from the response body per write
    pub chunk_size: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        ArchiveConfig { chunk_size: 1024 }
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if the file is missing or broken.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Load merged configuration from the global and project locations.
    pub fn discover(project_root: &Path) -> Self {
        let mut config = Config::default();

        if let Some(global) = global_config_path() {
            if global.exists() {
                config.merge(Config::load_or_default(&global));
            }
        }

        let project = project_config_path(project_root);
        if project.exists() {
            config.merge(Config::load_or_default(&project));
        }

        config
    }

    /// Merge another config into this one (other takes precedence where it
    /// differs from the defaults).
    pub fn merge(&mut self, other: Config) {
        let defaults = Config::default();

        if other.fs != defaults.fs {
            self.fs = other.fs;
        }
        if other.net.timeout_secs != defaults.net.timeout_secs {
            self.net.timeout_secs = other.net.timeout_secs;
        }
        if other.net.user_agent != defaults.net.user_agent {
            self.net.user_agent = other.net.user_agent;
        }
        if other.git != defaults.git {
            self.git = other.git;
        }
        if other.archive != defaults.archive {
            self.archive = other.archive;
        }
    }
}

/// Get the global config directory (~/.sdist-ports).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR_NAME))
}

/// Get the global config path (~/.sdist-ports/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.sdist-ports/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME).join("config.toml")
}
