//! Configuration loading for amux.
//! Loads configuration from ${AMUX_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Backend CLI configuration.
///
/// The backend is the external assistant CLI that hosts sessions. amux
/// spawns one backend process per turn and reads its stream-JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Executable name or path.
    pub binary: String,

    /// Extra arguments appended to every backend invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_args: Vec<String>,

    /// Directory where the backend keeps its own session logs.
    /// Defaults to `~/.claude` when unset.
    pub data_dir: Option<String>,

    /// Abort a turn after this many seconds (0 disables the limit).
    pub turn_timeout_secs: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            binary: Config::DEFAULT_BACKEND_BINARY.to_string(),
            extra_args: Vec::new(),
            data_dir: None,
            turn_timeout_secs: Config::DEFAULT_TURN_TIMEOUT_SECS,
        }
    }
}

impl BackendConfig {
    /// Returns the backend data directory, resolving the default when unset.
    pub fn effective_data_dir(&self) -> PathBuf {
        if let Some(dir) = self
            .data_dir
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return PathBuf::from(dir);
        }

        dirs::home_dir()
            .map(|h| h.join(".claude"))
            .expect("Could not determine home directory")
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        if self.turn_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(u64::from(self.turn_timeout_secs)))
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Default model forwarded to the backend (optional)
    pub model: Option<String>,

    /// Log filter used when AMUX_LOG is not set
    pub log_filter: String,

    /// Backend CLI configuration
    #[serde(default)]
    pub backend: BackendConfig,
}

impl Config {
    const DEFAULT_BACKEND_BINARY: &str = "claude";
    /// Default is disabled
    const DEFAULT_TURN_TIMEOUT_SECS: u32 = 0;
    const DEFAULT_LOG_FILTER: &str = "warn";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the effective model option, ignoring blank values.
    pub fn effective_model(&self) -> Option<&str> {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: None,
            log_filter: Self::DEFAULT_LOG_FILTER.to_string(),
            backend: BackendConfig::default(),
        }
    }
}

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
/// To update, edit default_config.toml directly.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for amux configuration and data directories.
    //!
    //! AMUX_HOME resolution order:
    //! 1. AMUX_HOME environment variable (if set)
    //! 2. ~/.config/amux (default)

    use std::path::PathBuf;

    /// Returns the amux home directory.
    ///
    /// Checks AMUX_HOME env var first, falls back to ~/.config/amux
    pub fn amux_home() -> PathBuf {
        if let Ok(home) = std::env::var("AMUX_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("amux"))
            .expect("Could not determine home directory")
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        amux_home().join("config.toml")
    }

    /// Returns the path to the persisted deck file.
    pub fn deck_path() -> PathBuf {
        amux_home().join("deck.json")
    }

    /// Returns the directory log files are written to.
    pub fn logs_dir() -> PathBuf {
        amux_home().join("logs")
    }
}
