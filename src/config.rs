//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Simulated host page settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationConfig {
    #[serde(default = "default_page_title")]
    pub page_title: String,

    #[serde(default = "default_dots")]
    pub dots: usize,

    /// When to press login, in ms from page load
    #[serde(default = "default_login_at")]
    pub login_at_ms: Option<u64>,

    #[serde(default = "default_duration")]
    pub duration_ms: u64,

    #[serde(default = "default_virtual_time")]
    pub virtual_time: bool,
}

fn default_page_title() -> String {
    "Enterprise".to_string()
}

fn default_dots() -> usize {
    5
}

fn default_login_at() -> Option<u64> {
    Some(0)
}

fn default_duration() -> u64 {
    1500
}

fn default_virtual_time() -> bool {
    true
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            page_title: default_page_title(),
            dots: default_dots(),
            login_at_ms: default_login_at(),
            duration_ms: default_duration(),
            virtual_time: default_virtual_time(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        Self::discover().config
    }

    /// Load the first usable file from the default locations, reporting
    /// where the result came from
    ///
    /// Nothing is logged here: callers usually run this before the
    /// subscriber exists, so they log the outcome once it does.
    pub fn discover() -> LoadedConfig {
        Self::load_first(&default_config_paths())
    }

    fn load_first(paths: &[PathBuf]) -> LoadedConfig {
        let mut skipped = Vec::new();

        for path in paths.iter().filter(|path| path.exists()) {
            match Self::load_with_env(path) {
                Ok(config) => {
                    return LoadedConfig {
                        config,
                        source: Some(path.clone()),
                        skipped,
                    };
                }
                Err(e) => skipped.push(e),
            }
        }

        LoadedConfig {
            config: Self::from_env(),
            source: None,
            skipped,
        }
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        // Simulation overrides
        if let Some(dots) = lookup("SPLASH_DOTS").and_then(|s| s.parse().ok()) {
            self.simulation.dots = dots;
        }
        if let Some(duration) = lookup("SPLASH_DURATION_MS").and_then(|s| s.parse().ok()) {
            self.simulation.duration_ms = duration;
        }

        // Logging overrides
        if let Some(level) = lookup("SPLASH_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("SPLASH_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

fn default_config_paths() -> Vec<PathBuf> {
    [
        dirs::config_dir().map(|p| p.join("enterprise-splash").join("config.toml")),
        Some(PathBuf::from("./config.toml")),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// A configuration together with its origin
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,

    /// File the config was read from; `None` means built-in defaults
    pub source: Option<PathBuf>,

    /// Files that exist but could not be loaded
    pub skipped: Vec<ConfigError>,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Enterprise Splash Configuration
#
# Environment variables override these settings:
# - SPLASH_DOTS
# - SPLASH_DURATION_MS
# - SPLASH_LOG_LEVEL
# - SPLASH_LOG_FORMAT

[simulation]
# Title of the simulated host page
page_title = "Enterprise"

# Number of dot indicators on the page
dots = 5

# When login is pressed, in ms after page load
login_at_ms = 0

# How long to run the page, in ms
duration_ms = 1500

# Run on virtual time (instant, deterministic) instead of the wall clock
virtual_time = true

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
