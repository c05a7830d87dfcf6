//! Monitor configuration.
//!
//! Configuration can be loaded from:
//! - TOML configuration file
//! - Environment variables (LIVEWIRE_*), which override the file

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenvis_livewire_core::StoreConfig;

/// Path value meaning "read the feed from stdin".
pub const STDIN_FEED: &str = "-";

/// Monitor configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Store configuration.
    #[serde(default)]
    pub store: StoreSection,

    /// Feed configuration.
    #[serde(default)]
    pub feed: FeedConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Grace period in milliseconds.
    #[serde(default = "default_grace_period")]
    pub grace_period_ms: u64,

    /// Change event broadcast capacity.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Feed configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Newline-delimited JSON event file, or `-` for stdin.
    #[serde(default = "default_feed_path")]
    pub path: String,

    /// Keep running after end of feed until every entity expired.
    #[serde(default = "default_true")]
    pub drain_on_eof: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

/// Environment variable overriding `store.grace_period_ms`.
pub const GRACE_PERIOD_ENV: &str = "LIVEWIRE_GRACE_MS";

/// Environment variable overriding `feed.path`.
pub const FEED_ENV: &str = "LIVEWIRE_FEED";

// Default value functions
fn default_grace_period() -> u64 {
    1000
}

fn default_event_capacity() -> usize {
    1024
}

fn default_feed_path() -> String {
    STDIN_FEED.to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            path: default_feed_path(),
            drain_on_eof: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// `LIVEWIRE_CONFIG` names an explicit file; otherwise the default paths
    /// are searched in order. `LIVEWIRE_GRACE_MS` and `LIVEWIRE_FEED` override
    /// whatever the file sets.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self> {
        let mut config = Self::locate()?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn locate() -> Result<Self> {
        if let Ok(path) = std::env::var("LIVEWIRE_CONFIG") {
            return Self::parse_file(shellexpand::tilde(&path).as_ref());
        }

        let config_paths = [
            "livewire.toml",
            "/etc/livewire/livewire.toml",
            "~/.config/livewire/livewire.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::parse_file(expanded.as_ref());
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::parse_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn parse_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Apply environment overrides on top of file or default values.
    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(ms) = var(GRACE_PERIOD_ENV) {
            self.store.grace_period_ms = ms
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", GRACE_PERIOD_ENV, ms))?;
        }
        if let Some(path) = var(FEED_ENV) {
            self.feed.path = path;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.store.grace_period_ms == 0 {
            bail!("store.grace_period_ms must be non-zero");
        }
        if self.store.event_capacity == 0 {
            bail!("store.event_capacity must be non-zero");
        }
        Ok(())
    }

    /// Get the store configuration.
    #[must_use]
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            grace_period: self.grace_period(),
            event_capacity: self.store.event_capacity,
        }
    }

    /// Get the grace period.
    #[must_use]
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.store.grace_period_ms)
    }

    /// Get the feed file, or `None` for stdin.
    #[must_use]
    pub fn feed_path(&self) -> Option<PathBuf> {
        if self.feed.path == STDIN_FEED {
            None
        } else {
            Some(PathBuf::from(shellexpand::tilde(&self.feed.path).as_ref()))
        }
    }
}
