// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Configuration module

mod secrets;

pub use secrets::NotifySecrets;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::analysis::TrendMethod;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application name
    pub app_name: String,

    /// Data directory, relative storage paths resolve against it
    pub data_dir: PathBuf,

    /// Log level
    pub log_level: String,

    /// Use the simulated sensor
    pub demo_mode: bool,

    /// Sensor link and parsing
    pub sensor: SensorConfig,

    /// Trend and rate-of-change analysis
    pub analysis: AnalysisConfig,

    /// Alert state machine
    pub alerts: AlertConfig,

    /// Notification channel
    pub notify: NotifyConfig,

    /// Persistence backends
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_name: "TurbiWatch".to_string(),
            data_dir: PathBuf::from("./data"),
            log_level: "info".to_string(),
            demo_mode: false,
            sensor: SensorConfig::default(),
            analysis: AnalysisConfig::default(),
            alerts: AlertConfig::default(),
            notify: NotifyConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Load or create default configuration
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let config = Self::default();

            // Create parent directories
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            config.save(path)?;
            Ok(config)
        }
    }

    /// Get configuration directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|d| d.join("turbiwatch"))
            .unwrap_or_else(|| PathBuf::from("./config"))
    }

    /// Get default configuration path
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Reject values that would make the pipeline misbehave
    pub fn validate(&self) -> Result<()> {
        if self.sensor.buffer_capacity == 0 {
            bail!("sensor.buffer_capacity must be at least 1");
        }
        if self.sensor.volts_below.is_nan() || self.sensor.volts_below < 0.0 {
            bail!("sensor.volts_below must be zero or positive");
        }
        if self.analysis.rate_min_points < 2 {
            bail!("analysis.rate_min_points must be at least 2");
        }
        if self.database.json_max_entries == 0 {
            bail!("database.json_max_entries must be at least 1");
        }
        if self.notify.queue_capacity == 0 {
            bail!("notify.queue_capacity must be at least 1");
        }
        Ok(())
    }

    /// Resolve a storage path against `data_dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn json_path(&self) -> PathBuf {
        self.resolve(&self.database.json_file)
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.resolve(&self.database.sqlite_file)
    }

    pub fn env_file(&self) -> PathBuf {
        self.notify.env_file.clone()
    }
}

/// Sensor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    /// Serial port for the sensor board
    pub serial_port: Option<String>,

    /// Serial baud rate
    pub baud_rate: u32,

    /// Source label written with every persisted reading
    pub source_label: String,

    /// Unitless voltages below this magnitude are read as volts.
    /// `0` turns the heuristic off and trusts millivolts.
    pub volts_below: f64,

    /// Localized keyword -> canonical token
    pub keyword_aliases: BTreeMap<String, String>,

    /// Same-command debounce window in seconds
    pub command_debounce_secs: u64,

    /// Rolling buffer capacity in samples
    pub buffer_capacity: usize,

    /// Demo simulator period in milliseconds
    pub demo_period_ms: u64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        let mut keyword_aliases = BTreeMap::new();
        keyword_aliases.insert("Vôn".to_string(), "VOLTAGE".to_string());
        keyword_aliases.insert("Độ đục".to_string(), "TURBIDITY".to_string());

        Self {
            serial_port: None,
            baud_rate: 9600,
            source_label: "Arduino Uno".to_string(),
            volts_below: 100.0,
            keyword_aliases,
            command_debounce_secs: 10,
            buffer_capacity: 120,
            demo_period_ms: 1000,
        }
    }
}

/// Analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Long trend window
    pub trend_window_secs: u64,

    /// Long trend "rising fast" threshold, NTU/min
    pub trend_threshold_per_min: f64,

    /// Long trend estimator
    pub trend_method: TrendMethod,

    /// Short rate-of-change window
    pub rate_window_secs: u64,

    /// Rate alert slope threshold, NTU/min
    pub rate_threshold_per_min: f64,

    /// Minimum net change across the rate window, NTU
    pub rate_min_delta: f64,

    /// Minimum points in the rate window
    pub rate_min_points: usize,

    /// Display curve window
    pub curve_window_secs: u64,

    /// Display curve inner sub-window
    pub rolling_window_secs: u64,

    /// Points in the chart export
    pub chart_points: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            trend_window_secs: 60,
            trend_threshold_per_min: 30.0,
            trend_method: TrendMethod::Regression,
            rate_window_secs: 60,
            rate_threshold_per_min: 20.0,
            rate_min_delta: 10.0,
            rate_min_points: 3,
            curve_window_secs: 300,
            rolling_window_secs: 60,
            chart_points: 50,
        }
    }
}

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum spacing between rate alerts
    pub rate_cooldown_secs: u64,

    /// Send the stand-down command when the water clears
    pub stand_down_on_clear: bool,

    /// Send the alarm command on a trend alert
    pub alarm_on_trend: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            rate_cooldown_secs: 60,
            stand_down_on_clear: true,
            alarm_on_trend: true,
        }
    }
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Master switch; without credentials the dispatcher is a no-op anyway
    pub enabled: bool,

    /// Per-kind cooldown for non-urgent alerts
    pub min_interval_secs: u64,

    /// Outbound call timeout
    pub timeout_secs: u64,

    /// Bot API base URL
    pub api_base: String,

    /// key=value secrets file, takes precedence over the environment
    pub env_file: PathBuf,

    /// Pending messages before new ones are dropped
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: 60,
            timeout_secs: 10,
            api_base: "https://api.telegram.org".to_string(),
            env_file: PathBuf::from(".env"),
            queue_capacity: 32,
        }
    }
}

/// Which persistence backends receive readings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Json,
    Sqlite,
    Both,
}

impl StorageBackend {
    pub fn uses_json(self) -> bool {
        matches!(self, StorageBackend::Json | StorageBackend::Both)
    }

    pub fn uses_sqlite(self) -> bool {
        matches!(self, StorageBackend::Sqlite | StorageBackend::Both)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Enable persistence
    pub enabled: bool,

    pub backend: StorageBackend,

    /// Bounded JSON log
    pub json_file: PathBuf,

    /// Entries kept in the JSON log
    pub json_max_entries: usize,

    /// SQLite database
    pub sqlite_file: PathBuf,

    /// Oldest rows beyond this are pruned; unbounded when unset
    pub sqlite_max_rows: Option<u64>,

    /// Persist a catch-up record after this long without writes
    pub stale_log_interval_secs: u64,

    /// Staleness check period
    pub stale_check_interval_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: StorageBackend::Both,
            json_file: PathBuf::from("turbidity_log.json"),
            json_max_entries: 1000,
            sqlite_file: PathBuf::from("turbidity.db"),
            sqlite_max_rows: None,
            stale_log_interval_secs: 3600,
            stale_check_interval_secs: 10,
        }
    }
}
