// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! TurbiWatch - Water Turbidity Telemetry Monitor
//!
//! Turns the free-form text printed by a turbidity sensor board into
//! stateful alerts and a bounded reading history:
//! - Tolerant line parsing with unit detection and localized keywords
//! - Rolling-window trend and rate-of-change regression
//! - Hysteretic multi-level alerting with per-kind notification cooldowns
//! - Atomic bounded JSON log and SQLite reading table
//! - Debounced alarm commands back to the sensor
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       TurbiWatch Engine                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐  │
//! │  │ LineSource │→ │ LineParser │→ │ Rolling  │→ │  Trend   │  │
//! │  │ (serial/…) │  │            │  │ Buffer   │  │ Analyzer │  │
//! │  └────────────┘  └────────────┘  └──────────┘  └──────────┘  │
//! │                                                     ↓        │
//! │  ┌──────────────┐  ┌─────────────┐  ┌──────────────────────┐ │
//! │  │ Notification │← │ AlertEngine │→ │ CommandFeedback (A/S)│ │
//! │  │ Dispatcher   │  └─────────────┘  └──────────────────────┘ │
//! │  └──────────────┘         ↓                                  │
//! │  ┌──────────────────────────────┐  ┌──────────────────────┐  │
//! │  │ PersistenceWriter (JSON/SQL) │  │      Event Bus       │  │
//! │  └──────────────────────────────┘  └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod analysis;
pub mod config;
pub mod core;
pub mod db;
pub mod detection;
pub mod notify;
pub mod sensors;

// Re-exports for convenience
pub use analysis::{RollingBuffer, TrendAnalyzer, TrendSnapshot};
pub use config::Config;
pub use self::core::{Engine, EventBus, Pipeline, ProcessedSample};
pub use db::{HistoryFilter, PersistedReading, PersistenceWriter, ReadingStore};
pub use detection::{Alert, AlertEngine, AlertKind, AlertLevel, WaterStatus};
pub use notify::{NotificationDispatcher, Notifier};
pub use sensors::{Command, LineParser, LineSource, Sample};

/// TurbiWatch version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// TurbiWatch name
pub const NAME: &str = "TurbiWatch";

/// Build info
pub fn build_info() -> BuildInfo {
    BuildInfo {
        version: VERSION.to_string(),
        target: std::env::consts::ARCH.to_string(),
        os: std::env::consts::OS.to_string(),
        features: enabled_features(),
    }
}

/// Build information
#[derive(Debug, Clone)]
pub struct BuildInfo {
    /// Version string
    pub version: String,
    /// Target architecture
    pub target: String,
    /// Operating system
    pub os: String,
    /// Enabled features
    pub features: Vec<String>,
}

fn enabled_features() -> Vec<String> {
    let mut features = vec![];

    #[cfg(feature = "serial")]
    features.push("serial".to_string());

    features
}
