// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Database module for persistent storage
//!
//! Every processed sample becomes a [`PersistedReading`] and is fanned out to
//! the configured backends: a bounded JSON file and/or an SQLite table.

mod json_log;
mod sqlite;

pub use json_log::JsonLog;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::detection::WaterStatus;
use crate::sensors::Sample;

/// Timestamp layout shared by both backends (local time)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One durable log record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedReading {
    pub timestamp: String,
    pub voltage: f64,
    pub turbidity: f64,
    pub status: String,
    pub source: String,
}

impl PersistedReading {
    /// Build a record for `sample`, stamped with `at`
    pub fn from_sample(sample: &Sample, at: DateTime<Utc>, source: &str) -> Self {
        Self {
            timestamp: at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
            voltage: sample.voltage_mv.round(),
            turbidity: (sample.turbidity_ntu * 100.0).round() / 100.0,
            status: WaterStatus::classify(sample.turbidity_ntu).label().to_string(),
            source: source.to_string(),
        }
    }

    pub fn observed_at(&self) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(&self.timestamp, TIMESTAMP_FORMAT).ok()
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.observed_at().map(|t| t.date())
    }
}

/// Read-side query over the log
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryFilter {
    /// Inclusive lower date bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub to: Option<NaiveDate>,
    /// Status labels to keep; empty keeps everything
    pub statuses: Vec<String>,
    /// Keep only the most recent N matches
    pub limit: Option<usize>,
}

impl HistoryFilter {
    pub fn matches(&self, reading: &PersistedReading) -> bool {
        if self.from.is_some() || self.to.is_some() {
            let Some(date) = reading.date() else {
                return false;
            };
            if self.from.map(|from| date < from).unwrap_or(false) {
                return false;
            }
            if self.to.map(|to| date > to).unwrap_or(false) {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.iter().any(|s| s == &reading.status)
    }

    /// Filter records that are already oldest first
    pub fn apply(&self, readings: impl IntoIterator<Item = PersistedReading>) -> Vec<PersistedReading> {
        let mut matched: Vec<PersistedReading> = readings.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(limit) = self.limit {
            let skip = matched.len().saturating_sub(limit);
            matched.drain(..skip);
        }
        matched
    }
}

/// A persistence backend
pub trait ReadingStore: Send + Sync {
    fn name(&self) -> &str;

    fn append(&self, reading: &PersistedReading) -> Result<()>;

    fn latest(&self) -> Result<Option<PersistedReading>>;

    /// Matching records, oldest first
    fn history(&self, filter: &HistoryFilter) -> Result<Vec<PersistedReading>>;
}

/// Fans readings out to every configured backend
pub struct PersistenceWriter {
    stores: Vec<Arc<dyn ReadingStore>>,
    source: String,
    last_write_at: Option<DateTime<Utc>>,
    written: u64,
}

impl PersistenceWriter {
    pub fn new(stores: Vec<Arc<dyn ReadingStore>>, source: &str) -> Self {
        Self {
            stores,
            source: source.to_string(),
            last_write_at: None,
            written: 0,
        }
    }

    /// Writer with no backends
    pub fn disabled() -> Self {
        Self::new(Vec::new(), "")
    }

    /// Open the backends selected in `config`. A backend that fails to open
    /// is logged and left out.
    pub fn open(config: &Config) -> Self {
        let db = &config.database;
        let mut stores: Vec<Arc<dyn ReadingStore>> = Vec::new();

        if db.enabled && db.backend.uses_sqlite() {
            match SqliteStore::open(&config.sqlite_path(), db.sqlite_max_rows) {
                Ok(store) => stores.push(Arc::new(store)),
                Err(e) => error!("SQLite log unavailable: {:#}", e),
            }
        }
        if db.enabled && db.backend.uses_json() {
            match JsonLog::open(&config.json_path(), db.json_max_entries) {
                Ok(store) => stores.push(Arc::new(store)),
                Err(e) => error!("JSON log unavailable: {:#}", e),
            }
        }

        if stores.is_empty() {
            warn!("No persistence backend active, readings will not be stored");
        } else {
            let names: Vec<&str> = stores.iter().map(|s| s.name()).collect();
            info!("Persisting readings to {}", names.join(", "));
        }
        Self::new(stores, &config.sensor.source_label)
    }

    /// Persist `sample` stamped with `at`. Backend errors are logged only.
    pub fn append(&mut self, sample: &Sample, at: DateTime<Utc>) -> PersistedReading {
        let reading = PersistedReading::from_sample(sample, at, &self.source);
        for store in &self.stores {
            if let Err(e) = store.append(&reading) {
                warn!("Failed to persist reading to {}: {:#}", store.name(), e);
            }
        }
        self.last_write_at = Some(at);
        self.written += 1;
        debug!("Persisted reading {:?}", reading);
        reading
    }

    /// True when nothing was written within `interval` of `now`
    pub fn is_stale(&self, now: DateTime<Utc>, interval: chrono::Duration) -> bool {
        match self.last_write_at {
            Some(last) => now - last >= interval,
            None => true,
        }
    }

    pub fn last_write_at(&self) -> Option<DateTime<Utc>> {
        self.last_write_at
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Backends in priority order (SQLite first when present)
    pub fn stores(&self) -> &[Arc<dyn ReadingStore>] {
        &self.stores
    }

    /// Query the highest-priority backend
    pub fn history(&self, filter: &HistoryFilter) -> Result<Vec<PersistedReading>> {
        match self.stores.first() {
            Some(store) => store.history(filter),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading(timestamp: &str, status: &str) -> PersistedReading {
        PersistedReading {
            timestamp: timestamp.to_string(),
            voltage: 3300.0,
            turbidity: 4.2,
            status: status.to_string(),
            source: "Arduino Uno".to_string(),
        }
    }

    #[test]
    fn test_from_sample_rounds() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let sample = Sample::new(at, 33.3333, 2399.6);
        let r = PersistedReading::from_sample(&sample, at, "Arduino Uno");

        assert_eq!(r.voltage, 2400.0);
        assert_eq!(r.turbidity, 33.33);
        assert_eq!(r.status, "Slightly cloudy");
        assert_eq!(r.source, "Arduino Uno");
        assert_eq!(
            r.observed_at(),
            Some(at.with_timezone(&Local).naive_local())
        );
    }

    #[test]
    fn test_filter_by_date_range_inclusive() {
        let filter = HistoryFilter {
            from: NaiveDate::from_ymd_opt(2024, 5, 2),
            to: NaiveDate::from_ymd_opt(2024, 5, 3),
            ..HistoryFilter::default()
        };
        assert!(!filter.matches(&reading("2024-05-01 23:59:59", "Clear water")));
        assert!(filter.matches(&reading("2024-05-02 00:00:00", "Clear water")));
        assert!(filter.matches(&reading("2024-05-03 23:59:59", "Clear water")));
        assert!(!filter.matches(&reading("2024-05-04 00:00:00", "Clear water")));
        assert!(!filter.matches(&reading("garbage", "Clear water")));
    }

    #[test]
    fn test_filter_by_status_and_limit() {
        let filter = HistoryFilter {
            statuses: vec!["Cloudy".to_string(), "Very cloudy".to_string()],
            limit: Some(2),
            ..HistoryFilter::default()
        };
        let rows = vec![
            reading("2024-05-01 10:00:00", "Cloudy"),
            reading("2024-05-01 10:00:01", "Clear water"),
            reading("2024-05-01 10:00:02", "Very cloudy"),
            reading("2024-05-01 10:00:03", "Cloudy"),
        ];
        let out = filter.apply(rows);
        let stamps: Vec<&str> = out.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(stamps, vec!["2024-05-01 10:00:02", "2024-05-01 10:00:03"]);
    }

    #[test]
    fn test_writer_staleness() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let mut writer = PersistenceWriter::disabled();
        let hour = chrono::Duration::seconds(3600);
        assert!(writer.is_stale(at, hour));

        writer.append(&Sample::new(at, 1.0, 3500.0), at);
        assert!(!writer.is_stale(at + chrono::Duration::seconds(3599), hour));
        assert!(writer.is_stale(at + hour, hour));
        assert_eq!(writer.written(), 1);
    }
}
