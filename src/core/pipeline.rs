// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Per-line processing pipeline
//!
//! Owns every piece of mutable processing state: the alert state machine,
//! notification and command bookkeeping, and the persistence writer. One
//! instance lives behind a mutex shared by the ingestion and staleness tasks.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use super::{EventBus, ProcessedSample};
use crate::analysis::{ChartPoint, RollingBuffer, SharedBuffer, TrendAnalyzer};
use crate::config::Config;
use crate::db::{PersistedReading, PersistenceWriter};
use crate::detection::AlertEngine;
use crate::notify::NotificationDispatcher;
use crate::sensors::{CommandFeedback, LineParser, Sample};

/// Processing counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    pub lines: u64,
    pub samples: u64,
    pub rejected: u64,
    pub alerts: u64,
    pub commands_sent: u64,
    pub catch_up_writes: u64,
}

pub struct Pipeline {
    parser: LineParser,
    buffer: SharedBuffer,
    analyzer: TrendAnalyzer,
    alerts: AlertEngine,
    dispatcher: NotificationDispatcher,
    writer: PersistenceWriter,
    commands: CommandFeedback,
    event_bus: Arc<EventBus>,
    stale_interval: Duration,
    clock: Option<DateTime<Utc>>,
    stats: PipelineStats,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        dispatcher: NotificationDispatcher,
        writer: PersistenceWriter,
        commands: CommandFeedback,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            parser: LineParser::new(&config.sensor),
            buffer: RollingBuffer::shared(config.sensor.buffer_capacity),
            analyzer: TrendAnalyzer::new(config.analysis.clone()),
            alerts: AlertEngine::new(config.alerts.clone(), config.analysis.trend_threshold_per_min),
            dispatcher,
            writer,
            commands,
            event_bus,
            stale_interval: Duration::seconds(config.database.stale_log_interval_secs as i64),
            clock: None,
            stats: PipelineStats::default(),
        }
    }

    /// Parse and process one raw line received at `now`
    pub fn process_line(&mut self, line: &str, now: DateTime<Utc>) -> Option<ProcessedSample> {
        self.stats.lines += 1;
        let now = self.advance_clock(now);

        match self.parser.parse(line, now) {
            Ok(sample) => Some(self.process_sample(sample)),
            Err(rejection) => {
                self.stats.rejected += 1;
                trace!("Ignored line {:?}: {}", line, rejection);
                None
            }
        }
    }

    /// Run an already parsed sample through analysis, alerting and storage
    pub fn process_sample(&mut self, sample: Sample) -> ProcessedSample {
        let now = sample.observed_at;

        let trend = {
            let mut buffer = self.buffer.write();
            buffer.append(sample);
            self.analyzer.update(&buffer, now)
        };

        let evaluation = self.alerts.evaluate(&sample, &trend);

        for alert in &evaluation.alerts {
            debug!("{} alert: {}", alert.kind, alert.message);
            self.dispatcher.send(alert);
            self.event_bus.publish_alert(alert.clone());
        }
        self.stats.alerts += evaluation.alerts.len() as u64;

        self.writer.append(&sample, now);

        for &command in &evaluation.commands {
            if self.commands.send(command, now) {
                self.stats.commands_sent += 1;
                self.event_bus.publish_command(command);
            }
        }

        self.stats.samples += 1;
        let processed = ProcessedSample {
            sample,
            level: evaluation.level,
            status: evaluation.status,
            trend,
            alerts: evaluation.alerts,
        };
        self.event_bus.publish_sample(processed.clone());
        processed
    }

    /// Persist the last sample again, stamped `now`, when nothing was
    /// written for the stale interval
    pub fn flush_if_stale(&mut self, now: DateTime<Utc>) -> Option<PersistedReading> {
        let now = self.advance_clock(now);
        let last = self.buffer.read().latest()?;
        if !self.writer.is_stale(now, self.stale_interval) {
            return None;
        }

        info!("No reading persisted for {}s, logging last sample", self.stale_interval.num_seconds());
        self.stats.catch_up_writes += 1;
        Some(self.writer.append(&last, now))
    }

    /// Close the notification queue and drop the command link. The returned
    /// handle completes once queued notifications have drained.
    pub fn close(&mut self) -> Option<JoinHandle<()>> {
        self.commands.close();
        self.dispatcher.close()
    }

    pub fn buffer(&self) -> SharedBuffer {
        Arc::clone(&self.buffer)
    }

    pub fn analyzer(&self) -> &TrendAnalyzer {
        &self.analyzer
    }

    pub fn chart(&self, now: DateTime<Utc>) -> Vec<ChartPoint> {
        self.analyzer.chart(&self.buffer.read(), now)
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }

    pub fn alert_engine(&self) -> &AlertEngine {
        &self.alerts
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Clamp `now` so time never runs backwards within a run
    fn advance_clock(&mut self, now: DateTime<Utc>) -> DateTime<Utc> {
        let now = match self.clock {
            Some(prev) if now < prev => prev,
            _ => now,
        };
        self.clock = Some(now);
        now
    }
}
