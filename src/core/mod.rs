//! Core engine module - ingestion pipeline, event bus and task scheduling

mod engine;
mod event_bus;
mod pipeline;
mod scheduler;

pub use engine::Engine;
pub use event_bus::{Event, EventBus, EventPayload, EventType};
pub use pipeline::{Pipeline, PipelineStats};
pub use scheduler::Scheduler;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::TrendSnapshot;
use crate::detection::{Alert, AlertLevel, WaterStatus};
use crate::sensors::Sample;

/// A sample after analysis and alert evaluation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessedSample {
    pub sample: Sample,
    pub level: AlertLevel,
    pub status: WaterStatus,
    pub trend: TrendSnapshot,
    pub alerts: Vec<Alert>,
}

/// System-wide state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub running: bool,
    pub source: Option<String>,
    pub total_lines: u64,
    pub total_samples: u64,
    pub rejected_lines: u64,
    pub total_alerts: u64,
    pub uptime_seconds: u64,
    pub last_sample: Option<DateTime<Utc>>,
    pub last_alert: Option<DateTime<Utc>>,
}
