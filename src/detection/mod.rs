//! Detection module - turbidity classification and the alert state machine

mod classification;

pub use classification::*;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};

use crate::analysis::TrendSnapshot;
use crate::config::AlertConfig;
use crate::sensors::{Command, Sample};

/// Alert kind; each kind has its own notification cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertKind {
    Level,
    Status,
    Trend,
    Rate,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AlertKind::Level => "level",
            AlertKind::Status => "status",
            AlertKind::Trend => "trend",
            AlertKind::Rate => "rate",
        };
        f.write_str(name)
    }
}

/// A fired alert, ready for notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub kind: AlertKind,
    pub level: AlertLevel,
    pub turbidity_ntu: f64,
    pub message: String,
    /// Deliver even if the kind is cooling down
    pub skip_cooldown: bool,
    pub raised_at: DateTime<Utc>,
}

/// Mutable alert bookkeeping
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertState {
    /// Last announced level, lags the instant level by one evaluation
    pub current_level: AlertLevel,
    pub last_status_label: Option<WaterStatus>,
    pub last_rate_alert_at: Option<DateTime<Utc>>,
    /// Set while the long trend stays above the threshold
    pub trend_active: bool,
}

/// Outcome of evaluating one sample
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub level: AlertLevel,
    pub status: WaterStatus,
    pub alerts: Vec<Alert>,
    pub commands: Vec<Command>,
}

/// Hysteretic multi-level alert engine
pub struct AlertEngine {
    config: AlertConfig,
    /// Long-trend threshold quoted in trend alerts, NTU/min
    trend_threshold: f64,
    state: AlertState,
}

impl AlertEngine {
    pub fn new(config: AlertConfig, trend_threshold: f64) -> Self {
        Self {
            config,
            trend_threshold,
            state: AlertState::default(),
        }
    }

    pub fn state(&self) -> &AlertState {
        &self.state
    }

    /// Evaluate one sample against its trend snapshot
    pub fn evaluate(&mut self, sample: &Sample, trend: &TrendSnapshot) -> Evaluation {
        let now = sample.observed_at;
        let turbidity = sample.turbidity_ntu;
        let level = AlertLevel::classify(turbidity);
        let status = WaterStatus::classify(turbidity);

        let mut alerts = Vec::new();
        let mut commands = Vec::new();

        // Short-term rate of change
        if let Some(rate) = trend.rate.filter(|_| trend.rate_exceeded) {
            let cooled = self
                .state
                .last_rate_alert_at
                .map(|at| now - at >= Duration::seconds(self.config.rate_cooldown_secs as i64))
                .unwrap_or(true);
            if cooled {
                self.state.last_rate_alert_at = Some(now);
                alerts.push(self.alert(
                    AlertKind::Rate,
                    level,
                    turbidity,
                    format!(
                        "Trend warning: water is getting cloudy fast! ~{:.0} NTU/min (Δ{:.1} NTU/{:.1} min)",
                        rate.slope,
                        rate.delta,
                        rate.duration_min.max(1e-6)
                    ),
                    true,
                    now,
                ));
            } else {
                debug!("Rate alert suppressed, last one at {:?}", self.state.last_rate_alert_at);
            }
        }

        // Status label edge; the first label is only a baseline
        match self.state.last_status_label {
            Some(previous) if previous != status => {
                info!("Water status changed: {} -> {}", previous, status);
                alerts.push(self.alert(
                    AlertKind::Status,
                    level,
                    turbidity,
                    format!("Status changed: {} - {:.2} NTU", status, turbidity),
                    true,
                    now,
                ));
                self.state.last_status_label = Some(status);
            }
            Some(_) => {}
            None => self.state.last_status_label = Some(status),
        }

        // Level edges
        if level > self.state.current_level {
            info!("Alert level raised: {} -> {}", self.state.current_level, level);
            self.state.current_level = level;
            let message = if level == AlertLevel::MAX {
                format!("Alert: turbidity very high ({:.2} NTU)", turbidity)
            } else {
                format!("Alert: turbidity level {} ({:.2} NTU)", level, turbidity)
            };
            alerts.push(self.alert(AlertKind::Level, level, turbidity, message, false, now));
            if level == AlertLevel::MAX {
                commands.push(Command::Alarm);
            }
        } else if level == AlertLevel::Clear && self.state.current_level > AlertLevel::Clear {
            info!("Alert level reset, water is clear again");
            self.state.current_level = AlertLevel::Clear;
            if self.config.stand_down_on_clear {
                commands.push(Command::StandDown);
            }
        }

        // Trend alert on the rising edge, re-armed once the slope drops back
        if trend.rising_fast && !self.state.trend_active {
            self.state.trend_active = true;
            alerts.push(self.alert(
                AlertKind::Trend,
                level,
                turbidity,
                format!(
                    "Trend warning: turbidity rising fast (>{:.0} NTU/min)",
                    self.trend_threshold
                ),
                false,
                now,
            ));
            if self.config.alarm_on_trend {
                commands.push(Command::Alarm);
            }
        } else if !trend.rising_fast && self.state.trend_active {
            debug!("Long trend back below {} NTU/min", self.trend_threshold);
            self.state.trend_active = false;
        }

        Evaluation {
            level,
            status,
            alerts,
            commands,
        }
    }

    fn alert(
        &self,
        kind: AlertKind,
        level: AlertLevel,
        turbidity_ntu: f64,
        message: String,
        skip_cooldown: bool,
        raised_at: DateTime<Utc>,
    ) -> Alert {
        Alert {
            kind,
            level,
            turbidity_ntu,
            message,
            skip_cooldown,
            raised_at,
        }
    }
}
