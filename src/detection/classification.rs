// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Turbidity classification: alert levels and water status labels

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Alert severity derived from turbidity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum AlertLevel {
    #[default]
    Clear = 0,
    Slight = 1,
    Cloudy = 2,
    VeryCloudy = 3,
}

impl AlertLevel {
    pub const MAX: AlertLevel = AlertLevel::VeryCloudy;

    /// Breakpoints are exclusive: exactly 10 NTU is still `Clear`
    pub fn classify(turbidity_ntu: f64) -> Self {
        if turbidity_ntu > 100.0 {
            AlertLevel::VeryCloudy
        } else if turbidity_ntu > 50.0 {
            AlertLevel::Cloudy
        } else if turbidity_ntu > 10.0 {
            AlertLevel::Slight
        } else {
            AlertLevel::Clear
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AlertLevel::Clear => "clear",
            AlertLevel::Slight => "slight",
            AlertLevel::Cloudy => "cloudy",
            AlertLevel::VeryCloudy => "very cloudy",
        }
    }
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Five-tier water status label
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WaterStatus {
    Distilled,
    Clear,
    SlightlyCloudy,
    Cloudy,
    VeryCloudy,
}

impl WaterStatus {
    pub const ALL: [WaterStatus; 5] = [
        WaterStatus::Distilled,
        WaterStatus::Clear,
        WaterStatus::SlightlyCloudy,
        WaterStatus::Cloudy,
        WaterStatus::VeryCloudy,
    ];

    pub fn classify(turbidity_ntu: f64) -> Self {
        if turbidity_ntu < 1.0 {
            WaterStatus::Distilled
        } else if turbidity_ntu <= 10.0 {
            WaterStatus::Clear
        } else if turbidity_ntu <= 50.0 {
            WaterStatus::SlightlyCloudy
        } else if turbidity_ntu <= 100.0 {
            WaterStatus::Cloudy
        } else {
            WaterStatus::VeryCloudy
        }
    }

    /// Label persisted in the `status` column
    pub fn label(&self) -> &'static str {
        match self {
            WaterStatus::Distilled => "Distilled water",
            WaterStatus::Clear => "Clear water",
            WaterStatus::SlightlyCloudy => "Slightly cloudy",
            WaterStatus::Cloudy => "Cloudy",
            WaterStatus::VeryCloudy => "Very cloudy",
        }
    }
}

impl fmt::Display for WaterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for WaterStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WaterStatus::ALL
            .iter()
            .copied()
            .find(|w| w.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown water status '{}'", s))
    }
}
