// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Telemetry line parser
//!
//! The sensor firmware prints free-form text: boot banners, command
//! acknowledgements and, once per second, a telemetry line such as
//! `Vôn:2400,Độ đục:33.33`. Other firmwares print `TURBIDITY: 75.3 VOLTAGE: 2400`
//! or `VOLT=2.4V TURBIDITY=5`. The parser accepts all of these and classifies
//! everything else as not telemetry.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;

use super::Sample;
use crate::config::SensorConfig;

static TURBIDITY_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)TURBIDITY\s*[:=]\s*([-+]?[0-9]*\.?[0-9]+)").expect("Invalid turbidity regex")
});

static VOLTAGE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)VOLT(?:AGE)?\s*[:=]\s*([-+]?[0-9]*\.?[0-9]+)\s*(?:(mv|v)\b)?")
        .expect("Invalid voltage regex")
});

/// Why a line was not turned into a sample
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("line does not carry both voltage and turbidity tokens")]
    MissingTokens,

    #[error("no turbidity value after separator")]
    MissingTurbidity,

    #[error("no voltage value after separator")]
    MissingVoltage,

    #[error("unreadable number '{0}'")]
    InvalidNumber(String),

    #[error("negative turbidity {0}")]
    NegativeTurbidity(f64),
}

/// Unit suffix found after the voltage value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageUnit {
    Millivolts,
    Volts,
    Unspecified,
}

/// Stateless line classifier
#[derive(Debug, Clone)]
pub struct LineParser {
    /// Localized keyword -> canonical token
    aliases: BTreeMap<String, String>,
    /// Unitless magnitudes below this are read as volts. `0` trusts millivolts.
    volts_below: f64,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new(&SensorConfig::default())
    }
}

impl LineParser {
    pub fn new(config: &SensorConfig) -> Self {
        Self {
            aliases: config.keyword_aliases.clone(),
            volts_below: config.volts_below,
        }
    }

    /// Parse a line observed at `observed_at` into a sample
    pub fn parse(&self, line: &str, observed_at: DateTime<Utc>) -> Result<Sample, Rejection> {
        let (voltage_mv, turbidity_ntu) = self.parse_values(line)?;
        Ok(Sample::new(observed_at, turbidity_ntu, voltage_mv))
    }

    /// Parse a line into `(voltage_mv, turbidity_ntu)`
    pub fn parse_values(&self, line: &str) -> Result<(f64, f64), Rejection> {
        let line = self.normalize(line);

        let upper = line.to_uppercase();
        if !upper.contains("VOLT") || !upper.contains("TURBIDITY") {
            return Err(Rejection::MissingTokens);
        }

        let turbidity = TURBIDITY_REGEX
            .captures(&line)
            .and_then(|c| c.get(1))
            .ok_or(Rejection::MissingTurbidity)?;
        let turbidity_ntu = parse_number(turbidity.as_str())?;
        if turbidity_ntu < 0.0 {
            return Err(Rejection::NegativeTurbidity(turbidity_ntu));
        }

        let voltage = VOLTAGE_REGEX
            .captures(&line)
            .ok_or(Rejection::MissingVoltage)?;
        let value = voltage
            .get(1)
            .ok_or(Rejection::MissingVoltage)
            .and_then(|m| parse_number(m.as_str()))?;
        let unit = match voltage.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
            Some(u) if u == "v" => VoltageUnit::Volts,
            Some(_) => VoltageUnit::Millivolts,
            None => VoltageUnit::Unspecified,
        };

        Ok((self.to_millivolts(value, unit), turbidity_ntu))
    }

    /// Apply the unit rules, including the small-magnitude heuristic
    pub fn to_millivolts(&self, value: f64, unit: VoltageUnit) -> f64 {
        match unit {
            VoltageUnit::Volts => value * 1000.0,
            VoltageUnit::Millivolts => value,
            VoltageUnit::Unspecified if value.abs() < self.volts_below => value * 1000.0,
            VoltageUnit::Unspecified => value,
        }
    }

    fn normalize(&self, line: &str) -> String {
        let mut out = line.trim().to_string();
        for (alias, canonical) in &self.aliases {
            if !alias.is_empty() && out.contains(alias.as_str()) {
                out = out.replace(alias.as_str(), canonical);
            }
        }
        out
    }
}

fn parse_number(raw: &str) -> Result<f64, Rejection> {
    raw.parse::<f64>()
        .map_err(|_| Rejection::InvalidNumber(raw.to_string()))
}
