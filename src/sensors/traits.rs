// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Sensor traits and common types

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single parsed turbidity reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub observed_at: DateTime<Utc>,
    /// Nephelometric turbidity units, never negative
    pub turbidity_ntu: f64,
    /// Probe output in millivolts
    pub voltage_mv: f64,
}

impl Sample {
    pub fn new(observed_at: DateTime<Utc>, turbidity_ntu: f64, voltage_mv: f64) -> Self {
        Self {
            observed_at,
            turbidity_ntu,
            voltage_mv,
        }
    }
}

/// Control byte written back toward the sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    /// Raise the local alarm output
    Alarm,
    /// Release the local alarm output
    StandDown,
}

impl Command {
    pub fn as_byte(self) -> u8 {
        match self {
            Command::Alarm => b'A',
            Command::StandDown => b'S',
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'A' => Some(Command::Alarm),
            b'S' => Some(Command::StandDown),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_byte() as char)
    }
}

/// Link operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Connected,
    Closed,
    Lost,
}

/// Anything that delivers raw telemetry lines.
///
/// `Ok(None)` means the source was closed cleanly; `Err` means the
/// connection was lost. Reconnecting is left to the caller.
#[async_trait]
pub trait LineSource: Send {
    /// Human readable name used in logs
    fn name(&self) -> &str;

    /// Wait for the next raw line
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Write side of the sensor link
pub trait CommandSink: Send {
    /// Write a single control byte
    fn write_command(&mut self, command: Command) -> Result<()>;
}
