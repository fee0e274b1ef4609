// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Debounced command feedback toward the sensor

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use super::{Command, CommandSink};

/// Writes control bytes to the sensor link, suppressing repeats.
///
/// The same command is sent at most once per debounce window; a different
/// command always goes straight through. Bookkeeping only advances after a
/// successful write so a failed alarm is retried on the next trigger.
pub struct CommandFeedback {
    sink: Option<Box<dyn CommandSink>>,
    debounce: Duration,
    last_command_type: Option<Command>,
    last_command_sent_at: Option<DateTime<Utc>>,
}

impl CommandFeedback {
    pub fn new(sink: Option<Box<dyn CommandSink>>, debounce_secs: u64) -> Self {
        Self {
            sink,
            debounce: Duration::seconds(debounce_secs as i64),
            last_command_type: None,
            last_command_sent_at: None,
        }
    }

    /// Feedback with no transport attached
    pub fn detached() -> Self {
        Self::new(None, 10)
    }

    pub fn is_attached(&self) -> bool {
        self.sink.is_some()
    }

    /// Try to send `command`. Returns `true` if a byte was written.
    pub fn send(&mut self, command: Command, now: DateTime<Utc>) -> bool {
        let Some(sink) = self.sink.as_mut() else {
            return false;
        };

        let repeat = self.last_command_type == Some(command)
            && self
                .last_command_sent_at
                .map(|at| now - at < self.debounce)
                .unwrap_or(false);
        if repeat {
            debug!("Command {} suppressed by debounce", command);
            return false;
        }

        match sink.write_command(command) {
            Ok(()) => {
                self.last_command_type = Some(command);
                self.last_command_sent_at = Some(now);
                debug!("Sent command {} to sensor", command);
                true
            }
            Err(e) => {
                warn!("Failed to send command {} to sensor: {}", command, e);
                false
            }
        }
    }

    pub fn last_command(&self) -> Option<(Command, DateTime<Utc>)> {
        self.last_command_type.zip(self.last_command_sent_at)
    }

    /// Drop the transport handle
    pub fn close(&mut self) {
        if self.sink.take().is_some() {
            info!("Command link closed");
        }
    }
}
