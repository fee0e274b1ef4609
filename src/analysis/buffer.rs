// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Fixed-capacity rolling sample buffer

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::sensors::Sample;

/// Buffer shared between the ingestion task (single writer) and readers
pub type SharedBuffer = Arc<RwLock<RollingBuffer>>;

/// Time-ordered samples with FIFO eviction
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl RollingBuffer {
    pub const DEFAULT_CAPACITY: usize = 120;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn shared(capacity: usize) -> SharedBuffer {
        Arc::new(RwLock::new(Self::new(capacity)))
    }

    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Samples with `observed_at >= now - duration`, oldest first
    pub fn window(&self, duration: Duration, now: DateTime<Utc>) -> Vec<Sample> {
        let cutoff = now - duration;
        // Samples are ordered, so scan back from the newest end
        let start = self
            .samples
            .iter()
            .rposition(|s| s.observed_at < cutoff)
            .map(|i| i + 1)
            .unwrap_or(0);
        self.samples.range(start..).copied().collect()
    }

    /// The last `n` samples, oldest first
    pub fn tail(&self, n: usize) -> Vec<Sample> {
        let skip = self.samples.len().saturating_sub(n);
        self.samples.iter().skip(skip).copied().collect()
    }

    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
