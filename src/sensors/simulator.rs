// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Sensor simulator for demo/testing
//!
//! Mimics the turbidity board firmware: it prints a short banner, then one
//! `Vôn:<mV>,Độ đục:<NTU>` line per period, and acknowledges every command
//! byte with `ACK:<cmd>`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::prelude::*;
use rand_distr::StandardNormal;
use tokio::time::{interval, Interval, MissedTickBehavior};

use super::{Command, CommandSink, LineSource};

/// Probe output at 0 NTU, in millivolts
pub const CLEAR_WATER_MV: f64 = 3600.0;

/// Firmware voltage to NTU conversion.
///
/// The board maps the voltage ratio onto 0..1000 NTU using integer math and
/// pins ratios in 0.98..=1.0 to zero.
pub fn voltage_to_ntu(voltage_mv: f64) -> f64 {
    let f = voltage_mv / CLEAR_WATER_MV;
    let ntu = if (0.98..=1.0).contains(&f) {
        0.0
    } else {
        let x = (f * 100.0).trunc();
        1000.0 - 10.0 * x
    };
    ntu.clamp(0.0, 1000.0)
}

/// Simulated turbidity board
pub struct DemoSource {
    rng: StdRng,
    ticker: Interval,
    banner: VecDeque<String>,
    acks: Arc<Mutex<VecDeque<Command>>>,

    // Simulation state
    water_ntu: f64,
    baseline_ntu: f64,
    episode_peak: Option<f64>,
    episode_probability: f64,
    noise_std_mv: f64,
}

impl DemoSource {
    pub fn new(period: Duration) -> Self {
        Self::with_rng(period, StdRng::from_entropy())
    }

    /// Deterministic simulator for tests
    pub fn seeded(period: Duration, seed: u64) -> Self {
        Self::with_rng(period, StdRng::seed_from_u64(seed))
    }

    fn with_rng(period: Duration, rng: StdRng) -> Self {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let banner = ["Cam bien do duc nuoc", "Khoi dong..."]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Self {
            rng,
            ticker,
            banner,
            acks: Arc::new(Mutex::new(VecDeque::new())),
            water_ntu: 3.0,
            baseline_ntu: 3.0,
            episode_peak: None,
            episode_probability: 0.02,
            noise_std_mv: 6.0,
        }
    }

    /// Write side of the simulated link
    pub fn command_sink(&self) -> DemoCommandSink {
        DemoCommandSink {
            acks: Arc::clone(&self.acks),
        }
    }

    pub fn set_episode_probability(&mut self, probability: f64) {
        self.episode_probability = probability.clamp(0.0, 1.0);
    }

    fn step(&mut self) -> String {
        match self.episode_peak {
            None => {
                if self.rng.gen::<f64>() < self.episode_probability {
                    let peak = self.rng.gen_range(40.0..300.0);
                    self.episode_peak = Some(peak);
                }
                self.water_ntu += (self.baseline_ntu - self.water_ntu) * 0.2;
            }
            Some(peak) => {
                // Storm runoff: fast rise, then the episode ends and the water settles
                self.water_ntu += self.rng.gen_range(2.0..12.0);
                if self.water_ntu >= peak {
                    self.episode_peak = None;
                }
            }
        }
        self.water_ntu = self.water_ntu.max(0.0);

        let ideal_mv = CLEAR_WATER_MV * (1.0 - self.water_ntu / 1000.0);
        let noise: f64 = self.rng.sample(StandardNormal);
        let voltage_mv = (ideal_mv + noise * self.noise_std_mv).max(0.0);
        let ntu = voltage_to_ntu(voltage_mv);

        format!("Vôn:{:.0},Độ đục:{:.2}", voltage_mv, ntu)
    }
}

#[async_trait]
impl LineSource for DemoSource {
    fn name(&self) -> &str {
        "demo"
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        if let Some(line) = self.banner.pop_front() {
            return Ok(Some(line));
        }
        if let Some(command) = self.acks.lock().pop_front() {
            return Ok(Some(format!("ACK:{}", command)));
        }
        self.ticker.tick().await;
        Ok(Some(self.step()))
    }
}

/// Command side of [`DemoSource`]
#[derive(Clone)]
pub struct DemoCommandSink {
    acks: Arc<Mutex<VecDeque<Command>>>,
}

impl CommandSink for DemoCommandSink {
    fn write_command(&mut self, command: Command) -> Result<()> {
        self.acks.lock().push_back(command);
        Ok(())
    }
}
