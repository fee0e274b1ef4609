// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Task scheduler for timed operations

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

type TaskFn = Box<dyn Fn() + Send + Sync + 'static>;

struct ScheduledTask {
    interval: Duration,
    task: TaskFn,
}

/// Runs registered closures at fixed intervals until shutdown
pub struct Scheduler {
    tasks: Arc<RwLock<HashMap<String, ScheduledTask>>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn add_task<F>(&self, name: &str, interval: Duration, task: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut tasks = self.tasks.write().await;
        tasks.insert(
            name.to_string(),
            ScheduledTask {
                interval,
                task: Box::new(task),
            },
        );
        debug!("Scheduled task '{}' with interval {:?}", name, interval);
    }

    /// Tick every registered task until `shutdown` fires. The first run of
    /// each task happens one interval after start.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let schedule: Vec<(String, Duration)> = {
            let tasks = self.tasks.read().await;
            tasks.iter().map(|(name, t)| (name.clone(), t.interval)).collect()
        };

        let mut handles = Vec::with_capacity(schedule.len());
        for (name, period) in schedule {
            let tasks = Arc::clone(&self.tasks);
            let mut stop = shutdown.resubscribe();

            handles.push(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                ticker.tick().await;

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let tasks = tasks.read().await;
                            match tasks.get(&name) {
                                Some(t) => (t.task)(),
                                None => break,
                            }
                        }
                        _ = stop.recv() => break,
                    }
                }
                debug!("Task '{}' stopped", name);
            }));
        }

        let _ = shutdown.recv().await;
        for handle in handles {
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}
