//! Main engine - owns the pipeline and its ingestion and staleness tasks

use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{EventBus, Pipeline, Scheduler, SystemState};
use crate::analysis::{ChartPoint, SharedBuffer};
use crate::config::Config;
use crate::db::{HistoryFilter, PersistedReading, PersistenceWriter};
use crate::notify::NotificationDispatcher;
use crate::sensors::{CommandFeedback, CommandSink, LineSource, LinkStatus, Sample};

/// Main TurbiWatch engine
pub struct Engine {
    pub config: Arc<Config>,
    pipeline: Arc<Mutex<Pipeline>>,
    buffer: SharedBuffer,
    event_bus: Arc<EventBus>,
    state: Arc<RwLock<SystemState>>,
    start_time: Option<Instant>,
}

impl Engine {
    /// Build the engine from configuration: persistence backends, the
    /// notification worker and the optional command link
    pub fn new(config: Config, command_sink: Option<Box<dyn CommandSink>>) -> Result<Self> {
        let dispatcher = NotificationDispatcher::from_config(&config.notify)?;
        let writer = PersistenceWriter::open(&config);
        Ok(Self::with_parts(config, dispatcher, writer, command_sink))
    }

    /// Build the engine from explicit collaborators
    pub fn with_parts(
        config: Config,
        dispatcher: NotificationDispatcher,
        writer: PersistenceWriter,
        command_sink: Option<Box<dyn CommandSink>>,
    ) -> Self {
        let event_bus = Arc::new(EventBus::new(1024));
        let commands = CommandFeedback::new(command_sink, config.sensor.command_debounce_secs);
        let pipeline = Pipeline::new(&config, dispatcher, writer, commands, Arc::clone(&event_bus));
        let buffer = pipeline.buffer();

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(Mutex::new(pipeline)),
            buffer,
            event_bus,
            state: Arc::new(RwLock::new(SystemState::default())),
            start_time: None,
        }
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    /// Ingest lines from `source` until it closes, fails or `shutdown`
    /// fires, then drain outstanding notifications.
    pub async fn run(&mut self, mut source: Box<dyn LineSource>, shutdown: broadcast::Receiver<()>) -> Result<()> {
        info!("Starting TurbiWatch engine on {}", source.name());
        self.start_time = Some(Instant::now());
        {
            let mut state = self.state.write();
            state.running = true;
            state.source = Some(source.name().to_string());
        }
        self.event_bus.publish_link(source.name(), LinkStatus::Connected);
        self.event_bus.publish_status("engine", "running");

        // Staleness check on its own timer
        let scheduler = Scheduler::new();
        {
            let pipeline = Arc::clone(&self.pipeline);
            scheduler
                .add_task(
                    "stale-log",
                    StdDuration::from_secs(self.config.database.stale_check_interval_secs.max(1)),
                    move || {
                        pipeline.lock().flush_if_stale(Utc::now());
                    },
                )
                .await;
        }
        let (stop_tx, stop_rx) = broadcast::channel(1);
        let scheduler_task = tokio::spawn(async move { scheduler.run(stop_rx).await });

        let link = self.ingest(source.as_mut(), shutdown).await;
        self.event_bus.publish_link(source.name(), link);

        let _ = stop_tx.send(());
        if let Err(e) = scheduler_task.await {
            error!("Scheduler task failed: {}", e);
        }

        self.shutdown().await;
        Ok(())
    }

    async fn ingest(&self, source: &mut dyn LineSource, mut shutdown: broadcast::Receiver<()>) -> LinkStatus {
        loop {
            tokio::select! {
                line = source.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line),
                    Ok(None) => {
                        info!("Line source {} closed", source.name());
                        return LinkStatus::Closed;
                    }
                    Err(e) => {
                        warn!("Lost connection to {}: {:#}", source.name(), e);
                        self.event_bus.publish_error(&format!("link lost: {}", e));
                        return LinkStatus::Lost;
                    }
                },
                _ = shutdown.recv() => {
                    info!("Shutdown requested");
                    return LinkStatus::Closed;
                }
            }
        }
    }

    /// Process one raw line as if it arrived now
    pub fn handle_line(&self, line: &str) {
        let processed = self.pipeline.lock().process_line(line, Utc::now());

        let mut state = self.state.write();
        state.total_lines += 1;
        match processed {
            Some(p) => {
                state.total_samples += 1;
                state.last_sample = Some(p.sample.observed_at);
                if !p.alerts.is_empty() {
                    state.total_alerts += p.alerts.len() as u64;
                    state.last_alert = Some(p.sample.observed_at);
                }
            }
            None => state.rejected_lines += 1,
        }
    }

    /// Close the command link and wait for queued notifications
    async fn shutdown(&mut self) {
        info!("Stopping TurbiWatch engine...");
        let worker = self.pipeline.lock().close();
        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                error!("Notification worker failed: {}", e);
            }
        }
        self.state.write().running = false;
        self.event_bus.publish_status("engine", "stopped");

        let stats = self.pipeline.lock().stats();
        info!(
            "TurbiWatch engine stopped: {} samples, {} rejected lines, {} alerts",
            stats.samples, stats.rejected, stats.alerts
        );
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<Sample> {
        self.buffer.read().latest()
    }

    /// Samples from the last `duration`
    pub fn recent(&self, duration: Duration) -> Vec<Sample> {
        self.buffer.read().window(duration, Utc::now())
    }

    /// Chart tail with the smoothed trend curve
    pub fn chart(&self) -> Vec<ChartPoint> {
        self.chart_at(Utc::now())
    }

    pub fn chart_at(&self, now: DateTime<Utc>) -> Vec<ChartPoint> {
        self.pipeline.lock().chart(now)
    }

    /// Persisted history from the primary backend
    pub fn history(&self, filter: &HistoryFilter) -> Result<Vec<PersistedReading>> {
        self.pipeline.lock().writer().history(filter)
    }

    pub fn state(&self) -> SystemState {
        let mut state = self.state.read().clone();
        state.uptime_seconds = self.uptime();
        state
    }

    pub fn uptime(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::EventPayload;
    use crate::sensors::ChannelSource;

    fn engine() -> Engine {
        Engine::with_parts(
            Config::default(),
            NotificationDispatcher::disabled(),
            PersistenceWriter::disabled(),
            None,
        )
    }

    #[tokio::test]
    async fn test_run_until_source_closes() {
        let mut engine = engine();
        let (tx, source) = ChannelSource::new("test", 16);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        tx.send(Ok("Cam bien do duc nuoc".to_string())).await.unwrap();
        tx.send(Ok("VOLTAGE: 3300 TURBIDITY: 4".to_string())).await.unwrap();
        tx.send(Ok("VOLT=2.4V TURBIDITY=5".to_string())).await.unwrap();
        drop(tx);

        engine.run(Box::new(source), shutdown_rx).await.unwrap();

        let state = engine.state();
        assert!(!state.running);
        assert_eq!(state.total_lines, 3);
        assert_eq!(state.total_samples, 2);
        assert_eq!(state.rejected_lines, 1);
        assert_eq!(engine.latest().map(|s| s.voltage_mv), Some(2400.0));
        assert_eq!(engine.recent(Duration::seconds(60)).len(), 2);
        assert_eq!(engine.chart().len(), 2);
    }

    #[tokio::test]
    async fn test_link_loss_ends_ingestion() {
        let mut engine = engine();
        let mut events = engine.event_bus().subscribe_events();
        let (tx, source) = ChannelSource::new("serial", 4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

        tx.send(Err(anyhow::anyhow!("device unplugged"))).await.unwrap();
        engine.run(Box::new(source), shutdown_rx).await.unwrap();

        let mut lost = false;
        while let Ok(event) = events.try_recv() {
            if let EventPayload::Link { status: LinkStatus::Lost, .. } = event.payload {
                lost = true;
            }
        }
        assert!(lost);
    }

    #[tokio::test]
    async fn test_run_reports_engine_status() {
        let mut engine = engine();
        let mut events = engine.event_bus().subscribe_events();
        let (tx, source) = ChannelSource::new("test", 4);
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        drop(tx);

        engine.run(Box::new(source), shutdown_rx).await.unwrap();

        let mut statuses = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let EventPayload::Status { key, value } = event.payload {
                statuses.push(format!("{}={}", key, value));
            }
        }
        assert_eq!(statuses, vec!["engine=running", "engine=stopped"]);
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_run() {
        let mut engine = engine();
        let (_tx, source) = ChannelSource::new("idle", 4);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = tokio::spawn(async move {
            engine.run(Box::new(source), shutdown_rx).await.unwrap();
            engine
        });
        tokio::task::yield_now().await;
        shutdown_tx.send(()).unwrap();

        let engine = handle.await.unwrap();
        assert!(!engine.state().running);
    }
}
