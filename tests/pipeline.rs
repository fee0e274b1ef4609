// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! End-to-end scenarios through the public API

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use tempfile::tempdir;

use turbiwatch::analysis::TrendMethod;
use turbiwatch::db::{JsonLog, SqliteStore};
use turbiwatch::sensors::CommandFeedback;
use turbiwatch::{
    AlertKind, AlertLevel, Config, EventBus, HistoryFilter, NotificationDispatcher, Notifier, PersistedReading,
    PersistenceWriter, Pipeline, ProcessedSample, ReadingStore,
};

#[derive(Default)]
struct RecordingNotifier {
    delivered: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        self.delivered.lock().push(text.to_string());
        Ok(())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
}

fn pipeline_with(config: &Config, notifier: Arc<RecordingNotifier>, writer: PersistenceWriter) -> Pipeline {
    Pipeline::new(
        config,
        NotificationDispatcher::spawn(notifier, &config.notify),
        writer,
        CommandFeedback::detached(),
        Arc::new(EventBus::default()),
    )
}

async fn drain(mut pipeline: Pipeline) {
    if let Some(worker) = pipeline.close() {
        worker.await.unwrap();
    }
}

fn reading(i: usize) -> PersistedReading {
    PersistedReading {
        timestamp: "2024-05-01 08:00:00".to_string(),
        voltage: i as f64,
        turbidity: 1.0,
        status: "Clear water".to_string(),
        source: "Arduino Uno".to_string(),
    }
}

#[tokio::test]
async fn scenario_a_cloudy_reading_notifies_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier.clone(), PersistenceWriter::disabled());

    let processed = pipeline
        .process_line("TURBIDITY: 75.3 VOLTAGE: 2400", at(0))
        .unwrap();
    assert_eq!(processed.sample.turbidity_ntu, 75.3);
    assert_eq!(processed.sample.voltage_mv, 2400.0);
    assert_eq!(processed.level, AlertLevel::Cloudy);
    drain(pipeline).await;

    assert_eq!(
        *notifier.delivered.lock(),
        vec!["Alert: turbidity level cloudy (75.30 NTU)".to_string()]
    );
}

#[tokio::test]
async fn scenario_b_volt_suffix_is_quiet() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier.clone(), PersistenceWriter::disabled());

    let processed = pipeline.process_line("VOLT=2.4V TURBIDITY=5", at(0)).unwrap();
    assert!((processed.sample.voltage_mv - 2400.0).abs() < 1e-9);
    assert_eq!(processed.level, AlertLevel::Clear);
    drain(pipeline).await;

    assert!(notifier.delivered.lock().is_empty());
}

const RISING_FAST: &str = "Trend warning: turbidity rising fast (>30 NTU/min)";

async fn run_scenario_c(method: TrendMethod) -> (Vec<ProcessedSample>, Vec<String>) {
    let mut config = Config::default();
    config.analysis.trend_method = method;
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&config, notifier.clone(), PersistenceWriter::disabled());

    let mut processed = Vec::new();
    for (i, ntu) in [5.0, 10.0, 20.0, 35.0, 50.0].iter().enumerate() {
        processed.push(
            pipeline
                .process_line(&format!("TURBIDITY: {} VOLTAGE: 3000", ntu), at(i as i64 * 15))
                .unwrap(),
        );
    }
    drain(pipeline).await;

    let delivered = notifier.delivered.lock().clone();
    (processed, delivered)
}

fn trend_alerts(processed: &ProcessedSample) -> usize {
    processed.alerts.iter().filter(|a| a.kind == AlertKind::Trend).count()
}

#[tokio::test]
async fn scenario_c_trend_alert_fires_once_over_the_minute() {
    let (processed, delivered) = run_scenario_c(TrendMethod::Regression).await;
    let last = processed.last().unwrap();
    assert!((last.trend.long_slope.unwrap() - 46.0).abs() < 1e-9);
    assert!(last.trend.rising_fast);
    assert!(!processed[1].trend.rising_fast);

    // (5, 10, 20) over half a minute is exactly 30 NTU/min
    assert_eq!(processed[2].trend.long_slope, Some(30.0));
    let raised: Vec<usize> = processed.iter().map(trend_alerts).collect();
    assert_eq!(raised, vec![0, 0, 1, 0, 0]);

    let trend: Vec<&str> = delivered
        .iter()
        .map(String::as_str)
        .filter(|m| m.starts_with("Trend warning: turbidity rising fast"))
        .collect();
    assert_eq!(trend, vec![RISING_FAST]);
}

#[tokio::test]
async fn scenario_c_endpoint_estimator() {
    let (processed, delivered) = run_scenario_c(TrendMethod::Endpoint).await;
    let last = processed.last().unwrap();
    assert!((last.trend.long_slope.unwrap() - 45.0).abs() < 1e-9);
    assert!(last.trend.rising_fast);

    let raised: Vec<usize> = processed.iter().map(trend_alerts).collect();
    assert_eq!(raised, vec![0, 0, 1, 0, 0]);
    assert_eq!(delivered.iter().filter(|m| m.as_str() == RISING_FAST).count(), 1);
}

#[tokio::test]
async fn rate_alert_not_repeated_within_a_minute() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier.clone(), PersistenceWriter::disabled());

    // Steady climb of 30 NTU/min sampled every 5 s for 50 s
    for i in 0..11 {
        let ntu = 2.0 + 2.5 * i as f64;
        pipeline
            .process_line(&format!("VOLTAGE: 3000 TURBIDITY: {:.1}", ntu), at(i * 5))
            .unwrap();
    }
    drain(pipeline).await;

    let rate = notifier
        .delivered
        .lock()
        .iter()
        .filter(|m| m.starts_with("Trend warning: water is getting cloudy fast!"))
        .count();
    assert_eq!(rate, 1);
}

#[tokio::test]
async fn level_up_fires_at_each_breakpoint_only_once() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut config = Config::default();
    // keep the trend estimator out of the way
    config.analysis.trend_threshold_per_min = 1e9;
    config.analysis.rate_threshold_per_min = 1e9;
    let mut pipeline = pipeline_with(&config, notifier.clone(), PersistenceWriter::disabled());

    let values = [2.0, 12.0, 14.0, 60.0, 55.0, 150.0, 120.0, 5.0, 12.0];
    for (i, ntu) in values.iter().enumerate() {
        pipeline
            .process_line(&format!("VOLTAGE: 3000 TURBIDITY: {}", ntu), at(i as i64 * 120))
            .unwrap();
    }
    drain(pipeline).await;

    let levels: Vec<String> = notifier
        .delivered
        .lock()
        .iter()
        .filter(|m| m.starts_with("Alert:"))
        .cloned()
        .collect();
    assert_eq!(
        levels,
        vec![
            "Alert: turbidity level slight (12.00 NTU)".to_string(),
            "Alert: turbidity level cloudy (60.00 NTU)".to_string(),
            "Alert: turbidity very high (150.00 NTU)".to_string(),
            "Alert: turbidity level slight (12.00 NTU)".to_string(),
        ]
    );
}

#[tokio::test]
async fn breakpoint_crossing_delivers_status_and_level_together() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier.clone(), PersistenceWriter::disabled());

    pipeline.process_line("VOLTAGE: 3000 TURBIDITY: 5", at(0)).unwrap();
    let processed = pipeline.process_line("VOLTAGE: 3000 TURBIDITY: 12", at(600)).unwrap();
    let kinds: Vec<AlertKind> = processed.alerts.iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![AlertKind::Status, AlertKind::Level]);
    drain(pipeline).await;

    assert_eq!(
        *notifier.delivered.lock(),
        vec![
            "Status changed: Slightly cloudy - 12.00 NTU".to_string(),
            "Alert: turbidity level slight (12.00 NTU)".to_string(),
        ]
    );
}

#[test]
fn bounded_log_keeps_most_recent_thousand() {
    let dir = tempdir().unwrap();
    let log = JsonLog::open(&dir.path().join("log.json"), 1000).unwrap();
    for i in 0..1500 {
        log.append(&reading(i)).unwrap();
    }

    let all = log.history(&HistoryFilter::default()).unwrap();
    assert_eq!(all.len(), 1000);
    let expected: Vec<f64> = (500..1500).map(|i| i as f64).collect();
    let actual: Vec<f64> = all.iter().map(|r| r.voltage).collect();
    assert_eq!(actual, expected);
}

#[test]
fn scenario_d_thousand_and_first_write_evicts_first() {
    let dir = tempdir().unwrap();
    let log = JsonLog::open(&dir.path().join("log.json"), 1000).unwrap();
    for i in 0..1000 {
        log.append(&reading(i)).unwrap();
    }
    assert_eq!(log.history(&HistoryFilter::default()).unwrap()[0].voltage, 0.0);

    log.append(&reading(1000)).unwrap();
    let all = log.history(&HistoryFilter::default()).unwrap();
    assert_eq!(all.len(), 1000);
    assert_eq!(all[0].voltage, 1.0);
    assert_eq!(all[999].voltage, 1000.0);
}

#[tokio::test]
async fn persisted_reading_round_trips_through_both_backends() {
    let dir = tempdir().unwrap();
    let json = Arc::new(JsonLog::open(&dir.path().join("log.json"), 1000).unwrap());
    let sqlite = Arc::new(SqliteStore::open(&dir.path().join("log.db"), None).unwrap());
    let writer = PersistenceWriter::new(
        vec![sqlite.clone() as Arc<dyn ReadingStore>, json.clone() as Arc<dyn ReadingStore>],
        "Arduino Uno",
    );

    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier, writer);
    pipeline
        .process_line("Vôn:3312,Độ đục:33.3333", at(0))
        .unwrap();

    let from_sqlite = sqlite.latest().unwrap().unwrap();
    let from_json = json.latest().unwrap().unwrap();
    assert_eq!(from_sqlite, from_json);
    assert_eq!(from_json.voltage, 3312.0);
    assert_eq!(from_json.turbidity, 33.33);
    assert_eq!(from_json.status, "Slightly cloudy");
    assert_eq!(from_json.source, "Arduino Uno");

    let history = pipeline.writer().history(&HistoryFilter::default()).unwrap();
    assert_eq!(history, vec![from_sqlite]);
    drain(pipeline).await;
}

#[tokio::test]
async fn catch_up_record_written_after_an_hour_of_silence() {
    let dir = tempdir().unwrap();
    let json = Arc::new(JsonLog::open(&dir.path().join("log.json"), 1000).unwrap());
    let writer = PersistenceWriter::new(vec![json.clone() as Arc<dyn ReadingStore>], "Arduino Uno");
    let notifier = Arc::new(RecordingNotifier::default());
    let mut pipeline = pipeline_with(&Config::default(), notifier, writer);

    pipeline.process_line("VOLTAGE: 3000 TURBIDITY: 4", at(0)).unwrap();
    assert!(pipeline.flush_if_stale(at(1800)).is_none());
    assert!(pipeline.flush_if_stale(at(3600)).is_some());

    let all = json.history(&HistoryFilter::default()).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].turbidity, all[1].turbidity);
    assert_ne!(all[0].timestamp, all[1].timestamp);
    drain(pipeline).await;
}
