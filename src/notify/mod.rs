// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Notification dispatch
//!
//! Alerts are queued to a dedicated worker task so the ingestion path never
//! waits on the network. The worker applies a per-kind cooldown and bounds
//! every outbound call with a timeout.

mod telegram;

pub use telegram::TelegramNotifier;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{NotifyConfig, NotifySecrets};
use crate::detection::{Alert, AlertKind};

/// An outbound text channel
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    async fn deliver(&self, text: &str) -> Result<()>;
}

/// Last successful send per alert kind
#[derive(Debug, Clone)]
pub struct CooldownGate {
    min_interval: Duration,
    last_sent_at: HashMap<AlertKind, DateTime<Utc>>,
}

impl CooldownGate {
    pub fn new(min_interval_secs: u64) -> Self {
        Self {
            min_interval: Duration::seconds(min_interval_secs as i64),
            last_sent_at: HashMap::new(),
        }
    }

    /// Whether `alert` may be delivered now
    pub fn allows(&self, alert: &Alert) -> bool {
        if alert.skip_cooldown {
            return true;
        }
        match self.last_sent_at.get(&alert.kind) {
            Some(&last) => alert.raised_at - last >= self.min_interval,
            None => true,
        }
    }

    pub fn record(&mut self, kind: AlertKind, at: DateTime<Utc>) {
        self.last_sent_at.insert(kind, at);
    }

    pub fn last_sent(&self, kind: AlertKind) -> Option<DateTime<Utc>> {
        self.last_sent_at.get(&kind).copied()
    }
}

/// Front end of the notification worker
pub struct NotificationDispatcher {
    tx: Option<mpsc::Sender<Alert>>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Dispatcher with no destination; `send` is a no-op
    pub fn disabled() -> Self {
        Self {
            tx: None,
            worker: None,
        }
    }

    /// Start a worker delivering through `notifier`
    pub fn spawn(notifier: Arc<dyn Notifier>, config: &NotifyConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let gate = CooldownGate::new(config.min_interval_secs);
        let timeout = StdDuration::from_secs(config.timeout_secs);

        info!("Notification worker started ({})", notifier.name());
        let worker = tokio::spawn(run_worker(notifier, rx, gate, timeout));

        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Telegram dispatcher when credentials are present, otherwise disabled
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        if !config.enabled {
            info!("Notifications disabled by configuration");
            return Ok(Self::disabled());
        }
        match NotifySecrets::load(&config.env_file) {
            Some(secrets) => {
                let notifier = TelegramNotifier::new(&secrets, config)?;
                Ok(Self::spawn(Arc::new(notifier), config))
            }
            None => {
                info!("No notification credentials configured, alerts will not be sent");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Queue an alert without waiting
    pub fn send(&self, alert: &Alert) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(alert.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(alert)) => {
                warn!("Notification queue full, dropping {} alert", alert.kind);
            }
            Err(TrySendError::Closed(alert)) => {
                warn!("Notification worker gone, dropping {} alert", alert.kind);
            }
        }
    }

    /// Close the queue. The returned handle finishes once queued alerts drain.
    pub fn close(&mut self) -> Option<JoinHandle<()>> {
        self.tx.take();
        self.worker.take()
    }
}

async fn run_worker(
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::Receiver<Alert>,
    mut gate: CooldownGate,
    timeout: StdDuration,
) {
    while let Some(alert) = rx.recv().await {
        if !gate.allows(&alert) {
            debug!("{} alert dropped by cooldown", alert.kind);
            continue;
        }

        match tokio::time::timeout(timeout, notifier.deliver(&alert.message)).await {
            Ok(Ok(())) => {
                gate.record(alert.kind, alert.raised_at);
                debug!("Delivered {} alert", alert.kind);
            }
            Ok(Err(e)) => warn!("Failed to deliver {} alert: {}", alert.kind, e),
            Err(_) => warn!("Delivering {} alert timed out after {:?}", alert.kind, timeout),
        }
    }
    info!("Notification worker stopped");
}
