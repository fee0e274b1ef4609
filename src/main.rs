// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! TurbiWatch - Water Turbidity Telemetry Monitor
//!
//! Reads telemetry lines from a turbidity sensor board (serial port, stdin or
//! the built-in simulator), raises alerts and keeps a bounded reading log.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use turbiwatch::sensors::{CommandSink, DemoSource, LineSource, StdinSource};
use turbiwatch::{Config, Engine, VERSION};

/// TurbiWatch - Water Turbidity Telemetry Monitor
#[derive(Parser, Debug)]
#[command(name = "turbiwatch")]
#[command(author = "TurbiWatch Project")]
#[command(version = VERSION)]
#[command(about = "Turbidity telemetry parsing, trend alerts and bounded logging")]
struct Args {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Enable trace-level logging
    #[arg(long)]
    trace: bool,

    /// Demo mode with a simulated sensor
    #[arg(long)]
    demo: bool,

    /// Serial port of the sensor board (requires the `serial` feature)
    #[arg(short, long)]
    port: Option<String>,

    /// Serial baud rate
    #[arg(long)]
    baud: Option<u32>,

    /// Data output directory
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load or create configuration
    let config_path = args.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load_or_create(&config_path)?;

    // Override with command line args
    if args.demo {
        config.demo_mode = true;
    }
    if let Some(port) = args.port.clone() {
        config.sensor.serial_port = Some(port);
    }
    if let Some(baud) = args.baud {
        config.sensor.baud_rate = baud;
    }
    if let Some(data_dir) = args.data_dir.clone() {
        config.data_dir = data_dir;
    }
    config.validate()?;

    // Initialize logging
    let log_level = if args.trace {
        Level::TRACE
    } else if args.debug {
        Level::DEBUG
    } else {
        config.log_level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(args.debug)
        .with_line_number(args.debug)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("💧 TurbiWatch v{} - Water Turbidity Telemetry Monitor", VERSION);
    info!("Configuration loaded from {:?}", config_path);
    info!("Demo mode: {}", config.demo_mode);

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(config))
}

async fn run(config: Config) -> Result<()> {
    let (source, sink) = open_source(&config)?;
    let mut engine = Engine::new(config, sink)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received, cleaning up...");
            let _ = shutdown_tx.send(());
        }
    });

    info!("🚀 TurbiWatch running");
    info!("   Press Ctrl+C to shutdown");

    engine.run(source, shutdown_rx).await?;

    info!("TurbiWatch shutdown complete");
    Ok(())
}

type Link = (Box<dyn LineSource>, Option<Box<dyn CommandSink>>);

fn open_source(config: &Config) -> Result<Link> {
    if config.demo_mode {
        let demo = DemoSource::new(Duration::from_millis(config.sensor.demo_period_ms.max(1)));
        let sink = demo.command_sink();
        info!("Using simulated sensor");
        return Ok((Box::new(demo), Some(Box::new(sink))));
    }

    if let Some(port) = &config.sensor.serial_port {
        #[cfg(feature = "serial")]
        {
            let (source, link) = turbiwatch::sensors::SerialLink::open(port, config.sensor.baud_rate)?;
            return Ok((Box::new(source), Some(Box::new(link))));
        }

        #[cfg(not(feature = "serial"))]
        {
            anyhow::bail!(
                "Serial port {} requested but serial support is not enabled. Build with --features serial or use --demo",
                port
            );
        }
    }

    info!("Reading telemetry lines from stdin");
    Ok((Box::new(StdinSource::new()), None))
}
