// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Line sources: stdin, in-process channels and the serial port

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use super::LineSource;

/// Reads telemetry lines piped into the process
pub struct StdinSource {
    lines: Lines<BufReader<Stdin>>,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LineSource for StdinSource {
    fn name(&self) -> &str {
        "stdin"
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.lines.next_line().await?)
    }
}

/// Lines pushed from another task or thread.
///
/// Each item is either a line or a link error; the source closes when every
/// sender is dropped.
pub struct ChannelSource {
    name: String,
    rx: mpsc::Receiver<Result<String>>,
}

impl ChannelSource {
    pub fn new(name: &str, capacity: usize) -> (mpsc::Sender<Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                name: name.to_string(),
                rx,
            },
        )
    }
}

#[async_trait]
impl LineSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_line(&mut self) -> Result<Option<String>> {
        match self.rx.recv().await {
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[cfg(feature = "serial")]
pub use serial::SerialLink;

#[cfg(feature = "serial")]
mod serial {
    use std::io::{BufRead, BufReader, Write};
    use std::time::Duration;

    use anyhow::{Context, Result};
    use tracing::{info, warn};

    use super::ChannelSource;
    use crate::sensors::{Command, CommandSink};

    /// Serial connection to the sensor board.
    ///
    /// A blocking reader thread feeds lines into a [`ChannelSource`]; a cloned
    /// port handle is used for command bytes.
    pub struct SerialLink {
        port: Box<dyn serialport::SerialPort>,
    }

    impl SerialLink {
        pub fn open(path: &str, baud_rate: u32) -> Result<(ChannelSource, Self)> {
            let port = serialport::new(path, baud_rate)
                .timeout(Duration::from_millis(1000))
                .open()
                .with_context(|| format!("Failed to open serial port {}", path))?;
            let reader = port
                .try_clone()
                .context("Failed to clone serial port handle")?;

            let (tx, source) = ChannelSource::new(path, 256);
            let name = path.to_string();

            std::thread::Builder::new()
                .name("serial-reader".to_string())
                .spawn(move || {
                    let mut reader = BufReader::new(reader);
                    let mut buf = Vec::with_capacity(128);
                    loop {
                        buf.clear();
                        match reader.read_until(b'\n', &mut buf) {
                            Ok(0) => break,
                            Ok(_) => {
                                let line = String::from_utf8_lossy(&buf).trim().to_string();
                                if line.is_empty() {
                                    continue;
                                }
                                if tx.blocking_send(Ok(line)).is_err() {
                                    break;
                                }
                            }
                            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                            Err(e) => {
                                warn!("Serial read failed on {}: {}", name, e);
                                let _ = tx.blocking_send(Err(e.into()));
                                break;
                            }
                        }
                    }
                    info!("Serial reader for {} stopped", name);
                })
                .context("Failed to spawn serial reader thread")?;

            info!("Connected to sensor on {} at {} baud", path, baud_rate);
            Ok((source, Self { port }))
        }
    }

    impl CommandSink for SerialLink {
        fn write_command(&mut self, command: Command) -> Result<()> {
            self.port.write_all(&[command.as_byte()])?;
            self.port.flush()?;
            Ok(())
        }
    }
}
