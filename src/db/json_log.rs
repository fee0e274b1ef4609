// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! Bounded JSON array log with atomic replacement

use std::fs::{self, File};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{info, warn};

use super::{HistoryFilter, PersistedReading, ReadingStore};

pub struct JsonLog {
    path: PathBuf,
    max_entries: usize,
    /// Serializes read-modify-write cycles
    lock: Mutex<()>,
}

impl JsonLog {
    pub fn open(path: &Path, max_entries: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        info!("JSON log at {:?} (max {} entries)", path, max_entries);
        Ok(Self {
            path: path.to_path_buf(),
            max_entries: max_entries.max(1),
            lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current entries. A file that exists but cannot be read is an error,
    /// content that does not decode is discarded.
    fn read_entries(&self) -> Result<Vec<PersistedReading>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == ErrorKind::InvalidData => {
                warn!("JSON log {:?} is not UTF-8, starting empty: {}", self.path, e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {:?}", self.path)),
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        match serde_json::from_str(&content) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                warn!("Corrupt JSON log {:?}, starting empty: {}", self.path, e);
                Ok(Vec::new())
            }
        }
    }

    fn write_atomic(&self, entries: &[PersistedReading]) -> Result<()> {
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);

        let file = File::create(&tmp).with_context(|| format!("Failed to create {:?}", tmp))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, entries)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        drop(writer);

        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace {:?}", self.path))?;
        Ok(())
    }
}

impl ReadingStore for JsonLog {
    fn name(&self) -> &str {
        "json"
    }

    fn append(&self, reading: &PersistedReading) -> Result<()> {
        let _guard = self.lock.lock();
        let mut entries = self.read_entries()?;
        entries.push(reading.clone());
        if entries.len() > self.max_entries {
            let excess = entries.len() - self.max_entries;
            entries.drain(..excess);
        }
        self.write_atomic(&entries)
    }

    fn latest(&self) -> Result<Option<PersistedReading>> {
        let _guard = self.lock.lock();
        Ok(self.read_entries()?.pop())
    }

    fn history(&self, filter: &HistoryFilter) -> Result<Vec<PersistedReading>> {
        let _guard = self.lock.lock();
        Ok(filter.apply(self.read_entries()?))
    }
}
