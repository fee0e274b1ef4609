// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/turbiwatch-rs

//! SQLite reading table

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::{params, params_from_iter, Connection, Row};
use tracing::{debug, info};

use super::{HistoryFilter, PersistedReading, ReadingStore};

/// Append-only readings table
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
    max_rows: Option<u64>,
}

impl SqliteStore {
    /// Open or create database
    pub fn open(path: &Path, max_rows: Option<u64>) -> Result<Self> {
        // Create parent directories
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL lets dashboards read while the pipeline writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        "#,
        )?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: path.to_path_buf(),
            max_rows,
        };
        store.create_tables()?;

        info!("Database opened at {:?} ({} readings)", path, store.count()?);
        Ok(store)
    }

    fn create_tables(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS readings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT,
                voltage REAL,
                turbidity REAL,
                status TEXT,
                source TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_readings_ts ON readings(ts);
        "#,
        )?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Drop the oldest rows beyond `max_rows`
    fn prune(&self, conn: &Connection, max_rows: u64) -> Result<usize> {
        let deleted = conn.execute(
            "DELETE FROM readings WHERE id NOT IN (SELECT id FROM readings ORDER BY id DESC LIMIT ?1)",
            params![max_rows as i64],
        )?;
        if deleted > 0 {
            debug!("Pruned {} old readings", deleted);
        }
        Ok(deleted)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<PersistedReading> {
    Ok(PersistedReading {
        timestamp: row.get(0)?,
        voltage: row.get(1)?,
        turbidity: row.get(2)?,
        status: row.get(3)?,
        source: row.get(4)?,
    })
}

impl ReadingStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn append(&self, reading: &PersistedReading) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO readings (ts, voltage, turbidity, status, source) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reading.timestamp,
                reading.voltage,
                reading.turbidity,
                reading.status,
                reading.source
            ],
        )?;
        if let Some(max_rows) = self.max_rows {
            self.prune(&conn, max_rows)?;
        }
        Ok(())
    }

    fn latest(&self) -> Result<Option<PersistedReading>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT ts, voltage, turbidity, status, source FROM readings ORDER BY id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query_map([], from_row)?;
        Ok(rows.next().transpose()?)
    }

    fn history(&self, filter: &HistoryFilter) -> Result<Vec<PersistedReading>> {
        let mut sql = String::from("SELECT ts, voltage, turbidity, status, source FROM readings WHERE 1 = 1");
        let mut values: Vec<String> = Vec::new();

        if let Some(from) = filter.from {
            sql.push_str(" AND substr(ts, 1, 10) >= ?");
            values.push(from.format("%Y-%m-%d").to_string());
        }
        if let Some(to) = filter.to {
            sql.push_str(" AND substr(ts, 1, 10) <= ?");
            values.push(to.format("%Y-%m-%d").to_string());
        }
        if !filter.statuses.is_empty() {
            let marks = vec!["?"; filter.statuses.len()].join(", ");
            sql.push_str(&format!(" AND status IN ({})", marks));
            values.extend(filter.statuses.iter().cloned());
        }
        let limit = filter.limit.map(|n| n as i64).unwrap_or(-1);
        sql.push_str(&format!(" ORDER BY id DESC LIMIT {}", limit));

        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), from_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        results.reverse();
        Ok(results)
    }
}
