//! Durable mirror of the latest snapshots, one row per system id.
//!
//! The table is created by `syswatch_collector migrate`; opening a database
//! never changes its schema.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::types::Snapshot;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database schema missing; run `syswatch_collector migrate` first")]
    NotMigrated,
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Blocking persistence seam. Callers on the async side go through
/// `spawn_blocking`.
pub trait SnapshotRepository: Send + Sync {
    /// Insert or replace the row for `snapshot.system_id`.
    fn upsert(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    fn fetch(&self, system_id: &str) -> Result<Option<Snapshot>, StoreError>;
}

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS system_metrics (
    system_id   TEXT PRIMARY KEY NOT NULL,
    hostname    TEXT NOT NULL,
    cpu         REAL NOT NULL DEFAULT 0,
    ram         REAL NOT NULL DEFAULT 0,
    disk        REAL NOT NULL DEFAULT 0,
    ping        REAL,
    updated_at  TEXT NOT NULL
);
";

pub struct SqliteRepository {
    conn: Mutex<Connection>,
}

impl SqliteRepository {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    /// Create the table. Safe to run repeatedly.
    pub fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn is_migrated(&self) -> Result<bool, StoreError> {
        let n: i64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'system_metrics'",
            [],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    /// Fail fast when serving against a database nobody migrated.
    pub fn ensure_migrated(&self) -> Result<(), StoreError> {
        if self.is_migrated()? {
            Ok(())
        } else {
            Err(StoreError::NotMigrated)
        }
    }

    pub fn row_count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM system_metrics", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl SnapshotRepository for SqliteRepository {
    fn upsert(&self, s: &Snapshot) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO system_metrics (system_id, hostname, cpu, ram, disk, ping, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(system_id) DO UPDATE SET \
               hostname = excluded.hostname, cpu = excluded.cpu, ram = excluded.ram, \
               disk = excluded.disk, ping = excluded.ping, updated_at = excluded.updated_at",
            params![
                s.system_id,
                s.hostname,
                s.cpu_percent,
                s.ram_percent,
                s.disk_percent,
                s.ping_ms,
                s.received_at,
            ],
        )?;
        Ok(())
    }

    fn fetch(&self, system_id: &str) -> Result<Option<Snapshot>, StoreError> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT system_id, hostname, cpu, ram, disk, ping, updated_at \
                 FROM system_metrics WHERE system_id = ?1",
                params![system_id],
                |row| {
                    Ok(Snapshot {
                        system_id: row.get(0)?,
                        hostname: row.get(1)?,
                        cpu_percent: row.get(2)?,
                        ram_percent: row.get(3)?,
                        disk_percent: row.get(4)?,
                        ping_ms: row.get(5)?,
                        received_at: row.get::<_, DateTime<Utc>>(6)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }
}
