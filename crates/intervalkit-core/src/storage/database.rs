//! SQLite-backed key-value store and usage statistics.
//!
//! Provides persistent storage for:
//! - Timer records and the pinned board (`kv` table)
//! - Start/pause/complete counts per timer kind (`timer_stats` table)
//!
//! Separate processes sharing the file see each other's writes only by
//! polling; there is no change feed.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::{data_dir, KeyValueStore};
use crate::error::StoreError;
use crate::stats::StatsAction;
use crate::sync::TabId;
use crate::timer::TimerKind;

/// Aggregated counters for one timer kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct KindStats {
    pub kind: String,
    pub starts: u64,
    pub pauses: u64,
    pub completions: u64,
    /// Sum of the nominal durations of completed runs.
    pub completed_ms: u64,
}

/// SQLite database shared by every CLI invocation.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `<data_dir>/intervalkit.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, StoreError> {
        let dir = data_dir().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::open_at(dir.join("intervalkit.db"))
    }

    /// Open (or create) the database at an explicit path.
    pub fn open_at(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path: PathBuf = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|source| StoreError::OpenFailed {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("database lock poisoned".into()))
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS timer_stats (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                kind        TEXT NOT NULL,
                action      TEXT NOT NULL,
                duration_ms INTEGER,
                recorded_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_timer_stats_kind ON timer_stats(kind);
            CREATE INDEX IF NOT EXISTS idx_timer_stats_recorded_at ON timer_stats(recorded_at);",
        )?;
        Ok(())
    }

    /// Record one start/pause/complete.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn record_stat(
        &self,
        kind: TimerKind,
        action: StatsAction,
        duration_ms: Option<u64>,
        recorded_at: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO timer_stats (kind, action, duration_ms, recorded_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                kind.as_str(),
                action.as_str(),
                duration_ms.and_then(|ms| i64::try_from(ms).ok()),
                recorded_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Per-kind counters, optionally limited to entries at or after `since`.
    pub fn stats_summary(&self, since: Option<DateTime<Utc>>) -> Result<Vec<KindStats>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT kind, action, COUNT(*), COALESCE(SUM(duration_ms), 0)
             FROM timer_stats
             WHERE recorded_at >= ?1
             GROUP BY kind, action
             ORDER BY kind",
        )?;
        let since = since
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "0000-01-01T00:00:00+00:00".to_string());
        let rows = stmt.query_map(params![since], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u64>(2)?,
                row.get::<_, u64>(3)?,
            ))
        })?;

        let mut summary: Vec<KindStats> = Vec::new();
        for row in rows {
            let (kind, action, count, total_ms) = row?;
            let index = match summary.iter().position(|s| s.kind == kind) {
                Some(index) => index,
                None => {
                    summary.push(KindStats {
                        kind,
                        ..KindStats::default()
                    });
                    summary.len() - 1
                }
            };
            let entry = &mut summary[index];
            match action.as_str() {
                "start" => entry.starts += count,
                "pause" => entry.pauses += count,
                "complete" => {
                    entry.completions += count;
                    entry.completed_ms += total_ms;
                }
                _ => {}
            }
        }
        Ok(summary)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, _origin: &TabId) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str, _origin: &TabId) -> Result<(), StoreError> {
        self.conn()?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}
