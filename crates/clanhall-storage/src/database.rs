// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! `Database` wraps one `tokio_rusqlite::Connection`, and every query runs as a
//! closure on its single background thread. That thread is the only writer;
//! do not open additional connections for writes.

use std::path::Path;

use clanhall_core::ClanhallError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the queue database.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path` in WAL mode and run migrations.
    pub async fn open(path: &str) -> Result<Self, ClanhallError> {
        Self::open_with(path, true).await
    }

    /// Open with an explicit journal mode.
    pub async fn open_with(path: &str, wal_mode: bool) -> Result<Self, ClanhallError> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(ClanhallError::storage)?;
        }

        let conn = Connection::open(path).await.map_err(ClanhallError::storage)?;
        let db = Self { conn };
        db.prepare(wal_mode).await?;
        debug!(path, wal_mode, "database opened");
        Ok(db)
    }

    /// In-memory database, used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self, ClanhallError> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(ClanhallError::storage)?;
        let db = Self { conn };
        db.prepare(false).await?;
        Ok(db)
    }

    async fn prepare(&self, wal_mode: bool) -> Result<(), ClanhallError> {
        self.conn
            .call(move |conn| -> Result<(), rusqlite::Error> {
                if wal_mode {
                    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
                }
                conn.execute_batch(
                    "PRAGMA synchronous = NORMAL;
                     PRAGMA busy_timeout = 5000;
                     PRAGMA foreign_keys = ON;",
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        self.conn
            .call(|conn| migrations::run_migrations(conn))
            .await
            .map_err(ClanhallError::storage)
    }

    /// The shared single-writer connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Checkpoint the WAL and close the connection.
    pub async fn close(self) -> Result<(), ClanhallError> {
        checkpoint(&self.conn).await?;
        self.conn.close().await.map_err(ClanhallError::storage)?;
        debug!("database closed");
        Ok(())
    }
}

/// `PRAGMA wal_checkpoint(TRUNCATE)`.
pub async fn checkpoint(conn: &Connection) -> Result<(), ClanhallError> {
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)
}

/// Convert a tokio-rusqlite error into a storage error.
///
/// Pins the closure error type to `rusqlite::Error` for query modules.
pub fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ClanhallError {
    ClanhallError::storage(e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_runs_migrations() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("queue.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'discord_%' ORDER BY name",
                )?;
                let rows = stmt.query_map([], |row| row.get(0))?;
                rows.collect()
            })
            .await
            .unwrap();
        assert_eq!(
            tables,
            vec![
                "discord_rate_limit_bucket_map",
                "discord_rate_limit_buckets",
                "discord_write_queue",
                "discord_write_state",
            ]
        );
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let path = path.to_str().unwrap();
        Database::open(path).await.unwrap().close().await.unwrap();
        let db = Database::open(path).await.unwrap();
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn wal_mode_is_enabled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wal.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let mode: String = db
            .connection()
            .call(|conn| -> Result<String, rusqlite::Error> {
                conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))
            })
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        db.close().await.unwrap();
    }
}
