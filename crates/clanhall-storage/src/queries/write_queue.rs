// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable write queue: one row per persisted outbound Discord write.

use std::str::FromStr;

use clanhall_core::types::QueueStats;
use clanhall_core::{ClanhallError, WriteRecord, WriteStatus};
use rusqlite::{Row, params};

use crate::database::{Database, map_tr_err};

const RECORD_COLUMNS: &str = "id, operation, payload, status, priority, attempts, failure_reason,
                              created_at, updated_at, completed_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<WriteRecord> {
    let status: String = row.get(3)?;
    let status = WriteStatus::from_str(&status).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(WriteRecord {
        id: row.get(0)?,
        operation: row.get(1)?,
        payload: row.get(2)?,
        status,
        priority: row.get(4)?,
        attempts: row.get(5)?,
        failure_reason: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        completed_at: row.get(9)?,
    })
}

/// Insert a pending record. Returns the new id.
pub async fn enqueue(
    db: &Database,
    operation: &str,
    payload: &str,
    priority: i64,
) -> Result<i64, ClanhallError> {
    let operation = operation.to_string();
    let payload = payload.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO discord_write_queue (operation, payload, priority) VALUES (?1, ?2, ?3)",
                params![operation, payload, priority],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Pending records in ascending id order.
pub async fn fetch_pending(
    db: &Database,
    after_id: i64,
    limit: usize,
) -> Result<Vec<WriteRecord>, ClanhallError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM discord_write_queue
                 WHERE status = 'pending' AND id > ?1
                 ORDER BY id ASC
                 LIMIT ?2"
            ))?;
            let rows = stmt.query_map(params![after_id, limit], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent failed records, newest first.
pub async fn recent_failed(db: &Database, limit: usize) -> Result<Vec<WriteRecord>, ClanhallError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM discord_write_queue
                 WHERE status = 'failed'
                 ORDER BY id DESC
                 LIMIT ?1"
            ))?;
            let rows = stmt.query_map(params![limit], row_to_record)?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get(db: &Database, id: i64) -> Result<Option<WriteRecord>, ClanhallError> {
    db.connection()
        .call(move |conn| {
            let result = conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM discord_write_queue WHERE id = ?1"),
                params![id],
                row_to_record,
            );
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_done(db: &Database, id: i64) -> Result<(), ClanhallError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE discord_write_queue SET status = 'done', failure_reason = NULL,
                 completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn mark_failed(db: &Database, id: i64, reason: &str) -> Result<(), ClanhallError> {
    let reason = reason.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE discord_write_queue SET status = 'failed', failure_reason = ?1,
                 completed_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2",
                params![reason, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a throttle retry. The record stays pending.
pub async fn mark_retry(db: &Database, id: i64, attempts: u32) -> Result<(), ClanhallError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE discord_write_queue SET attempts = ?1,
                 updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?2 AND status = 'pending'",
                params![attempts, id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete every pending record. Returns the number removed.
pub async fn clear_pending(db: &Database) -> Result<u64, ClanhallError> {
    db.connection()
        .call(|conn| {
            let removed = conn.execute("DELETE FROM discord_write_queue WHERE status = 'pending'", [])?;
            Ok(removed as u64)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn stats(db: &Database) -> Result<QueueStats, ClanhallError> {
    db.connection()
        .call(|conn| {
            let mut stmt =
                conn.prepare("SELECT status, COUNT(*) FROM discord_write_queue GROUP BY status")?;
            let mut rows = stmt.query([])?;
            let mut stats = QueueStats::default();
            while let Some(row) = rows.next()? {
                let status: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                let count = count.max(0) as u64;
                match status.as_str() {
                    "pending" => stats.pending = count,
                    "done" => stats.done = count,
                    "failed" => stats.failed = count,
                    _ => {}
                }
            }
            Ok(stats)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn enqueue_then_fetch_in_id_order() {
        let (db, _dir) = setup_db().await;

        let a = enqueue(&db, "send_message", r#"{"content":"a"}"#, 10).await.unwrap();
        let b = enqueue(&db, "add_roles", r#"{"role_ids":["1"]}"#, 10).await.unwrap();
        let c = enqueue(&db, "ban_member", r#"{"user_id":"2"}"#, 0).await.unwrap();
        assert!(a < b && b < c);

        let pending = fetch_pending(&db, 0, 100).await.unwrap();
        let ids: Vec<i64> = pending.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(pending[0].status, WriteStatus::Pending);
        assert_eq!(pending[0].operation, "send_message");
        assert_eq!(pending[2].priority, 0);
        assert_eq!(pending[0].attempts, 0);
        assert!(pending[0].completed_at.is_none());

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn fetch_respects_limit() {
        let (db, _dir) = setup_db().await;
        for i in 0..5 {
            enqueue(&db, "send_message", &format!(r#"{{"n":{i}}}"#), 10)
                .await
                .unwrap();
        }
        let pending = fetch_pending(&db, 0, 3).await.unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].payload, r#"{"n":0}"#);

        let rest = fetch_pending(&db, 0, 3).await.unwrap();
        assert_eq!(rest, pending);
        let rest = fetch_pending(&db, pending[2].id, 3).await.unwrap();
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].payload, r#"{"n":3}"#);
        assert!(fetch_pending(&db, rest[1].id, 3).await.unwrap().is_empty());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn done_and_failed_leave_pending_set() {
        let (db, _dir) = setup_db().await;
        let a = enqueue(&db, "send_message", "{}", 10).await.unwrap();
        let b = enqueue(&db, "delete_message", "{}", 10).await.unwrap();
        let c = enqueue(&db, "edit_message", "{}", 10).await.unwrap();

        mark_done(&db, a).await.unwrap();
        mark_failed(&db, b, "forbidden (50013): Missing Permissions").await.unwrap();

        let pending = fetch_pending(&db, 0, 100).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, c);

        let done = get(&db, a).await.unwrap().unwrap();
        assert_eq!(done.status, WriteStatus::Done);
        assert!(done.completed_at.is_some());

        let failed = get(&db, b).await.unwrap().unwrap();
        assert_eq!(failed.status, WriteStatus::Failed);
        assert_eq!(
            failed.failure_reason.as_deref(),
            Some("forbidden (50013): Missing Permissions")
        );

        let recent = recent_failed(&db, 10).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, b);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn retry_only_bumps_attempts() {
        let (db, _dir) = setup_db().await;
        let id = enqueue(&db, "add_roles", "{}", 10).await.unwrap();
        mark_retry(&db, id, 1).await.unwrap();
        mark_retry(&db, id, 2).await.unwrap();

        let record = get(&db, id).await.unwrap().unwrap();
        assert_eq!(record.status, WriteStatus::Pending);
        assert_eq!(record.attempts, 2);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn clear_pending_keeps_history() {
        let (db, _dir) = setup_db().await;
        let a = enqueue(&db, "send_message", "{}", 10).await.unwrap();
        enqueue(&db, "send_message", "{}", 10).await.unwrap();
        enqueue(&db, "send_message", "{}", 10).await.unwrap();
        mark_done(&db, a).await.unwrap();

        assert_eq!(clear_pending(&db).await.unwrap(), 2);
        let s = stats(&db).await.unwrap();
        assert_eq!(s, QueueStats { pending: 0, done: 1, failed: 0 });
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn get_missing_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(get(&db, 999).await.unwrap().is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_enqueues_do_not_busy() {
        let (db, _dir) = setup_db().await;
        let db = std::sync::Arc::new(db);

        let mut handles = Vec::new();
        for i in 0..10 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                enqueue(&db, "send_message", &format!(r#"{{"n":{i}}}"#), 10).await
            }));
        }
        for handle in handles {
            let result = handle.await.unwrap();
            assert!(result.is_ok(), "concurrent enqueue failed: {result:?}");
        }
        assert_eq!(stats(&db).await.unwrap().pending, 10);
    }
}
