// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persisted rate-limiter state: the global clock and per-route buckets.
//!
//! All timestamps are unix seconds so they survive a restart.

use clanhall_core::ClanhallError;
use clanhall_core::types::{BucketBlock, LimiterSnapshot};
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

pub async fn load_limiter_state(db: &Database) -> Result<LimiterSnapshot, ClanhallError> {
    db.connection()
        .call(|conn| {
            let row = conn
                .query_row(
                    "SELECT last_write_at, blocked_until FROM discord_write_state WHERE id = 1",
                    [],
                    |row| {
                        Ok(LimiterSnapshot {
                            last_write_at: row.get(0)?,
                            blocked_until: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(row.unwrap_or_default())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_limiter_state(db: &Database, snapshot: LimiterSnapshot) -> Result<(), ClanhallError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO discord_write_state (id, last_write_at, blocked_until) VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                     last_write_at = excluded.last_write_at,
                     blocked_until = excluded.blocked_until",
                params![snapshot.last_write_at, snapshot.blocked_until],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Prune blocks that expired before `now`, then return the rest.
pub async fn load_buckets(db: &Database, now: f64) -> Result<Vec<BucketBlock>, ClanhallError> {
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM discord_rate_limit_buckets WHERE blocked_until <= ?1",
                params![now],
            )?;
            let blocks = {
                let mut stmt = tx.prepare(
                    "SELECT bucket_key, blocked_until FROM discord_rate_limit_buckets ORDER BY bucket_key",
                )?;
                let rows = stmt.query_map([], |row| {
                    Ok(BucketBlock {
                        bucket_key: row.get(0)?,
                        blocked_until: row.get(1)?,
                    })
                })?;
                rows.collect::<Result<Vec<_>, _>>()?
            };
            tx.commit()?;
            Ok(blocks)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_bucket(db: &Database, bucket_key: &str, blocked_until: f64) -> Result<(), ClanhallError> {
    let bucket_key = bucket_key.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO discord_rate_limit_buckets (bucket_key, blocked_until) VALUES (?1, ?2)
                 ON CONFLICT(bucket_key) DO UPDATE SET blocked_until = excluded.blocked_until",
                params![bucket_key, blocked_until],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

pub async fn load_bucket_map(db: &Database) -> Result<Vec<(String, String)>, ClanhallError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT route_key, bucket_id FROM discord_rate_limit_bucket_map ORDER BY route_key",
            )?;
            let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
            rows.collect::<Result<Vec<_>, _>>()
        })
        .await
        .map_err(map_tr_err)
}

pub async fn save_bucket_mapping(db: &Database, route_key: &str, bucket_id: &str) -> Result<(), ClanhallError> {
    let route_key = route_key.to_string();
    let bucket_id = bucket_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO discord_rate_limit_bucket_map (route_key, bucket_id) VALUES (?1, ?2)
                 ON CONFLICT(route_key) DO UPDATE SET
                     bucket_id = excluded.bucket_id,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')",
                params![route_key, bucket_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
