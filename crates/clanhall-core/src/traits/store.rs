// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable queue store trait.

use async_trait::async_trait;

use crate::error::ClanhallError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{BucketBlock, LimiterSnapshot, Operation, QueueStats, WritePriority, WriteRecord};

/// Persistence for queued writes and limiter state.
///
/// Records move `pending -> done` or `pending -> failed`; throttle retries only
/// bump `attempts`. Rate-limit timestamps are unix seconds.
#[async_trait]
pub trait WriteStore: PluginAdapter {
    /// Inserts a pending record and returns its id.
    async fn enqueue(
        &self,
        operation: Operation,
        payload: &str,
        priority: WritePriority,
    ) -> Result<i64, ClanhallError>;

    /// Returns up to `limit` pending records with an id above `after_id`,
    /// in ascending id order. Pass 0 to start from the oldest.
    async fn fetch_pending(&self, after_id: i64, limit: usize) -> Result<Vec<WriteRecord>, ClanhallError>;

    async fn mark_done(&self, id: i64) -> Result<(), ClanhallError>;

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<(), ClanhallError>;

    async fn mark_retry(&self, id: i64, attempts: u32) -> Result<(), ClanhallError>;

    /// Drops every pending record. Returns how many were removed.
    async fn clear_pending(&self) -> Result<u64, ClanhallError>;

    async fn stats(&self) -> Result<QueueStats, ClanhallError>;

    async fn load_limiter_state(&self) -> Result<LimiterSnapshot, ClanhallError>;

    async fn save_limiter_state(&self, snapshot: LimiterSnapshot) -> Result<(), ClanhallError>;

    /// Returns bucket blocks still active at `now`, pruning the expired ones.
    async fn load_buckets(&self, now: f64) -> Result<Vec<BucketBlock>, ClanhallError>;

    async fn save_bucket(&self, bucket_key: &str, blocked_until: f64) -> Result<(), ClanhallError>;

    /// Returns `(route_key, bucket_id)` pairs learned from response headers.
    async fn load_bucket_map(&self) -> Result<Vec<(String, String)>, ClanhallError>;

    async fn save_bucket_mapping(&self, route_key: &str, bucket_id: &str) -> Result<(), ClanhallError>;
}
