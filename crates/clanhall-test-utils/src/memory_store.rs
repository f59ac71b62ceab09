// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory `WriteStore` for coordinator tests that do not need SQLite.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use clanhall_core::traits::adapter::PluginAdapter;
use clanhall_core::traits::store::WriteStore;
use clanhall_core::types::{
    AdapterType, BucketBlock, HealthStatus, LimiterSnapshot, QueueStats, WriteRecord,
};
use clanhall_core::{ClanhallError, Operation, WritePriority, WriteStatus};

#[derive(Default)]
struct State {
    records: BTreeMap<i64, WriteRecord>,
    next_id: i64,
    limiter: LimiterSnapshot,
    buckets: HashMap<String, f64>,
    bucket_map: HashMap<String, String>,
}

#[derive(Default)]
pub struct MemoryWriteStore {
    state: Mutex<State>,
    fail_enqueue: AtomicBool,
}

fn now_text() -> String {
    "1970-01-01T00:00:00.000Z".to_string()
}

impl MemoryWriteStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Make every `enqueue` fail until reset.
    pub fn fail_enqueue(&self, fail: bool) {
        self.fail_enqueue.store(fail, Ordering::SeqCst);
    }

    /// Insert a raw record, e.g. a corrupt one, as if left by a previous run.
    pub fn insert_raw(&self, operation: &str, payload: &str) -> i64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.records.insert(
            id,
            WriteRecord {
                id,
                operation: operation.to_string(),
                payload: payload.to_string(),
                status: WriteStatus::Pending,
                priority: WritePriority::Normal.as_i64(),
                attempts: 0,
                failure_reason: None,
                created_at: now_text(),
                updated_at: now_text(),
                completed_at: None,
            },
        );
        id
    }

    pub fn record(&self, id: i64) -> Option<WriteRecord> {
        self.state().records.get(&id).cloned()
    }

    pub fn records(&self) -> Vec<WriteRecord> {
        self.state().records.values().cloned().collect()
    }

    fn finish(&self, id: i64, status: WriteStatus, reason: Option<&str>) {
        if let Some(record) = self.state().records.get_mut(&id) {
            record.status = status;
            record.failure_reason = reason.map(str::to_string);
            record.completed_at = Some(now_text());
        }
    }
}

#[async_trait]
impl PluginAdapter for MemoryWriteStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ClanhallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ClanhallError> {
        Ok(())
    }
}

#[async_trait]
impl WriteStore for MemoryWriteStore {
    async fn enqueue(
        &self,
        operation: Operation,
        payload: &str,
        priority: WritePriority,
    ) -> Result<i64, ClanhallError> {
        if self.fail_enqueue.load(Ordering::SeqCst) {
            return Err(ClanhallError::storage(std::io::Error::other("disk full")));
        }
        let id = self.insert_raw(operation.as_ref(), payload);
        if let Some(record) = self.state().records.get_mut(&id) {
            record.priority = priority.as_i64();
        }
        Ok(id)
    }

    async fn fetch_pending(&self, after_id: i64, limit: usize) -> Result<Vec<WriteRecord>, ClanhallError> {
        Ok(self
            .state()
            .records
            .range(after_id.saturating_add(1)..)
            .map(|(_, r)| r)
            .filter(|r| r.status == WriteStatus::Pending)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_done(&self, id: i64) -> Result<(), ClanhallError> {
        self.finish(id, WriteStatus::Done, None);
        Ok(())
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<(), ClanhallError> {
        self.finish(id, WriteStatus::Failed, Some(reason));
        Ok(())
    }

    async fn mark_retry(&self, id: i64, attempts: u32) -> Result<(), ClanhallError> {
        if let Some(record) = self.state().records.get_mut(&id)
            && record.status == WriteStatus::Pending
        {
            record.attempts = attempts;
        }
        Ok(())
    }

    async fn clear_pending(&self) -> Result<u64, ClanhallError> {
        let mut state = self.state();
        let before = state.records.len();
        state.records.retain(|_, r| r.status != WriteStatus::Pending);
        Ok((before - state.records.len()) as u64)
    }

    async fn stats(&self) -> Result<QueueStats, ClanhallError> {
        let mut stats = QueueStats::default();
        for record in self.state().records.values() {
            match record.status {
                WriteStatus::Pending => stats.pending += 1,
                WriteStatus::Done => stats.done += 1,
                WriteStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn load_limiter_state(&self) -> Result<LimiterSnapshot, ClanhallError> {
        Ok(self.state().limiter)
    }

    async fn save_limiter_state(&self, snapshot: LimiterSnapshot) -> Result<(), ClanhallError> {
        self.state().limiter = snapshot;
        Ok(())
    }

    async fn load_buckets(&self, now: f64) -> Result<Vec<BucketBlock>, ClanhallError> {
        let mut state = self.state();
        state.buckets.retain(|_, until| *until > now);
        Ok(state
            .buckets
            .iter()
            .map(|(key, until)| BucketBlock {
                bucket_key: key.clone(),
                blocked_until: *until,
            })
            .collect())
    }

    async fn save_bucket(&self, bucket_key: &str, blocked_until: f64) -> Result<(), ClanhallError> {
        self.state()
            .buckets
            .insert(bucket_key.to_string(), blocked_until);
        Ok(())
    }

    async fn load_bucket_map(&self) -> Result<Vec<(String, String)>, ClanhallError> {
        Ok(self
            .state()
            .bucket_map
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    async fn save_bucket_mapping(&self, route_key: &str, bucket_id: &str) -> Result<(), ClanhallError> {
        self.state()
            .bucket_map
            .insert(route_key.to_string(), bucket_id.to_string());
        Ok(())
    }
}
