// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Pacing for the dispatch worker.
//!
//! The limiter answers one question: how long must the next write wait? It
//! combines a global minimum interval, optional per-operation intervals, a
//! global block set by throttle responses, and per-bucket blocks learned from
//! Discord's rate-limit headers.
//!
//! Internally everything runs on the monotonic clock. State that should
//! survive a restart is emitted as [`LimiterChange`]s carrying unix times,
//! which the worker hands to the store.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clanhall_config::WriterConfig;
use clanhall_core::types::{BucketBlock, LimiterSnapshot};
use clanhall_core::{MAX_RATE_LIMIT_WAIT, Operation, RateLimitInfo};
use tokio::time::Instant;
use tracing::debug;

/// Static pacing parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitSettings {
    pub min_interval: Duration,
    pub operation_intervals: HashMap<Operation, Duration>,
    /// Block applied to a route after its first success, until Discord's
    /// headers reveal the real bucket.
    pub warmup: Duration,
    pub warmup_operations: HashSet<Operation>,
}

impl RateLimitSettings {
    /// Only a global interval.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            operation_intervals: HashMap::new(),
            warmup: Duration::ZERO,
            warmup_operations: HashSet::new(),
        }
    }

    pub fn from_config(config: &WriterConfig) -> Self {
        let operation_intervals = config
            .operation_min_intervals
            .iter()
            .filter_map(|(name, secs)| {
                Operation::from_str(name)
                    .ok()
                    .map(|op| (op, clanhall_config::model::secs(*secs)))
            })
            .collect();
        let warmup_operations = config
            .warmup_operations
            .iter()
            .filter_map(|name| Operation::from_str(name).ok())
            .collect();
        Self {
            min_interval: config.min_interval(),
            operation_intervals,
            warmup: config.warmup(),
            warmup_operations,
        }
    }

    pub fn with_operation_interval(mut self, op: Operation, interval: Duration) -> Self {
        self.operation_intervals.insert(op, interval);
        self
    }

    pub fn with_warmup(mut self, warmup: Duration, operations: impl IntoIterator<Item = Operation>) -> Self {
        self.warmup = warmup;
        self.warmup_operations = operations.into_iter().collect();
        self
    }
}

/// Limiter state to write through to durable storage.
#[derive(Debug, Clone, PartialEq)]
pub enum LimiterChange {
    Global(LimiterSnapshot),
    Bucket { key: String, blocked_until: f64 },
    Mapping { route_key: String, bucket_id: String },
}

#[derive(Debug)]
pub struct RateLimiter {
    settings: RateLimitSettings,
    last_dispatch: Option<Instant>,
    last_by_operation: HashMap<Operation, Instant>,
    blocked_until: Option<Instant>,
    /// Keyed by server bucket id, or by route key when no id is known.
    blocks: HashMap<String, Instant>,
    /// Route key to server bucket id.
    bucket_map: HashMap<String, String>,
    warmups: HashMap<String, Instant>,
    changes: Vec<LimiterChange>,
}

pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

fn to_unix(at: Instant, now: Instant, now_unix: f64) -> f64 {
    if at >= now {
        now_unix + (at - now).as_secs_f64()
    } else {
        now_unix - (now - at).as_secs_f64()
    }
}

fn from_unix(at: f64, now: Instant, now_unix: f64) -> Option<Instant> {
    let delta = at - now_unix;
    if !delta.is_finite() {
        return None;
    }
    if delta >= 0.0 {
        Some(later(now, Duration::try_from_secs_f64(delta).ok()?))
    } else {
        now.checked_sub(Duration::try_from_secs_f64(-delta).ok()?)
    }
}

/// `at + delay`, with the delay capped so the sum cannot overflow.
fn later(at: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_RATE_LIMIT_WAIT);
    at.checked_add(delay).unwrap_or(at)
}

fn remaining(until: Instant, now: Instant) -> Duration {
    until.saturating_duration_since(now)
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self {
            settings,
            last_dispatch: None,
            last_by_operation: HashMap::new(),
            blocked_until: None,
            blocks: HashMap::new(),
            bucket_map: HashMap::new(),
            warmups: HashMap::new(),
            changes: Vec::new(),
        }
    }

    pub fn settings(&self) -> &RateLimitSettings {
        &self.settings
    }

    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch
    }

    pub fn blocked_until(&self) -> Option<Instant> {
        self.blocked_until
    }

    /// How long a write of `op` on `route_key` must wait at `now`.
    ///
    /// Expired blocks are pruned as a side effect.
    pub fn wait_time(&mut self, op: Operation, route_key: &str, now: Instant) -> Duration {
        self.prune(now);

        let mut wait = Duration::ZERO;
        if let Some(last) = self.last_dispatch {
            wait = wait.max(remaining(later(last, self.settings.min_interval), now));
        }
        if let Some(interval) = self.settings.operation_intervals.get(&op)
            && let Some(last) = self.last_by_operation.get(&op)
        {
            wait = wait.max(remaining(later(*last, *interval), now));
        }
        if let Some(until) = self.blocked_until {
            wait = wait.max(remaining(until, now));
        }
        if let Some(until) = self.warmups.get(route_key) {
            wait = wait.max(remaining(*until, now));
        }
        if let Some(until) = self.blocks.get(route_key) {
            wait = wait.max(remaining(*until, now));
        }
        if let Some(bucket) = self.bucket_map.get(route_key)
            && let Some(until) = self.blocks.get(bucket)
        {
            wait = wait.max(remaining(*until, now));
        }
        wait
    }

    fn prune(&mut self, now: Instant) {
        if self.blocked_until.is_some_and(|until| until <= now) {
            self.blocked_until = None;
        }
        self.blocks.retain(|_, until| *until > now);
        self.warmups.retain(|_, until| *until > now);
    }

    /// Mark the completion of an attempt. Called after every attempt,
    /// whatever its outcome.
    pub fn record_attempt(&mut self, op: Operation, now: Instant) {
        self.last_dispatch = Some(now);
        self.last_by_operation.insert(op, now);
        self.push_global(now);
    }

    /// Learn from a successful response.
    pub fn record_success(
        &mut self,
        op: Operation,
        route_key: &str,
        info: Option<&RateLimitInfo>,
        now: Instant,
    ) {
        if let Some(info) = info {
            self.observe_headers(route_key, info, false, now);
        }
        if !self.settings.warmup.is_zero()
            && self.settings.warmup_operations.contains(&op)
            && !self.bucket_map.contains_key(route_key)
        {
            debug!(route_key, warmup = ?self.settings.warmup, "route warmup");
            self.warmups
                .insert(route_key.to_string(), later(now, self.settings.warmup));
        }
    }

    /// Apply a throttle response. Every write waits at least `retry_after`
    /// from `now`; the affected bucket is blocked as well.
    pub fn record_throttle(
        &mut self,
        route_key: &str,
        retry_after: Duration,
        info: Option<&RateLimitInfo>,
        now: Instant,
    ) {
        let until = later(now, retry_after);
        self.blocked_until = Some(self.blocked_until.map_or(until, |current| current.max(until)));
        self.push_global(now);

        match info {
            Some(info) if info.bucket.is_some() || info.reset_after.is_some() || info.reset_at.is_some() => {
                self.observe_headers(route_key, info, true, now);
            }
            _ => {
                let key = self
                    .bucket_map
                    .get(route_key)
                    .cloned()
                    .unwrap_or_else(|| route_key.to_string());
                self.block(key, until, now);
            }
        }
    }

    fn observe_headers(&mut self, route_key: &str, info: &RateLimitInfo, force_block: bool, now: Instant) {
        let now_unix = unix_now();
        if let Some(bucket) = &info.bucket
            && self.bucket_map.get(route_key) != Some(bucket)
        {
            self.bucket_map.insert(route_key.to_string(), bucket.clone());
            self.warmups.remove(route_key);
            self.changes.push(LimiterChange::Mapping {
                route_key: route_key.to_string(),
                bucket_id: bucket.clone(),
            });
        }

        let reset_after = info.reset_after.or_else(|| {
            info.reset_at
                .and_then(|at| Duration::try_from_secs_f64((at - now_unix).max(0.0)).ok())
        });
        let exhausted = info.remaining.is_some_and(|r| r == 0);
        if let Some(reset_after) = reset_after
            && (force_block || exhausted)
        {
            let key = info.bucket.clone().unwrap_or_else(|| route_key.to_string());
            self.block(key, later(now, reset_after), now);
        }
    }

    fn block(&mut self, key: String, until: Instant, now: Instant) {
        let until = match self.blocks.get(&key) {
            Some(existing) if *existing > until => *existing,
            _ => until,
        };
        debug!(bucket = %key, wait = ?remaining(until, now), "bucket blocked");
        self.changes.push(LimiterChange::Bucket {
            key: key.clone(),
            blocked_until: to_unix(until, now, unix_now()),
        });
        self.blocks.insert(key, until);
    }

    fn push_global(&mut self, now: Instant) {
        let now_unix = unix_now();
        let snapshot = LimiterSnapshot {
            last_write_at: self.last_dispatch.map(|at| to_unix(at, now, now_unix)),
            blocked_until: self.blocked_until.map(|at| to_unix(at, now, now_unix)),
        };
        // Only the latest global snapshot matters.
        self.changes
            .retain(|change| !matches!(change, LimiterChange::Global(_)));
        self.changes.push(LimiterChange::Global(snapshot));
    }

    /// Drain pending persistence work.
    pub fn take_changes(&mut self) -> Vec<LimiterChange> {
        std::mem::take(&mut self.changes)
    }

    /// Seed state from a previous run.
    pub fn restore(
        &mut self,
        snapshot: LimiterSnapshot,
        blocks: Vec<BucketBlock>,
        mappings: Vec<(String, String)>,
        now: Instant,
        now_unix: f64,
    ) {
        if let Some(last) = snapshot.last_write_at {
            // A clock that moved backwards counts as "just now".
            self.last_dispatch = Some(from_unix(last, now, now_unix).map_or(now, |at| at.min(now)));
        }
        if let Some(until) = snapshot.blocked_until
            && let Some(at) = from_unix(until, now, now_unix)
            && at > now
        {
            self.blocked_until = Some(at);
        }
        for block in blocks {
            if let Some(at) = from_unix(block.blocked_until, now, now_unix)
                && at > now
            {
                self.blocks.insert(block.bucket_key, at);
            }
        }
        self.bucket_map.extend(mappings);
    }
}
