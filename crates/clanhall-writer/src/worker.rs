// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The single dispatch worker.
//!
//! One task owns the pending set and performs every write, one at a time.
//! Writes are taken in (lane, arrival) order, paced by the [`RateLimiter`],
//! and a throttled write goes back to the tail of its lane.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

use clanhall_core::{ClanhallError, PlatformClient, RateLimitInfo, WritePriority, WriteStore};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::dispatch;
use crate::rate_limit::{LimiterChange, RateLimiter};
use crate::request::WriteRequest;
use crate::sanitize::TextLimits;

struct Queued {
    priority: WritePriority,
    seq: u64,
    request: WriteRequest,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reversed so the max-heap pops the lowest (lane, seq) first.
impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

pub struct DispatchWorker {
    platform: Arc<dyn PlatformClient>,
    store: Option<Arc<dyn WriteStore>>,
    limiter: RateLimiter,
    limits: TextLimits,
    persist_limiter_state: bool,
    rx: mpsc::UnboundedReceiver<WriteRequest>,
    pending: BinaryHeap<Queued>,
    next_seq: u64,
    cancel: CancellationToken,
}

impl DispatchWorker {
    pub fn new(
        platform: Arc<dyn PlatformClient>,
        store: Option<Arc<dyn WriteStore>>,
        limiter: RateLimiter,
        limits: TextLimits,
        rx: mpsc::UnboundedReceiver<WriteRequest>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            platform,
            store,
            limiter,
            limits,
            persist_limiter_state: true,
            rx,
            pending: BinaryHeap::new(),
            next_seq: 0,
            cancel,
        }
    }

    pub fn persist_limiter_state(mut self, enabled: bool) -> Self {
        self.persist_limiter_state = enabled;
        self
    }

    /// Queue a request ahead of any channel traffic. Used for recovery.
    pub fn preload(&mut self, request: WriteRequest) {
        self.push(request);
    }

    fn push(&mut self, request: WriteRequest) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.push(Queued {
            priority: request.priority,
            seq,
            request,
        });
    }

    /// Re-queue at the original position, after a wait was cut short.
    fn restore(&mut self, queued: Queued) {
        self.pending.push(queued);
    }

    fn drain_channel(&mut self) {
        while let Ok(request) = self.rx.try_recv() {
            self.push(request);
        }
    }

    /// Run until cancelled, or until every sender is gone and nothing is pending.
    pub async fn run(mut self) {
        info!(pending = self.pending.len(), "dispatch worker started");
        loop {
            self.drain_channel();

            let Some(next) = self.pending.pop() else {
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    received = self.rx.recv() => match received {
                        Some(request) => self.push(request),
                        None => break,
                    },
                }
                continue;
            };

            let wait = self.limiter.wait_time(
                next.request.operation,
                next.request.route_key(),
                Instant::now(),
            );
            if !wait.is_zero() {
                debug!(operation = %next.request.operation, ?wait, "pacing write");
                self.restore(next);
                tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                // Something more urgent may have arrived while waiting.
                continue;
            }

            self.dispatch(next.request).await;
            self.flush_limiter_changes().await;
        }
        self.shutdown();
    }

    async fn dispatch(&mut self, mut request: WriteRequest) {
        let op = request.operation;
        let result = dispatch::perform(&*self.platform, op, &request.payload, self.limits).await;
        let now = Instant::now();
        self.limiter.record_attempt(op, now);

        match result {
            Ok(reply) => {
                self.limiter
                    .record_success(op, request.route_key(), reply.rate_limit.as_ref(), now);
                if let Some(id) = request.durable_id
                    && let Some(store) = &self.store
                    && let Err(e) = store.mark_done(id).await
                {
                    warn!(id, error = %e, "failed to mark write done");
                }
                debug!(operation = %op, attempts = request.attempts, "write delivered");
                request.resolve(Ok(reply.body));
            }
            Err(ClanhallError::RateLimited {
                retry_after,
                global,
                bucket,
            }) => {
                let delay = retry_after.unwrap_or(self.limiter.settings().min_interval);
                let info = bucket.map(|bucket| RateLimitInfo {
                    bucket: Some(bucket),
                    reset_after: Some(delay),
                    ..RateLimitInfo::default()
                });
                self.limiter
                    .record_throttle(request.route_key(), delay, info.as_ref(), now);
                request.attempts += 1;
                warn!(
                    operation = %op,
                    route = request.route_key(),
                    ?delay,
                    global,
                    attempts = request.attempts,
                    "write throttled, requeued"
                );
                if let Some(id) = request.durable_id
                    && let Some(store) = &self.store
                    && let Err(e) = store.mark_retry(id, request.attempts).await
                {
                    warn!(id, error = %e, "failed to record retry");
                }
                self.push(request);
            }
            Err(e) => {
                error!(operation = %op, error = %e, "write failed");
                if let Some(id) = request.durable_id
                    && let Some(store) = &self.store
                    && let Err(store_err) = store.mark_failed(id, &e.to_string()).await
                {
                    warn!(id, error = %store_err, "failed to mark write failed");
                }
                request.resolve(Err(e));
            }
        }
    }

    async fn flush_limiter_changes(&mut self) {
        let changes = self.limiter.take_changes();
        if !self.persist_limiter_state {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        for change in changes {
            let result = match &change {
                LimiterChange::Global(snapshot) => store.save_limiter_state(*snapshot).await,
                LimiterChange::Bucket { key, blocked_until } => {
                    store.save_bucket(key, *blocked_until).await
                }
                LimiterChange::Mapping {
                    route_key,
                    bucket_id,
                } => store.save_bucket_mapping(route_key, bucket_id).await,
            };
            if let Err(e) = result {
                warn!(error = %e, ?change, "failed to persist rate-limit state");
            }
        }
    }

    /// Abandon whatever is still pending. Durable writes stay pending in the
    /// store and resume on the next start.
    fn shutdown(&mut self) {
        self.rx.close();
        self.drain_channel();
        let mut durable = 0usize;
        let abandoned = self.pending.len();
        for mut queued in self.pending.drain() {
            let is_durable = queued.request.durable_id.is_some();
            if is_durable {
                durable += 1;
            }
            queued
                .request
                .resolve(Err(ClanhallError::Abandoned { durable: is_durable }));
        }
        info!(abandoned, durable, "dispatch worker stopped");
    }
}
