// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The write coordinator: accepts writes, makes them durable, hands them to
//! the dispatch worker and relays the outcome back to the caller.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use clanhall_config::WriterConfig;
use clanhall_core::{
    AdapterType, ClanhallError, HealthStatus, Operation, PlatformClient, PluginAdapter,
    WritePriority, WriteRecord, WriteStore,
};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::codec;
use crate::facade::DiscordWriter;
use crate::payload::Payload;
use crate::rate_limit::{RateLimitSettings, RateLimiter, unix_now};
use crate::request::{PreparedWrite, WriteRequest, WriteResult};
use crate::sanitize::TextLimits;
use crate::worker::DispatchWorker;

/// Runtime settings, usually derived from `[writer]`.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorSettings {
    pub rate: RateLimitSettings,
    pub text: TextLimits,
    pub restore_limit: usize,
    pub urgent_moderation: bool,
    pub persist_limiter_state: bool,
}

impl CoordinatorSettings {
    pub fn from_config(config: &WriterConfig) -> Self {
        Self {
            rate: RateLimitSettings::from_config(config),
            text: TextLimits::from_config(config),
            restore_limit: config.restore_limit,
            urgent_moderation: config.urgent_moderation,
            persist_limiter_state: config.persist_limiter_state,
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self::from_config(&WriterConfig::default())
    }
}

/// A write the coordinator could not accept, handed back to the caller.
#[derive(Debug)]
pub struct Rejected {
    pub error: ClanhallError,
    pub write: PreparedWrite,
}

/// An accepted write awaiting its outcome.
#[derive(Debug)]
pub struct PendingWrite {
    rx: oneshot::Receiver<WriteResult>,
    durable: bool,
}

impl PendingWrite {
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    pub async fn wait(self) -> WriteResult {
        let durable = self.durable;
        self.rx
            .await
            .unwrap_or(Err(ClanhallError::Abandoned { durable }))
    }
}

pub struct WriteCoordinator {
    tx: mpsc::UnboundedSender<WriteRequest>,
    store: Option<Arc<dyn WriteStore>>,
    urgent_moderation: bool,
    restored: usize,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteCoordinator {
    /// Restore limiter state and pending records, then spawn the worker.
    ///
    /// Without a store the coordinator still paces writes, it just cannot
    /// survive a restart.
    pub async fn start(
        platform: Arc<dyn PlatformClient>,
        store: Option<Arc<dyn WriteStore>>,
        settings: CoordinatorSettings,
        cancel: CancellationToken,
    ) -> Result<Self, ClanhallError> {
        let mut limiter = RateLimiter::new(settings.rate.clone());
        if settings.persist_limiter_state
            && let Some(store) = &store
        {
            restore_limiter(store.as_ref(), &mut limiter).await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut worker = DispatchWorker::new(
            platform,
            store.clone(),
            limiter,
            settings.text,
            rx,
            cancel.clone(),
        )
        .persist_limiter_state(settings.persist_limiter_state);

        let mut restored = 0;
        if let Some(store) = &store {
            for request in recover_pending(store.as_ref(), settings.restore_limit).await? {
                worker.preload(request);
                restored += 1;
            }
        }
        if restored > 0 {
            info!(restored, "resuming durable writes from the previous run");
        }

        let handle = tokio::spawn(worker.run());
        Ok(Self {
            tx,
            store,
            urgent_moderation: settings.urgent_moderation,
            restored,
            cancel,
            worker: Mutex::new(Some(handle)),
        })
    }

    /// Writes replayed from the store at startup.
    pub fn restored(&self) -> usize {
        self.restored
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed() && !self.cancel.is_cancelled()
    }

    /// Queue a write and wait for its outcome.
    pub async fn submit(&self, write: PreparedWrite) -> WriteResult {
        match self.enqueue(write).await {
            Ok(pending) => pending.wait().await,
            Err(rejected) => Err(rejected.error),
        }
    }

    /// Queue a write. On refusal the write is handed back untouched and was
    /// never recorded.
    pub async fn enqueue(&self, mut write: PreparedWrite) -> Result<PendingWrite, Rejected> {
        if !self.is_running() {
            return Err(Rejected {
                error: ClanhallError::WriterUnavailable("dispatch worker is not running".into()),
                write,
            });
        }
        if self.urgent_moderation && write.operation.is_moderation() {
            write.priority = WritePriority::Urgent;
        }

        let durable_id = if write.persist {
            self.persist(&write).await
        } else {
            None
        };

        let (result_tx, rx) = oneshot::channel();
        let request = WriteRequest::new(
            write.operation,
            write.payload,
            write.priority,
            durable_id,
            Some(result_tx),
        );
        if let Err(mpsc::error::SendError(request)) = self.tx.send(request) {
            // Never dispatched: retire the record so a restart does not replay it.
            if let Some(id) = request.durable_id
                && let Some(store) = &self.store
                && let Err(e) = store.mark_failed(id, "writer stopped before queueing").await
            {
                warn!(id, error = %e, "failed to retire unqueued record");
            }
            return Err(Rejected {
                error: ClanhallError::WriterUnavailable("dispatch worker stopped".into()),
                write: request.into_prepared(),
            });
        }
        Ok(PendingWrite {
            rx,
            durable: durable_id.is_some(),
        })
    }

    /// Durable record for a write, or `None` when it cannot or need not be
    /// stored. Storage trouble degrades to in-memory delivery.
    async fn persist(&self, write: &PreparedWrite) -> Option<i64> {
        let store = self.store.as_ref()?;
        let text = match codec::encode_to_string(&write.payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(operation = %write.operation, error = %e, "payload has no persisted form; delivering without durability");
                return None;
            }
        };
        match store
            .enqueue(write.operation, &text, write.priority)
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(operation = %write.operation, error = %e, "durable enqueue failed; delivering without durability");
                None
            }
        }
    }

    /// Stop the worker and wait for the write in flight, if any, to finish.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle
            && let Err(e) = handle.await
        {
            error!(error = %e, "dispatch worker panicked");
        }
    }
}

async fn restore_limiter(store: &dyn WriteStore, limiter: &mut RateLimiter) {
    let now_unix = unix_now();
    let snapshot = store.load_limiter_state().await;
    let buckets = store.load_buckets(now_unix).await;
    let mappings = store.load_bucket_map().await;
    match (snapshot, buckets, mappings) {
        (Ok(snapshot), Ok(buckets), Ok(mappings)) => {
            limiter.restore(snapshot, buckets, mappings, Instant::now(), now_unix);
        }
        (snapshot, buckets, mappings) => {
            let e = [snapshot.err(), buckets.err(), mappings.err()]
                .into_iter()
                .flatten()
                .next();
            if let Some(e) = e {
                warn!(error = %e, "could not restore rate-limit state; starting fresh");
            }
        }
    }
}

/// Every pending record as a request, in id order, read `page_size` rows at
/// a time. Records that cannot be decoded are marked failed so they stop
/// blocking recovery.
async fn recover_pending(store: &dyn WriteStore, page_size: usize) -> Result<Vec<WriteRequest>, ClanhallError> {
    let page_size = page_size.max(1);
    let mut requests = Vec::new();
    let mut after_id = 0;
    loop {
        let records = store.fetch_pending(after_id, page_size).await?;
        let exhausted = records.len() < page_size;
        if let Some(last) = records.last() {
            after_id = last.id;
        }
        recover_page(store, records, &mut requests).await;
        if exhausted {
            return Ok(requests);
        }
    }
}

async fn recover_page(store: &dyn WriteStore, records: Vec<WriteRecord>, requests: &mut Vec<WriteRequest>) {
    for record in records {
        match decode_record(&record) {
            Ok((op, payload)) => {
                let mut request = WriteRequest::new(
                    op,
                    payload,
                    WritePriority::from_i64(record.priority),
                    Some(record.id),
                    None,
                );
                request.attempts = record.attempts;
                requests.push(request);
            }
            Err(e) => {
                error!(id = record.id, operation = %record.operation, error = %e, "skipping unreadable write record");
                if let Err(mark_err) = store
                    .mark_failed(record.id, &format!("unreadable record: {e}"))
                    .await
                {
                    warn!(id = record.id, error = %mark_err, "failed to retire unreadable record");
                }
            }
        }
    }
}

fn decode_record(record: &WriteRecord) -> Result<(Operation, Payload), ClanhallError> {
    let op = Operation::from_str(&record.operation)
        .map_err(|_| ClanhallError::InvalidArgument(format!("unknown operation `{}`", record.operation)))?;
    let payload = codec::decode(&record.payload)?;
    Ok((op, payload))
}

#[async_trait]
impl DiscordWriter for WriteCoordinator {
    async fn submit(&self, write: PreparedWrite) -> WriteResult {
        WriteCoordinator::submit(self, write).await
    }
}

#[async_trait]
impl PluginAdapter for WriteCoordinator {
    fn name(&self) -> &str {
        "coordinator"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Writer
    }

    async fn health_check(&self) -> Result<HealthStatus, ClanhallError> {
        if !self.is_running() {
            return Ok(HealthStatus::Unhealthy("dispatch worker stopped".into()));
        }
        match &self.store {
            Some(store) => {
                store.stats().await?;
                Ok(HealthStatus::Healthy)
            }
            None => Ok(HealthStatus::Degraded("no durable store".into())),
        }
    }

    async fn shutdown(&self) -> Result<(), ClanhallError> {
        WriteCoordinator::shutdown(self).await;
        Ok(())
    }
}
