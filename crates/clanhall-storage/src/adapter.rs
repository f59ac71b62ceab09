// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the `WriteStore` trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use clanhall_config::model::StorageConfig;
use clanhall_core::types::{BucketBlock, LimiterSnapshot, QueueStats};
use clanhall_core::{
    AdapterType, ClanhallError, HealthStatus, Operation, PluginAdapter, WritePriority, WriteRecord,
    WriteStore,
};

use crate::database::{self, Database, map_tr_err};
use crate::queries::{rate_limits, write_queue};

/// SQLite-backed durable queue store.
///
/// The database opens on [`SqliteWriteStore::initialize`]; every other call
/// fails with a storage error until then.
pub struct SqliteWriteStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteWriteStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// `new` followed by `initialize`.
    pub async fn open(config: StorageConfig) -> Result<Self, ClanhallError> {
        let store = Self::new(config);
        store.initialize().await?;
        Ok(store)
    }

    /// Open the database and run migrations.
    pub async fn initialize(&self) -> Result<(), ClanhallError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| ClanhallError::storage("write store already initialized"))?;
        debug!(path = %self.config.database_path, "SQLite write store initialized");
        Ok(())
    }

    /// The underlying database, for operator queries.
    pub fn database(&self) -> Result<&Database, ClanhallError> {
        self.db
            .get()
            .ok_or_else(|| ClanhallError::storage("write store not initialized -- call initialize() first"))
    }

    /// Most recent failed records, newest first.
    pub async fn recent_failed(&self, limit: usize) -> Result<Vec<WriteRecord>, ClanhallError> {
        write_queue::recent_failed(self.database()?, limit).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<WriteRecord>, ClanhallError> {
        write_queue::get(self.database()?, id).await
    }
}

#[async_trait]
impl PluginAdapter for SqliteWriteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ClanhallError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ClanhallError> {
        if let Some(db) = self.db.get() {
            database::checkpoint(db.connection()).await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl WriteStore for SqliteWriteStore {
    async fn enqueue(
        &self,
        operation: Operation,
        payload: &str,
        priority: WritePriority,
    ) -> Result<i64, ClanhallError> {
        write_queue::enqueue(self.database()?, operation.as_ref(), payload, priority.as_i64()).await
    }

    async fn fetch_pending(&self, after_id: i64, limit: usize) -> Result<Vec<WriteRecord>, ClanhallError> {
        write_queue::fetch_pending(self.database()?, after_id, limit).await
    }

    async fn mark_done(&self, id: i64) -> Result<(), ClanhallError> {
        write_queue::mark_done(self.database()?, id).await
    }

    async fn mark_failed(&self, id: i64, reason: &str) -> Result<(), ClanhallError> {
        write_queue::mark_failed(self.database()?, id, reason).await
    }

    async fn mark_retry(&self, id: i64, attempts: u32) -> Result<(), ClanhallError> {
        write_queue::mark_retry(self.database()?, id, attempts).await
    }

    async fn clear_pending(&self) -> Result<u64, ClanhallError> {
        write_queue::clear_pending(self.database()?).await
    }

    async fn stats(&self) -> Result<QueueStats, ClanhallError> {
        write_queue::stats(self.database()?).await
    }

    async fn load_limiter_state(&self) -> Result<LimiterSnapshot, ClanhallError> {
        rate_limits::load_limiter_state(self.database()?).await
    }

    async fn save_limiter_state(&self, snapshot: LimiterSnapshot) -> Result<(), ClanhallError> {
        rate_limits::save_limiter_state(self.database()?, snapshot).await
    }

    async fn load_buckets(&self, now: f64) -> Result<Vec<BucketBlock>, ClanhallError> {
        rate_limits::load_buckets(self.database()?, now).await
    }

    async fn save_bucket(&self, bucket_key: &str, blocked_until: f64) -> Result<(), ClanhallError> {
        rate_limits::save_bucket(self.database()?, bucket_key, blocked_until).await
    }

    async fn load_bucket_map(&self) -> Result<Vec<(String, String)>, ClanhallError> {
        rate_limits::load_bucket_map(self.database()?).await
    }

    async fn save_bucket_mapping(&self, route_key: &str, bucket_id: &str) -> Result<(), ClanhallError> {
        rate_limits::save_bucket_mapping(self.database()?, route_key, bucket_id).await
    }
}
