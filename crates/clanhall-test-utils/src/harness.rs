// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for restart and recovery tests.
//!
//! `TestHarness` owns a temp directory holding a SQLite queue database and a
//! shared [`MockPlatform`]. `reopen_store()` opens a fresh store on the same
//! file, which is how tests simulate a process restart.

use std::path::PathBuf;
use std::sync::Arc;

use clanhall_config::model::StorageConfig;
use clanhall_core::ClanhallError;
use clanhall_storage::SqliteWriteStore;

use crate::mock_platform::MockPlatform;

pub struct TestHarness {
    pub platform: Arc<MockPlatform>,
    pub store: Arc<SqliteWriteStore>,
    db_path: PathBuf,
    // Held so the directory outlives the stores.
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub async fn new() -> Result<Self, ClanhallError> {
        Self::with_platform(MockPlatform::new()).await
    }

    pub async fn with_platform(platform: MockPlatform) -> Result<Self, ClanhallError> {
        let temp_dir = tempfile::TempDir::new().map_err(ClanhallError::storage)?;
        let db_path = temp_dir.path().join("queue.db");
        let store = open_store(&db_path).await?;
        Ok(Self {
            platform: Arc::new(platform),
            store: Arc::new(store),
            db_path,
            _temp_dir: temp_dir,
        })
    }

    /// A second store on the same database file.
    pub async fn reopen_store(&self) -> Result<Arc<SqliteWriteStore>, ClanhallError> {
        open_store(&self.db_path).await.map(Arc::new)
    }

    pub fn db_path(&self) -> &std::path::Path {
        &self.db_path
    }
}

async fn open_store(path: &std::path::Path) -> Result<SqliteWriteStore, ClanhallError> {
    let config = StorageConfig {
        database_path: path.to_string_lossy().to_string(),
        wal_mode: true,
    };
    SqliteWriteStore::open(config).await
}
