// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The writer handed to callers: queued through the coordinator when it is
//! running, otherwise per the configured fallback.

use std::sync::Arc;

use async_trait::async_trait;
use clanhall_config::FallbackMode;
use clanhall_core::ClanhallError;
use serde_json::Value;
use tracing::warn;

use crate::coordinator::{Rejected, WriteCoordinator};
use crate::direct::DirectWriter;
use crate::facade::DiscordWriter;
use crate::request::PreparedWrite;

pub struct FallbackWriter {
    coordinator: Option<Arc<WriteCoordinator>>,
    direct: DirectWriter,
    mode: FallbackMode,
}

impl FallbackWriter {
    pub fn new(coordinator: Arc<WriteCoordinator>, direct: DirectWriter, mode: FallbackMode) -> Self {
        Self {
            coordinator: Some(coordinator),
            direct,
            mode,
        }
    }

    /// No coordinator could be started; every write takes the fallback path.
    pub fn without_coordinator(direct: DirectWriter, mode: FallbackMode) -> Self {
        Self {
            coordinator: None,
            direct,
            mode,
        }
    }

    pub fn coordinator(&self) -> Option<&Arc<WriteCoordinator>> {
        self.coordinator.as_ref()
    }

    /// Only writes the coordinator refused get here, so nothing runs twice.
    async fn fall_back(&self, rejected: Rejected) -> Result<Value, ClanhallError> {
        let Rejected { error, write } = rejected;
        match self.mode {
            FallbackMode::Direct => {
                warn!(operation = %write.operation, reason = %error, "write coordinator unavailable; writing directly");
                self.direct.submit(write).await
            }
            FallbackMode::Error => Err(error),
        }
    }
}

#[async_trait]
impl DiscordWriter for FallbackWriter {
    async fn submit(&self, write: PreparedWrite) -> Result<Value, ClanhallError> {
        let Some(coordinator) = &self.coordinator else {
            return self
                .fall_back(Rejected {
                    error: ClanhallError::WriterUnavailable("write coordinator not started".into()),
                    write,
                })
                .await;
        };
        match coordinator.enqueue(write).await {
            Ok(pending) => pending.wait().await,
            Err(rejected) => self.fall_back(rejected).await,
        }
    }
}
