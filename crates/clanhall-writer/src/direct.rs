// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Unqueued writes: straight to Discord, no pacing, no durability.

use std::sync::Arc;

use async_trait::async_trait;
use clanhall_core::{ClanhallError, PlatformClient};
use serde_json::Value;
use tracing::debug;

use crate::dispatch;
use crate::facade::DiscordWriter;
use crate::request::PreparedWrite;
use crate::sanitize::TextLimits;

#[derive(Clone)]
pub struct DirectWriter {
    platform: Arc<dyn PlatformClient>,
    limits: TextLimits,
}

impl DirectWriter {
    pub fn new(platform: Arc<dyn PlatformClient>, limits: TextLimits) -> Self {
        Self { platform, limits }
    }
}

#[async_trait]
impl DiscordWriter for DirectWriter {
    async fn submit(&self, write: PreparedWrite) -> Result<Value, ClanhallError> {
        debug!(operation = %write.operation, "direct write");
        dispatch::perform(&*self.platform, write.operation, &write.payload, self.limits)
            .await
            .map(|reply| reply.body)
    }
}
