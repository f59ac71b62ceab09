// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Upstream chat-platform boundary.

use async_trait::async_trait;

use crate::error::ClanhallError;
use crate::route::ApiRequest;
use crate::traits::adapter::PluginAdapter;
use crate::types::PlatformReply;

/// Executes a single REST call against the chat platform.
///
/// Implementations report throttling as [`ClanhallError::RateLimited`] and map
/// other non-success responses onto the matching error variant. They never
/// retry on their own; retry policy belongs to the dispatch worker.
#[async_trait]
pub trait PlatformClient: PluginAdapter {
    async fn request(&self, request: ApiRequest) -> Result<PlatformReply, ClanhallError>;
}
