// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serialized, rate-limited Discord writes.
//!
//! Every outbound write (messages, reactions, moderation, interaction replies)
//! goes through one [`WriteCoordinator`]. It records durable writes before
//! dispatch, paces them with a [`RateLimiter`], retries throttled ones, and
//! resumes unfinished work after a restart. Callers use the [`DiscordWriter`]
//! facade and get the same results and errors a direct REST call would give.

pub mod bucket;
pub mod codec;
pub mod coordinator;
pub mod direct;
pub mod dispatch;
pub mod facade;
pub mod fallback;
pub mod message;
pub mod payload;
pub mod rate_limit;
pub mod request;
pub mod sanitize;
pub mod worker;

pub use coordinator::{CoordinatorSettings, PendingWrite, Rejected, WriteCoordinator};
pub use direct::DirectWriter;
pub use facade::DiscordWriter;
pub use fallback::FallbackWriter;
pub use message::{
    DeferKind, InteractionRef, MessageTarget, OutgoingMessage, PermissionTarget, TimeoutUntil,
    WebhookRef,
};
pub use payload::{Payload, PayloadValue};
pub use rate_limit::{RateLimitSettings, RateLimiter};
pub use request::{PreparedWrite, WriteRequest, WriteResult};
pub use sanitize::TextLimits;
