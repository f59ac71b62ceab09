// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the writer, the storage backend and the REST client.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoStaticStr};

/// A Discord object identifier.
///
/// Serialized as a decimal string, as Discord does, and accepted from either a
/// string or a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Snowflake(pub u64);

impl fmt::Display for Snowflake {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Snowflake {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Snowflake)
    }
}

impl From<u64> for Snowflake {
    fn from(value: u64) -> Self {
        Snowflake(value)
    }
}

impl Serialize for Snowflake {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Snowflake {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Num(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Num(n) => Ok(Snowflake(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Every outbound write the coordinator knows how to queue.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    IntoStaticStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    SendMessage,
    EditMessage,
    DeleteMessage,
    AddReaction,
    RemoveReaction,
    ClearReactions,
    PinMessage,
    UnpinMessage,
    DeleteMessages,
    CreateThread,
    EditChannel,
    DeleteChannel,
    SetPermissions,
    CreateTextChannel,
    CreateVoiceChannel,
    CreateCategory,
    CreateForumChannel,
    CreateStageChannel,
    CreateRole,
    AddRoles,
    RemoveRoles,
    BanMember,
    KickMember,
    TimeoutMember,
    EditMember,
    InteractionResponse,
    InteractionFollowup,
    InteractionEdit,
    InteractionEditOriginal,
    InteractionDefer,
    InteractionModal,
    WebhookSend,
    WebhookEdit,
    WebhookDelete,
    /// Any other write route, given as method and path.
    HttpRequest,
}

impl Operation {
    /// Operations that answer an interaction through its short-lived token.
    pub fn is_interaction(self) -> bool {
        matches!(
            self,
            Operation::InteractionResponse
                | Operation::InteractionFollowup
                | Operation::InteractionEdit
                | Operation::InteractionEditOriginal
                | Operation::InteractionDefer
                | Operation::InteractionModal
        )
    }

    pub fn is_webhook(self) -> bool {
        matches!(
            self,
            Operation::WebhookSend | Operation::WebhookEdit | Operation::WebhookDelete
        )
    }

    /// Moderation actions eligible for the urgent lane.
    pub fn is_moderation(self) -> bool {
        matches!(
            self,
            Operation::BanMember | Operation::KickMember | Operation::TimeoutMember
        )
    }

    /// Interaction and webhook writes carry credentials in the payload and are
    /// never written to disk.
    pub fn carries_token(self) -> bool {
        self.is_interaction() || self.is_webhook()
    }
}

/// Queue lane. Lower values dispatch first; FIFO within a lane.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WritePriority {
    Urgent,
    Normal,
}

impl WritePriority {
    pub fn as_i64(self) -> i64 {
        match self {
            WritePriority::Urgent => 0,
            WritePriority::Normal => 10,
        }
    }

    pub fn from_i64(value: i64) -> Self {
        if value <= 0 {
            WritePriority::Urgent
        } else {
            WritePriority::Normal
        }
    }
}

/// Lifecycle of a durable write record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum WriteStatus {
    Pending,
    Done,
    Failed,
}

/// A persisted outbound write, as stored in the durable queue.
///
/// `operation` is kept as text so that a record written by a newer build, or a
/// corrupted row, can still be read and skipped during recovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRecord {
    pub id: i64,
    pub operation: String,
    pub payload: String,
    pub status: WriteStatus,
    pub priority: i64,
    pub attempts: u32,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

/// Row counts per status in the durable queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub done: u64,
    pub failed: u64,
}

/// Persisted global limiter state, as unix timestamps in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LimiterSnapshot {
    pub last_write_at: Option<f64>,
    pub blocked_until: Option<f64>,
}

/// A per-route block learned from rate-limit headers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketBlock {
    pub bucket_key: String,
    /// Unix timestamp in seconds.
    pub blocked_until: f64,
}

/// Longest wait honoured from a single rate-limit signal or interval.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Rate-limit headers reported with a platform response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitInfo {
    /// Opaque server bucket id (`X-RateLimit-Bucket`).
    pub bucket: Option<String>,
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// `X-RateLimit-Reset-After`.
    pub reset_after: Option<Duration>,
    /// `X-RateLimit-Reset`, unix seconds.
    pub reset_at: Option<f64>,
}

/// Result of a successful platform call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformReply {
    /// Response JSON, `Null` for empty (204) responses.
    pub body: serde_json::Value,
    pub rate_limit: Option<RateLimitInfo>,
}

impl PlatformReply {
    pub fn new(body: serde_json::Value) -> Self {
        Self {
            body,
            rate_limit: None,
        }
    }
}

/// A file uploaded alongside a message. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub description: Option<String>,
}

impl Attachment {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
            description: None,
        }
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("filename", &self.filename)
            .field("len", &self.bytes.len())
            .field("description", &self.description)
            .finish()
    }
}

/// Rich embed, serialized in Discord's wire shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<EmbedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedMedia>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedMedia {
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

/// The subset of a Discord message object callers typically need back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub channel_id: Snowflake,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Platform,
    Storage,
    Writer,
}
