// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Caller-side descriptions of outgoing messages and write targets.

use chrono::{DateTime, Utc};
use clanhall_core::{Attachment, Embed, Snowflake};
use serde_json::Value;

use crate::payload::{Payload, PayloadValue};
use crate::sanitize::IS_COMPONENTS_V2;

/// Message flag that hides an interaction reply from everyone but its invoker.
pub const EPHEMERAL: u64 = 1 << 6;

/// Where a new message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTarget {
    Channel(Snowflake),
    /// A direct message; the DM channel is opened at dispatch time.
    User(Snowflake),
}

/// The credentials needed to answer an interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub id: Snowflake,
    pub application_id: Snowflake,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRef {
    pub id: Snowflake,
    pub token: String,
}

/// Deferred acknowledgement flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferKind {
    /// "Thinking..." placeholder for a later followup.
    Message { ephemeral: bool },
    /// Acknowledge a component interaction without changing its message.
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionTarget {
    Role(Snowflake),
    Member(Snowflake),
}

impl PermissionTarget {
    pub fn id(self) -> Snowflake {
        match self {
            PermissionTarget::Role(id) | PermissionTarget::Member(id) => id,
        }
    }

    pub fn kind(self) -> i64 {
        match self {
            PermissionTarget::Role(_) => 0,
            PermissionTarget::Member(_) => 1,
        }
    }
}

/// Communication timeout for a member.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeoutUntil {
    At(DateTime<Utc>),
    /// Relative to the moment the write is dispatched.
    For(std::time::Duration),
    Clear,
}

/// Body of a message to send or edit.
///
/// For edits, fields left as `None` are not touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutgoingMessage {
    pub content: Option<String>,
    pub embeds: Option<Vec<Embed>>,
    pub components: Option<Value>,
    pub allowed_mentions: Option<Value>,
    pub files: Vec<Attachment>,
    pub flags: u64,
    pub tts: bool,
    /// Only honored for interaction replies.
    pub ephemeral: bool,
    pub reply_to: Option<Snowflake>,
}

impl OutgoingMessage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(content: impl Into<String>) -> Self {
        Self::new().content(content)
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.get_or_insert_with(Vec::new).push(embed);
        self
    }

    pub fn clear_embeds(mut self) -> Self {
        self.embeds = Some(Vec::new());
        self
    }

    pub fn components(mut self, components: Value) -> Self {
        self.components = Some(components);
        self
    }

    /// Components-v2 layout. Layout messages cannot carry embeds.
    pub fn layout(mut self, components: Value) -> Self {
        self.components = Some(components);
        self.flags |= IS_COMPONENTS_V2;
        self
    }

    pub fn allowed_mentions(mut self, allowed_mentions: Value) -> Self {
        self.allowed_mentions = Some(allowed_mentions);
        self
    }

    pub fn file(mut self, file: Attachment) -> Self {
        self.files.push(file);
        self
    }

    pub fn flags(mut self, flags: u64) -> Self {
        self.flags |= flags;
        self
    }

    pub fn tts(mut self, tts: bool) -> Self {
        self.tts = tts;
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn reply_to(mut self, message_id: Snowflake) -> Self {
        self.reply_to = Some(message_id);
        self
    }

    /// Uploads and mention overrides are delivered without durability.
    pub fn is_durable(&self) -> bool {
        self.files.is_empty() && self.allowed_mentions.is_none()
    }

    /// Split into a payload body and uploads.
    pub(crate) fn into_parts(self, allow_ephemeral: bool) -> (Payload, Vec<Attachment>) {
        let mut body = Payload::new();
        if let Some(content) = self.content {
            body.insert("content".into(), content.into());
        }
        if let Some(embeds) = self.embeds {
            body.insert("embeds".into(), embeds.into());
        }
        if let Some(components) = self.components {
            body.insert("components".into(), components.into());
        }
        if let Some(allowed_mentions) = self.allowed_mentions {
            body.insert("allowed_mentions".into(), allowed_mentions.into());
        }
        let mut flags = self.flags;
        if allow_ephemeral && self.ephemeral {
            flags |= EPHEMERAL;
        }
        if flags != 0 {
            body.insert("flags".into(), PayloadValue::Int(flags as i64));
        }
        if self.tts {
            body.insert("tts".into(), true.into());
        }
        if let Some(reply_to) = self.reply_to {
            let mut reference = Payload::new();
            reference.insert("message_id".into(), reply_to.into());
            reference.insert("fail_if_not_exists".into(), false.into());
            body.insert("message_reference".into(), reference.into());
        }
        (body, self.files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::map_to_wire;
    use serde_json::json;

    #[test]
    fn parts_render_discord_body() {
        let msg = OutgoingMessage::text("gg")
            .embed(Embed::new().title("Results"))
            .reply_to(Snowflake(77))
            .ephemeral(true);
        let (body, files) = msg.clone().into_parts(false);
        assert!(files.is_empty());
        assert_eq!(
            map_to_wire(&body).unwrap(),
            json!({
                "content": "gg",
                "embeds": [{"title": "Results"}],
                "message_reference": {"message_id": "77", "fail_if_not_exists": false}
            })
        );

        let (body, _) = msg.into_parts(true);
        assert_eq!(body["flags"], PayloadValue::Int(64));
    }

    #[test]
    fn untouched_fields_are_omitted() {
        let (body, _) = OutgoingMessage::new().into_parts(true);
        assert!(body.is_empty());
        let (body, _) = OutgoingMessage::new().clear_embeds().into_parts(true);
        assert_eq!(body["embeds"], PayloadValue::List(Vec::new()));
    }

    #[test]
    fn durability() {
        assert!(OutgoingMessage::text("x").is_durable());
        assert!(!OutgoingMessage::text("x").file(Attachment::new("a", vec![1])).is_durable());
        assert!(!OutgoingMessage::text("x").allowed_mentions(json!({"parse": []})).is_durable());
    }

    #[test]
    fn layout_sets_components_v2_flag() {
        let (body, _) = OutgoingMessage::new()
            .layout(json!([{"type": 10, "content": "hi"}]))
            .into_parts(false);
        assert_eq!(body["flags"], PayloadValue::Int(IS_COMPONENTS_V2 as i64));
    }

    #[test]
    fn permission_target_kinds() {
        assert_eq!(PermissionTarget::Role(Snowflake(1)).kind(), 0);
        assert_eq!(PermissionTarget::Member(Snowflake(2)).id(), Snowflake(2));
    }
}
