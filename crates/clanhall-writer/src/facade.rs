// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The caller-facing write API.
//!
//! [`DiscordWriter`] has one required method, [`DiscordWriter::submit`]; every
//! operation is a provided method that validates its arguments, builds the
//! payload and submits it. Implementations decide how the write travels:
//! through the coordinator, straight to Discord, or one then the other.

use async_trait::async_trait;
use clanhall_core::{ClanhallError, Message, Operation, Snowflake};
use serde_json::Value;

use crate::message::{
    DeferKind, InteractionRef, MessageTarget, OutgoingMessage, PermissionTarget, TimeoutUntil,
    WebhookRef,
};
use crate::payload::{Payload, PayloadValue, payload};
use crate::request::PreparedWrite;

/// Bulk deletes accept at most this many messages per call.
pub const MAX_DELETE_BATCH: usize = 100;

const CHANNEL_TEXT: i64 = 0;
const CHANNEL_VOICE: i64 = 2;
const CHANNEL_CATEGORY: i64 = 4;
const CHANNEL_STAGE: i64 = 13;
const CHANNEL_FORUM: i64 = 15;
const THREAD_PUBLIC: i64 = 11;

fn with_reason(mut p: Payload, reason: Option<&str>) -> Payload {
    if let Some(reason) = reason {
        p.insert("reason".into(), reason.into());
    }
    p
}

fn with_message(mut p: Payload, message: OutgoingMessage, allow_ephemeral: bool) -> Payload {
    let (body, files) = message.into_parts(allow_ephemeral);
    p.insert("body".into(), body.into());
    if !files.is_empty() {
        p.insert("files".into(), files.into());
    }
    p
}

fn interaction_payload(interaction: &InteractionRef) -> Payload {
    payload([
        ("interaction_id", interaction.id.into()),
        ("application_id", interaction.application_id.into()),
        ("token", interaction.token.as_str().into()),
    ])
}

fn webhook_payload(webhook: &WebhookRef) -> Payload {
    payload([
        ("webhook_id", webhook.id.into()),
        ("token", webhook.token.as_str().into()),
    ])
}

fn message_write(op: Operation, p: Payload, durable: bool) -> PreparedWrite {
    let write = PreparedWrite::new(op, p);
    if durable { write } else { write.ephemeral() }
}

/// Parse a message object returned by Discord.
pub fn parse_message(value: Value) -> Result<Message, ClanhallError> {
    serde_json::from_value(value).map_err(|e| ClanhallError::Http {
        message: format!("unexpected message object: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
pub trait DiscordWriter: Send + Sync {
    /// Deliver one prepared write and return Discord's response body.
    async fn submit(&self, write: PreparedWrite) -> Result<Value, ClanhallError>;

    /// Send a message. `content` is a shorthand for `message.content`;
    /// giving both is an error.
    async fn send_message(
        &self,
        target: MessageTarget,
        content: Option<String>,
        message: OutgoingMessage,
    ) -> Result<Message, ClanhallError> {
        if content.is_some() && message.content.is_some() {
            return Err(ClanhallError::InvalidArgument(
                "content given both positionally and in the message".into(),
            ));
        }
        let message = match content {
            Some(content) => message.content(content),
            None => message,
        };
        let durable = message.is_durable();
        let target = match target {
            MessageTarget::Channel(id) => payload([("channel_id", id.into())]),
            MessageTarget::User(id) => payload([("user_id", id.into())]),
        };
        let p = with_message(target, message, false);
        parse_message(self.submit(message_write(Operation::SendMessage, p, durable)).await?)
    }

    async fn edit_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        edit: OutgoingMessage,
    ) -> Result<Message, ClanhallError> {
        let durable = edit.is_durable();
        let p = payload([("channel_id", channel_id.into()), ("message_id", message_id.into())]);
        let p = with_message(p, edit, false);
        parse_message(self.submit(message_write(Operation::EditMessage, p, durable)).await?)
    }

    async fn delete_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = payload([("channel_id", channel_id.into()), ("message_id", message_id.into())]);
        self.submit(PreparedWrite::new(Operation::DeleteMessage, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    /// Delete up to [`MAX_DELETE_BATCH`] messages. An empty list is a no-op.
    async fn delete_messages(
        &self,
        channel_id: Snowflake,
        message_ids: Vec<Snowflake>,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        if message_ids.is_empty() {
            return Ok(());
        }
        if message_ids.len() > MAX_DELETE_BATCH {
            return Err(ClanhallError::InvalidArgument(format!(
                "cannot delete more than {MAX_DELETE_BATCH} messages at once"
            )));
        }
        let p = payload([("channel_id", channel_id.into()), ("message_ids", message_ids.into())]);
        self.submit(PreparedWrite::new(Operation::DeleteMessages, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn add_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> Result<(), ClanhallError> {
        let p = payload([
            ("channel_id", channel_id.into()),
            ("message_id", message_id.into()),
            ("emoji", emoji.into()),
        ]);
        self.submit(PreparedWrite::new(Operation::AddReaction, p)).await?;
        Ok(())
    }

    /// Remove a reaction; the bot's own when `user_id` is `None`.
    async fn remove_reaction(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
        user_id: Option<Snowflake>,
    ) -> Result<(), ClanhallError> {
        let mut p = payload([
            ("channel_id", channel_id.into()),
            ("message_id", message_id.into()),
            ("emoji", emoji.into()),
        ]);
        if let Some(user_id) = user_id {
            p.insert("user_id".into(), user_id.into());
        }
        self.submit(PreparedWrite::new(Operation::RemoveReaction, p)).await?;
        Ok(())
    }

    async fn clear_reactions(&self, channel_id: Snowflake, message_id: Snowflake) -> Result<(), ClanhallError> {
        let p = payload([("channel_id", channel_id.into()), ("message_id", message_id.into())]);
        self.submit(PreparedWrite::new(Operation::ClearReactions, p)).await?;
        Ok(())
    }

    async fn pin_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = payload([("channel_id", channel_id.into()), ("message_id", message_id.into())]);
        self.submit(PreparedWrite::new(Operation::PinMessage, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn unpin_message(
        &self,
        channel_id: Snowflake,
        message_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = payload([("channel_id", channel_id.into()), ("message_id", message_id.into())]);
        self.submit(PreparedWrite::new(Operation::UnpinMessage, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    /// Start a thread, from `message_id` when given. `options` is merged into
    /// the request body (e.g. `auto_archive_duration`, `type`).
    async fn create_thread(
        &self,
        channel_id: Snowflake,
        message_id: Option<Snowflake>,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let mut body = options;
        body.insert("name".into(), name.into());
        let mut p = payload([("channel_id", channel_id.into())]);
        match message_id {
            Some(id) => {
                p.insert("message_id".into(), id.into());
            }
            None => {
                body.entry("type".into()).or_insert(PayloadValue::Int(THREAD_PUBLIC));
            }
        }
        p.insert("body".into(), body.into());
        self.submit(PreparedWrite::new(Operation::CreateThread, with_reason(p, reason)))
            .await
    }

    async fn edit_channel(
        &self,
        channel_id: Snowflake,
        changes: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = payload([("channel_id", channel_id.into()), ("body", changes.into())]);
        self.submit(PreparedWrite::new(Operation::EditChannel, with_reason(p, reason)))
            .await
    }

    async fn delete_channel(&self, channel_id: Snowflake, reason: Option<&str>) -> Result<(), ClanhallError> {
        let p = payload([("channel_id", channel_id.into())]);
        self.submit(PreparedWrite::new(Operation::DeleteChannel, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    /// Overwrite channel permissions for a role or member. `allow` and `deny`
    /// are permission bitsets.
    async fn set_permissions(
        &self,
        channel_id: Snowflake,
        target: PermissionTarget,
        allow: u64,
        deny: u64,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let body = payload([
            ("allow", allow.to_string().into()),
            ("deny", deny.to_string().into()),
            ("type", PayloadValue::Int(target.kind())),
        ]);
        let p = payload([
            ("channel_id", channel_id.into()),
            ("overwrite_id", target.id().into()),
            ("body", body.into()),
        ]);
        self.submit(PreparedWrite::new(Operation::SetPermissions, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn create_text_channel(
        &self,
        guild_id: Snowflake,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = channel_payload(guild_id, name, CHANNEL_TEXT, options);
        self.submit(PreparedWrite::new(Operation::CreateTextChannel, with_reason(p, reason)))
            .await
    }

    async fn create_voice_channel(
        &self,
        guild_id: Snowflake,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = channel_payload(guild_id, name, CHANNEL_VOICE, options);
        self.submit(PreparedWrite::new(Operation::CreateVoiceChannel, with_reason(p, reason)))
            .await
    }

    async fn create_category(
        &self,
        guild_id: Snowflake,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = channel_payload(guild_id, name, CHANNEL_CATEGORY, options);
        self.submit(PreparedWrite::new(Operation::CreateCategory, with_reason(p, reason)))
            .await
    }

    async fn create_forum_channel(
        &self,
        guild_id: Snowflake,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = channel_payload(guild_id, name, CHANNEL_FORUM, options);
        self.submit(PreparedWrite::new(Operation::CreateForumChannel, with_reason(p, reason)))
            .await
    }

    async fn create_stage_channel(
        &self,
        guild_id: Snowflake,
        name: &str,
        options: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = channel_payload(guild_id, name, CHANNEL_STAGE, options);
        self.submit(PreparedWrite::new(Operation::CreateStageChannel, with_reason(p, reason)))
            .await
    }

    /// A write with no dedicated method, e.g. `("PUT", "/guilds/1/emojis/2")`.
    /// Paths through a webhook or interaction token are never persisted.
    async fn http_request(
        &self,
        method: &str,
        path: &str,
        body: Option<Payload>,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let mut p = payload([("method", method.into()), ("path", path.into())]);
        if let Some(body) = body {
            p.insert("body".into(), body.into());
        }
        self.submit(PreparedWrite::new(Operation::HttpRequest, with_reason(p, reason)))
            .await
    }

    /// `role` is the role body: `name`, `permissions`, `color`, `hoist`...
    async fn create_role(
        &self,
        guild_id: Snowflake,
        role: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = payload([("guild_id", guild_id.into()), ("body", role.into())]);
        self.submit(PreparedWrite::new(Operation::CreateRole, with_reason(p, reason)))
            .await
    }

    async fn add_roles(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_ids: Vec<Snowflake>,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = member_payload(guild_id, user_id, [("role_ids", role_ids.into())]);
        self.submit(PreparedWrite::new(Operation::AddRoles, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn remove_roles(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        role_ids: Vec<Snowflake>,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = member_payload(guild_id, user_id, [("role_ids", role_ids.into())]);
        self.submit(PreparedWrite::new(Operation::RemoveRoles, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn ban_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        delete_message_seconds: u32,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let body = payload([("delete_message_seconds", delete_message_seconds.into())]);
        let p = member_payload(guild_id, user_id, [("body", body.into())]);
        self.submit(PreparedWrite::new(Operation::BanMember, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn kick_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let p = member_payload(guild_id, user_id, []);
        self.submit(PreparedWrite::new(Operation::KickMember, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        until: TimeoutUntil,
        reason: Option<&str>,
    ) -> Result<(), ClanhallError> {
        let mut p = member_payload(guild_id, user_id, []);
        match until {
            TimeoutUntil::At(at) => {
                p.insert("until".into(), at.into());
            }
            TimeoutUntil::For(duration) => {
                p.insert("duration".into(), duration.into());
            }
            TimeoutUntil::Clear => {}
        }
        self.submit(PreparedWrite::new(Operation::TimeoutMember, with_reason(p, reason)))
            .await?;
        Ok(())
    }

    /// `changes` is the member patch: `nick`, `roles`, `mute`, `deaf`,
    /// `channel_id`...
    async fn edit_member(
        &self,
        guild_id: Snowflake,
        user_id: Snowflake,
        changes: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let p = member_payload(guild_id, user_id, [("body", changes.into())]);
        self.submit(PreparedWrite::new(Operation::EditMember, with_reason(p, reason)))
            .await
    }

    /// Initial reply to an interaction.
    async fn interaction_response(
        &self,
        interaction: &InteractionRef,
        message: OutgoingMessage,
    ) -> Result<(), ClanhallError> {
        let p = with_message(interaction_payload(interaction), message, true);
        self.submit(PreparedWrite::new(Operation::InteractionResponse, p)).await?;
        Ok(())
    }

    /// Update the message a component interaction came from.
    async fn interaction_edit(
        &self,
        interaction: &InteractionRef,
        message: OutgoingMessage,
    ) -> Result<(), ClanhallError> {
        let p = with_message(interaction_payload(interaction), message, false);
        self.submit(PreparedWrite::new(Operation::InteractionEdit, p)).await?;
        Ok(())
    }

    async fn interaction_defer(&self, interaction: &InteractionRef, kind: DeferKind) -> Result<(), ClanhallError> {
        let mut p = interaction_payload(interaction);
        match kind {
            DeferKind::Message { ephemeral } => {
                p.insert("defer".into(), "message".into());
                p.insert("ephemeral".into(), ephemeral.into());
            }
            DeferKind::Update => {
                p.insert("defer".into(), "update".into());
            }
        }
        self.submit(PreparedWrite::new(Operation::InteractionDefer, p)).await?;
        Ok(())
    }

    /// Open a modal. `modal` carries `custom_id`, `title` and `components`.
    async fn interaction_modal(&self, interaction: &InteractionRef, modal: Value) -> Result<(), ClanhallError> {
        if !modal.is_object() {
            return Err(ClanhallError::InvalidArgument("modal must be a JSON object".into()));
        }
        let mut p = interaction_payload(interaction);
        p.insert("body".into(), modal.into());
        self.submit(PreparedWrite::new(Operation::InteractionModal, p)).await?;
        Ok(())
    }

    async fn interaction_followup(
        &self,
        interaction: &InteractionRef,
        message: OutgoingMessage,
    ) -> Result<Message, ClanhallError> {
        let p = with_message(interaction_payload(interaction), message, true);
        parse_message(self.submit(PreparedWrite::new(Operation::InteractionFollowup, p)).await?)
    }

    /// Edit the original interaction reply. Resolves to `None` when the
    /// interaction already expired.
    async fn interaction_edit_original(
        &self,
        interaction: &InteractionRef,
        edit: OutgoingMessage,
    ) -> Result<Option<Message>, ClanhallError> {
        let p = with_message(interaction_payload(interaction), edit, false);
        match self
            .submit(PreparedWrite::new(Operation::InteractionEditOriginal, p))
            .await?
        {
            Value::Null => Ok(None),
            value => parse_message(value).map(Some),
        }
    }

    /// Execute a webhook. `username` and `avatar_url` override the webhook's
    /// defaults for this message.
    async fn webhook_send(
        &self,
        webhook: &WebhookRef,
        message: OutgoingMessage,
        username: Option<&str>,
        avatar_url: Option<&str>,
    ) -> Result<Message, ClanhallError> {
        let mut p = with_message(webhook_payload(webhook), message, false);
        if let Some(PayloadValue::Map(body)) = p.get_mut("body") {
            if let Some(username) = username {
                body.insert("username".into(), username.into());
            }
            if let Some(avatar_url) = avatar_url {
                body.insert("avatar_url".into(), avatar_url.into());
            }
        }
        parse_message(self.submit(PreparedWrite::new(Operation::WebhookSend, p)).await?)
    }

    async fn webhook_edit(
        &self,
        webhook: &WebhookRef,
        changes: Payload,
        reason: Option<&str>,
    ) -> Result<Value, ClanhallError> {
        let mut p = webhook_payload(webhook);
        p.insert("body".into(), changes.into());
        self.submit(PreparedWrite::new(Operation::WebhookEdit, with_reason(p, reason)))
            .await
    }

    async fn webhook_delete(&self, webhook: &WebhookRef, reason: Option<&str>) -> Result<(), ClanhallError> {
        let p = webhook_payload(webhook);
        self.submit(PreparedWrite::new(Operation::WebhookDelete, with_reason(p, reason)))
            .await?;
        Ok(())
    }
}

fn channel_payload(guild_id: Snowflake, name: &str, kind: i64, options: Payload) -> Payload {
    let mut body = options;
    body.insert("name".into(), name.into());
    body.insert("type".into(), PayloadValue::Int(kind));
    payload([("guild_id", guild_id.into()), ("body", body.into())])
}

fn member_payload<const N: usize>(
    guild_id: Snowflake,
    user_id: Snowflake,
    extra: [(&str, PayloadValue); N],
) -> Payload {
    let mut p = payload([("guild_id", guild_id.into()), ("user_id", user_id.into())]);
    p.extend(payload(extra));
    p
}
