// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a write into one or more REST calls and performs them.
//!
//! Both the dispatch worker and the direct writer go through [`perform`], so
//! a write behaves the same whether or not it was queued.

use chrono::Utc;
use clanhall_core::{
    ApiRequest, Attachment, ClanhallError, HttpMethod, Operation, PlatformClient, PlatformReply,
    Route, Snowflake,
};
use serde_json::{Map, Value, json};
use tracing::info;

use crate::codec::to_wire;
use crate::payload::{
    Payload, PayloadValue, optional_snowflake, optional_str, require_snowflake, require_str,
};
use crate::sanitize::{TextLimits, sanitize_body};

const BULK_DELETE_MAX: usize = 100;

/// Interaction callback types.
const CALLBACK_MESSAGE: i64 = 4;
const CALLBACK_DEFERRED_MESSAGE: i64 = 5;
const CALLBACK_DEFERRED_UPDATE: i64 = 6;
const CALLBACK_UPDATE_MESSAGE: i64 = 7;
const CALLBACK_MODAL: i64 = 9;

/// Perform a write against the platform.
///
/// An expired interaction token on an acknowledgement is not an error: there
/// is nothing left to answer, so the write resolves to `null`.
pub async fn perform(
    platform: &dyn PlatformClient,
    op: Operation,
    payload: &Payload,
    limits: TextLimits,
) -> Result<PlatformReply, ClanhallError> {
    match execute(platform, op, payload, limits).await {
        Err(e) if tolerates_expired_interaction(op) && e.is_unknown_interaction() => {
            info!(operation = %op, "interaction expired before it could be answered");
            Ok(PlatformReply::new(Value::Null))
        }
        other => other,
    }
}

fn tolerates_expired_interaction(op: Operation) -> bool {
    op.is_interaction() && op != Operation::InteractionFollowup
}

async fn execute(
    platform: &dyn PlatformClient,
    op: Operation,
    p: &Payload,
    limits: TextLimits,
) -> Result<PlatformReply, ClanhallError> {
    use Operation::*;

    let reason = optional_str(p, "reason").map(str::to_string);
    let channel = || require_snowflake(p, "channel_id");
    let message = || require_snowflake(p, "message_id");
    let guild = || require_snowflake(p, "guild_id");
    let user = || require_snowflake(p, "user_id");

    let request = match op {
        SendMessage => {
            let channel_id = match optional_snowflake(p, "channel_id")? {
                Some(id) => id,
                None => open_dm(platform, user()?).await?,
            };
            ApiRequest::new(Route::CreateMessage { channel_id })
                .files(files(p))
        }
        EditMessage => ApiRequest::new(Route::EditMessage {
            channel_id: channel()?,
            message_id: message()?,
        })
        .files(files(p)),
        DeleteMessage => ApiRequest::new(Route::DeleteMessage {
            channel_id: channel()?,
            message_id: message()?,
        }),
        AddReaction => ApiRequest::new(Route::CreateReaction {
            channel_id: channel()?,
            message_id: message()?,
            emoji: route_emoji(require_str(p, "emoji")?),
        }),
        RemoveReaction => {
            let (channel_id, message_id) = (channel()?, message()?);
            let emoji = route_emoji(require_str(p, "emoji")?);
            match optional_snowflake(p, "user_id")? {
                Some(user_id) => ApiRequest::new(Route::DeleteUserReaction {
                    channel_id,
                    message_id,
                    emoji,
                    user_id,
                }),
                None => ApiRequest::new(Route::DeleteOwnReaction {
                    channel_id,
                    message_id,
                    emoji,
                }),
            }
        }
        ClearReactions => ApiRequest::new(Route::DeleteAllReactions {
            channel_id: channel()?,
            message_id: message()?,
        }),
        PinMessage => ApiRequest::new(Route::PinMessage {
            channel_id: channel()?,
            message_id: message()?,
        }),
        UnpinMessage => ApiRequest::new(Route::UnpinMessage {
            channel_id: channel()?,
            message_id: message()?,
        }),
        DeleteMessages => return delete_messages(platform, channel()?, p, reason).await,
        CreateThread => match optional_snowflake(p, "message_id")? {
            Some(message_id) => ApiRequest::new(Route::StartThreadFromMessage {
                channel_id: channel()?,
                message_id,
            }),
            None => ApiRequest::new(Route::StartThread {
                channel_id: channel()?,
            }),
        },
        EditChannel => ApiRequest::new(Route::ModifyChannel {
            channel_id: channel()?,
        }),
        DeleteChannel => ApiRequest::new(Route::DeleteChannel {
            channel_id: channel()?,
        }),
        SetPermissions => ApiRequest::new(Route::EditChannelPermissions {
            channel_id: channel()?,
            overwrite_id: require_snowflake(p, "overwrite_id")?,
        }),
        CreateTextChannel | CreateVoiceChannel | CreateCategory | CreateForumChannel
        | CreateStageChannel => ApiRequest::new(Route::CreateGuildChannel { guild_id: guild()? }),
        CreateRole => ApiRequest::new(Route::CreateGuildRole { guild_id: guild()? }),
        AddRoles | RemoveRoles => {
            return change_roles(platform, op, guild()?, user()?, p, reason).await;
        }
        BanMember => ApiRequest::new(Route::CreateGuildBan {
            guild_id: guild()?,
            user_id: user()?,
        }),
        KickMember => ApiRequest::new(Route::RemoveGuildMember {
            guild_id: guild()?,
            user_id: user()?,
        }),
        TimeoutMember => {
            let request = ApiRequest::new(Route::ModifyGuildMember {
                guild_id: guild()?,
                user_id: user()?,
            });
            return platform
                .request(request.body(timeout_body(p)?).reason(reason))
                .await;
        }
        EditMember => ApiRequest::new(Route::ModifyGuildMember {
            guild_id: guild()?,
            user_id: user()?,
        }),
        InteractionResponse | InteractionEdit | InteractionDefer | InteractionModal => {
            let route = Route::CreateInteractionResponse {
                interaction_id: require_snowflake(p, "interaction_id")?,
                token: require_str(p, "token")?.to_string(),
            };
            let callback = callback_body(op, p, limits)?;
            return platform
                .request(ApiRequest::new(route).body(callback).files(files(p)))
                .await;
        }
        InteractionFollowup => ApiRequest::new(Route::CreateFollowupMessage {
            application_id: require_snowflake(p, "application_id")?,
            token: require_str(p, "token")?.to_string(),
        })
        .files(files(p)),
        InteractionEditOriginal => ApiRequest::new(Route::EditOriginalInteractionResponse {
            application_id: require_snowflake(p, "application_id")?,
            token: require_str(p, "token")?.to_string(),
        })
        .files(files(p)),
        WebhookSend => ApiRequest::new(Route::ExecuteWebhook {
            webhook_id: require_snowflake(p, "webhook_id")?,
            token: require_str(p, "token")?.to_string(),
            wait: true,
        })
        .files(files(p)),
        WebhookEdit => ApiRequest::new(Route::ModifyWebhook {
            webhook_id: require_snowflake(p, "webhook_id")?,
            token: require_str(p, "token")?.to_string(),
        }),
        WebhookDelete => ApiRequest::new(Route::DeleteWebhook {
            webhook_id: require_snowflake(p, "webhook_id")?,
            token: require_str(p, "token")?.to_string(),
        }),
        HttpRequest => ApiRequest::new(custom_route(p)?).files(files(p)),
    };

    let request = match body_json(p, limits)? {
        Some(body) => request.body(body),
        None => request,
    };
    platform.request(request.reason(reason)).await
}

/// A write route given as `method` and `path`. Reads are not writes and
/// are refused, as are paths that could escape the API base.
fn custom_route(p: &Payload) -> Result<Route, ClanhallError> {
    let raw = require_str(p, "method")?;
    let method: HttpMethod = raw
        .parse()
        .map_err(|_| ClanhallError::InvalidArgument(format!("unknown HTTP method {raw:?}")))?;
    if method == HttpMethod::Get {
        return Err(ClanhallError::InvalidArgument(
            "GET requests are not writes".into(),
        ));
    }
    let path = require_str(p, "path")?;
    if !path.starts_with('/') || path.contains('?') {
        return Err(ClanhallError::InvalidArgument(format!(
            "path must be absolute and without a query, got {path:?}"
        )));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(ClanhallError::InvalidArgument(format!(
            "path must not contain '..', got {path:?}"
        )));
    }
    Ok(Route::Custom { method, path: path.to_string() })
}

/// The `body` entry rendered to wire JSON and sanitized.
fn body_json(p: &Payload, limits: TextLimits) -> Result<Option<Value>, ClanhallError> {
    let Some(body) = p.get("body") else {
        return Ok(None);
    };
    match to_wire(body)? {
        Value::Object(mut map) => {
            sanitize_body(&mut map, limits);
            Ok(Some(Value::Object(map)))
        }
        Value::Null => Ok(None),
        other => Err(ClanhallError::InvalidArgument(format!(
            "request body must be an object, got {other}"
        ))),
    }
}

fn files(p: &Payload) -> Vec<Attachment> {
    p.get("files")
        .and_then(PayloadValue::as_list)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    PayloadValue::Attachment(a) => Some(a.clone()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Custom emoji arrive as `<:name:id>` or `<a:name:id>`; routes want `name:id`.
fn route_emoji(emoji: &str) -> String {
    let trimmed = emoji.trim();
    match trimmed.strip_prefix('<').and_then(|s| s.strip_suffix('>')) {
        Some(inner) => inner
            .strip_prefix("a:")
            .or_else(|| inner.strip_prefix(':'))
            .unwrap_or(inner)
            .to_string(),
        None => trimmed.to_string(),
    }
}

async fn open_dm(platform: &dyn PlatformClient, user_id: Snowflake) -> Result<Snowflake, ClanhallError> {
    let request = ApiRequest::new(Route::CreateDm).body(json!({ "recipient_id": user_id }));
    let reply = platform.request(request).await?;
    reply
        .body
        .get("id")
        .and_then(|id| serde_json::from_value::<Snowflake>(id.clone()).ok())
        .ok_or_else(|| ClanhallError::Http {
            message: format!("DM channel response without an id: {}", reply.body),
            source: None,
        })
}

async fn delete_messages(
    platform: &dyn PlatformClient,
    channel_id: Snowflake,
    p: &Payload,
    reason: Option<String>,
) -> Result<PlatformReply, ClanhallError> {
    let ids: Vec<Snowflake> = p
        .get("message_ids")
        .and_then(PayloadValue::as_list)
        .map(|items| items.iter().filter_map(PayloadValue::as_snowflake).collect())
        .unwrap_or_default();

    let mut last = PlatformReply::new(Value::Null);
    for chunk in ids.chunks(BULK_DELETE_MAX) {
        let request = match chunk {
            [message_id] => ApiRequest::new(Route::DeleteMessage {
                channel_id,
                message_id: *message_id,
            }),
            _ => ApiRequest::new(Route::BulkDeleteMessages { channel_id })
                .body(json!({ "messages": chunk })),
        };
        last = platform.request(request.reason(reason.clone())).await?;
    }
    Ok(last)
}

/// One call per role. Repeating an already applied role is harmless, so a
/// throttled retry can replay the whole list.
async fn change_roles(
    platform: &dyn PlatformClient,
    op: Operation,
    guild_id: Snowflake,
    user_id: Snowflake,
    p: &Payload,
    reason: Option<String>,
) -> Result<PlatformReply, ClanhallError> {
    let role_ids: Vec<Snowflake> = p
        .get("role_ids")
        .and_then(PayloadValue::as_list)
        .map(|items| items.iter().filter_map(PayloadValue::as_snowflake).collect())
        .unwrap_or_default();

    let mut last = PlatformReply::new(Value::Null);
    for role_id in role_ids {
        let route = if op == Operation::AddRoles {
            Route::AddMemberRole {
                guild_id,
                user_id,
                role_id,
            }
        } else {
            Route::RemoveMemberRole {
                guild_id,
                user_id,
                role_id,
            }
        };
        last = platform
            .request(ApiRequest::new(route).reason(reason.clone()))
            .await?;
    }
    Ok(last)
}

fn timeout_body(p: &Payload) -> Result<Value, ClanhallError> {
    let until = match (p.get("until"), p.get("duration")) {
        (Some(PayloadValue::DateTime(at)), _) => Some(*at),
        (_, Some(PayloadValue::Duration(d))) => {
            let delta = chrono::Duration::from_std(*d)
                .map_err(|e| ClanhallError::InvalidArgument(format!("timeout duration: {e}")))?;
            Some(Utc::now() + delta)
        }
        _ => None,
    };
    let until = match until {
        Some(at) => to_wire(&PayloadValue::DateTime(at))?,
        None => Value::Null,
    };
    Ok(json!({ "communication_disabled_until": until }))
}

fn callback_body(op: Operation, p: &Payload, limits: TextLimits) -> Result<Value, ClanhallError> {
    let (kind, data) = match op {
        Operation::InteractionResponse => (CALLBACK_MESSAGE, body_json(p, limits)?),
        Operation::InteractionEdit => (CALLBACK_UPDATE_MESSAGE, body_json(p, limits)?),
        Operation::InteractionModal => (CALLBACK_MODAL, body_json(p, limits)?),
        _ => match optional_str(p, "defer") {
            Some("update") => (CALLBACK_DEFERRED_UPDATE, None),
            _ => {
                let ephemeral = p
                    .get("ephemeral")
                    .and_then(PayloadValue::as_bool)
                    .unwrap_or(false);
                let data = ephemeral.then(|| json!({ "flags": crate::message::EPHEMERAL }));
                (CALLBACK_DEFERRED_MESSAGE, data)
            }
        },
    };
    let mut callback = Map::new();
    callback.insert("type".into(), Value::from(kind));
    if let Some(data) = data {
        callback.insert("data".into(), data);
    }
    Ok(Value::Object(callback))
}
