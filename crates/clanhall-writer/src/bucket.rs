// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Route keys: a local name for "the Discord rate-limit bucket this write
//! will hit", derived from the operation and its major identifiers.
//!
//! Discord reports opaque bucket ids only after a response. The route key is
//! what the limiter can compute before the first call, and it is mapped onto
//! the server's bucket id once one is seen.

use clanhall_core::{Operation, is_token_path};

use crate::payload::{Payload, PayloadValue};

/// Identifier fields that become part of the key, in order.
fn identifier_fields(op: Operation) -> &'static [&'static str] {
    use Operation::*;
    match op {
        SendMessage => &["channel_id", "user_id"],
        EditMessage | DeleteMessage | AddReaction | RemoveReaction | ClearReactions
        | PinMessage | UnpinMessage | DeleteMessages | CreateThread | EditChannel
        | DeleteChannel | SetPermissions => &["channel_id"],
        CreateTextChannel | CreateVoiceChannel | CreateCategory | CreateForumChannel
        | CreateStageChannel | CreateRole | AddRoles | RemoveRoles | BanMember | KickMember
        | TimeoutMember | EditMember => &["guild_id"],
        WebhookSend | WebhookEdit | WebhookDelete => &["webhook_id"],
        InteractionResponse | InteractionFollowup | InteractionEdit | InteractionEditOriginal
        | InteractionDefer | InteractionModal => &["application_id"],
        HttpRequest => &[],
    }
}

/// Followups and edits of the original response share one webhook route.
fn operation_bucket(op: Operation) -> &'static str {
    match op {
        Operation::InteractionFollowup | Operation::InteractionEditOriginal => "interaction_followup",
        other => other.into(),
    }
}

/// `http_request|METHOD|path`. Paths carrying a token keep only the part
/// before it.
fn custom_route_key(payload: &Payload) -> String {
    let text = |field| match payload.get(field) {
        Some(PayloadValue::Text(s)) => s.as_str(),
        _ => "",
    };
    let path = text("path");
    let path = if is_token_path(path) {
        path.split('/').filter(|s| !s.is_empty()).take(2).collect::<Vec<_>>().join("/")
    } else {
        path.trim_matches('/').to_string()
    };
    format!("http_request|{}|{}", text("method").to_ascii_uppercase(), path)
}

/// `operation[|field:value]...`, e.g. `send_message|channel_id:123`.
pub fn route_key(op: Operation, payload: &Payload) -> String {
    if op == Operation::HttpRequest {
        return custom_route_key(payload);
    }
    let mut key = operation_bucket(op).to_string();
    for field in identifier_fields(op) {
        let value = match payload.get(*field) {
            Some(PayloadValue::Text(s)) => s.clone(),
            Some(PayloadValue::Int(n)) => n.to_string(),
            _ => continue,
        };
        key.push('|');
        key.push_str(field);
        key.push(':');
        key.push_str(&value);
        // Only the first present identifier counts.
        break;
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::payload;
    use clanhall_core::Snowflake;

    #[test]
    fn channel_scoped_operations() {
        let p = payload([
            ("channel_id", Snowflake(10).into()),
            ("message_id", Snowflake(20).into()),
        ]);
        assert_eq!(route_key(Operation::EditMessage, &p), "edit_message|channel_id:10");
        assert_eq!(route_key(Operation::AddReaction, &p), "add_reaction|channel_id:10");
    }

    #[test]
    fn direct_messages_use_the_user() {
        let p = payload([("user_id", Snowflake(5).into())]);
        assert_eq!(route_key(Operation::SendMessage, &p), "send_message|user_id:5");
    }

    #[test]
    fn guild_and_webhook_operations() {
        let p = payload([("guild_id", Snowflake(1).into()), ("user_id", Snowflake(2).into())]);
        assert_eq!(route_key(Operation::AddRoles, &p), "add_roles|guild_id:1");
        assert_eq!(route_key(Operation::CreateRole, &p), "create_role|guild_id:1");

        let w = payload([("webhook_id", Snowflake(3).into()), ("token", "secret".into())]);
        assert_eq!(route_key(Operation::WebhookSend, &w), "webhook_send|webhook_id:3");
    }

    #[test]
    fn interaction_followups_share_a_bucket() {
        let p = payload([
            ("application_id", Snowflake(7).into()),
            ("token", "tok".into()),
        ]);
        let followup = route_key(Operation::InteractionFollowup, &p);
        let edit = route_key(Operation::InteractionEditOriginal, &p);
        assert_eq!(followup, edit);
        assert_eq!(followup, "interaction_followup|application_id:7");
        assert_ne!(route_key(Operation::InteractionResponse, &p), followup);
    }

    #[test]
    fn missing_identifiers_fall_back_to_the_operation() {
        assert_eq!(route_key(Operation::KickMember, &Payload::new()), "kick_member");
    }

    #[test]
    fn tokens_never_enter_the_key() {
        let p = payload([("webhook_id", Snowflake(3).into()), ("token", "secret".into())]);
        assert!(!route_key(Operation::WebhookDelete, &p).contains("secret"));

        let custom = payload([
            ("method", "patch".into()),
            ("path", "/webhooks/3/secret/messages/4".into()),
        ]);
        assert_eq!(route_key(Operation::HttpRequest, &custom), "http_request|PATCH|webhooks/3");
    }

    #[test]
    fn custom_requests_key_on_method_and_path() {
        let p = payload([("method", "post".into()), ("path", "/guilds/1/emojis".into())]);
        assert_eq!(route_key(Operation::HttpRequest, &p), "http_request|POST|guilds/1/emojis");

        let forum = payload([("guild_id", Snowflake(1).into())]);
        assert_eq!(
            route_key(Operation::CreateForumChannel, &forum),
            "create_forum_channel|guild_id:1"
        );
    }
}
