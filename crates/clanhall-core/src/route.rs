// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord REST routes used by the writer.
//!
//! A [`Route`] names one endpoint plus its path parameters. The HTTP client turns
//! it into a URL by pushing [`Route::segments`] onto the API base, which takes
//! care of percent-encoding emoji and tokens.

use strum::{Display, EnumString};

use crate::types::{Attachment, Snowflake};

/// HTTP verb of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    CreateMessage { channel_id: Snowflake },
    CreateDm,
    EditMessage { channel_id: Snowflake, message_id: Snowflake },
    DeleteMessage { channel_id: Snowflake, message_id: Snowflake },
    BulkDeleteMessages { channel_id: Snowflake },
    CreateReaction { channel_id: Snowflake, message_id: Snowflake, emoji: String },
    DeleteOwnReaction { channel_id: Snowflake, message_id: Snowflake, emoji: String },
    DeleteUserReaction {
        channel_id: Snowflake,
        message_id: Snowflake,
        emoji: String,
        user_id: Snowflake,
    },
    DeleteAllReactions { channel_id: Snowflake, message_id: Snowflake },
    PinMessage { channel_id: Snowflake, message_id: Snowflake },
    UnpinMessage { channel_id: Snowflake, message_id: Snowflake },
    ModifyChannel { channel_id: Snowflake },
    DeleteChannel { channel_id: Snowflake },
    EditChannelPermissions { channel_id: Snowflake, overwrite_id: Snowflake },
    StartThreadFromMessage { channel_id: Snowflake, message_id: Snowflake },
    StartThread { channel_id: Snowflake },
    CreateGuildChannel { guild_id: Snowflake },
    CreateGuildRole { guild_id: Snowflake },
    AddMemberRole { guild_id: Snowflake, user_id: Snowflake, role_id: Snowflake },
    RemoveMemberRole { guild_id: Snowflake, user_id: Snowflake, role_id: Snowflake },
    CreateGuildBan { guild_id: Snowflake, user_id: Snowflake },
    RemoveGuildMember { guild_id: Snowflake, user_id: Snowflake },
    ModifyGuildMember { guild_id: Snowflake, user_id: Snowflake },
    CreateInteractionResponse { interaction_id: Snowflake, token: String },
    EditOriginalInteractionResponse { application_id: Snowflake, token: String },
    CreateFollowupMessage { application_id: Snowflake, token: String },
    ExecuteWebhook { webhook_id: Snowflake, token: String, wait: bool },
    ModifyWebhook { webhook_id: Snowflake, token: String },
    DeleteWebhook { webhook_id: Snowflake, token: String },
    /// A route without a dedicated variant. `path` is relative to the API
    /// base, e.g. `/guilds/1/emojis`.
    Custom { method: HttpMethod, path: String },
}

impl Route {
    pub fn method(&self) -> HttpMethod {
        use Route::*;
        match self {
            Custom { method, .. } => *method,
            CreateMessage { .. }
            | CreateDm
            | BulkDeleteMessages { .. }
            | StartThreadFromMessage { .. }
            | StartThread { .. }
            | CreateGuildChannel { .. }
            | CreateGuildRole { .. }
            | CreateInteractionResponse { .. }
            | CreateFollowupMessage { .. }
            | ExecuteWebhook { .. } => HttpMethod::Post,
            CreateReaction { .. }
            | PinMessage { .. }
            | EditChannelPermissions { .. }
            | AddMemberRole { .. }
            | CreateGuildBan { .. } => HttpMethod::Put,
            EditMessage { .. }
            | ModifyChannel { .. }
            | ModifyGuildMember { .. }
            | EditOriginalInteractionResponse { .. }
            | ModifyWebhook { .. } => HttpMethod::Patch,
            DeleteMessage { .. }
            | DeleteOwnReaction { .. }
            | DeleteUserReaction { .. }
            | DeleteAllReactions { .. }
            | UnpinMessage { .. }
            | DeleteChannel { .. }
            | RemoveMemberRole { .. }
            | RemoveGuildMember { .. }
            | DeleteWebhook { .. } => HttpMethod::Delete,
        }
    }

    /// Unencoded path segments below the API base.
    pub fn segments(&self) -> Vec<String> {
        use Route::*;
        let s = |v: &Snowflake| v.to_string();
        match self {
            CreateMessage { channel_id } => vec!["channels".into(), s(channel_id), "messages".into()],
            CreateDm => vec!["users".into(), "@me".into(), "channels".into()],
            EditMessage { channel_id, message_id } | DeleteMessage { channel_id, message_id } => {
                vec!["channels".into(), s(channel_id), "messages".into(), s(message_id)]
            }
            BulkDeleteMessages { channel_id } => vec![
                "channels".into(),
                s(channel_id),
                "messages".into(),
                "bulk-delete".into(),
            ],
            CreateReaction { channel_id, message_id, emoji }
            | DeleteOwnReaction { channel_id, message_id, emoji } => vec![
                "channels".into(),
                s(channel_id),
                "messages".into(),
                s(message_id),
                "reactions".into(),
                emoji.clone(),
                "@me".into(),
            ],
            DeleteUserReaction { channel_id, message_id, emoji, user_id } => vec![
                "channels".into(),
                s(channel_id),
                "messages".into(),
                s(message_id),
                "reactions".into(),
                emoji.clone(),
                s(user_id),
            ],
            DeleteAllReactions { channel_id, message_id } => vec![
                "channels".into(),
                s(channel_id),
                "messages".into(),
                s(message_id),
                "reactions".into(),
            ],
            PinMessage { channel_id, message_id } | UnpinMessage { channel_id, message_id } => {
                vec!["channels".into(), s(channel_id), "pins".into(), s(message_id)]
            }
            ModifyChannel { channel_id } | DeleteChannel { channel_id } => {
                vec!["channels".into(), s(channel_id)]
            }
            EditChannelPermissions { channel_id, overwrite_id } => vec![
                "channels".into(),
                s(channel_id),
                "permissions".into(),
                s(overwrite_id),
            ],
            StartThreadFromMessage { channel_id, message_id } => vec![
                "channels".into(),
                s(channel_id),
                "messages".into(),
                s(message_id),
                "threads".into(),
            ],
            StartThread { channel_id } => vec!["channels".into(), s(channel_id), "threads".into()],
            CreateGuildChannel { guild_id } => vec!["guilds".into(), s(guild_id), "channels".into()],
            CreateGuildRole { guild_id } => vec!["guilds".into(), s(guild_id), "roles".into()],
            AddMemberRole { guild_id, user_id, role_id }
            | RemoveMemberRole { guild_id, user_id, role_id } => vec![
                "guilds".into(),
                s(guild_id),
                "members".into(),
                s(user_id),
                "roles".into(),
                s(role_id),
            ],
            CreateGuildBan { guild_id, user_id } => {
                vec!["guilds".into(), s(guild_id), "bans".into(), s(user_id)]
            }
            RemoveGuildMember { guild_id, user_id } | ModifyGuildMember { guild_id, user_id } => {
                vec!["guilds".into(), s(guild_id), "members".into(), s(user_id)]
            }
            CreateInteractionResponse { interaction_id, token } => vec![
                "interactions".into(),
                s(interaction_id),
                token.clone(),
                "callback".into(),
            ],
            EditOriginalInteractionResponse { application_id, token } => vec![
                "webhooks".into(),
                s(application_id),
                token.clone(),
                "messages".into(),
                "@original".into(),
            ],
            CreateFollowupMessage { application_id, token } => {
                vec!["webhooks".into(), s(application_id), token.clone()]
            }
            ExecuteWebhook { webhook_id, token, .. }
            | ModifyWebhook { webhook_id, token }
            | DeleteWebhook { webhook_id, token } => {
                vec!["webhooks".into(), s(webhook_id), token.clone()]
            }
            Custom { path, .. } => path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Query parameters appended to the URL.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        match self {
            Route::ExecuteWebhook { wait: true, .. } => vec![("wait", "true".to_string())],
            _ => Vec::new(),
        }
    }

    /// Route name for logs. Never includes tokens.
    pub fn name(&self) -> &'static str {
        use Route::*;
        match self {
            CreateMessage { .. } => "create_message",
            CreateDm => "create_dm",
            EditMessage { .. } => "edit_message",
            DeleteMessage { .. } => "delete_message",
            BulkDeleteMessages { .. } => "bulk_delete_messages",
            CreateReaction { .. } => "create_reaction",
            DeleteOwnReaction { .. } => "delete_own_reaction",
            DeleteUserReaction { .. } => "delete_user_reaction",
            DeleteAllReactions { .. } => "delete_all_reactions",
            PinMessage { .. } => "pin_message",
            UnpinMessage { .. } => "unpin_message",
            ModifyChannel { .. } => "modify_channel",
            DeleteChannel { .. } => "delete_channel",
            EditChannelPermissions { .. } => "edit_channel_permissions",
            StartThreadFromMessage { .. } => "start_thread_from_message",
            StartThread { .. } => "start_thread",
            CreateGuildChannel { .. } => "create_guild_channel",
            CreateGuildRole { .. } => "create_guild_role",
            AddMemberRole { .. } => "add_member_role",
            RemoveMemberRole { .. } => "remove_member_role",
            CreateGuildBan { .. } => "create_guild_ban",
            RemoveGuildMember { .. } => "remove_guild_member",
            ModifyGuildMember { .. } => "modify_guild_member",
            CreateInteractionResponse { .. } => "create_interaction_response",
            EditOriginalInteractionResponse { .. } => "edit_original_interaction_response",
            CreateFollowupMessage { .. } => "create_followup_message",
            ExecuteWebhook { .. } => "execute_webhook",
            ModifyWebhook { .. } => "modify_webhook",
            DeleteWebhook { .. } => "delete_webhook",
            Custom { .. } => "custom",
        }
    }

    /// Whether the route authenticates with its own token instead of the bot token.
    pub fn is_token_authenticated(&self) -> bool {
        match self {
            Route::CreateInteractionResponse { .. }
            | Route::EditOriginalInteractionResponse { .. }
            | Route::CreateFollowupMessage { .. }
            | Route::ExecuteWebhook { .. }
            | Route::ModifyWebhook { .. }
            | Route::DeleteWebhook { .. } => true,
            Route::Custom { path, .. } => is_token_path(path),
            _ => false,
        }
    }
}

/// `/webhooks/{id}/{token}...` and `/interactions/{id}/{token}...` carry a
/// credential in the path itself.
pub fn is_token_path(path: &str) -> bool {
    let mut segments = path.split('/').filter(|s| !s.is_empty());
    matches!(segments.next(), Some("webhooks" | "interactions")) && segments.nth(1).is_some()
}

/// One REST call: a route plus its JSON body, uploads and audit-log reason.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub route: Route,
    pub body: Option<serde_json::Value>,
    pub files: Vec<Attachment>,
    pub reason: Option<String>,
}

impl ApiRequest {
    pub fn new(route: Route) -> Self {
        Self {
            route,
            body: None,
            files: Vec::new(),
            reason: None,
        }
    }

    pub fn body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn files(mut self, files: Vec<Attachment>) -> Self {
        self.files = files;
        self
    }

    pub fn reason(mut self, reason: Option<String>) -> Self {
        self.reason = reason;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_routes() {
        let route = Route::EditMessage {
            channel_id: Snowflake(1),
            message_id: Snowflake(2),
        };
        assert_eq!(route.method(), HttpMethod::Patch);
        assert_eq!(route.segments(), vec!["channels", "1", "messages", "2"]);
        assert_eq!(route.method().to_string(), "PATCH");
    }

    #[test]
    fn reaction_route_keeps_raw_emoji() {
        let route = Route::CreateReaction {
            channel_id: Snowflake(1),
            message_id: Snowflake(2),
            emoji: "✅".into(),
        };
        assert_eq!(route.method(), HttpMethod::Put);
        assert_eq!(route.segments()[5], "✅");
        assert_eq!(route.segments()[6], "@me");
    }

    #[test]
    fn webhook_execute_waits_for_message() {
        let route = Route::ExecuteWebhook {
            webhook_id: Snowflake(9),
            token: "tok".into(),
            wait: true,
        };
        assert_eq!(route.query(), vec![("wait", "true".to_string())]);
        assert!(route.is_token_authenticated());
        assert_eq!(route.name(), "execute_webhook");
    }

    #[test]
    fn custom_routes_split_their_path() {
        let route = Route::Custom {
            method: "patch".parse().unwrap(),
            path: "/guilds/1/emojis/2".into(),
        };
        assert_eq!(route.method(), HttpMethod::Patch);
        assert_eq!(route.segments(), vec!["guilds", "1", "emojis", "2"]);
        assert!(!route.is_token_authenticated());

        let webhook = Route::Custom {
            method: HttpMethod::Post,
            path: "/webhooks/9/secret/messages".into(),
        };
        assert!(webhook.is_token_authenticated());
        assert!(!is_token_path("/webhooks/9"));
    }

    #[test]
    fn member_role_routes_share_path() {
        let add = Route::AddMemberRole {
            guild_id: Snowflake(1),
            user_id: Snowflake(2),
            role_id: Snowflake(3),
        };
        let remove = Route::RemoveMemberRole {
            guild_id: Snowflake(1),
            user_id: Snowflake(2),
            role_id: Snowflake(3),
        };
        assert_eq!(add.segments(), remove.segments());
        assert_ne!(add.method(), remove.method());
    }
}
