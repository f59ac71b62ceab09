// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Clanhall configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ClanhallConfig {
    /// Process identity and logging.
    #[serde(default)]
    pub bot: BotConfig,

    /// Discord REST API settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Write coordinator settings.
    #[serde(default)]
    pub writer: WriterConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    #[serde(default = "default_bot_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: default_bot_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_bot_name() -> String {
    "clanhall".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Discord REST API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Bot token. Usually supplied as `CLANHALL_DISCORD_BOT_TOKEN`.
    #[serde(default)]
    pub bot_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            api_base: default_api_base(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_user_agent() -> String {
    "DiscordBot (https://github.com/clanhall/clanhall, 0.1)".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("clanhall").join("clanhall.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("clanhall.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// What to do with a write the coordinator cannot accept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Call Discord directly, bypassing spacing and durability.
    #[default]
    Direct,
    /// Return the error to the caller.
    Error,
}

/// Write coordinator configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WriterConfig {
    /// Route writes through the queue. When false every write goes direct.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum spacing between any two dispatches.
    #[serde(default = "default_min_interval_secs")]
    pub min_interval_secs: f64,

    /// Extra spacing per operation name, on top of the global interval.
    #[serde(default = "default_operation_min_intervals")]
    pub operation_min_intervals: BTreeMap<String, f64>,

    /// How long a route stays blocked after its first call, until the server
    /// reports its bucket.
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: f64,

    #[serde(default = "default_warmup_operations")]
    pub warmup_operations: Vec<String>,

    /// Pending records read per page while replaying the queue on start.
    #[serde(default = "default_restore_limit")]
    pub restore_limit: usize,

    #[serde(default)]
    pub fallback: FallbackMode,

    /// Dispatch ban/kick/timeout ahead of queued normal writes.
    #[serde(default)]
    pub urgent_moderation: bool,

    /// Persist the limiter clock and learned buckets across restarts.
    #[serde(default = "default_true")]
    pub persist_limiter_state: bool,

    /// Maximum characters of a single component text field.
    #[serde(default = "default_text_limit")]
    pub text_field_limit: usize,

    /// Maximum characters across all component `content` fields of one message.
    #[serde(default = "default_text_limit")]
    pub text_total_limit: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_secs: default_min_interval_secs(),
            operation_min_intervals: default_operation_min_intervals(),
            warmup_secs: default_warmup_secs(),
            warmup_operations: default_warmup_operations(),
            restore_limit: default_restore_limit(),
            fallback: FallbackMode::default(),
            urgent_moderation: false,
            persist_limiter_state: true,
            text_field_limit: default_text_limit(),
            text_total_limit: default_text_limit(),
        }
    }
}

impl WriterConfig {
    pub fn min_interval(&self) -> Duration {
        secs(self.min_interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        secs(self.warmup_secs)
    }
}

/// Converts a validated seconds value. Invalid input clamps to zero.
pub fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value)
        .unwrap_or(Duration::ZERO)
        .min(clanhall_core::MAX_RATE_LIMIT_WAIT)
}

fn default_true() -> bool {
    true
}

fn default_min_interval_secs() -> f64 {
    0.5
}

fn default_operation_min_intervals() -> BTreeMap<String, f64> {
    let mut map = BTreeMap::new();
    for op in [
        "send_message",
        "edit_message",
        "delete_message",
        "webhook_send",
        "webhook_edit",
        "webhook_delete",
        "interaction_response",
        "interaction_followup",
        "interaction_edit",
        "interaction_edit_original",
        "interaction_defer",
        "interaction_modal",
    ] {
        map.insert(op.to_string(), 1.1);
    }
    for op in ["add_reaction", "remove_reaction", "clear_reactions"] {
        map.insert(op.to_string(), 0.6);
    }
    for op in ["edit_member", "add_roles", "pin_message", "unpin_message"] {
        map.insert(op.to_string(), 1.0);
    }
    for op in ["edit_channel", "delete_channel", "delete_messages"] {
        map.insert(op.to_string(), 1.2);
    }
    map
}

fn default_warmup_secs() -> f64 {
    1.5
}

fn default_warmup_operations() -> Vec<String> {
    ["add_reaction", "remove_reaction", "edit_member", "add_roles"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_restore_limit() -> usize {
    100
}

fn default_text_limit() -> usize {
    4000
}
