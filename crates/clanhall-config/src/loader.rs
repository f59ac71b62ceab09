// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./clanhall.toml` > `~/.config/clanhall/clanhall.toml` >
//! `/etc/clanhall/clanhall.toml` with environment variable overrides via `CLANHALL_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::ClanhallConfig;

pub const LOCAL_CONFIG: &str = "clanhall.toml";
pub const SYSTEM_CONFIG: &str = "/etc/clanhall/clanhall.toml";

/// `~/.config/clanhall/clanhall.toml`, if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("clanhall").join(LOCAL_CONFIG))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/clanhall/clanhall.toml`
/// 3. `~/.config/clanhall/clanhall.toml`
/// 4. `./clanhall.toml`
/// 5. `CLANHALL_*` environment variables
pub fn load_config() -> Result<ClanhallConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<ClanhallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ClanhallConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from an explicit file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<ClanhallConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(ClanhallConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// The full layered Figment, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(ClanhallConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")`: `CLANHALL_WRITER_MIN_INTERVAL_SECS`
/// must land on `writer.min_interval_secs`, not `writer.min.interval.secs`.
fn env_provider() -> Env {
    Env::prefixed("CLANHALL_").map(|key| {
        let key_str = key.as_str();
        let mapped = ["bot", "discord", "storage", "writer"]
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string());
        mapped.into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FallbackMode;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CLANHALL_DISCORD_BOT_TOKEN", "abc.def");
            jail.set_env("CLANHALL_WRITER_MIN_INTERVAL_SECS", "0.75");
            jail.set_env("CLANHALL_WRITER_FALLBACK", "error");
            let config = load_config()?;
            assert_eq!(config.discord.bot_token.as_deref(), Some("abc.def"));
            assert_eq!(config.writer.min_interval_secs, 0.75);
            assert_eq!(config.writer.fallback, FallbackMode::Error);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                LOCAL_CONFIG,
                r#"
                [writer]
                urgent_moderation = true

                [writer.operation_min_intervals]
                send_message = 2.0
                "#,
            )?;
            let config = load_config()?;
            assert!(config.writer.urgent_moderation);
            assert_eq!(config.writer.operation_min_intervals.get("send_message"), Some(&2.0));
            // Untouched defaults survive the map merge.
            assert_eq!(config.writer.operation_min_intervals.get("add_reaction"), Some(&0.6));
            Ok(())
        });
    }
}
