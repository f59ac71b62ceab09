// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use std::str::FromStr;

use clanhall_core::{MAX_RATE_LIMIT_WAIT, Operation};

use crate::diagnostic::ConfigError;
use crate::model::ClanhallConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first one.
pub fn validate_config(config: &ClanhallConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.bot.log_level.as_str()) {
        errors.push(ConfigError::validation(
            "bot.log_level",
            format!(
                "must be one of {}, got `{}`",
                LOG_LEVELS.join(", "),
                config.bot.log_level
            ),
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation("storage.database_path", "must not be empty"));
    }

    let api_base = config.discord.api_base.trim();
    if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
        errors.push(ConfigError::validation(
            "discord.api_base",
            format!("must be an http(s) URL, got `{api_base}`"),
        ));
    }

    if config.discord.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "discord.request_timeout_secs",
            "must be at least 1",
        ));
    }

    let writer = &config.writer;
    check_interval(&mut errors, "writer.min_interval_secs", writer.min_interval_secs);
    check_interval(&mut errors, "writer.warmup_secs", writer.warmup_secs);

    for (name, secs) in &writer.operation_min_intervals {
        let key = format!("writer.operation_min_intervals.{name}");
        if Operation::from_str(name).is_err() {
            errors.push(ConfigError::validation(key, "is not a known operation"));
            continue;
        }
        check_interval(&mut errors, &key, *secs);
    }

    for name in &writer.warmup_operations {
        if Operation::from_str(name).is_err() {
            errors.push(ConfigError::validation(
                "writer.warmup_operations",
                format!("contains unknown operation `{name}`"),
            ));
        }
    }

    if writer.restore_limit == 0 {
        errors.push(ConfigError::validation("writer.restore_limit", "must be at least 1"));
    }

    if writer.text_field_limit == 0 || writer.text_total_limit == 0 {
        errors.push(ConfigError::validation(
            "writer.text_field_limit",
            "text limits must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_interval(errors: &mut Vec<ConfigError>, key: &str, secs: f64) {
    let max = MAX_RATE_LIMIT_WAIT.as_secs_f64();
    if !secs.is_finite() || secs < 0.0 {
        errors.push(ConfigError::validation(
            key,
            format!("must be a non-negative number of seconds, got {secs}"),
        ));
    } else if secs > max {
        errors.push(ConfigError::validation(
            key,
            format!("must be at most {max} seconds, got {secs}"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&ClanhallConfig::default()).is_ok());
    }

    #[test]
    fn negative_interval_fails() {
        let mut config = ClanhallConfig::default();
        config.writer.min_interval_secs = -0.1;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("writer.min_interval_secs"));
    }

    #[test]
    fn huge_interval_fails() {
        let mut config = ClanhallConfig::default();
        config.writer.warmup_secs = 1e12;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("writer.warmup_secs"));
    }

    #[test]
    fn unknown_operation_interval_fails() {
        let mut config = ClanhallConfig::default();
        config
            .writer
            .operation_min_intervals
            .insert("send_mesage".into(), 1.0);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors[0].to_string().contains("send_mesage"));
    }

    #[test]
    fn collects_all_errors() {
        let mut config = ClanhallConfig::default();
        config.storage.database_path = "  ".into();
        config.writer.restore_limit = 0;
        config.writer.warmup_operations.push("dance".into());
        config.bot.log_level = "loud".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn api_base_must_be_url() {
        let mut config = ClanhallConfig::default();
        config.discord.api_base = "discord.com".into();
        assert!(validate_config(&config).is_err());
    }
}
