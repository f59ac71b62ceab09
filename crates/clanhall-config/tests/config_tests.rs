// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the Clanhall configuration system.

use std::io::Write;

use clanhall_config::diagnostic::ConfigError;
use clanhall_config::model::{ClanhallConfig, FallbackMode};
use clanhall_config::{load_and_validate_path, load_and_validate_str, load_config_from_str};

/// Valid TOML with all sections deserializes successfully.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[bot]
name = "clan-bot"
log_level = "debug"

[discord]
bot_token = "MTIz.abc.def"
api_base = "http://127.0.0.1:9000/api/v10"
request_timeout_secs = 10

[storage]
database_path = "/tmp/clanhall-test.db"
wal_mode = false

[writer]
enabled = true
min_interval_secs = 0.25
warmup_secs = 2.0
warmup_operations = ["add_reaction"]
restore_limit = 50
fallback = "error"
urgent_moderation = true
persist_limiter_state = false
text_field_limit = 2000
text_total_limit = 3000

[writer.operation_min_intervals]
ban_member = 3.0
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.bot.name, "clan-bot");
    assert_eq!(config.discord.bot_token.as_deref(), Some("MTIz.abc.def"));
    assert_eq!(config.discord.request_timeout_secs, 10);
    assert!(!config.storage.wal_mode);
    assert_eq!(config.writer.min_interval_secs, 0.25);
    assert_eq!(config.writer.warmup_operations, vec!["add_reaction"]);
    assert_eq!(config.writer.restore_limit, 50);
    assert_eq!(config.writer.fallback, FallbackMode::Error);
    assert!(config.writer.urgent_moderation);
    assert!(!config.writer.persist_limiter_state);
    assert_eq!(config.writer.operation_min_intervals.get("ban_member"), Some(&3.0));
    assert_eq!(config.writer.operation_min_intervals.get("send_message"), Some(&1.1));
}

#[test]
fn empty_toml_gives_defaults() {
    let config = load_config_from_str("").unwrap();
    let defaults = ClanhallConfig::default();
    assert_eq!(config.writer.min_interval_secs, defaults.writer.min_interval_secs);
    assert_eq!(config.discord.api_base, "https://discord.com/api/v10");
    assert_eq!(config.bot.log_level, "info");
}

#[test]
fn unknown_writer_key_gets_suggestion() {
    let toml = r#"
[writer]
restore_limt = 10
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "restore_limt");
            assert_eq!(suggestion.as_deref(), Some("restore_limit"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telegram]\nbot_token = \"x\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[writer]\nmin_interval_secs = \"fast\"\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::InvalidType { .. }));
}

#[test]
fn unknown_fallback_mode_is_reported() {
    let errors = load_and_validate_str("[writer]\nfallback = \"retry\"\n").unwrap_err();
    assert!(
        matches!(errors[0], ConfigError::InvalidValue { .. } | ConfigError::Other(_)),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn semantic_errors_come_from_validation() {
    let toml = r#"
[writer]
min_interval_secs = -1.0
warmup_operations = ["not_an_op"]
"#;
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| matches!(e, ConfigError::Validation { .. })));
}

#[test]
fn explicit_path_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[storage]\ndatabase_path = \"/var/lib/clanhall/queue.db\"").unwrap();
    let config = load_and_validate_path(file.path()).unwrap();
    assert_eq!(config.storage.database_path, "/var/lib/clanhall/queue.db");
}

#[test]
fn serialized_defaults_round_trip_through_toml() {
    let rendered = toml::to_string(&ClanhallConfig::default()).unwrap();
    let config = load_and_validate_str(&rendered).expect("defaults should validate");
    assert_eq!(config.writer.warmup_operations.len(), 4);
}
