// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests: configuration, the real REST client against a mock
//! Discord server, the SQLite queue and the `clanhall` binary itself.

use std::process::Command;
use std::sync::Arc;

use clanhall_config::ClanhallConfig;
use clanhall_core::{ClanhallError, PlatformClient, Snowflake, WriteStatus, WriteStore};
use clanhall_discord::DiscordHttpClient;
use clanhall_storage::SqliteWriteStore;
use clanhall_writer::{
    CoordinatorSettings, DirectWriter, DiscordWriter, FallbackWriter, MessageTarget,
    OutgoingMessage, TextLimits, WriteCoordinator,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn config_for(server: &MockServer, db: &std::path::Path, extra: &str) -> ClanhallConfig {
    let toml = format!(
        r#"
[discord]
bot_token = "e2e-token"
api_base = "{}/api/v10"

[storage]
database_path = "{}"

[writer]
min_interval_secs = 0.05
warmup_secs = 0.0
{extra}
"#,
        server.uri(),
        db.display()
    );
    clanhall_config::load_and_validate_str(&toml).unwrap()
}

struct Stack {
    writer: FallbackWriter,
    coordinator: Arc<WriteCoordinator>,
    store: Arc<SqliteWriteStore>,
}

async fn stack(config: &ClanhallConfig) -> Stack {
    let platform: Arc<dyn PlatformClient> = Arc::new(DiscordHttpClient::new(&config.discord).unwrap());
    let store = Arc::new(SqliteWriteStore::open(config.storage.clone()).await.unwrap());
    let coordinator = Arc::new(
        WriteCoordinator::start(
            platform.clone(),
            Some(store.clone()),
            CoordinatorSettings::from_config(&config.writer),
            CancellationToken::new(),
        )
        .await
        .unwrap(),
    );
    let direct = DirectWriter::new(platform, TextLimits::from_config(&config.writer));
    Stack {
        writer: FallbackWriter::new(coordinator.clone(), direct, config.writer.fallback),
        coordinator,
        store,
    }
}

fn echo_message(req: &Request) -> ResponseTemplate {
    let body: serde_json::Value = serde_json::from_slice(&req.body).unwrap_or_default();
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "900",
        "channel_id": "10",
        "content": body["content"],
    }))
}

// ---- delivery through the full stack ----

#[tokio::test]
async fn messages_reach_discord_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/10/messages"))
        .respond_with(echo_message)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir.path().join("q.db"), "");
    let stack = stack(&config).await;

    for text in ["one", "two", "three"] {
        let message = stack
            .writer
            .send_message(MessageTarget::Channel(Snowflake(10)), Some(text.into()), OutgoingMessage::new())
            .await
            .unwrap();
        assert_eq!(message.content, text);
    }

    let received = server.received_requests().await.unwrap();
    let contents: Vec<String> = received
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["content"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(contents, ["one", "two", "three"]);
    assert_eq!(stack.store.stats().await.unwrap().done, 3);
    stack.coordinator.shutdown().await;
}

#[tokio::test]
async fn discord_throttle_is_retried_transparently() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/10/messages"))
        .respond_with(
            ResponseTemplate::new(429)
                .set_body_json(json!({"message": "You are being rate limited.", "retry_after": 0.2, "global": false})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v10/channels/10/messages"))
        .respond_with(echo_message)
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir.path().join("q.db"), "");
    let stack = stack(&config).await;

    let started = std::time::Instant::now();
    let message = stack
        .writer
        .send_message(MessageTarget::Channel(Snowflake(10)), Some("patient".into()), OutgoingMessage::new())
        .await
        .unwrap();

    assert_eq!(message.content, "patient");
    assert!(started.elapsed() >= std::time::Duration::from_millis(200));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let record = stack.store.get(1).await.unwrap().unwrap();
    assert_eq!(record.status, WriteStatus::Done);
    assert_eq!(record.attempts, 1);
    stack.coordinator.shutdown().await;
}

#[tokio::test]
async fn permission_errors_reach_the_caller_and_the_queue() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"code": 50013, "message": "Missing Permissions"})),
        )
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir.path().join("q.db"), "");
    let stack = stack(&config).await;

    let err = stack
        .writer
        .delete_channel(Snowflake(5), Some("cleanup"))
        .await
        .unwrap_err();
    assert!(matches!(err, ClanhallError::Forbidden { code: 50013, .. }));

    let failed = stack.store.recent_failed(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].operation, "delete_channel");
    stack.coordinator.shutdown().await;
}

#[tokio::test]
async fn error_fallback_mode_from_config() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir.path().join("q.db"), "fallback = \"error\"");
    let stack = stack(&config).await;
    stack.coordinator.shutdown().await;

    let err = stack
        .writer
        .add_reaction(Snowflake(1), Snowflake(2), "🔥")
        .await
        .unwrap_err();
    assert!(matches!(err, ClanhallError::WriterUnavailable(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ---- the binary ----

fn clanhall(config: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_clanhall"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap()
}

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("clanhall.toml");
    let toml = format!(
        "[discord]\nbot_token = \"very-secret\"\n\n[storage]\ndatabase_path = \"{}\"\n",
        dir.join("queue.db").display()
    );
    std::fs::write(&path, toml).unwrap();
    path
}

#[tokio::test]
async fn queue_commands_operate_on_the_configured_database() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    {
        let config = clanhall_config::load_and_validate_path(&config_path).unwrap();
        let store = SqliteWriteStore::open(config.storage).await.unwrap();
        store
            .enqueue(clanhall_core::Operation::SendMessage, "{}", clanhall_core::WritePriority::Normal)
            .await
            .unwrap();
    }

    let stats = clanhall(&config_path, &["queue", "stats", "--json"]);
    assert!(stats.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&stats.stdout).unwrap();
    assert_eq!(stats["pending"], 1);

    let refused = clanhall(&config_path, &["queue", "clear"]);
    assert!(!refused.status.success());

    let cleared = clanhall(&config_path, &["queue", "clear", "--yes"]);
    assert!(cleared.status.success());
    assert!(String::from_utf8_lossy(&cleared.stdout).contains("removed 1"));
}

#[test]
fn config_command_masks_the_token() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let output = clanhall(&config_path, &["config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("very-secret"));
    assert!(stdout.contains("min_interval_secs"));
}

#[test]
fn invalid_config_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[writer]\nmin_interval_secs = -1.0\n").unwrap();

    let output = clanhall(&path, &["config"]);
    assert!(!output.status.success());
}
