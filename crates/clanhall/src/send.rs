// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `clanhall send`: one message through the configured write path.
//!
//! Pending writes left by a previous run are delivered first, since the
//! coordinator replays them on start.

use std::sync::Arc;

use clanhall_config::ClanhallConfig;
use clanhall_core::{ClanhallError, PlatformClient, Snowflake};
use clanhall_discord::DiscordHttpClient;
use clanhall_writer::{MessageTarget, OutgoingMessage};
use tokio_util::sync::CancellationToken;

use crate::serve::{build_writer, init_tracing};

pub async fn run_send(config: ClanhallConfig, channel: u64, text: String) -> Result<(), ClanhallError> {
    init_tracing(&config.bot.log_level);
    if text.trim().is_empty() {
        return Err(ClanhallError::InvalidArgument("message text is empty".into()));
    }

    let platform: Arc<dyn PlatformClient> = Arc::new(DiscordHttpClient::new(&config.discord)?);
    let stack = build_writer(&config, platform, CancellationToken::new()).await;

    let result = stack
        .writer
        .send_message(
            MessageTarget::Channel(Snowflake(channel)),
            Some(text),
            OutgoingMessage::new(),
        )
        .await;
    stack.shutdown().await;

    let message = result?;
    println!("sent message {} to channel {}", message.id, message.channel_id);
    Ok(())
}
