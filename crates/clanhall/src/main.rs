// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Clanhall - durable, rate-limited Discord writes.
//!
//! This is the binary entry point: the long-running writer service plus
//! operator commands for the durable queue.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod queue;
mod send;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clanhall_config::ClanhallConfig;

/// Clanhall - durable, rate-limited Discord writes.
#[derive(Parser, Debug)]
#[command(name = "clanhall", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG lookup.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the write coordinator until interrupted.
    Serve,
    /// Send one message through the write path.
    Send {
        /// Target channel id.
        #[arg(long)]
        channel: u64,
        text: String,
    },
    /// Inspect or clear the durable write queue.
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
    /// Validate the configuration and print the effective values.
    Config,
}

#[derive(Subcommand, Debug)]
enum QueueAction {
    /// Record counts per status.
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Writes waiting to be dispatched, oldest first.
    Pending {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Most recent failed writes.
    Failed {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Drop every pending write.
    Clear {
        /// Required: clearing cannot be undone.
        #[arg(long)]
        yes: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> ClanhallConfig {
    let loaded = match path {
        Some(path) => clanhall_config::load_and_validate_path(path),
        None => clanhall_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            clanhall_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref());

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Send { channel, text }) => send::run_send(config, channel, text).await,
        Some(Commands::Queue { action }) => queue::run_queue(&config, action).await,
        Some(Commands::Config) => print_config(&config),
        None => {
            println!("clanhall: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("clanhall: {e}");
        std::process::exit(1);
    }
}

/// Effective configuration as JSON, with the bot token masked.
fn print_config(config: &ClanhallConfig) -> Result<(), clanhall_core::ClanhallError> {
    let mut shown = config.clone();
    if shown.discord.bot_token.is_some() {
        shown.discord.bot_token = Some("********".into());
    }
    let rendered = serde_json::to_string_pretty(&shown)
        .map_err(|e| clanhall_core::ClanhallError::Internal(format!("cannot render config: {e}")))?;
    println!("{rendered}");
    Ok(())
}
