// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `clanhall serve` and the writer wiring shared by every command.

use std::sync::Arc;
use std::time::Duration;

use clanhall_config::ClanhallConfig;
use clanhall_core::{ClanhallError, PlatformClient, WriteStore};
use clanhall_discord::DiscordHttpClient;
use clanhall_storage::SqliteWriteStore;
use clanhall_writer::{
    CoordinatorSettings, DirectWriter, DiscordWriter, FallbackWriter, TextLimits,
    WriteCoordinator,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::shutdown;

const STATS_INTERVAL: Duration = Duration::from_secs(300);

/// The writer callers use, plus the coordinator behind it when there is one.
pub struct WriterStack {
    pub writer: Arc<dyn DiscordWriter>,
    pub coordinator: Option<Arc<WriteCoordinator>>,
    pub store: Option<Arc<SqliteWriteStore>>,
}

impl WriterStack {
    pub async fn shutdown(&self) {
        if let Some(coordinator) = &self.coordinator {
            coordinator.shutdown().await;
        }
    }
}

/// Wire the write path from configuration.
///
/// A store that fails to open leaves the coordinator running without
/// durability; a coordinator that fails to start leaves only the fallback.
pub async fn build_writer(
    config: &ClanhallConfig,
    platform: Arc<dyn PlatformClient>,
    cancel: CancellationToken,
) -> WriterStack {
    let limits = TextLimits::from_config(&config.writer);
    let direct = DirectWriter::new(platform.clone(), limits);

    if !config.writer.enabled {
        info!("write coordinator disabled, writes go straight to Discord");
        return WriterStack {
            writer: Arc::new(direct),
            coordinator: None,
            store: None,
        };
    }

    let store = match SqliteWriteStore::open(config.storage.clone()).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            error!(error = %e, path = %config.storage.database_path, "cannot open the write queue; writes will not survive a restart");
            None
        }
    };
    let dyn_store = store.clone().map(|s| s as Arc<dyn WriteStore>);

    let settings = CoordinatorSettings::from_config(&config.writer);
    let writer = match WriteCoordinator::start(platform, dyn_store, settings, cancel).await {
        Ok(coordinator) => {
            let coordinator = Arc::new(coordinator);
            info!(
                restored = coordinator.restored(),
                min_interval = ?config.writer.min_interval(),
                fallback = ?config.writer.fallback,
                "write coordinator started"
            );
            return WriterStack {
                writer: Arc::new(FallbackWriter::new(coordinator.clone(), direct, config.writer.fallback)),
                coordinator: Some(coordinator),
                store,
            };
        }
        Err(e) => {
            error!(error = %e, "write coordinator failed to start");
            FallbackWriter::without_coordinator(direct, config.writer.fallback)
        }
    };
    WriterStack {
        writer: Arc::new(writer),
        coordinator: None,
        store,
    }
}

/// Run the writer until SIGINT or SIGTERM.
pub async fn run_serve(config: ClanhallConfig) -> Result<(), ClanhallError> {
    init_tracing(&config.bot.log_level);
    info!(name = %config.bot.name, "clanhall serve starting");

    let platform: Arc<dyn PlatformClient> = Arc::new(DiscordHttpClient::new(&config.discord)?);
    let cancel = shutdown::install_signal_handler();
    let stack = build_writer(&config, platform, cancel.clone()).await;

    let mut ticker = tokio::time::interval(STATS_INTERVAL);
    // The first tick fires immediately.
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => log_queue_stats(stack.store.as_deref()).await,
        }
    }

    stack.shutdown().await;
    info!("clanhall serve shutdown complete");
    Ok(())
}

async fn log_queue_stats(store: Option<&SqliteWriteStore>) {
    let Some(store) = store else {
        return;
    };
    match store.stats().await {
        Ok(stats) if stats.pending > 0 => {
            info!(pending = stats.pending, done = stats.done, failed = stats.failed, "write queue")
        }
        Ok(stats) => debug!(done = stats.done, failed = stats.failed, "write queue idle"),
        Err(e) => warn!(error = %e, "cannot read write queue stats"),
    }
}

/// Initializes the tracing subscriber with the given log level.
pub(crate) fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("clanhall={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
