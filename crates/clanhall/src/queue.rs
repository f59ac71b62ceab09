// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `clanhall queue`: operator view of the durable write queue.

use clanhall_config::ClanhallConfig;
use clanhall_core::{ClanhallError, WriteRecord, WriteStore};
use clanhall_storage::SqliteWriteStore;

use crate::QueueAction;

pub async fn run_queue(config: &ClanhallConfig, action: QueueAction) -> Result<(), ClanhallError> {
    let store = SqliteWriteStore::open(config.storage.clone()).await?;

    match action {
        QueueAction::Stats { json } => {
            let stats = store.stats().await?;
            if json {
                let rendered = serde_json::to_string(&stats)
                    .map_err(|e| ClanhallError::Internal(format!("cannot render stats: {e}")))?;
                println!("{rendered}");
            } else {
                println!(
                    "pending: {}\ndone:    {}\nfailed:  {}",
                    stats.pending, stats.done, stats.failed
                );
            }
        }
        QueueAction::Pending { limit } => print_records(&store.fetch_pending(0, limit).await?),
        QueueAction::Failed { limit } => print_records(&store.recent_failed(limit).await?),
        QueueAction::Clear { yes } => {
            if !yes {
                return Err(ClanhallError::InvalidArgument(
                    "refusing to clear pending writes without --yes".into(),
                ));
            }
            let removed = store.clear_pending().await?;
            println!("removed {removed} pending write(s)");
        }
    }
    Ok(())
}

fn print_records(records: &[WriteRecord]) {
    if records.is_empty() {
        println!("(none)");
        return;
    }
    for record in records {
        let reason = record.failure_reason.as_deref().unwrap_or("");
        println!(
            "{:>6}  {:<26} attempts={:<3} {}  {}",
            record.id, record.operation, record.attempts, record.created_at, reason
        );
    }
}
