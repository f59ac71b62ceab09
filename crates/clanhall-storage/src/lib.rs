// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite durable queue store for the Clanhall Discord writer.
//!
//! WAL-mode SQLite with embedded migrations and a single-writer connection via
//! `tokio-rusqlite`. Holds the outbound write queue plus the rate limiter's
//! clock and learned buckets.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteWriteStore;
pub use database::Database;
