// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Clanhall integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without a Discord connection.
//!
//! # Components
//!
//! - [`MockPlatform`] - Scripted Discord REST client that records every call
//! - [`MemoryWriteStore`] - In-memory durable queue with failure injection
//! - [`TestHarness`] - Mock platform plus a SQLite store in a temp directory

pub mod harness;
pub mod memory_store;
pub mod mock_platform;

pub use harness::TestHarness;
pub use memory_store::MemoryWriteStore;
pub use mock_platform::{MockPlatform, RecordedCall};
