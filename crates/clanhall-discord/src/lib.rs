// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord REST client for the Clanhall writer.
//!
//! Implements `PlatformClient` over `reqwest`: bot authentication, audit-log
//! reasons, multipart uploads, rate-limit header parsing and the mapping of
//! error statuses onto `ClanhallError`.

pub mod client;
pub mod response;

pub use client::DiscordHttpClient;
