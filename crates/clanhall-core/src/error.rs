// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Clanhall Discord writer.

use std::time::Duration;

use thiserror::Error;

/// Discord JSON error code for an interaction token that expired or was already used.
pub const UNKNOWN_INTERACTION_CODE: u64 = 10062;

/// The primary error type used across all Clanhall adapter traits and core operations.
///
/// Platform failures keep the shape a direct REST call would produce, so a caller
/// cannot tell whether its write went through the queue or straight to Discord.
#[derive(Debug, Error)]
pub enum ClanhallError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, migration).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A payload could not be encoded to, or decoded from, its persisted JSON form.
    #[error("codec error: {message}")]
    Codec { message: String },

    /// HTTP 429. Always retried by the dispatch worker, never surfaced through the queue.
    #[error("rate limited (global: {global}, retry after {retry_after:?})")]
    RateLimited {
        retry_after: Option<Duration>,
        global: bool,
        bucket: Option<String>,
    },

    /// HTTP 403: missing permissions or access.
    #[error("forbidden ({code}): {message}")]
    Forbidden { code: u64, message: String },

    /// HTTP 404: the target channel, message, member or interaction does not exist.
    #[error("not found ({code}): {message}")]
    NotFound { code: u64, message: String },

    /// HTTP 400: the request body was rejected.
    #[error("invalid request ({code}): {message}")]
    Validation { code: u64, message: String },

    /// Any other non-success platform response.
    #[error("platform error {status} ({code}): {message}")]
    Platform {
        status: u16,
        code: u64,
        message: String,
    },

    /// Transport failures (connection refused, TLS, body decoding).
    #[error("http error: {message}")]
    Http {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller passed arguments that cannot form a valid request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The write coordinator refused the write before queueing it.
    #[error("writer unavailable: {0}")]
    WriterUnavailable(String),

    /// The writer stopped after accepting the write but before dispatching it.
    /// Durable writes resume on the next start.
    #[error("write abandoned at shutdown (durable: {durable})")]
    Abandoned { durable: bool },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClanhallError {
    /// Wraps any error as a storage failure.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    /// Returns true for throttling responses.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns true when Discord reported an expired or unknown interaction token.
    pub fn is_unknown_interaction(&self) -> bool {
        matches!(
            self,
            Self::NotFound {
                code: UNKNOWN_INTERACTION_CODE,
                ..
            }
        )
    }
}
