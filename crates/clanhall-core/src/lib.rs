// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Clanhall Discord writer.
//!
//! Provides the error type, the shared data model (operations, durable records,
//! embeds, rate-limit headers), REST route definitions, and the adapter traits
//! implemented by the storage backend and the platform client.

pub mod error;
pub mod route;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::ClanhallError;
pub use route::{ApiRequest, HttpMethod, Route, is_token_path};
pub use types::{
    AdapterType, Attachment, Embed, HealthStatus, Message, Operation, PlatformReply,
    MAX_RATE_LIMIT_WAIT, RateLimitInfo, Snowflake, WritePriority, WriteRecord, WriteStatus,
};

pub use traits::{PlatformClient, PluginAdapter, WriteStore};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_construct() {
        let _config = ClanhallError::Config("test".into());
        let _storage = ClanhallError::storage(std::io::Error::other("test"));
        let _codec = ClanhallError::Codec {
            message: "bytes".into(),
        };
        let _http = ClanhallError::Http {
            message: "refused".into(),
            source: None,
        };
        let _timeout = ClanhallError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = ClanhallError::Internal("test".into());
    }

    #[test]
    fn unknown_interaction_detection() {
        let expired = ClanhallError::NotFound {
            code: error::UNKNOWN_INTERACTION_CODE,
            message: "Unknown interaction".into(),
        };
        let missing = ClanhallError::NotFound {
            code: 10008,
            message: "Unknown Message".into(),
        };
        assert!(expired.is_unknown_interaction());
        assert!(!missing.is_unknown_interaction());
        assert!(!missing.is_rate_limited());
    }

    #[test]
    fn rate_limited_display_mentions_retry() {
        let err = ClanhallError::RateLimited {
            retry_after: Some(std::time::Duration::from_millis(2500)),
            global: false,
            bucket: None,
        };
        assert!(err.is_rate_limited());
        assert!(err.to_string().contains("2.5s"));
    }

    #[test]
    fn adapter_type_round_trip() {
        use std::str::FromStr;
        for variant in [AdapterType::Platform, AdapterType::Storage, AdapterType::Writer] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_platform_client<T: PlatformClient>() {}
        fn _assert_write_store<T: WriteStore>() {}
    }
}
