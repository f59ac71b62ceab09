// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response interpretation: rate-limit headers and error bodies.

use std::time::Duration;

use clanhall_core::{ClanhallError, MAX_RATE_LIMIT_WAIT, RateLimitInfo};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;

/// Discord's JSON error envelope. Every field is optional in practice.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: u64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    retry_after: Option<f64>,
    #[serde(default)]
    global: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn header_f64(headers: &HeaderMap, name: &str) -> Option<f64> {
    header_str(headers, name)?.parse().ok()
}

fn secs(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value)
        .ok()
        .map(|d| d.min(MAX_RATE_LIMIT_WAIT))
}

/// `X-RateLimit-*` headers, if the response carried any.
pub fn rate_limit_info(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let info = RateLimitInfo {
        bucket: header_str(headers, "x-ratelimit-bucket").map(str::to_string),
        limit: header_str(headers, "x-ratelimit-limit").and_then(|v| v.parse().ok()),
        remaining: header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse().ok()),
        reset_after: header_f64(headers, "x-ratelimit-reset-after").and_then(secs),
        reset_at: header_f64(headers, "x-ratelimit-reset"),
    };
    (info != RateLimitInfo::default()).then_some(info)
}

/// Map a non-success response onto the matching error.
pub fn error_for_status(status: u16, headers: &HeaderMap, body: &[u8]) -> ClanhallError {
    let parsed: ErrorBody = serde_json::from_slice(body).unwrap_or_default();
    let message = if parsed.message.is_empty() {
        String::from_utf8_lossy(body).trim().to_string()
    } else {
        parsed.message
    };
    let code = parsed.code;

    match status {
        429 => {
            let retry_after = parsed
                .retry_after
                .or_else(|| header_f64(headers, RETRY_AFTER.as_str()))
                .and_then(secs);
            let global = parsed.global
                || header_str(headers, "x-ratelimit-global").is_some_and(|v| v.eq_ignore_ascii_case("true"))
                || header_str(headers, "x-ratelimit-scope") == Some("global");
            ClanhallError::RateLimited {
                retry_after,
                global,
                bucket: header_str(headers, "x-ratelimit-bucket").map(str::to_string),
            }
        }
        400 => ClanhallError::Validation { code, message },
        403 => ClanhallError::Forbidden { code, message },
        404 => ClanhallError::NotFound { code, message },
        _ => ClanhallError::Platform {
            status,
            code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn no_headers_no_info() {
        assert_eq!(rate_limit_info(&HeaderMap::new()), None);
    }

    #[test]
    fn reset_headers_parse() {
        let info = rate_limit_info(&headers(&[
            ("x-ratelimit-limit", "5"),
            ("x-ratelimit-remaining", "0"),
            ("x-ratelimit-reset", "1700000000.25"),
            ("x-ratelimit-reset-after", "0.25"),
        ]))
        .unwrap();
        assert_eq!(info.limit, Some(5));
        assert_eq!(info.remaining, Some(0));
        assert_eq!(info.reset_at, Some(1_700_000_000.25));
        assert_eq!(info.reset_after, Some(Duration::from_millis(250)));
        assert_eq!(info.bucket, None);
    }

    #[test]
    fn absurd_waits_are_capped() {
        let err = error_for_status(429, &HeaderMap::new(), br#"{"retry_after": 1e300}"#);
        match err {
            ClanhallError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(MAX_RATE_LIMIT_WAIT));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        let info = rate_limit_info(&headers(&[("x-ratelimit-reset-after", "99999999999999")])).unwrap();
        assert_eq!(info.reset_after, Some(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn throttle_falls_back_to_retry_after_header() {
        let err = error_for_status(
            429,
            &headers(&[("retry-after", "3"), ("x-ratelimit-scope", "global")]),
            b"",
        );
        match err {
            ClanhallError::RateLimited { retry_after, global, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(3)));
                assert!(global);
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[test]
    fn unknown_interaction_keeps_its_code() {
        let err = error_for_status(
            404,
            &HeaderMap::new(),
            br#"{"code": 10062, "message": "Unknown interaction"}"#,
        );
        assert!(err.is_unknown_interaction());
    }

    #[test]
    fn non_json_body_becomes_the_message() {
        let err = error_for_status(400, &HeaderMap::new(), b"  nope ");
        assert!(matches!(err, ClanhallError::Validation { code: 0, ref message } if message == "nope"));
    }
}
