// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Discord REST API.
//!
//! [`DiscordHttpClient`] performs exactly one request per call. It never
//! retries: throttling comes back as [`ClanhallError::RateLimited`] so the
//! dispatch worker can decide what to do with it.

use std::time::Duration;

use async_trait::async_trait;
use clanhall_config::model::DiscordConfig;
use clanhall_core::{
    AdapterType, ApiRequest, ClanhallError, HealthStatus, HttpMethod, PlatformClient,
    PlatformReply, PluginAdapter,
};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::{AUTHORIZATION, HeaderMap};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, Url};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::response::{error_for_status, rate_limit_info};

const AUDIT_LOG_REASON: &str = "X-Audit-Log-Reason";

/// Discord REST client authenticated as a bot.
#[derive(Debug, Clone)]
pub struct DiscordHttpClient {
    client: reqwest::Client,
    base: Url,
    authorization: String,
    timeout: Duration,
}

impl DiscordHttpClient {
    pub fn new(config: &DiscordConfig) -> Result<Self, ClanhallError> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ClanhallError::Config("discord.bot_token is not set".into()))?;
        let base = Url::parse(config.api_base.trim_end_matches('/'))
            .map_err(|e| ClanhallError::Config(format!("invalid discord.api_base: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(ClanhallError::Config(format!(
                "discord.api_base `{}` cannot carry a path",
                config.api_base
            )));
        }

        let timeout = Duration::from_secs(config.request_timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| ClanhallError::Http {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base,
            authorization: format!("Bot {token}"),
            timeout,
        })
    }

    /// Full URL of a request, path segments percent-encoded.
    fn url(&self, request: &ApiRequest) -> Result<Url, ClanhallError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClanhallError::Config("discord.api_base cannot carry a path".into()))?
            .pop_if_empty()
            .extend(request.route.segments());
        let query = request.route.query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn build(&self, request: &ApiRequest) -> Result<reqwest::RequestBuilder, ClanhallError> {
        let method = match request.route.method() {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        };
        let mut builder = self.client.request(method, self.url(request)?);
        if !request.route.is_token_authenticated() {
            builder = builder.header(AUTHORIZATION, &self.authorization);
        }
        if let Some(reason) = request.reason.as_deref().filter(|r| !r.is_empty()) {
            let encoded = utf8_percent_encode(reason, NON_ALPHANUMERIC).to_string();
            builder = builder.header(AUDIT_LOG_REASON, encoded);
        }

        if request.files.is_empty() {
            if let Some(body) = &request.body {
                builder = builder.json(body);
            }
            return Ok(builder);
        }
        Ok(builder.multipart(multipart_form(request)?))
    }
}

/// `payload_json` plus one `files[n]` part per upload, with matching
/// `attachments` entries so Discord can pair them up.
fn multipart_form(request: &ApiRequest) -> Result<Form, ClanhallError> {
    let mut body = match &request.body {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(other) => {
            return Err(ClanhallError::InvalidArgument(format!(
                "uploads need an object body, got {other}"
            )));
        }
    };
    if !body.contains_key("attachments") {
        let attachments: Vec<Value> = request
            .files
            .iter()
            .enumerate()
            .map(|(i, file)| {
                let mut entry = json!({ "id": i, "filename": file.filename });
                if let Some(description) = &file.description {
                    entry["description"] = Value::String(description.clone());
                }
                entry
            })
            .collect();
        body.insert("attachments".into(), Value::Array(attachments));
    }

    let payload_json = Part::text(Value::Object(body).to_string())
        .mime_str("application/json")
        .map_err(|e| ClanhallError::Http {
            message: format!("invalid payload_json part: {e}"),
            source: Some(Box::new(e)),
        })?;
    let mut form = Form::new().part("payload_json", payload_json);
    for (i, file) in request.files.iter().enumerate() {
        let part = Part::bytes(file.bytes.clone()).file_name(file.filename.clone());
        form = form.part(format!("files[{i}]"), part);
    }
    Ok(form)
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> ClanhallError {
    if e.is_timeout() {
        return ClanhallError::Timeout { duration: timeout };
    }
    ClanhallError::Http {
        message: format!("HTTP request failed: {e}"),
        source: Some(Box::new(e)),
    }
}

fn parse_body(bytes: &[u8]) -> Result<Value, ClanhallError> {
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| ClanhallError::Http {
        message: format!("failed to parse response body: {e}"),
        source: Some(Box::new(e)),
    })
}

#[async_trait]
impl PluginAdapter for DiscordHttpClient {
    fn name(&self) -> &str {
        "discord-rest"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Platform
    }

    async fn health_check(&self) -> Result<HealthStatus, ClanhallError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ClanhallError> {
        Ok(())
    }
}

#[async_trait]
impl PlatformClient for DiscordHttpClient {
    async fn request(&self, request: ApiRequest) -> Result<PlatformReply, ClanhallError> {
        let route = request.route.name();
        let response = self
            .build(&request)?
            .send()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;

        let status = response.status().as_u16();
        let headers: HeaderMap = response.headers().clone();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, self.timeout))?;
        debug!(route, status, "discord response");

        if (200..300).contains(&status) {
            return Ok(PlatformReply {
                body: parse_body(&bytes)?,
                rate_limit: rate_limit_info(&headers),
            });
        }

        let err = error_for_status(status, &headers, &bytes);
        if let ClanhallError::RateLimited {
            retry_after,
            global,
            bucket,
        } = &err
        {
            warn!(route, ?retry_after, global, bucket = bucket.as_deref(), "discord throttled the request");
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clanhall_core::{Attachment, Route, Snowflake};
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn test_client(base: &str) -> DiscordHttpClient {
        let config = DiscordConfig {
            bot_token: Some("test-token".into()),
            api_base: format!("{base}/api/v10"),
            request_timeout_secs: 2,
            ..DiscordConfig::default()
        };
        DiscordHttpClient::new(&config).unwrap()
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = DiscordHttpClient::new(&DiscordConfig::default()).unwrap_err();
        assert!(matches!(err, ClanhallError::Config(_)));
    }

    #[tokio::test]
    async fn create_message_sends_bot_auth_and_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/channels/42/messages"))
            .and(header("authorization", "Bot test-token"))
            .and(body_json(json!({"content": "hello"})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "1", "channel_id": "42", "content": "hello"}))
                    .insert_header("X-RateLimit-Bucket", "abc123")
                    .insert_header("X-RateLimit-Remaining", "4")
                    .insert_header("X-RateLimit-Reset-After", "1.5"),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let reply = client
            .request(
                ApiRequest::new(Route::CreateMessage {
                    channel_id: Snowflake(42),
                })
                .body(json!({"content": "hello"})),
            )
            .await
            .unwrap();

        assert_eq!(reply.body["id"], "1");
        let info = reply.rate_limit.unwrap();
        assert_eq!(info.bucket.as_deref(), Some("abc123"));
        assert_eq!(info.remaining, Some(4));
        assert_eq!(info.reset_after, Some(Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn empty_response_is_null() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v10/channels/1/messages/2"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let reply = test_client(&server.uri())
            .request(ApiRequest::new(Route::DeleteMessage {
                channel_id: Snowflake(1),
                message_id: Snowflake(2),
            }))
            .await
            .unwrap();
        assert_eq!(reply.body, Value::Null);
    }

    #[tokio::test]
    async fn throttle_reports_retry_after_and_bucket() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(
                ResponseTemplate::new(429)
                    .set_body_json(json!({"message": "You are being rate limited.", "retry_after": 0.75, "global": false}))
                    .insert_header("X-RateLimit-Bucket", "react"),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri())
            .request(ApiRequest::new(Route::CreateReaction {
                channel_id: Snowflake(1),
                message_id: Snowflake(2),
                emoji: "👍".into(),
            }))
            .await
            .unwrap_err();
        match err {
            ClanhallError::RateLimited {
                retry_after,
                global,
                bucket,
            } => {
                assert_eq!(retry_after, Some(Duration::from_millis(750)));
                assert!(!global);
                assert_eq!(bucket.as_deref(), Some("react"));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn emoji_is_percent_encoded_in_the_path() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v10/channels/1/messages/2/reactions/%F0%9F%91%8D/@me"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        test_client(&server.uri())
            .request(ApiRequest::new(Route::CreateReaction {
                channel_id: Snowflake(1),
                message_id: Snowflake(2),
                emoji: "👍".into(),
            }))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn token_routes_skip_bot_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/webhooks/9/tok"))
            .and(query_param("wait", "true"))
            .respond_with(|req: &Request| {
                if req.headers.contains_key("authorization") {
                    ResponseTemplate::new(401)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!({"id": "5", "channel_id": "6"}))
                }
            })
            .mount(&server)
            .await;

        let reply = test_client(&server.uri())
            .request(
                ApiRequest::new(Route::ExecuteWebhook {
                    webhook_id: Snowflake(9),
                    token: "tok".into(),
                    wait: true,
                })
                .body(json!({"content": "hook"})),
            )
            .await
            .unwrap();
        assert_eq!(reply.body["id"], "5");
    }

    #[tokio::test]
    async fn audit_reason_is_encoded() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(header("X-Audit-Log-Reason", "spam%20%C3%A9"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        test_client(&server.uri())
            .request(
                ApiRequest::new(Route::RemoveGuildMember {
                    guild_id: Snowflake(1),
                    user_id: Snowflake(2),
                })
                .reason(Some("spam é".into())),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn uploads_use_multipart_with_payload_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v10/channels/3/messages"))
            .and(header_exists("content-type"))
            .respond_with(|req: &Request| {
                let body = String::from_utf8_lossy(&req.body);
                let content_type = req
                    .headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                if content_type.starts_with("multipart/form-data")
                    && body.contains("payload_json")
                    && body.contains("filename=\"stats.png\"")
                    && body.contains("\"attachments\"")
                {
                    ResponseTemplate::new(200).set_body_json(json!({"id": "8", "channel_id": "3"}))
                } else {
                    ResponseTemplate::new(400).set_body_json(json!({"code": 50035, "message": "bad form"}))
                }
            })
            .mount(&server)
            .await;

        let reply = test_client(&server.uri())
            .request(
                ApiRequest::new(Route::CreateMessage {
                    channel_id: Snowflake(3),
                })
                .body(json!({"content": "chart"}))
                .files(vec![Attachment::new("stats.png", vec![1u8, 2, 3])]),
            )
            .await
            .unwrap();
        assert_eq!(reply.body["id"], "8");
    }

    #[tokio::test]
    async fn error_statuses_map_to_variants() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/api/v10/channels/1"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({"code": 50013, "message": "Missing Permissions"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v10/channels/2"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"code": 10003, "message": "Unknown Channel"})))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v10/channels/3"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let delete = |id| {
            client.request(ApiRequest::new(Route::DeleteChannel {
                channel_id: Snowflake(id),
            }))
        };

        assert!(matches!(
            delete(1).await.unwrap_err(),
            ClanhallError::Forbidden { code: 50013, .. }
        ));
        assert!(matches!(
            delete(2).await.unwrap_err(),
            ClanhallError::NotFound { code: 10003, .. }
        ));
        assert!(matches!(
            delete(3).await.unwrap_err(),
            ClanhallError::Platform { status: 502, .. }
        ));
    }
}
