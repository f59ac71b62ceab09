// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock Discord REST client for deterministic testing.
//!
//! `MockPlatform` implements `PlatformClient`. Each call pops the next
//! scripted outcome; with none scripted it answers with a canned body for the
//! route, or a plausible message object for message-creating routes. Every
//! call is recorded with its start and end instants for pacing assertions.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clanhall_core::traits::adapter::PluginAdapter;
use clanhall_core::traits::platform::PlatformClient;
use clanhall_core::types::{AdapterType, HealthStatus, PlatformReply};
use clanhall_core::{ApiRequest, ClanhallError, Route};
use serde_json::{Value, json};
use tokio::time::Instant;

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: ApiRequest,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct State {
    calls: Vec<RecordedCall>,
    outcomes: VecDeque<Result<PlatformReply, ClanhallError>>,
    responses: HashMap<String, Value>,
}

pub struct MockPlatform {
    state: Mutex<State>,
    latency: Duration,
    next_id: AtomicU64,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            latency: Duration::ZERO,
            next_id: AtomicU64::new(1000),
        }
    }

    /// Every call takes `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // A panicking test thread must not hide the calls recorded so far.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Default body for a route, by [`Route::name`].
    pub fn respond_to(&self, route_name: &str, body: Value) {
        self.state().responses.insert(route_name.to_string(), body);
    }

    /// Script the next call's outcome.
    pub fn push_outcome(&self, outcome: Result<PlatformReply, ClanhallError>) {
        self.state().outcomes.push_back(outcome);
    }

    pub fn fail_next(&self, error: ClanhallError) {
        self.push_outcome(Err(error));
    }

    /// The next call answers 429 with the given retry-after.
    pub fn throttle_next(&self, retry_after: Duration) {
        self.fail_next(ClanhallError::RateLimited {
            retry_after: Some(retry_after),
            global: false,
            bucket: None,
        });
    }

    pub fn reply_next(&self, reply: PlatformReply) {
        self.push_outcome(Ok(reply));
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.state().calls.iter().map(|c| c.request.clone()).collect()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state().calls.len()
    }

    pub fn clear_requests(&self) {
        self.state().calls.clear();
    }

    fn default_body(&self, request: &ApiRequest) -> Value {
        let channel_id = match &request.route {
            Route::CreateMessage { channel_id } | Route::EditMessage { channel_id, .. } => {
                Some(channel_id.to_string())
            }
            Route::CreateFollowupMessage { .. } | Route::ExecuteWebhook { .. } => {
                Some("1".to_string())
            }
            _ => None,
        };
        match channel_id {
            Some(channel_id) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let content = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("content"))
                    .cloned()
                    .unwrap_or(Value::String(String::new()));
                json!({ "id": id.to_string(), "channel_id": channel_id, "content": content })
            }
            None => Value::Null,
        }
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockPlatform {
    fn name(&self) -> &str {
        "mock-platform"
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
impl PlatformClient for MockPlatform {
    async fn request(&self, request: ApiRequest) -> Result<PlatformReply, ClanhallError> {
        let started = Instant::now();
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let finished = Instant::now();

        let scripted = self.state().outcomes.pop_front();
        let outcome = match scripted {
            Some(outcome) => outcome,
            None => {
                let canned = self.state().responses.get(request.route.name()).cloned();
                let body = canned.unwrap_or_else(|| self.default_body(&request));
                Ok(PlatformReply::new(body))
            }
        };
        self.state().calls.push(RecordedCall {
            request,
            started,
            finished,
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clanhall_core::Snowflake;

    #[tokio::test]
    async fn scripted_outcomes_come_first() {
        let platform = MockPlatform::new();
        platform.throttle_next(Duration::from_secs(1));
        let route = Route::CreateMessage {
            channel_id: Snowflake(5),
        };

        let first = platform.request(ApiRequest::new(route.clone())).await;
        assert!(first.unwrap_err().is_rate_limited());

        let second = platform
            .request(ApiRequest::new(route).body(json!({"content": "hi"})))
            .await
            .unwrap();
        assert_eq!(second.body["channel_id"], "5");
        assert_eq!(second.body["content"], "hi");
        assert_eq!(platform.call_count(), 2);
    }

    #[tokio::test]
    async fn canned_responses_by_route_name() {
        let platform = MockPlatform::new();
        platform.respond_to("create_dm", json!({"id": "77"}));
        let reply = platform.request(ApiRequest::new(Route::CreateDm)).await.unwrap();
        assert_eq!(reply.body["id"], "77");
    }

    #[tokio::test(start_paused = true)]
    async fn latency_is_recorded() {
        let platform = MockPlatform::new().with_latency(Duration::from_millis(250));
        platform
            .request(ApiRequest::new(Route::DeleteChannel {
                channel_id: Snowflake(1),
            }))
            .await
            .unwrap();
        let call = &platform.calls()[0];
        assert_eq!(call.finished - call.started, Duration::from_millis(250));
    }
}
