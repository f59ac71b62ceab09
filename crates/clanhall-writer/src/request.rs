// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Write requests as they move from callers, through the queue, to dispatch.

use clanhall_core::{ClanhallError, Operation, WritePriority, is_token_path};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::bucket;
use crate::payload::{Payload, PayloadValue};

pub type WriteResult = Result<Value, ClanhallError>;

/// A write as the facade hands it to the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedWrite {
    pub operation: Operation,
    pub payload: Payload,
    /// Whether to keep a durable record. Ignored when the payload has no
    /// persisted form.
    pub persist: bool,
    pub priority: WritePriority,
}

impl PreparedWrite {
    /// Durable by default, except for token-bearing operations and uploads.
    pub fn new(operation: Operation, payload: Payload) -> Self {
        let has_files = payload.values().any(PayloadValue::contains_attachment);
        let token_path = operation == Operation::HttpRequest
            && matches!(payload.get("path"), Some(PayloadValue::Text(path)) if is_token_path(path));
        Self {
            operation,
            persist: !operation.carries_token() && !has_files && !token_path,
            payload,
            priority: WritePriority::Normal,
        }
    }

    pub fn ephemeral(mut self) -> Self {
        self.persist = false;
        self
    }

    pub fn priority(mut self, priority: WritePriority) -> Self {
        self.priority = priority;
        self
    }
}

/// A queued write.
#[derive(Debug)]
pub struct WriteRequest {
    pub operation: Operation,
    pub payload: Payload,
    pub priority: WritePriority,
    /// Durable record id, when one was written.
    pub durable_id: Option<i64>,
    /// Throttled attempts so far.
    pub attempts: u32,
    route_key: String,
    /// Absent for writes replayed after a restart.
    pending_result: Option<oneshot::Sender<WriteResult>>,
}

impl WriteRequest {
    pub fn new(
        operation: Operation,
        payload: Payload,
        priority: WritePriority,
        durable_id: Option<i64>,
        pending_result: Option<oneshot::Sender<WriteResult>>,
    ) -> Self {
        let route_key = bucket::route_key(operation, &payload);
        Self {
            operation,
            payload,
            priority,
            durable_id,
            attempts: 0,
            route_key,
            pending_result,
        }
    }

    pub fn route_key(&self) -> &str {
        &self.route_key
    }

    /// Deliver the outcome. Only the first call has any effect.
    pub fn resolve(&mut self, result: WriteResult) {
        if let Some(tx) = self.pending_result.take() {
            // The caller may have stopped waiting.
            let _ = tx.send(result);
        }
    }

    pub(crate) fn into_prepared(self) -> PreparedWrite {
        PreparedWrite {
            operation: self.operation,
            payload: self.payload,
            persist: self.durable_id.is_some(),
            priority: self.priority,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::payload;
    use clanhall_core::{Attachment, Snowflake};

    #[test]
    fn durability_defaults() {
        let plain = PreparedWrite::new(
            Operation::SendMessage,
            payload([("channel_id", Snowflake(1).into())]),
        );
        assert!(plain.persist);

        let upload = PreparedWrite::new(
            Operation::SendMessage,
            payload([("files", vec![Attachment::new("a.png", vec![1, 2])].into())]),
        );
        assert!(!upload.persist);

        let token = PreparedWrite::new(Operation::InteractionFollowup, Payload::new());
        assert!(!token.persist);

        let custom = |path: &str| {
            PreparedWrite::new(
                Operation::HttpRequest,
                payload([("method", "POST".into()), ("path", path.into())]),
            )
        };
        assert!(custom("/guilds/1/emojis").persist);
        assert!(!custom("/webhooks/4/secret").persist);
        assert!(!plain.clone().ephemeral().persist);
    }

    #[tokio::test]
    async fn resolve_delivers_once() {
        let (tx, rx) = oneshot::channel();
        let mut req = WriteRequest::new(
            Operation::DeleteMessage,
            payload([("channel_id", Snowflake(9).into())]),
            WritePriority::Normal,
            None,
            Some(tx),
        );
        assert_eq!(req.route_key(), "delete_message|channel_id:9");
        assert!(req.pending_result.is_some());
        req.resolve(Ok(Value::Bool(true)));
        req.resolve(Ok(Value::Bool(false)));
        assert_eq!(rx.await.unwrap().unwrap(), Value::Bool(true));
        assert!(req.pending_result.is_none());
    }
}
