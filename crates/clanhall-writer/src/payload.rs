// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory request payloads.
//!
//! A payload is an ordered map of [`PayloadValue`]s: target identifiers, the
//! message body, role lists, timestamps. Rich values (embeds, timestamps,
//! durations, uploads) stay typed until the codec or the dispatcher needs JSON.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clanhall_core::{Attachment, ClanhallError, Embed, Snowflake};

pub type Payload = BTreeMap<String, PayloadValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum PayloadValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<PayloadValue>),
    Map(Payload),
    Embed(Embed),
    DateTime(DateTime<Utc>),
    Duration(Duration),
    /// Upload bytes. Never persisted.
    Attachment(Attachment),
}

impl PayloadValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PayloadValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PayloadValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Snowflakes are stored as text but numbers are accepted too.
    pub fn as_snowflake(&self) -> Option<Snowflake> {
        match self {
            PayloadValue::Text(s) => s.parse().ok(),
            PayloadValue::Int(n) => u64::try_from(*n).ok().map(Snowflake),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[PayloadValue]> {
        match self {
            PayloadValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Payload> {
        match self {
            PayloadValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// True if this value or anything nested in it is an upload.
    pub fn contains_attachment(&self) -> bool {
        match self {
            PayloadValue::Attachment(_) => true,
            PayloadValue::List(items) => items.iter().any(PayloadValue::contains_attachment),
            PayloadValue::Map(map) => map.values().any(PayloadValue::contains_attachment),
            _ => false,
        }
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        PayloadValue::Bool(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        PayloadValue::Int(value)
    }
}

impl From<u32> for PayloadValue {
    fn from(value: u32) -> Self {
        PayloadValue::Int(i64::from(value))
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        PayloadValue::Float(value)
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        PayloadValue::Text(value)
    }
}

impl From<Snowflake> for PayloadValue {
    fn from(value: Snowflake) -> Self {
        PayloadValue::Text(value.to_string())
    }
}

impl From<Embed> for PayloadValue {
    fn from(value: Embed) -> Self {
        PayloadValue::Embed(value)
    }
}

impl From<DateTime<Utc>> for PayloadValue {
    fn from(value: DateTime<Utc>) -> Self {
        PayloadValue::DateTime(value)
    }
}

impl From<Duration> for PayloadValue {
    fn from(value: Duration) -> Self {
        PayloadValue::Duration(value)
    }
}

impl From<Attachment> for PayloadValue {
    fn from(value: Attachment) -> Self {
        PayloadValue::Attachment(value)
    }
}

impl From<Payload> for PayloadValue {
    fn from(value: Payload) -> Self {
        PayloadValue::Map(value)
    }
}

impl<T: Into<PayloadValue>> From<Vec<T>> for PayloadValue {
    fn from(value: Vec<T>) -> Self {
        PayloadValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<PayloadValue>> From<Option<T>> for PayloadValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(PayloadValue::Null, Into::into)
    }
}

/// Plain JSON becomes untyped payload data (no tag interpretation).
impl From<serde_json::Value> for PayloadValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => PayloadValue::Null,
            Value::Bool(b) => PayloadValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => PayloadValue::Int(i),
                None => PayloadValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => PayloadValue::Text(s),
            Value::Array(items) => PayloadValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                PayloadValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

/// Build a payload from literal entries.
pub fn payload<const N: usize>(entries: [(&str, PayloadValue); N]) -> Payload {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Required snowflake field.
pub fn require_snowflake(payload: &Payload, key: &str) -> Result<Snowflake, ClanhallError> {
    payload
        .get(key)
        .and_then(PayloadValue::as_snowflake)
        .ok_or_else(|| ClanhallError::InvalidArgument(format!("payload field `{key}` must be a snowflake")))
}

/// Optional snowflake field. A present but malformed value is an error.
pub fn optional_snowflake(payload: &Payload, key: &str) -> Result<Option<Snowflake>, ClanhallError> {
    match payload.get(key) {
        None | Some(PayloadValue::Null) => Ok(None),
        Some(_) => require_snowflake(payload, key).map(Some),
    }
}

pub fn require_str<'a>(payload: &'a Payload, key: &str) -> Result<&'a str, ClanhallError> {
    payload
        .get(key)
        .and_then(PayloadValue::as_str)
        .ok_or_else(|| ClanhallError::InvalidArgument(format!("payload field `{key}` must be text")))
}

pub fn optional_str<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(PayloadValue::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_conversion_keeps_shape() {
        let value = PayloadValue::from(json!({
            "content": "hi",
            "count": 3,
            "ratio": 0.5,
            "flags": [1, true, null]
        }));
        let map = value.as_map().unwrap();
        assert_eq!(map["content"], PayloadValue::Text("hi".into()));
        assert_eq!(map["count"], PayloadValue::Int(3));
        assert_eq!(map["ratio"], PayloadValue::Float(0.5));
        assert_eq!(
            map["flags"],
            PayloadValue::List(vec![PayloadValue::Int(1), PayloadValue::Bool(true), PayloadValue::Null])
        );
    }

    #[test]
    fn snowflake_fields() {
        let p = payload([
            ("channel_id", Snowflake(42).into()),
            ("guild_id", PayloadValue::Int(7)),
            ("user_id", "nope".into()),
        ]);
        assert_eq!(require_snowflake(&p, "channel_id").unwrap(), Snowflake(42));
        assert_eq!(require_snowflake(&p, "guild_id").unwrap(), Snowflake(7));
        assert!(require_snowflake(&p, "user_id").is_err());
        assert!(require_snowflake(&p, "missing").is_err());
        assert_eq!(optional_snowflake(&p, "missing").unwrap(), None);
        assert!(optional_snowflake(&p, "user_id").is_err());
    }

    #[test]
    fn nested_attachment_detection() {
        let file = Attachment::new("a.txt", b"hi".to_vec());
        let p = PayloadValue::Map(payload([("files", vec![file].into())]));
        assert!(p.contains_attachment());
        assert!(!PayloadValue::from(vec!["a", "b"]).contains_attachment());
    }
}
