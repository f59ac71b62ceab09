// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payload codec.
//!
//! Two JSON renderings of a [`Payload`]:
//!
//! - the **persisted** form, which tags rich values so they survive a restart:
//!   `{"__embed__": {...}}`, `{"__datetime__": "<rfc3339>"}` and
//!   `{"__timedelta__": <seconds>}`;
//! - the **wire** form sent to Discord, where embeds are plain objects,
//!   timestamps are ISO-8601 strings and durations are seconds.
//!
//! Uploads have no persisted form. A payload containing one is not
//! serializable and is delivered without durability.

use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use clanhall_core::{ClanhallError, Embed};
use serde_json::{Map, Number, Value};

use crate::payload::{Payload, PayloadValue};

pub const EMBED_TAG: &str = "__embed__";
pub const DATETIME_TAG: &str = "__datetime__";
pub const TIMEDELTA_TAG: &str = "__timedelta__";

const RESERVED_TAGS: [&str; 3] = [EMBED_TAG, DATETIME_TAG, TIMEDELTA_TAG];

fn codec_err(message: impl Into<String>) -> ClanhallError {
    ClanhallError::Codec {
        message: message.into(),
    }
}

/// Encode a payload to its persisted JSON form.
pub fn encode(payload: &Payload) -> Result<Value, ClanhallError> {
    encode_map(payload)
}

/// Encode a payload to persisted JSON text.
pub fn encode_to_string(payload: &Payload) -> Result<String, ClanhallError> {
    let value = encode(payload)?;
    serde_json::to_string(&value).map_err(|e| codec_err(e.to_string()))
}

/// True if the payload has a persisted form.
pub fn is_serializable(payload: &Payload) -> bool {
    encode(payload).is_ok()
}

fn encode_map(map: &Payload) -> Result<Value, ClanhallError> {
    if map.len() == 1
        && let Some(key) = map.keys().next()
        && RESERVED_TAGS.contains(&key.as_str())
    {
        return Err(codec_err(format!(
            "map with the single key `{key}` would decode as a tagged value"
        )));
    }
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        out.insert(key.clone(), encode_value(value)?);
    }
    Ok(Value::Object(out))
}

fn encode_value(value: &PayloadValue) -> Result<Value, ClanhallError> {
    Ok(match value {
        PayloadValue::Null => Value::Null,
        PayloadValue::Bool(b) => Value::Bool(*b),
        PayloadValue::Int(n) => Value::from(*n),
        PayloadValue::Float(f) => Value::Number(finite(*f)?),
        PayloadValue::Text(s) => Value::String(s.clone()),
        PayloadValue::List(items) => {
            Value::Array(items.iter().map(encode_value).collect::<Result<_, _>>()?)
        }
        PayloadValue::Map(map) => encode_map(map)?,
        PayloadValue::Embed(embed) => tagged(EMBED_TAG, embed_json(embed)?),
        PayloadValue::DateTime(ts) => tagged(DATETIME_TAG, Value::String(rfc3339(ts))),
        PayloadValue::Duration(d) => tagged(TIMEDELTA_TAG, Value::Number(finite(d.as_secs_f64())?)),
        PayloadValue::Attachment(a) => {
            return Err(codec_err(format!(
                "attachment `{}` cannot be persisted",
                a.filename
            )));
        }
    })
}

fn tagged(tag: &str, inner: Value) -> Value {
    let mut map = Map::with_capacity(1);
    map.insert(tag.to_string(), inner);
    Value::Object(map)
}

fn finite(f: f64) -> Result<Number, ClanhallError> {
    Number::from_f64(f).ok_or_else(|| codec_err(format!("non-finite number {f}")))
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn embed_json(embed: &Embed) -> Result<Value, ClanhallError> {
    serde_json::to_value(embed).map_err(|e| codec_err(format!("embed: {e}")))
}

/// Decode persisted JSON text back to a payload.
pub fn decode(text: &str) -> Result<Payload, ClanhallError> {
    let value: Value = serde_json::from_str(text).map_err(|e| codec_err(e.to_string()))?;
    decode_value(value)
}

/// Decode a persisted JSON value. The top level must be an object.
pub fn decode_value(value: Value) -> Result<Payload, ClanhallError> {
    match decode_any(value)? {
        PayloadValue::Map(map) => Ok(map),
        other => Err(codec_err(format!("payload must be an object, got {other:?}"))),
    }
}

fn decode_any(value: Value) -> Result<PayloadValue, ClanhallError> {
    Ok(match value {
        Value::Null => PayloadValue::Null,
        Value::Bool(b) => PayloadValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PayloadValue::Int(i),
            None => PayloadValue::Float(
                n.as_f64()
                    .ok_or_else(|| codec_err(format!("unrepresentable number {n}")))?,
            ),
        },
        Value::String(s) => PayloadValue::Text(s),
        Value::Array(items) => {
            PayloadValue::List(items.into_iter().map(decode_any).collect::<Result<_, _>>()?)
        }
        Value::Object(map) => decode_object(map)?,
    })
}

fn decode_object(map: Map<String, Value>) -> Result<PayloadValue, ClanhallError> {
    if map.len() == 1
        && let Some((key, inner)) = map.iter().next()
        && RESERVED_TAGS.contains(&key.as_str())
    {
        return decode_tagged(key, inner.clone());
    }
    let mut out = Payload::new();
    for (key, value) in map {
        out.insert(key, decode_any(value)?);
    }
    Ok(PayloadValue::Map(out))
}

fn decode_tagged(tag: &str, inner: Value) -> Result<PayloadValue, ClanhallError> {
    match tag {
        EMBED_TAG => serde_json::from_value::<Embed>(inner)
            .map(PayloadValue::Embed)
            .map_err(|e| codec_err(format!("bad {EMBED_TAG}: {e}"))),
        DATETIME_TAG => {
            let text = inner
                .as_str()
                .ok_or_else(|| codec_err(format!("{DATETIME_TAG} must be a string")))?;
            DateTime::parse_from_rfc3339(text)
                .map(|ts| PayloadValue::DateTime(ts.with_timezone(&Utc)))
                .map_err(|e| codec_err(format!("bad {DATETIME_TAG} `{text}`: {e}")))
        }
        TIMEDELTA_TAG => {
            let secs = inner
                .as_f64()
                .ok_or_else(|| codec_err(format!("{TIMEDELTA_TAG} must be a number")))?;
            duration_from_secs(secs).map(PayloadValue::Duration)
        }
        other => Err(codec_err(format!("unknown tag `{other}`"))),
    }
}

/// Seconds to a duration, rounded to the nearest nanosecond.
fn duration_from_secs(secs: f64) -> Result<Duration, ClanhallError> {
    if !secs.is_finite() || secs < 0.0 || secs > u64::MAX as f64 {
        return Err(codec_err(format!("invalid duration {secs}")));
    }
    let whole = secs.trunc();
    let mut whole_secs = whole as u64;
    let mut nanos = ((secs - whole) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        whole_secs = whole_secs.saturating_add(1);
        nanos -= 1_000_000_000;
    }
    Ok(Duration::new(whole_secs, nanos))
}

/// Render a value in Discord's wire format.
pub fn to_wire(value: &PayloadValue) -> Result<Value, ClanhallError> {
    Ok(match value {
        PayloadValue::Null => Value::Null,
        PayloadValue::Bool(b) => Value::Bool(*b),
        PayloadValue::Int(n) => Value::from(*n),
        PayloadValue::Float(f) => Value::Number(finite(*f)?),
        PayloadValue::Text(s) => Value::String(s.clone()),
        PayloadValue::List(items) => {
            Value::Array(items.iter().map(to_wire).collect::<Result<_, _>>()?)
        }
        PayloadValue::Map(map) => map_to_wire(map)?,
        PayloadValue::Embed(embed) => embed_json(embed)?,
        PayloadValue::DateTime(ts) => Value::String(rfc3339(ts)),
        PayloadValue::Duration(d) => Value::Number(finite(d.as_secs_f64())?),
        PayloadValue::Attachment(a) => {
            return Err(codec_err(format!(
                "attachment `{}` belongs in the multipart body",
                a.filename
            )));
        }
    })
}

pub fn map_to_wire(map: &Payload) -> Result<Value, ClanhallError> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        out.insert(key.clone(), to_wire(value)?);
    }
    Ok(Value::Object(out))
}
