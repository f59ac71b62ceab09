// SPDX-FileCopyrightText: 2026 Clanhall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Component text sanitizing, applied to message bodies right before dispatch.
//!
//! Discord rejects layout components whose text is empty or too long, and
//! caps the combined text of a components-v2 message. Rather than failing a
//! queued write hours after it was submitted, text is clamped in place.

use serde_json::{Map, Value};

/// Message flag marking a components-v2 (layout) message.
pub const IS_COMPONENTS_V2: u64 = 1 << 15;

const EMPTY_TEXT: &str = "\u{200b}";
const TRUNCATION_SUFFIX: &str = "… (truncated)";
const TEXT_FIELDS: [&str; 3] = ["content", "label", "value"];
/// Text fields Discord rejects when blank.
const REQUIRED_TEXT_FIELDS: [&str; 2] = ["content", "label"];
const NESTED_FIELDS: [&str; 5] = ["components", "accessory", "component", "items", "children"];

/// Per-field and per-message text limits, in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    pub field: usize,
    pub total: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            field: 4000,
            total: 4000,
        }
    }
}

impl TextLimits {
    pub fn from_config(config: &clanhall_config::WriterConfig) -> Self {
        Self {
            field: config.text_field_limit,
            total: config.text_total_limit,
        }
    }
}

/// Clamp component text in a wire-format message body.
///
/// Layout messages (`flags` carries [`IS_COMPONENTS_V2`]) cannot carry embeds,
/// so `embed` and `embeds` are dropped from them.
pub fn sanitize_body(body: &mut Map<String, Value>, limits: TextLimits) {
    let flags = body.get("flags").and_then(Value::as_u64).unwrap_or(0);
    if flags & IS_COMPONENTS_V2 != 0 {
        body.remove("embed");
        body.remove("embeds");
    }
    if let Some(components) = body.get_mut("components") {
        sanitize_components(components, limits);
    }
}

/// Normalize every text field under `components`, then fit `content` fields
/// into the total budget.
pub fn sanitize_components(components: &mut Value, limits: TextLimits) {
    let mut content_lengths = Vec::new();
    normalize(components, limits.field, &mut content_lengths);

    let total: usize = content_lengths.iter().sum();
    if total <= limits.total {
        return;
    }
    let mut excess = total - limits.total;
    let mut targets = Vec::with_capacity(content_lengths.len());
    for len in content_lengths.iter().rev() {
        let cut = excess.min(len.saturating_sub(1));
        excess -= cut;
        targets.push(len - cut);
    }
    targets.reverse();
    let mut targets = targets.into_iter();
    trim_contents(components, &mut targets);
}

fn normalize(node: &mut Value, field_limit: usize, content_lengths: &mut Vec<usize>) {
    match node {
        Value::Array(items) => {
            for item in items {
                normalize(item, field_limit, content_lengths);
            }
        }
        Value::Object(map) => {
            for field in TEXT_FIELDS {
                if let Some(value) = map.get_mut(field) {
                    let required = REQUIRED_TEXT_FIELDS.contains(&field);
                    let Some(text) = clamp_text(value, field_limit, required) else {
                        continue;
                    };
                    if field == "content" {
                        content_lengths.push(text.chars().count());
                    }
                    *value = Value::String(text);
                }
            }
            for field in NESTED_FIELDS {
                if let Some(nested) = map.get_mut(field) {
                    normalize(nested, field_limit, content_lengths);
                }
            }
        }
        _ => {}
    }
}

/// Walks in the same order as [`normalize`], so content nodes line up with
/// their computed target lengths.
fn trim_contents(node: &mut Value, targets: &mut impl Iterator<Item = usize>) {
    match node {
        Value::Array(items) => {
            for item in items {
                trim_contents(item, targets);
            }
        }
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get_mut("content")
                && let Some(target) = targets.next()
            {
                let trimmed: String = text.chars().take(target.max(1)).collect();
                *text = if trimmed.trim().is_empty() {
                    EMPTY_TEXT.to_string()
                } else {
                    trimmed
                };
            }
            for field in NESTED_FIELDS {
                if let Some(nested) = map.get_mut(field) {
                    trim_contents(nested, targets);
                }
            }
        }
        _ => {}
    }
}

/// The field's text capped at `limit`. Blank text becomes [`EMPTY_TEXT`]
/// when `required`, otherwise `None` leaves the field as it was.
fn clamp_text(value: &Value, limit: usize, required: bool) -> Option<String> {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.trim().is_empty() {
        return required.then(|| EMPTY_TEXT.to_string());
    }
    if text.chars().count() <= limit {
        return Some(text);
    }
    let suffix_len = TRUNCATION_SUFFIX.chars().count();
    if suffix_len >= limit {
        return Some(text.chars().take(limit).collect());
    }
    let mut clipped: String = text.chars().take(limit - suffix_len).collect();
    clipped.push_str(TRUNCATION_SUFFIX);
    Some(clipped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn lengths(components: &Value) -> Vec<usize> {
        let mut out = Vec::new();
        let mut copy = components.clone();
        normalize(&mut copy, usize::MAX, &mut out);
        out
    }

    #[test]
    fn empty_text_becomes_zero_width_space() {
        let mut b = body(json!({
            "components": [
                {"type": 10, "content": ""},
                {"type": 1, "components": [{"type": 2, "label": "   "}]},
                {"type": 10, "content": null}
            ]
        }));
        sanitize_body(&mut b, TextLimits::default());
        assert_eq!(b["components"][0]["content"], EMPTY_TEXT);
        assert_eq!(b["components"][1]["components"][0]["label"], EMPTY_TEXT);
        assert_eq!(b["components"][2]["content"], EMPTY_TEXT);
    }

    #[test]
    fn empty_input_values_stay_empty() {
        let mut b = body(json!({
            "components": [
                {"type": 18, "component": {"type": 4, "label": "", "value": ""}},
                {"type": 18, "component": {"type": 4, "label": "Bio", "value": null}}
            ]
        }));
        sanitize_body(&mut b, TextLimits::default());
        assert_eq!(b["components"][0]["component"]["value"], "");
        assert_eq!(b["components"][0]["component"]["label"], EMPTY_TEXT);
        assert_eq!(b["components"][1]["component"]["value"], Value::Null);
    }

    #[test]
    fn long_field_is_truncated_with_suffix() {
        let long = "x".repeat(50);
        let mut b = body(json!({"components": [{"type": 10, "content": long}]}));
        sanitize_body(&mut b, TextLimits { field: 20, total: 100 });
        let text = b["components"][0]["content"].as_str().unwrap();
        assert_eq!(text.chars().count(), 20);
        assert!(text.ends_with(TRUNCATION_SUFFIX));
    }

    #[test]
    fn total_budget_trims_from_the_end() {
        let mut b = body(json!({
            "components": [{
                "type": 17,
                "components": [
                    {"type": 10, "content": "a".repeat(30)},
                    {"type": 9, "components": [{"type": 10, "content": "b".repeat(30)}],
                     "accessory": {"type": 2, "label": "Go"}},
                    {"type": 10, "content": "c".repeat(30)}
                ]
            }]
        }));
        sanitize_body(&mut b, TextLimits { field: 100, total: 50 });
        let lens = lengths(&b["components"]);
        assert_eq!(lens, vec![30, 19, 1]);
        assert_eq!(lens.iter().sum::<usize>(), 50);
        assert_eq!(b["components"][0]["components"][2]["content"], "c");
    }

    #[test]
    fn every_content_keeps_at_least_one_char() {
        let mut b = body(json!({
            "components": [
                {"type": 10, "content": "aaaa"},
                {"type": 10, "content": "bbbb"},
                {"type": 10, "content": "cccc"}
            ]
        }));
        sanitize_body(&mut b, TextLimits { field: 100, total: 1 });
        assert_eq!(lengths(&b["components"]), vec![1, 1, 1]);
    }

    #[test]
    fn embeds_dropped_only_for_layout_messages() {
        let mut classic = body(json!({
            "content": "hi",
            "embeds": [{"title": "t"}],
            "components": [{"type": 1, "components": [{"type": 2, "label": "ok"}]}]
        }));
        sanitize_body(&mut classic, TextLimits::default());
        assert!(classic.contains_key("embeds"));

        let mut layout = body(json!({
            "flags": IS_COMPONENTS_V2,
            "embeds": [{"title": "t"}],
            "components": [{"type": 10, "content": "hi"}]
        }));
        sanitize_body(&mut layout, TextLimits::default());
        assert!(!layout.contains_key("embeds"));
    }

    #[test]
    fn non_string_text_is_stringified() {
        let mut b = body(json!({"components": [{"type": 10, "content": 42}]}));
        sanitize_body(&mut b, TextLimits::default());
        assert_eq!(b["components"][0]["content"], "42");
    }
}
