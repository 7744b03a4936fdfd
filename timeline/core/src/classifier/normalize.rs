//! Payload Normalization
//!
//! The upstream producer sends `content` as plain text, as a list of
//! tool-call descriptors, or as an arbitrary object. Each shape gets one
//! strategy; every strategy answers the same question ("what capability, and
//! what body?") so the classifier never branches on shape itself.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Capability name used when none can be recognized
pub const CAPABILITY_PLACEHOLDER: &str = "tool";

/// Keys that name the invoked capability, in priority order
const NAME_KEYS: &[&str] = &["name", "tool_name", "tool"];

/// Keys that hold call arguments, in priority order
const ARGUMENT_KEYS: &[&str] = &["arguments", "args", "input"];

/// Keys that hold an execution result, in priority order
const RESULT_KEYS: &[&str] = &["content", "result", "output"];

/// Which part of the payload the caller is after
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Extract {
    /// Capability name plus call arguments
    Arguments,
    /// Capability name plus execution result
    Result,
    /// Human-readable text
    Text,
}

/// Canonical pieces pulled out of a payload
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Extracted {
    /// Recognized capability name
    pub capability: Option<String>,
    /// Arguments, result or text, rendered for display
    pub body: Option<String>,
    /// The descriptor flagged itself as an error result
    pub failed: bool,
}

/// A payload classified by shape
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadShape<'a> {
    /// Plain text (JSON scalars are rendered as text)
    Text(Cow<'a, str>),
    /// A list; only the first element is consulted
    List(&'a [Value]),
    /// An arbitrary object
    Object(&'a Map<String, Value>),
}

impl<'a> PayloadShape<'a> {
    /// Select the strategy for a payload. `None` for JSON `null`, which no
    /// strategy can normalize.
    #[must_use]
    pub fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Text(Cow::Borrowed(s))),
            Value::Bool(_) | Value::Number(_) => Some(Self::Text(Cow::Owned(value.to_string()))),
            Value::Array(items) => Some(Self::List(items)),
            Value::Object(map) => Some(Self::Object(map)),
        }
    }

    /// Run this shape's strategy
    #[must_use]
    pub fn extract(&self, want: Extract) -> Extracted {
        match self {
            Self::Text(text) => Extracted {
                capability: None,
                body: non_blank(text),
                failed: false,
            },
            Self::List(items) => match items.first().and_then(PayloadShape::of) {
                Some(Self::Object(first)) if want == Extract::Text => Extracted {
                    capability: None,
                    body: first_present(first, RESULT_KEYS)
                        .map(render_value)
                        .or_else(|| Some(pretty(&Value::Object(first.clone())))),
                    failed: false,
                },
                Some(Self::List(nested)) => Extracted {
                    capability: None,
                    body: Some(pretty(&Value::Array(nested.to_vec()))),
                    failed: false,
                },
                Some(shape) => shape.extract(want),
                None => Extracted::default(),
            },
            Self::Object(map) => match want {
                Extract::Text => Extracted {
                    capability: None,
                    body: Some(pretty(&Value::Object((*map).clone()))),
                    failed: false,
                },
                Extract::Arguments => Extracted {
                    capability: capability_name(map),
                    body: call_arguments(map).and_then(render_arguments),
                    failed: false,
                },
                Extract::Result => Extracted {
                    capability: capability_name(map),
                    body: first_present(map, RESULT_KEYS).and_then(|v| non_blank(&render_value(v))),
                    failed: map.get("is_error").and_then(Value::as_bool).unwrap_or(false),
                },
            },
        }
    }
}

/// Capability name from a descriptor, including the nested
/// `{"function": {"name": ...}}` form
///
/// Only non-blank strings count as names; anything else falls through to the
/// next key.
fn capability_name(map: &Map<String, Value>) -> Option<String> {
    NAME_KEYS
        .iter()
        .map(|key| map.get(*key))
        .chain(std::iter::once(
            map.get("function").and_then(|f| f.get("name")),
        ))
        .flatten()
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

fn call_arguments(map: &Map<String, Value>) -> Option<&Value> {
    first_present(map, ARGUMENT_KEYS).or_else(|| map.get("function").and_then(|f| f.get("arguments")))
}

fn first_present<'m>(map: &'m Map<String, Value>, keys: &[&str]) -> Option<&'m Value> {
    keys.iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

/// Arguments pretty-printed when they are (or encode) structured data,
/// otherwise the raw text
fn render_arguments(args: &Value) -> Option<String> {
    match args {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => render_arguments(&parsed),
            _ => non_blank(raw),
        },
        Value::Object(map) if map.is_empty() => None,
        other => non_blank(&render_value(other)),
    }
}

/// Strings as-is, anything structured pretty-printed
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => pretty(other),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn non_blank(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}
