//! Decoding of the backend's error payload conventions.
//!
//! The API reports failures in three shapes, sometimes mixed within one
//! endpoint: a per-field object, a bare string, or an array of strings.
//! Everything funnels into [`ApiFailure`] so callers handle exactly two
//! cases — field-mapped or general.

#[cfg(test)]
#[path = "failure_test.rs"]
mod failure_test;

use std::collections::BTreeMap;

use serde_json::Value;

/// A backend-reported failure, normalized for display.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiFailure {
    /// Structured messages keyed by field name.
    #[error("{}", join_fields(.0))]
    Fields(BTreeMap<String, String>),
    /// One human-readable block for the page banner.
    #[error("{0}")]
    General(String),
}

fn join_fields(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(name, message)| format!("{name}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ApiFailure {
    /// Normalize an error payload.
    ///
    /// Accepts `{ "errors": {field: message} }`, `{ "errors": [..] }`,
    /// `{ "error": ".." }`, `{ "message": ".." }`, a bare string/array, or a
    /// bare field-message object. Anything unrecognized becomes a general
    /// failure mentioning the HTTP status.
    #[must_use]
    pub fn from_payload(status: u16, payload: &Value) -> Self {
        let inner = payload
            .get("errors")
            .or_else(|| payload.get("error"))
            .or_else(|| payload.get("message"))
            .unwrap_or(payload);

        match inner {
            Value::String(message) => Self::General(message.clone()),
            Value::Array(items) => {
                let lines: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
                if lines.is_empty() {
                    Self::unrecognized(status)
                } else {
                    Self::General(lines.join("\n"))
                }
            }
            Value::Object(map) => {
                let fields: BTreeMap<String, String> = map
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                    .collect();
                if fields.is_empty() {
                    Self::unrecognized(status)
                } else {
                    Self::Fields(fields)
                }
            }
            _ => Self::unrecognized(status),
        }
    }

    /// Render field errors as one block, translating names to labels.
    #[must_use]
    pub fn to_display_block(&self, labels: &BTreeMap<String, String>) -> String {
        match self {
            Self::General(message) => message.clone(),
            Self::Fields(fields) => fields
                .iter()
                .map(|(name, message)| {
                    let label = labels.get(name).map_or(name.as_str(), String::as_str);
                    format!("{label}: {message}")
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    fn unrecognized(status: u16) -> Self {
        Self::General(format!("request failed with HTTP {status}"))
    }
}
