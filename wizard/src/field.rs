//! Field model: definitions, typed values, and the accumulated form store.
//!
//! A [`FieldDefinition`] describes one input on a step — its key, label,
//! behavior class, and validation hints. [`FormData`] is the single store of
//! everything the user has entered so far; it accumulates across steps and is
//! only cleared on a full session reset.

#[cfg(test)]
#[path = "field_test.rs"]
mod field_test;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capture::CapturedFile;

/// Behavior class of a field, driving both validation and rendering dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Plain single-line text.
    Text,
    /// Email address; format-checked and probed for duplicates.
    Email,
    /// Phone number with a leading country code.
    Tel,
    /// Password with composition rules.
    Password,
    /// Boolean consent box, optionally tied to a legal text link.
    Checkbox,
    /// Captured or uploaded image file.
    File,
    /// One value out of a fixed option list.
    Select,
}

impl FieldType {
    /// Parse the wire representation, defaulting unknown kinds to plain text.
    #[must_use]
    pub fn from_wire(raw: &str) -> Self {
        match raw {
            "email" => Self::Email,
            "tel" => Self::Tel,
            "password" => Self::Password,
            "checkbox" => Self::Checkbox,
            "file" => Self::File,
            "select" => Self::Select,
            _ => Self::Text,
        }
    }
}

/// One input on a registration step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Unique key within the whole form.
    pub name: String,
    /// Human-readable label.
    pub label: String,
    /// Behavior class.
    pub field_type: FieldType,
    /// Whether the step cannot advance while this field is blank.
    pub required: bool,
    /// Placeholder / example text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    /// Secondary help text rendered under the input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Link target for checkbox legal text (terms, privacy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Options for [`FieldType::Select`] fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Name of the field this one must match (confirmation inputs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterpart: Option<String>,
}

impl FieldDefinition {
    /// A required field with no extras.
    #[must_use]
    pub fn required(name: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
            field_type,
            required: true,
            placeholder: None,
            help: None,
            link: None,
            options: Vec::new(),
            counterpart: None,
        }
    }

    /// An optional field with no extras.
    #[must_use]
    pub fn optional(name: &str, label: &str, field_type: FieldType) -> Self {
        Self {
            required: false,
            ..Self::required(name, label, field_type)
        }
    }

    /// Attach placeholder text.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: &str) -> Self {
        self.placeholder = Some(placeholder.to_owned());
        self
    }

    /// Attach help text.
    #[must_use]
    pub fn with_help(mut self, help: &str) -> Self {
        self.help = Some(help.to_owned());
        self
    }

    /// Attach a legal-text link target.
    #[must_use]
    pub fn with_link(mut self, link: &str) -> Self {
        self.link = Some(link.to_owned());
        self
    }

    /// Attach select options.
    #[must_use]
    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = options.iter().map(|&o| o.to_owned()).collect();
        self
    }

    /// Mark this field as a confirmation of `other`.
    #[must_use]
    pub fn confirms(mut self, other: &str) -> Self {
        self.counterpart = Some(other.to_owned());
        self
    }
}

/// Current value of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Text-like input (text, email, tel, password, select).
    Text(String),
    /// Checkbox state.
    Flag(bool),
    /// Captured image, kept in memory for preview and later upload.
    File(CapturedFile),
}

/// Everything the user has entered so far, keyed by field name.
///
/// Values accumulate across steps and survive step regressions; only
/// [`FormData::reset`] clears them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    values: BTreeMap<String, FieldValue>,
}

impl FormData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, replacing any previous one.
    pub fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_owned(), value);
    }

    /// Remove a single field's value.
    pub fn clear(&mut self, name: &str) {
        self.values.remove(name);
    }

    /// Drop every stored value. Only valid on a full session reset.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    /// Text content of a field, if it holds text.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FieldValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Checkbox state of a field; absent means unchecked.
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(FieldValue::Flag(true)))
    }

    /// Captured file stored under a field, if any.
    #[must_use]
    pub fn file(&self, name: &str) -> Option<&CapturedFile> {
        match self.values.get(name) {
            Some(FieldValue::File(file)) => Some(file),
            _ => None,
        }
    }

    /// Whether a field counts as empty for `required` validation.
    ///
    /// Missing values, empty/whitespace text, and unchecked flags are all
    /// blank; a stored file never is.
    #[must_use]
    pub fn is_blank(&self, name: &str) -> bool {
        match self.values.get(name) {
            None => true,
            Some(FieldValue::Text(value)) => value.trim().is_empty(),
            Some(FieldValue::Flag(checked)) => !checked,
            Some(FieldValue::File(_)) => false,
        }
    }

    /// Iterate over stored `(name, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
