//! Client-side field validation.
//!
//! Validation runs before every step submission and never talks to the
//! network; the one asynchronous check (email duplication) is fed in as the
//! set of addresses the backend has already reported as taken. Messages are
//! returned per field and shown inline.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use std::collections::{BTreeMap, BTreeSet};

use crate::capture;
use crate::field::{FieldDefinition, FieldType, FormData};
use crate::step::StepDefinition;

/// Validate every field of a step against the current form.
///
/// Returns an empty map when the step may advance. `duplicate_emails` holds
/// addresses a prior existence check reported as registered; a matching email
/// value taints the field even though its format is fine.
#[must_use]
pub fn validate_step(
    def: &StepDefinition,
    form: &FormData,
    duplicate_emails: &BTreeSet<String>,
) -> BTreeMap<String, String> {
    let mut errors = BTreeMap::new();
    for field in &def.fields {
        if let Some(message) = validate_field(field, form, duplicate_emails) {
            errors.insert(field.name.clone(), message);
        }
    }
    errors
}

/// Validate a single field. `None` means the field passes.
#[must_use]
pub fn validate_field(
    field: &FieldDefinition,
    form: &FormData,
    duplicate_emails: &BTreeSet<String>,
) -> Option<String> {
    if form.is_blank(&field.name) {
        if field.required {
            return Some(match field.field_type {
                FieldType::Checkbox => format!("{} must be accepted", field.label),
                FieldType::File => format!("{} is required; add a photo", field.label),
                _ => format!("{} is required", field.label),
            });
        }
        return None;
    }

    if let Some(counterpart) = &field.counterpart {
        if form.text(&field.name) != form.text(counterpart) {
            return Some(format!("{} does not match", field.label));
        }
        return None;
    }

    match field.field_type {
        FieldType::Email => {
            let value = form.text(&field.name)?;
            if !email_format_ok(value) {
                return Some("enter a valid email address".to_owned());
            }
            if duplicate_emails.contains(&value.to_ascii_lowercase()) {
                return Some("this email is already registered".to_owned());
            }
            None
        }
        FieldType::Tel => phone_error(form.text(&field.name)?),
        FieldType::Password => {
            let issues = password_issues(form.text(&field.name)?);
            if issues.is_empty() {
                None
            } else {
                Some(format!("password must contain {}", issues.join(", ")))
            }
        }
        FieldType::Text if field.name == "identification" => {
            identification_error(form.text(&field.name)?)
        }
        FieldType::File => {
            let file = form.file(&field.name)?;
            capture::check(file).err().map(|e| e.to_string())
        }
        FieldType::Select => {
            let value = form.text(&field.name)?;
            if field.options.is_empty() || field.options.iter().any(|o| o == value) {
                None
            } else {
                Some(format!("choose one of the listed {}", field.label))
            }
        }
        _ => None,
    }
}

/// RFC-lite email shape: one `@`, non-empty local part, dotted domain,
/// no whitespace.
#[must_use]
pub fn email_format_ok(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let Some((host, tld)) = domain.rsplit_once('.') else {
        return false;
    };
    !host.is_empty() && !tld.is_empty()
}

/// Phone numbers must carry a `+` country code and 8–20 digits once
/// separators (spaces, dashes, parentheses) are stripped.
#[must_use]
pub fn phone_error(value: &str) -> Option<String> {
    let stripped: String = value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    let Some(digits) = stripped.strip_prefix('+') else {
        return Some("phone must start with a country code (+)".to_owned());
    };
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Some("phone may only contain digits and separators".to_owned());
    }
    if digits.len() < 8 || digits.len() > 20 {
        return Some("phone must have between 8 and 20 digits".to_owned());
    }
    None
}

/// Identification numbers: 9–20 characters of letters, digits, spaces and
/// dashes, with 9–12 digits among them.
#[must_use]
pub fn identification_error(value: &str) -> Option<String> {
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
    {
        return Some("identification may only contain letters, digits, spaces and dashes".to_owned());
    }
    let digits = value.chars().filter(char::is_ascii_digit).count();
    if digits < 9 {
        return Some("identification must contain at least 9 digits".to_owned());
    }
    if digits > 12 {
        return Some("identification exceeds 12 digits".to_owned());
    }
    if value.len() < 9 || value.len() > 20 {
        return Some("identification must be between 9 and 20 characters".to_owned());
    }
    None
}

/// Composition rules a password is missing, in display order.
///
/// Empty result means the password is acceptable.
#[must_use]
pub fn password_issues(value: &str) -> Vec<&'static str> {
    let mut issues = Vec::new();
    if value.len() < 8 {
        issues.push("at least 8 characters");
    }
    if !value.chars().any(char::is_uppercase) {
        issues.push("an uppercase letter");
    }
    if !value.chars().any(char::is_lowercase) {
        issues.push("a lowercase letter");
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        issues.push("a digit");
    }
    if !value.chars().any(|c| !c.is_alphanumeric() && !c.is_whitespace()) {
        issues.push("a special character");
    }
    issues
}
