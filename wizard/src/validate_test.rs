use std::collections::BTreeSet;

use super::*;
use crate::capture::CapturedFile;
use crate::field::FieldValue;
use crate::step::local_step;

fn no_duplicates() -> BTreeSet<String> {
    BTreeSet::new()
}

// =============================================================
// Password composition
// =============================================================

#[test]
fn password_too_weak_lists_every_missing_rule() {
    let issues = password_issues("abc");
    assert_eq!(issues.len(), 4);
    assert!(issues.contains(&"at least 8 characters"));
    assert!(issues.contains(&"an uppercase letter"));
    assert!(issues.contains(&"a digit"));
    assert!(issues.contains(&"a special character"));
}

#[test]
fn password_meeting_all_rules_passes() {
    assert!(password_issues("Abcdef1!").is_empty());
}

#[test]
fn password_missing_only_lowercase() {
    let issues = password_issues("ABCDEF1!");
    assert_eq!(issues, vec!["a lowercase letter"]);
}

// =============================================================
// Identification
// =============================================================

#[test]
fn identification_nine_digits_passes() {
    assert_eq!(identification_error("123456789"), None);
}

#[test]
fn identification_eight_digits_reports_minimum() {
    let message = identification_error("12345678").unwrap();
    assert!(message.contains("at least 9 digits"), "{message}");
}

#[test]
fn identification_thirteen_digits_reports_maximum() {
    let message = identification_error("1234567890123").unwrap();
    assert!(message.contains("exceeds 12 digits"), "{message}");
}

#[test]
fn identification_allows_letters_spaces_and_dashes() {
    assert_eq!(identification_error("1-2345 6789 AB"), None);
}

#[test]
fn identification_rejects_other_characters() {
    let message = identification_error("12345678#9").unwrap();
    assert!(message.contains("letters, digits"), "{message}");
}

#[test]
fn identification_rejects_over_twenty_characters() {
    // 12 digits spread over more than 20 characters.
    let message = identification_error("1 2 3 4 5 6 7 8 9 0 1 2").unwrap();
    assert!(message.contains("between 9 and 20"), "{message}");
}

// =============================================================
// Phone
// =============================================================

#[test]
fn phone_with_country_code_passes() {
    assert_eq!(phone_error("+50688889999"), None);
}

#[test]
fn phone_without_plus_is_rejected() {
    let message = phone_error("88889999").unwrap();
    assert!(message.contains("country code"), "{message}");
}

#[test]
fn phone_separators_are_stripped_before_counting() {
    assert_eq!(phone_error("+506 8888-9999"), None);
}

#[test]
fn phone_too_short_after_stripping() {
    let message = phone_error("+506 88").unwrap();
    assert!(message.contains("between 8 and 20"), "{message}");
}

#[test]
fn phone_rejects_letters() {
    assert!(phone_error("+506abcd9999").is_some());
}

// =============================================================
// Email format
// =============================================================

#[test]
fn email_basic_shapes() {
    assert!(email_format_ok("juan@test.com"));
    assert!(email_format_ok("a.b+c@sub.example.org"));
    assert!(!email_format_ok("juan"));
    assert!(!email_format_ok("juan@"));
    assert!(!email_format_ok("@test.com"));
    assert!(!email_format_ok("juan@test"));
    assert!(!email_format_ok("ju an@test.com"));
}

// =============================================================
// Step-level validation
// =============================================================

fn filled_step0_form() -> FormData {
    let mut form = FormData::new();
    form.set("firstName", FieldValue::Text("Juan".to_owned()));
    form.set("lastName", FieldValue::Text("Perez".to_owned()));
    form.set("email", FieldValue::Text("juan@test.com".to_owned()));
    form.set("phone", FieldValue::Text("+50688889999".to_owned()));
    form.set("identification", FieldValue::Text("123456789".to_owned()));
    form
}

#[test]
fn complete_first_step_validates_clean() {
    let def = local_step(0, false, &FormData::new());
    let errors = validate_step(&def, &filled_step0_form(), &no_duplicates());
    assert!(errors.is_empty(), "{errors:?}");
}

#[test]
fn empty_required_fields_all_reported() {
    let def = local_step(0, false, &FormData::new());
    let errors = validate_step(&def, &FormData::new(), &no_duplicates());
    assert_eq!(errors.len(), def.fields.len());
    assert!(errors["firstName"].contains("required"));
}

#[test]
fn duplicate_email_taints_an_otherwise_valid_form() {
    let def = local_step(0, false, &FormData::new());
    let mut duplicates = BTreeSet::new();
    duplicates.insert("juan@test.com".to_owned());
    let errors = validate_step(&def, &filled_step0_form(), &duplicates);
    assert_eq!(errors.len(), 1);
    assert!(errors["email"].contains("already registered"));
}

#[test]
fn confirmation_must_match_counterpart() {
    let def = local_step(1, false, &FormData::new());
    let mut form = FormData::new();
    form.set("password", FieldValue::Text("Abcdef1!".to_owned()));
    form.set("confirmPassword", FieldValue::Text("Abcdef1?".to_owned()));
    let errors = validate_step(&def, &form, &no_duplicates());
    assert_eq!(errors.len(), 1);
    assert!(errors["confirmPassword"].contains("does not match"));

    form.set("confirmPassword", FieldValue::Text("Abcdef1!".to_owned()));
    assert!(validate_step(&def, &form, &no_duplicates()).is_empty());
}

#[test]
fn required_checkbox_must_be_true() {
    let def = local_step(3, false, &FormData::new());
    let mut form = FormData::new();
    form.set("termsAccepted", FieldValue::Flag(false));
    form.set("privacyAccepted", FieldValue::Flag(true));
    let errors = validate_step(&def, &form, &no_duplicates());
    assert_eq!(errors.len(), 1);
    assert!(errors["termsAccepted"].contains("accepted"));
}

#[test]
fn optional_checkbox_may_stay_unchecked() {
    let def = local_step(3, false, &FormData::new());
    let mut form = FormData::new();
    form.set("termsAccepted", FieldValue::Flag(true));
    form.set("privacyAccepted", FieldValue::Flag(true));
    assert!(validate_step(&def, &form, &no_duplicates()).is_empty());
}

#[test]
fn oversized_file_is_rejected() {
    let mut form = FormData::new();
    form.set(
        "selfie",
        FieldValue::File(CapturedFile {
            name: "selfie.jpg".to_owned(),
            mime: "image/jpeg".to_owned(),
            bytes: vec![0; crate::consts::MAX_CAPTURE_BYTES + 1],
        }),
    );
    let def = local_step(2, false, &form);
    let errors = validate_step(&def, &form, &no_duplicates());
    assert!(errors["selfie"].contains("5 MB"), "{errors:?}");
}

#[test]
fn validation_is_idempotent_for_the_same_form() {
    let def = local_step(0, false, &FormData::new());
    let form = filled_step0_form();
    let first = validate_step(&def, &form, &no_duplicates());
    let second = validate_step(&def, &form, &no_duplicates());
    assert_eq!(first, second);
    assert!(first.is_empty());
}
