use super::*;
use crate::capture::CapturedFile;
use crate::field::FieldValue;

fn capture(name: &str) -> CapturedFile {
    CapturedFile {
        name: format!("{name}.jpg"),
        mime: "image/jpeg".to_owned(),
        bytes: vec![1, 2, 3],
    }
}

fn names(fields: &[FieldDefinition]) -> Vec<&str> {
    fields.iter().map(|f| f.name.as_str()).collect()
}

// =============================================================
// Local step table
// =============================================================

#[test]
fn first_step_collects_contact_details() {
    let def = local_step(0, false, &FormData::new());
    assert_eq!(def.title, "Your details");
    assert_eq!(
        names(&def.fields),
        vec!["firstName", "lastName", "email", "phone", "identification"]
    );
    assert!(def.fields.iter().all(|f| f.required));
}

#[test]
fn invitation_flow_prepends_the_code_field() {
    let def = local_step(0, true, &FormData::new());
    assert_eq!(def.fields[0].name, "invitationCode");
    assert!(def.has_invitation_code());
    assert!(!local_step(0, false, &FormData::new()).has_invitation_code());
}

#[test]
fn security_step_confirms_the_password() {
    let def = local_step(1, false, &FormData::new());
    assert_eq!(names(&def.fields), vec!["password", "confirmPassword"]);
    assert_eq!(def.fields[1].counterpart.as_deref(), Some("password"));
}

#[test]
fn consent_step_links_legal_texts() {
    let def = local_step(3, false, &FormData::new());
    let terms = def.field("termsAccepted").unwrap();
    assert_eq!(terms.link.as_deref(), Some("/legal/terms"));
    assert!(terms.required);
    assert!(!def.field("marketingOptIn").unwrap().required);
}

#[test]
fn out_of_range_index_clamps_to_last_step() {
    let def = local_step(99, false, &FormData::new());
    assert_eq!(def.index, TOTAL_STEPS - 1);
}

// =============================================================
// Identity step growth
// =============================================================

#[test]
fn identity_step_starts_with_selfie_only() {
    let fields = identity_fields(&FormData::new());
    assert_eq!(names(&fields), vec!["selfie"]);
}

#[test]
fn identity_step_reveals_front_after_selfie() {
    let mut form = FormData::new();
    form.set("selfie", FieldValue::File(capture("selfie")));
    assert_eq!(names(&identity_fields(&form)), vec!["selfie", "idFront"]);
}

#[test]
fn identity_step_reveals_back_after_selfie_and_front() {
    let mut form = FormData::new();
    form.set("selfie", FieldValue::File(capture("selfie")));
    form.set("idFront", FieldValue::File(capture("idFront")));
    assert_eq!(
        names(&identity_fields(&form)),
        vec!["selfie", "idFront", "idBack"]
    );
}

#[test]
fn identity_step_never_shrinks_when_an_earlier_capture_is_cleared() {
    let mut form = FormData::new();
    form.set("selfie", FieldValue::File(capture("selfie")));
    form.set("idFront", FieldValue::File(capture("idFront")));
    form.clear("selfie");
    // idFront stays visible; the list never shrinks short of a reset.
    assert_eq!(names(&identity_fields(&form)), vec!["selfie", "idFront"]);
}

#[test]
fn identity_step_resets_with_the_form() {
    let mut form = FormData::new();
    form.set("selfie", FieldValue::File(capture("selfie")));
    form.set("idFront", FieldValue::File(capture("idFront")));
    form.reset();
    assert_eq!(names(&identity_fields(&form)), vec!["selfie"]);
}
