//! Step definitions and the local step tables.
//!
//! Steps normally come from the registration backend, but the wizard keeps a
//! complete local table so the flow stays usable when that endpoint cannot be
//! reached. The identity-verification step is special: its field list is
//! computed from the current form state and only ever grows.

#[cfg(test)]
#[path = "step_test.rs"]
mod step_test;

use serde::{Deserialize, Serialize};

use crate::field::{FieldDefinition, FieldType, FormData};

/// Number of steps in the locally served flow.
pub const TOTAL_STEPS: usize = 4;

/// 0-based index of the identity-verification step.
pub const IDENTITY_STEP: usize = 2;

/// One screen's worth of related registration fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// 0-based position in the flow.
    pub index: usize,
    /// Heading shown above the fields.
    pub title: String,
    /// Ordered inputs for this step.
    pub fields: Vec<FieldDefinition>,
}

impl StepDefinition {
    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether this step collects an invitation code.
    #[must_use]
    pub fn has_invitation_code(&self) -> bool {
        self.field("invitationCode").is_some()
    }
}

/// Build the locally served definition for one step.
///
/// `with_invitation` prepends the invitation-code field to the first step.
/// The identity step reads `form` to decide which capture fields exist yet.
/// Out-of-range indices clamp to the last step.
#[must_use]
pub fn local_step(index: usize, with_invitation: bool, form: &FormData) -> StepDefinition {
    let index = index.min(TOTAL_STEPS - 1);
    match index {
        0 => {
            let mut fields = Vec::new();
            if with_invitation {
                fields.push(
                    FieldDefinition::required("invitationCode", "Invitation code", FieldType::Text)
                        .with_help("The code your company sent you"),
                );
            }
            fields.extend([
                FieldDefinition::required("firstName", "First name", FieldType::Text),
                FieldDefinition::required("lastName", "Last name", FieldType::Text),
                FieldDefinition::required("email", "Email", FieldType::Email)
                    .with_placeholder("you@example.com"),
                FieldDefinition::required("phone", "Phone", FieldType::Tel)
                    .with_placeholder("+50688889999")
                    .with_help("Include the country code"),
                FieldDefinition::required("identification", "Identification number", FieldType::Text)
                    .with_help("National ID, 9 to 12 digits"),
            ]);
            StepDefinition {
                index,
                title: "Your details".to_owned(),
                fields,
            }
        }
        1 => StepDefinition {
            index,
            title: "Account security".to_owned(),
            fields: vec![
                FieldDefinition::required("password", "Password", FieldType::Password)
                    .with_help("At least 8 characters with upper, lower, digit and symbol"),
                FieldDefinition::required("confirmPassword", "Confirm password", FieldType::Password)
                    .confirms("password"),
            ],
        },
        2 => StepDefinition {
            index,
            title: "Identity verification".to_owned(),
            fields: identity_fields(form),
        },
        _ => StepDefinition {
            index,
            title: "Review and consent".to_owned(),
            fields: vec![
                FieldDefinition::required("termsAccepted", "Terms of service", FieldType::Checkbox)
                    .with_link("/legal/terms"),
                FieldDefinition::required("privacyAccepted", "Privacy policy", FieldType::Checkbox)
                    .with_link("/legal/privacy"),
                FieldDefinition::optional("marketingOptIn", "Marketplace updates by email", FieldType::Checkbox),
            ],
        },
    }
}

/// Field list for the identity-verification step.
///
/// Invariant: the list is strictly incremental — the document front appears
/// once a selfie exists, the back once both earlier captures exist. A field
/// that has a value stays visible even if an earlier one is cleared, so the
/// list never shrinks short of a full form reset.
#[must_use]
pub fn identity_fields(form: &FormData) -> Vec<FieldDefinition> {
    let selfie = FieldDefinition::required("selfie", "Selfie", FieldType::File)
        .with_help("A clear photo of your face");
    let front = FieldDefinition::required("idFront", "ID front", FieldType::File)
        .with_help("Front of your identification document");
    let back = FieldDefinition::required("idBack", "ID back", FieldType::File)
        .with_help("Back of your identification document");

    let have_selfie = form.file("selfie").is_some();
    let have_front = form.file("idFront").is_some();
    let have_back = form.file("idBack").is_some();

    let mut fields = vec![selfie];
    if have_selfie || have_front || have_back {
        fields.push(front);
    }
    if (have_selfie && have_front) || have_back {
        fields.push(back);
    }
    fields
}
