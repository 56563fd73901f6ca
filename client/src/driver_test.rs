use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value, json};

use wire::{
    CurrentStepResponse, DeleteSessionResponse, PreviousStepResponse, StartSessionResponse,
    SubmitStepResponse, UploadResponse, ValidateCodeResponse, VerifyEmailResponse, WireField,
};
use wizard::capture::CapturedFile;
use wizard::field::FieldValue;
use wizard::machine::{Origin, Phase};
use wizard::session::MemoryStore;
use wizard::step::{TOTAL_STEPS, local_step};

use super::*;
use crate::api::OfflineApi;

const NOW: u64 = 1_700_000_000_000;

/// Scripted in-memory stand-in for the registration backend.
///
/// Serves the same step shapes the local tables use, tracks the session's
/// 1-based step, and knows which emails are already registered.
#[derive(Default)]
struct FakeBackend {
    wire_step: Mutex<i64>,
    existing_emails: Vec<String>,
    deleted: Mutex<Vec<String>>,
    uploads: Mutex<Vec<String>>,
}

impl FakeBackend {
    fn with_existing_email(email: &str) -> Self {
        Self {
            existing_emails: vec![email.to_owned()],
            ..Self::default()
        }
    }
}

fn wire_fields(step: usize) -> Vec<WireField> {
    local_step(step, false, &wizard::field::FormData::new())
        .fields
        .into_iter()
        .map(|field| WireField {
            name: field.name,
            label: field.label,
            field_type: serde_json::to_value(field.field_type)
                .ok()
                .and_then(|v| v.as_str().map(ToOwned::to_owned))
                .unwrap_or_else(|| "text".to_owned()),
            required: field.required,
            placeholder: field.placeholder,
            help: field.help,
            link: field.link,
            options: field.options,
            confirms: field.counterpart,
        })
        .collect()
}

#[async_trait]
impl Api for FakeBackend {
    async fn start_session(&self, role: &str) -> Result<StartSessionResponse, ApiError> {
        *self.wire_step.lock().unwrap() = 1;
        Ok(StartSessionResponse {
            session_id: "sess-1".to_owned(),
            role: role.to_owned(),
            current_step: 1,
            expires_at: None,
        })
    }

    async fn current_step(&self, _session_id: &str) -> Result<CurrentStepResponse, ApiError> {
        let wire_step = *self.wire_step.lock().unwrap();
        let step = wire::to_client_step(wire_step);
        Ok(CurrentStepResponse {
            step: wire_step,
            title: local_step(step, false, &wizard::field::FormData::new()).title,
            fields: wire_fields(step),
            data: None,
        })
    }

    async fn submit_step(
        &self,
        _session_id: &str,
        _payload: &Value,
    ) -> Result<SubmitStepResponse, ApiError> {
        let mut wire_step = self.wire_step.lock().unwrap();
        if wire::to_client_step(*wire_step) + 1 >= TOTAL_STEPS {
            return Ok(SubmitStepResponse {
                success: true,
                current_step: None,
                completed: Some(true),
                errors: None,
                user_id: Some("user-99".to_owned()),
                user: None,
                message: None,
            });
        }
        *wire_step += 1;
        Ok(SubmitStepResponse {
            success: true,
            current_step: Some(*wire_step),
            completed: Some(false),
            errors: None,
            user_id: None,
            user: None,
            message: None,
        })
    }

    async fn previous_step(&self, _session_id: &str) -> Result<PreviousStepResponse, ApiError> {
        let mut wire_step = self.wire_step.lock().unwrap();
        *wire_step = (*wire_step - 1).max(1);
        Ok(PreviousStepResponse {
            success: true,
            current_step: *wire_step,
        })
    }

    async fn delete_session(&self, session_id: &str) -> Result<DeleteSessionResponse, ApiError> {
        self.deleted.lock().unwrap().push(session_id.to_owned());
        Ok(DeleteSessionResponse {
            success: true,
            message: None,
            session_id: Some(session_id.to_owned()),
        })
    }

    async fn verify_email(&self, email: &str) -> Result<VerifyEmailResponse, ApiError> {
        Ok(VerifyEmailResponse {
            success: true,
            exists: Some(self.existing_emails.iter().any(|e| e == email)),
            retry_after: None,
        })
    }

    async fn validate_code(&self, code: &str) -> Result<ValidateCodeResponse, ApiError> {
        if code == "ACME-2026" {
            return Ok(serde_json::from_value(json!({
                "success": true,
                "data": {
                    "company": { "id": "co-3", "name": "ACME Construcciones" },
                    "role": "employee",
                    "preloadedData": { "firstName": "Ana" },
                    "status": "active",
                },
            }))
            .unwrap());
        }
        Ok(ValidateCodeResponse {
            success: false,
            data: None,
        })
    }

    async fn upload_identity(
        &self,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        let mut uploads = self.uploads.lock().unwrap();
        for (field, _) in files {
            uploads.push(format!("{user_id}/{field}"));
        }
        Ok(UploadResponse {
            success: true,
            uploaded_files: None,
        })
    }

    async fn upload_documents(
        &self,
        _user_id: &str,
        _files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        Ok(UploadResponse {
            success: true,
            uploaded_files: None,
        })
    }
}

fn online_driver(api: FakeBackend) -> WizardDriver<FakeBackend, MemoryStore> {
    WizardDriver::new(
        api,
        MemoryStore::new(),
        Origin::Fresh {
            role: "contractor".to_owned(),
        },
    )
}

fn fill_step0<A: Api>(driver: &mut WizardDriver<A, MemoryStore>) {
    let core = driver.core_mut();
    core.set_field("firstName", FieldValue::Text("Juan".to_owned()));
    core.set_field("lastName", FieldValue::Text("Perez".to_owned()));
    core.set_field("email", FieldValue::Text("juan@test.com".to_owned()));
    core.set_field("phone", FieldValue::Text("+50688889999".to_owned()));
    core.set_field("identification", FieldValue::Text("123456789".to_owned()));
}

// =============================================================
// Online flow
// =============================================================

#[tokio::test]
async fn first_step_advances_with_a_fresh_email() {
    let mut driver = online_driver(FakeBackend::default());
    driver.begin(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });

    fill_step0(&mut driver);
    driver.check_email().await;
    driver.advance(NOW).await;

    assert_eq!(*driver.core().phase(), Phase::Ready { step: 1 });
    assert_eq!(driver.core().step_def().unwrap().title, "Account security");
    assert!(!driver.core().is_offline());
}

#[tokio::test]
async fn duplicate_email_pins_the_flow_to_step_zero() {
    let mut driver = online_driver(FakeBackend::with_existing_email("juan@test.com"));
    driver.begin(NOW).await;
    fill_step0(&mut driver);
    driver.check_email().await;
    driver.advance(NOW).await;

    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });
    assert!(driver.core().errors()["email"].contains("already registered"));
}

#[tokio::test]
async fn retreat_follows_the_backend_step() {
    let mut driver = online_driver(FakeBackend::default());
    driver.begin(NOW).await;
    fill_step0(&mut driver);
    driver.advance(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 1 });

    driver.retreat(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });
    assert_eq!(driver.core().step_def().unwrap().title, "Your details");
}

#[tokio::test]
async fn abandon_deletes_the_server_session() {
    let mut driver = online_driver(FakeBackend::default());
    driver.begin(NOW).await;
    driver.abandon().await;
    assert_eq!(
        *driver.api.deleted.lock().unwrap(),
        vec!["sess-1".to_owned()]
    );
}

#[tokio::test]
async fn expiry_tick_deletes_and_terminates() {
    let mut driver = online_driver(FakeBackend::default());
    driver.begin(NOW).await;
    driver.tick(NOW + wizard::consts::SESSION_TIMEOUT_MS).await;
    assert_eq!(*driver.core().phase(), Phase::Expired);
    assert_eq!(
        *driver.api.deleted.lock().unwrap(),
        vec!["sess-1".to_owned()]
    );
}

// =============================================================
// Fallback and offline flow
// =============================================================

#[tokio::test]
async fn unreachable_backend_degrades_to_local_steps() {
    let mut driver = WizardDriver::new(
        OfflineApi,
        MemoryStore::new(),
        Origin::Fresh {
            role: "contractor".to_owned(),
        },
    );
    driver.begin(NOW).await;
    assert!(driver.core().is_offline());
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });
    assert!(driver.core().session_id().unwrap().starts_with("local-"));
}

#[tokio::test]
async fn offline_flow_completes_end_to_end() {
    let mut driver = WizardDriver::new(
        OfflineApi,
        MemoryStore::new(),
        Origin::Fresh {
            role: "contractor".to_owned(),
        },
    );
    driver.begin(NOW).await;
    fill_step0(&mut driver);
    driver.advance(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 1 });

    let core = driver.core_mut();
    core.set_field("password", FieldValue::Text("Abcdef1!".to_owned()));
    core.set_field("confirmPassword", FieldValue::Text("Abcdef1!".to_owned()));
    driver.advance(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 2 });

    for field in ["selfie", "idFront", "idBack"] {
        driver
            .core_mut()
            .attach_file(
                field,
                CapturedFile {
                    name: format!("{field}.jpg"),
                    mime: "image/jpeg".to_owned(),
                    bytes: vec![0xFF, 0xD8],
                },
            )
            .unwrap();
    }
    driver.advance(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 3 });

    let core = driver.core_mut();
    core.set_field("termsAccepted", FieldValue::Flag(true));
    core.set_field("privacyAccepted", FieldValue::Flag(true));
    driver.advance(NOW).await;

    let Phase::Success { user_id } = driver.core().phase() else {
        panic!("expected success, got {:?}", driver.core().phase());
    };
    assert!(user_id.as_deref().unwrap().starts_with("local-user-"));
    // The staged batch was "uploaded" locally and dropped.
    assert!(driver.core().staged_files().is_empty());
    assert!(driver.core().upload_warning().is_none());
}

#[tokio::test]
async fn identity_upload_lands_on_the_backend_after_completion() {
    let mut driver = online_driver(FakeBackend::default());
    driver.begin(NOW).await;
    fill_step0(&mut driver);
    driver.advance(NOW).await;

    let core = driver.core_mut();
    core.set_field("password", FieldValue::Text("Abcdef1!".to_owned()));
    core.set_field("confirmPassword", FieldValue::Text("Abcdef1!".to_owned()));
    driver.advance(NOW).await;

    for field in ["selfie", "idFront", "idBack"] {
        driver
            .core_mut()
            .attach_file(
                field,
                CapturedFile {
                    name: format!("{field}.jpg"),
                    mime: "image/jpeg".to_owned(),
                    bytes: vec![0xFF, 0xD8],
                },
            )
            .unwrap();
    }
    driver.advance(NOW).await;

    let core = driver.core_mut();
    core.set_field("termsAccepted", FieldValue::Flag(true));
    core.set_field("privacyAccepted", FieldValue::Flag(true));
    driver.advance(NOW).await;

    assert!(matches!(*driver.core().phase(), Phase::Success { .. }));
    let uploads = driver.api.uploads.lock().unwrap();
    assert!(uploads.contains(&"user-99/selfie".to_owned()));
    assert!(uploads.contains(&"user-99/idBack".to_owned()));
}

// =============================================================
// Invitation flow
// =============================================================

#[tokio::test]
async fn valid_invitation_code_prefills_and_starts() {
    let mut driver = WizardDriver::new(
        FakeBackend::default(),
        MemoryStore::new(),
        Origin::Invitation {
            code: "ACME-2026".to_owned(),
        },
    );
    driver.begin(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });
    assert_eq!(driver.core().form().text("firstName"), Some("Ana"));
    assert_eq!(driver.core().form().text("invitationCode"), Some("ACME-2026"));
}

#[tokio::test]
async fn rejected_invitation_code_stays_inline() {
    let mut driver = WizardDriver::new(
        FakeBackend::default(),
        MemoryStore::new(),
        Origin::Invitation {
            code: "WRONG".to_owned(),
        },
    );
    driver.begin(NOW).await;
    assert_eq!(*driver.core().phase(), Phase::Ready { step: 0 });
    assert!(driver.core().errors().contains_key("invitationCode"));
    assert!(driver.core().general_error().is_none());
}
