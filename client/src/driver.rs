//! Connects the wizard core to a transport.
//!
//! The driver executes the core's effects one at a time, feeds completions
//! back, and keeps going until the queue drains — so a single `advance` call
//! carries the flow all the way through submit, fetch-next, and (on the last
//! step) the identity batch upload. Transport failures during session start
//! and step fetch degrade to the core's local tables; failures during
//! submission surface to the user.

#[cfg(test)]
#[path = "driver_test.rs"]
mod driver_test;

use std::collections::VecDeque;

use serde_json::Value;
use uuid::Uuid;

use wire::{CodeData, CurrentStepResponse, WireField};
use wizard::field::{FieldDefinition, FieldType};
use wizard::machine::{
    Effect, InvitationGrant, Origin, SubmitError, SubmitOutcome, WizardCore,
};
use wizard::session::StateStore;
use wizard::step::{self, StepDefinition};

use crate::api::{Api, ApiError};

/// Host-side orchestrator: one wizard core, one transport, one store.
pub struct WizardDriver<A: Api, S: StateStore> {
    core: WizardCore<S>,
    api: A,
}

impl<A: Api, S: StateStore> WizardDriver<A, S> {
    #[must_use]
    pub fn new(api: A, store: S, origin: Origin) -> Self {
        Self {
            core: WizardCore::new(store, origin),
            api,
        }
    }

    #[must_use]
    pub fn core(&self) -> &WizardCore<S> {
        &self.core
    }

    #[must_use]
    pub fn core_mut(&mut self) -> &mut WizardCore<S> {
        &mut self.core
    }

    /// Start a fresh flow and settle on the first step.
    pub async fn begin(&mut self, now_ms: u64) {
        let effects = self.core.begin(now_ms);
        self.run(effects).await;
    }

    /// Recover a persisted session, or start fresh.
    pub async fn resume(&mut self, now_ms: u64) {
        let effects = self.core.resume(now_ms);
        self.run(effects).await;
    }

    /// Validate and submit the current step, settling on the next state.
    pub async fn advance(&mut self, now_ms: u64) {
        let effects = self.core.advance(now_ms);
        self.run(effects).await;
    }

    /// Move back one step.
    pub async fn retreat(&mut self, now_ms: u64) {
        let effects = self.core.retreat(now_ms);
        self.run(effects).await;
    }

    /// Fire the out-of-band email duplication probe.
    pub async fn check_email(&mut self) {
        let effects = self.core.request_email_check();
        self.run(effects).await;
    }

    /// Run the inactivity check.
    pub async fn tick(&mut self, now_ms: u64) {
        let effects = self.core.tick(now_ms);
        self.run(effects).await;
    }

    /// Best-effort cleanup when leaving mid-flow.
    pub async fn abandon(&mut self) {
        let effects = self.core.abandon();
        self.run(effects).await;
    }

    async fn run(&mut self, effects: Vec<Effect>) {
        let mut queue = VecDeque::from(effects);
        while let Some(effect) = queue.pop_front() {
            let follow_ups = self.execute(effect).await;
            queue.extend(follow_ups);
        }
    }

    async fn execute(&mut self, effect: Effect) -> Vec<Effect> {
        match effect {
            Effect::ValidateCode { epoch, code } => self.run_validate_code(epoch, &code).await,
            Effect::StartSession { epoch, role } => match self.api.start_session(&role).await {
                Ok(response) => self.core.on_session_started(
                    epoch,
                    &response.session_id,
                    wire::to_client_step(response.current_step),
                ),
                Err(error) => {
                    tracing::debug!(%error, "session start unreachable");
                    self.core.on_session_start_failed(epoch);
                    Vec::new()
                }
            },
            Effect::FetchStep { epoch, session_id } => {
                match self.api.current_step(&session_id).await {
                    Ok(response) => self.core.on_step_loaded(epoch, step_from_wire(&response)),
                    Err(error) => {
                        tracing::debug!(%error, "step fetch unreachable");
                        self.core.on_step_fetch_failed(epoch);
                        Vec::new()
                    }
                }
            }
            Effect::SubmitStep {
                epoch,
                session_id,
                step,
                payload,
            } => self.run_submit(epoch, &session_id, step, &payload).await,
            Effect::PreviousStep { epoch, session_id } => {
                if self.core.is_offline() {
                    self.core.on_previous_failed(epoch);
                    return Vec::new();
                }
                match self.api.previous_step(&session_id).await {
                    Ok(response) => self
                        .core
                        .on_previous_ok(epoch, wire::to_client_step(response.current_step)),
                    Err(error) => {
                        tracing::debug!(%error, "previous-step unreachable");
                        self.core.on_previous_failed(epoch);
                        Vec::new()
                    }
                }
            }
            Effect::VerifyEmail { email, .. } => {
                match self.api.verify_email(&email).await {
                    Ok(response) => {
                        self.core
                            .on_email_checked(&email, response.exists.unwrap_or(false));
                    }
                    // No answer means no taint; the backend re-checks anyway.
                    Err(error) => tracing::debug!(%error, "email probe unreachable"),
                }
                Vec::new()
            }
            Effect::UploadIdentityFiles { user_id, files } => {
                if self.core.is_offline() {
                    self.core.on_upload_ok();
                    return Vec::new();
                }
                match self.api.upload_identity(&user_id, &files).await {
                    Ok(_) => self.core.on_upload_ok(),
                    Err(error) => self.core.on_upload_failed(&error.to_string()),
                }
                Vec::new()
            }
            Effect::DeleteSession { session_id } => {
                if !session_id.starts_with("local-") {
                    if let Err(error) = self.api.delete_session(&session_id).await {
                        tracing::warn!(%error, "best-effort session delete failed");
                    }
                }
                Vec::new()
            }
        }
    }

    async fn run_validate_code(&mut self, epoch: u64, code: &str) -> Vec<Effect> {
        match self.api.validate_code(code).await {
            Ok(response) if response.success => {
                let data = response.data.unwrap_or_default();
                if let Some(status) = data.status.as_deref() {
                    if status != "active" {
                        self.core
                            .on_code_invalid(epoch, &format!("this invitation code is {status}"));
                        return Vec::new();
                    }
                }
                self.core.on_code_validated(epoch, &grant_from_wire(&data))
            }
            Ok(_) => {
                self.core
                    .on_code_invalid(epoch, "this invitation code is not valid");
                Vec::new()
            }
            Err(ApiError::Backend { failure, .. }) => {
                self.core.on_code_invalid(epoch, &failure.to_string());
                Vec::new()
            }
            // A deliberately offline transport grants a local placeholder so
            // the flow stays demonstrable end to end.
            Err(ApiError::Offline) => {
                tracing::debug!("offline transport, granting local invitation");
                self.core.on_code_validated(
                    epoch,
                    &InvitationGrant {
                        role: "employee".to_owned(),
                        ..InvitationGrant::default()
                    },
                )
            }
            Err(error) => {
                tracing::debug!(%error, "code validation unreachable");
                self.core
                    .on_code_invalid(epoch, "could not verify the invitation code; try again");
                Vec::new()
            }
        }
    }

    async fn run_submit(
        &mut self,
        epoch: u64,
        session_id: &str,
        step: usize,
        payload: &Value,
    ) -> Vec<Effect> {
        if self.core.is_offline() {
            let completed = step + 1 >= step::TOTAL_STEPS;
            let outcome = SubmitOutcome {
                completed,
                next_step: (!completed).then(|| step + 1),
                user_id: completed.then(|| format!("local-user-{}", Uuid::new_v4())),
            };
            return self.core.on_submit_ok(epoch, &outcome);
        }

        match self.api.submit_step(session_id, payload).await {
            Ok(response) if response.success => {
                let user_id = response.user_id.clone().or_else(|| {
                    response
                        .user
                        .as_ref()
                        .and_then(|user| user.get("id"))
                        .and_then(Value::as_str)
                        .map(ToOwned::to_owned)
                });
                let outcome = SubmitOutcome {
                    completed: response.completed.unwrap_or(false),
                    next_step: response.current_step.map(wire::to_client_step),
                    user_id,
                };
                self.core.on_submit_ok(epoch, &outcome)
            }
            Ok(response) => {
                let failure = match &response.errors {
                    Some(errors) => {
                        wire::ApiFailure::from_payload(422, &serde_json::json!({ "errors": errors }))
                    }
                    None => wire::ApiFailure::General(
                        response
                            .message
                            .clone()
                            .unwrap_or_else(|| "step submission failed".to_owned()),
                    ),
                };
                self.core.on_submit_failed(epoch, &submit_error(failure));
                Vec::new()
            }
            Err(ApiError::Backend { failure, .. }) => {
                self.core.on_submit_failed(epoch, &submit_error(failure));
                Vec::new()
            }
            Err(error) => {
                tracing::warn!(%error, "step submission failed in transit");
                self.core.on_submit_failed(
                    epoch,
                    &SubmitError::General(
                        "could not reach the server; your progress was kept".to_owned(),
                    ),
                );
                Vec::new()
            }
        }
    }
}

fn submit_error(failure: wire::ApiFailure) -> SubmitError {
    match failure {
        wire::ApiFailure::Fields(fields) => SubmitError::Fields(fields),
        wire::ApiFailure::General(message) => SubmitError::General(message),
    }
}

/// Convert a backend step description into the core's model.
#[must_use]
pub fn step_from_wire(response: &CurrentStepResponse) -> StepDefinition {
    StepDefinition {
        index: wire::to_client_step(response.step),
        title: response.title.clone(),
        fields: response.fields.iter().map(field_from_wire).collect(),
    }
}

fn field_from_wire(field: &WireField) -> FieldDefinition {
    FieldDefinition {
        name: field.name.clone(),
        label: field.label.clone(),
        field_type: FieldType::from_wire(&field.field_type),
        required: field.required,
        placeholder: field.placeholder.clone(),
        help: field.help.clone(),
        link: field.link.clone(),
        options: field.options.clone(),
        counterpart: field.confirms.clone(),
    }
}

/// Convert a resolved invitation code into the core's grant model.
#[must_use]
pub fn grant_from_wire(data: &CodeData) -> InvitationGrant {
    let prefill = data
        .preloaded_data
        .as_ref()
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_owned())))
                .collect()
        })
        .unwrap_or_default();

    InvitationGrant {
        company: data.company.as_ref().map(|company| {
            company
                .get("name")
                .and_then(Value::as_str)
                .map_or_else(|| company.to_string(), ToOwned::to_owned)
        }),
        role: data.role.clone().unwrap_or_else(|| "contractor".to_owned()),
        prefill,
        status: data.status.clone(),
    }
}
