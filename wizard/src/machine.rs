//! The wizard phase machine and its effect/completion surface.
//!
//! [`WizardCore`] is the single authority over the registration flow. Hosts
//! call its input methods (`begin`, `advance`, `retreat`, `tick`, ...), get
//! back a list of [`Effect`]s to execute against the transport, and report
//! the results through the `on_*` completion methods — which may themselves
//! yield follow-up effects. Phase is a single tagged union, so contradictory
//! flag combinations cannot be represented.
//!
//! Every effect carries the epoch it was issued under. The epoch bumps on
//! each step transition and reset, and completions from an older epoch are
//! dropped, so a slow response from a previous step can never clobber the
//! current one.

#[cfg(test)]
#[path = "machine_test.rs"]
mod machine_test;

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::capture::{self, CaptureError, CapturedFile};
use crate::consts::SESSION_TIMEOUT_MS;
use crate::field::{FieldValue, FormData};
use crate::session::{self, StateStore};
use crate::step::{self, StepDefinition};
use crate::validate;

/// Where a registration attempt came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Direct signup under a self-chosen role.
    Fresh {
        role: String,
    },
    /// Signup through a company invitation code.
    Invitation {
        code: String,
    },
}

/// A resolved invitation code: company, role, and pre-fill values.
///
/// Fetched once per invitation-flow session; read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvitationGrant {
    pub company: Option<String>,
    pub role: String,
    pub prefill: BTreeMap<String, String>,
    pub status: Option<String>,
}

/// The one authoritative lifecycle state of the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Nothing has happened yet.
    Uninitialized,
    /// Waiting on the transport for the given step's definition.
    Loading { step: usize },
    /// Collecting input for the given step.
    Ready { step: usize },
    /// The given step's payload is in flight. At most one at a time.
    Submitting { step: usize },
    /// Registration finished.
    Success { user_id: Option<String> },
    /// The inactivity timeout fired; the session is gone.
    Expired,
    /// An unrecoverable error; the flow must be restarted.
    Failed { message: String },
}

impl Phase {
    /// The step this phase is on, if it is step-scoped.
    #[must_use]
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Loading { step } | Self::Ready { step } | Self::Submitting { step } => Some(*step),
            _ => None,
        }
    }

    /// Whether the flow has ended, successfully or not.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Expired | Self::Failed { .. })
    }
}

/// Work the host must perform on behalf of the core.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Resolve an invitation code before starting the session.
    ValidateCode { epoch: u64, code: String },
    /// Open a registration session for the given role.
    StartSession { epoch: u64, role: String },
    /// Fetch the current step's definition.
    FetchStep { epoch: u64, session_id: String },
    /// Submit the assembled payload for the given step.
    SubmitStep {
        epoch: u64,
        session_id: String,
        step: usize,
        payload: Value,
    },
    /// Ask the backend to move the session back one step.
    PreviousStep { epoch: u64, session_id: String },
    /// Probe whether an email is already registered.
    VerifyEmail { epoch: u64, email: String },
    /// Upload the staged identity captures in one batch.
    UploadIdentityFiles {
        user_id: String,
        files: Vec<(String, CapturedFile)>,
    },
    /// Best-effort server-side session deletion.
    DeleteSession { session_id: String },
}

/// Result of a successful step submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOutcome {
    /// The last step was accepted and registration is complete.
    pub completed: bool,
    /// 0-based index the session moved to, when not completed.
    pub next_step: Option<usize>,
    /// Newly issued user id, present on completion.
    pub user_id: Option<String>,
}

/// A failed step submission, already shaped for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Structured errors keyed by field name, mapped 1:1 onto the form.
    Fields(BTreeMap<String, String>),
    /// A single human-readable block for the page-level banner.
    General(String),
}

/// What happened to a capture the host handed in.
#[derive(Debug, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Decoded and staged for upload.
    Stored,
    /// A conversion for this field is already in flight; input ignored.
    AlreadyProcessing,
    /// Decoding failed; the error is now on the field.
    Rejected,
}

/// Client-side orchestrator of the multi-step signup flow.
pub struct WizardCore<S: StateStore> {
    phase: Phase,
    origin: Origin,
    store: S,
    session_id: Option<String>,
    form: FormData,
    files: BTreeMap<String, CapturedFile>,
    step_def: Option<StepDefinition>,
    errors: BTreeMap<String, String>,
    general_error: Option<String>,
    upload_warning: Option<String>,
    duplicate_emails: BTreeSet<String>,
    captures_in_flight: BTreeSet<String>,
    last_activity: u64,
    epoch: u64,
    offline: bool,
}

impl<S: StateStore> WizardCore<S> {
    #[must_use]
    pub fn new(store: S, origin: Origin) -> Self {
        Self {
            phase: Phase::Uninitialized,
            origin,
            store,
            session_id: None,
            form: FormData::new(),
            files: BTreeMap::new(),
            step_def: None,
            errors: BTreeMap::new(),
            general_error: None,
            upload_warning: None,
            duplicate_emails: BTreeSet::new(),
            captures_in_flight: BTreeSet::new(),
            last_activity: 0,
            epoch: 0,
            offline: false,
        }
    }

    // --- Lifecycle inputs ---

    /// Start a fresh flow. Invitation origins resolve their code first.
    pub fn begin(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.phase != Phase::Uninitialized {
            return Vec::new();
        }
        self.last_activity = now_ms;
        session::touch(&mut self.store, now_ms);
        self.phase = Phase::Loading { step: 0 };
        match self.origin.clone() {
            Origin::Invitation { code } => vec![Effect::ValidateCode {
                epoch: self.epoch,
                code,
            }],
            Origin::Fresh { role } => vec![Effect::StartSession {
                epoch: self.epoch,
                role,
            }],
        }
    }

    /// Recover a persisted session, or fall back to [`Self::begin`].
    pub fn resume(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.phase != Phase::Uninitialized {
            return Vec::new();
        }
        let Some(persisted) = session::load(&self.store, step::TOTAL_STEPS) else {
            return self.begin(now_ms);
        };
        if session::is_expired(
            now_ms,
            persisted.last_activity.unwrap_or(0),
            SESSION_TIMEOUT_MS,
        ) {
            tracing::info!(session_id = %persisted.id, "persisted session is stale, starting over");
            session::clear(&mut self.store);
            return self.begin(now_ms);
        }

        self.session_id = Some(persisted.id.clone());
        self.last_activity = now_ms;
        session::touch(&mut self.store, now_ms);
        self.phase = Phase::Loading {
            step: persisted.step,
        };
        vec![Effect::FetchStep {
            epoch: self.epoch,
            session_id: persisted.id,
        }]
    }

    /// Fire-and-forget cleanup when the host goes away mid-flow.
    pub fn abandon(&mut self) -> Vec<Effect> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        session::clear(&mut self.store);
        self.session_id
            .clone()
            .map(|session_id| Effect::DeleteSession { session_id })
            .into_iter()
            .collect()
    }

    /// Drop all progress and return to a blank flow under a new epoch.
    pub fn reset(&mut self) {
        self.epoch += 1;
        self.phase = Phase::Uninitialized;
        self.session_id = None;
        self.form.reset();
        self.files.clear();
        self.step_def = None;
        self.errors.clear();
        self.general_error = None;
        self.upload_warning = None;
        self.captures_in_flight.clear();
        session::clear(&mut self.store);
    }

    // --- Activity & expiry ---

    /// Record a user interaction, refreshing the inactivity clock.
    pub fn record_activity(&mut self, now_ms: u64) {
        if self.phase.is_terminal() {
            return;
        }
        self.last_activity = now_ms;
        session::touch(&mut self.store, now_ms);
    }

    /// Periodic inactivity check.
    ///
    /// On the first tick past the timeout the session keys are cleared, a
    /// best-effort delete is emitted, and the phase becomes [`Phase::Expired`].
    /// Further ticks are no-ops.
    pub fn tick(&mut self, now_ms: u64) -> Vec<Effect> {
        if self.phase.is_terminal() || self.phase == Phase::Uninitialized {
            return Vec::new();
        }
        if !session::is_expired(now_ms, self.last_activity, SESSION_TIMEOUT_MS) {
            return Vec::new();
        }
        tracing::info!("registration session expired after inactivity");
        self.phase = Phase::Expired;
        session::clear(&mut self.store);
        self.session_id
            .take()
            .map(|session_id| Effect::DeleteSession { session_id })
            .into_iter()
            .collect()
    }

    // --- Form inputs ---

    /// Store a field value and clear any stale error on it.
    pub fn set_field(&mut self, name: &str, value: FieldValue) {
        if !matches!(self.phase, Phase::Ready { .. }) {
            return;
        }
        self.form.set(name, value);
        self.errors.remove(name);
        // The identity step's field list depends on what has been captured.
        self.refresh_identity_step();
    }

    /// Ask for the out-of-band duplicate check on the current email value.
    ///
    /// Emits nothing when the email is blank, malformed, or already known.
    pub fn request_email_check(&mut self) -> Vec<Effect> {
        if !matches!(self.phase, Phase::Ready { .. }) {
            return Vec::new();
        }
        let Some(email) = self.form.text("email") else {
            return Vec::new();
        };
        if !validate::email_format_ok(email) {
            return Vec::new();
        }
        if self.duplicate_emails.contains(&email.to_ascii_lowercase()) {
            return Vec::new();
        }
        vec![Effect::VerifyEmail {
            epoch: self.epoch,
            email: email.to_owned(),
        }]
    }

    /// Decode a capture widget's data URL into the given file field.
    pub fn capture_data_url(&mut self, field: &str, url: &str) -> CaptureOutcome {
        // Empty capture clears the field.
        if url.is_empty() {
            self.clear_capture(field);
            return CaptureOutcome::Stored;
        }
        if !self.captures_in_flight.insert(field.to_owned()) {
            return CaptureOutcome::AlreadyProcessing;
        }
        let result = capture::decode_data_url(field, url);
        self.captures_in_flight.remove(field);
        match result {
            Ok(file) => {
                self.stage_file(field, file);
                CaptureOutcome::Stored
            }
            Err(error) => {
                self.errors.insert(field.to_owned(), error.to_string());
                CaptureOutcome::Rejected
            }
        }
    }

    /// Stage a file the host already decoded (e.g. read from disk).
    ///
    /// # Errors
    ///
    /// Rejects non-images and oversized files without touching the form.
    pub fn attach_file(&mut self, field: &str, file: CapturedFile) -> Result<(), CaptureError> {
        capture::check(&file)?;
        self.stage_file(field, file);
        Ok(())
    }

    /// Remove a staged capture from the upload batch and the form.
    pub fn clear_capture(&mut self, field: &str) {
        self.files.remove(field);
        self.form.clear(field);
        self.errors.remove(field);
        self.refresh_identity_step();
    }

    fn stage_file(&mut self, field: &str, file: CapturedFile) {
        self.files.insert(field.to_owned(), file.clone());
        self.form.set(field, FieldValue::File(file));
        self.errors.remove(field);
        self.refresh_identity_step();
    }

    // --- Step navigation ---

    /// Validate the current step and, if clean, submit it.
    ///
    /// On validation failure the per-field errors are set, nothing is
    /// emitted, and the phase stays [`Phase::Ready`]. Re-running with the
    /// same form yields the same errors and no duplicate submission.
    pub fn advance(&mut self, now_ms: u64) -> Vec<Effect> {
        let Phase::Ready { step } = self.phase else {
            return Vec::new();
        };
        let Some(def) = self.step_def.clone() else {
            return Vec::new();
        };
        self.record_activity(now_ms);

        let errors = validate::validate_step(&def, &self.form, &self.duplicate_emails);
        if !errors.is_empty() {
            self.errors = errors;
            return Vec::new();
        }
        self.errors.clear();
        self.general_error = None;

        let Some(session_id) = self.session_id.clone() else {
            // No session yet means the invitation code was rejected before one
            // opened; re-validate the corrected code instead of submitting.
            if let Some(code) = self.form.text("invitationCode").map(str::to_owned) {
                self.origin = Origin::Invitation { code: code.clone() };
                self.phase = Phase::Loading { step };
                return vec![Effect::ValidateCode {
                    epoch: self.epoch,
                    code,
                }];
            }
            return Vec::new();
        };
        self.phase = Phase::Submitting { step };
        vec![Effect::SubmitStep {
            epoch: self.epoch,
            session_id,
            step,
            payload: build_payload(&def, &self.form),
        }]
    }

    /// Move back one step. Valid only from `Ready` with step > 0.
    pub fn retreat(&mut self, now_ms: u64) -> Vec<Effect> {
        let Phase::Ready { step } = self.phase else {
            return Vec::new();
        };
        if step == 0 {
            return Vec::new();
        }
        self.record_activity(now_ms);
        self.epoch += 1;
        self.phase = Phase::Loading { step: step - 1 };
        let Some(session_id) = self.session_id.clone() else {
            return Vec::new();
        };
        vec![Effect::PreviousStep {
            epoch: self.epoch,
            session_id,
        }]
    }

    // --- Transport completions ---

    /// Invitation code resolved; pre-fill and open the session.
    pub fn on_code_validated(&mut self, epoch: u64, grant: &InvitationGrant) -> Vec<Effect> {
        if self.stale(epoch) {
            return Vec::new();
        }
        for (name, value) in &grant.prefill {
            self.form.set(name, FieldValue::Text(value.clone()));
        }
        if let Origin::Invitation { code } = &self.origin {
            self.form.set("invitationCode", FieldValue::Text(code.clone()));
        }
        vec![Effect::StartSession {
            epoch: self.epoch,
            role: grant.role.clone(),
        }]
    }

    /// Invitation code rejected. The error lands on the field, not the
    /// banner, and the first step renders locally so it can be corrected.
    pub fn on_code_invalid(&mut self, epoch: u64, message: &str) {
        if self.stale(epoch) {
            return;
        }
        self.errors
            .insert("invitationCode".to_owned(), message.to_owned());
        self.serve_local_step(0);
    }

    /// Session opened; `step` is already 0-based.
    pub fn on_session_started(&mut self, epoch: u64, session_id: &str, step: usize) -> Vec<Effect> {
        if self.stale(epoch) {
            return Vec::new();
        }
        let step = step.min(step::TOTAL_STEPS - 1);
        self.session_id = Some(session_id.to_owned());
        session::persist(&mut self.store, session_id, step);
        self.phase = Phase::Loading { step };
        vec![Effect::FetchStep {
            epoch: self.epoch,
            session_id: session_id.to_owned(),
        }]
    }

    /// Session start failed; synthesize a local session and serve the flow
    /// from the local step tables.
    pub fn on_session_start_failed(&mut self, epoch: u64) {
        if self.stale(epoch) {
            return;
        }
        let local_id = format!("local-{}", Uuid::new_v4());
        tracing::debug!(session_id = %local_id, "backend unreachable, serving local steps");
        self.offline = true;
        self.session_id = Some(local_id.clone());
        let step = self.phase.step().unwrap_or(0);
        session::persist(&mut self.store, &local_id, step);
        self.serve_local_step(step);
    }

    /// Step definition arrived from the backend.
    pub fn on_step_loaded(&mut self, epoch: u64, def: StepDefinition) -> Vec<Effect> {
        if self.stale(epoch) {
            return Vec::new();
        }
        let mut def = def;
        def.index = def.index.min(step::TOTAL_STEPS - 1);
        let step = def.index;
        if let Some(id) = self.session_id.clone() {
            session::persist(&mut self.store, &id, step);
        }
        self.step_def = Some(def);
        self.phase = Phase::Ready { step };
        Vec::new()
    }

    /// Step fetch failed; degrade to the local table for this step.
    pub fn on_step_fetch_failed(&mut self, epoch: u64) {
        if self.stale(epoch) {
            return;
        }
        let step = self.phase.step().unwrap_or(0);
        tracing::debug!(step, "step fetch failed, serving local definition");
        self.offline = true;
        self.serve_local_step(step);
    }

    /// Submission accepted.
    pub fn on_submit_ok(&mut self, epoch: u64, outcome: &SubmitOutcome) -> Vec<Effect> {
        if self.stale(epoch) {
            return Vec::new();
        }
        let Phase::Submitting { step } = self.phase else {
            return Vec::new();
        };

        if outcome.completed {
            self.phase = Phase::Success {
                user_id: outcome.user_id.clone(),
            };
            session::clear(&mut self.store);
            let Some(user_id) = outcome.user_id.clone() else {
                if !self.files.is_empty() {
                    self.upload_warning =
                        Some("identity photos were not uploaded; no user id issued".to_owned());
                }
                return Vec::new();
            };
            if self.files.is_empty() {
                return Vec::new();
            }
            return vec![Effect::UploadIdentityFiles {
                user_id,
                files: self.files.clone().into_iter().collect(),
            }];
        }

        self.epoch += 1;
        let next = outcome
            .next_step
            .unwrap_or(step + 1)
            .min(step::TOTAL_STEPS - 1);
        if let Some(id) = self.session_id.clone() {
            session::persist(&mut self.store, &id, next);
        }
        self.phase = Phase::Loading { step: next };
        if self.offline {
            self.serve_local_step(next);
            return Vec::new();
        }
        let Some(session_id) = self.session_id.clone() else {
            self.serve_local_step(next);
            return Vec::new();
        };
        vec![Effect::FetchStep {
            epoch: self.epoch,
            session_id,
        }]
    }

    /// Submission rejected. Field errors map 1:1; anything else becomes the
    /// page banner, except invitation-code problems which stay on the field.
    pub fn on_submit_failed(&mut self, epoch: u64, error: &SubmitError) {
        if self.stale(epoch) {
            return;
        }
        let Phase::Submitting { step } = self.phase else {
            return;
        };
        self.phase = Phase::Ready { step };
        match error {
            SubmitError::Fields(fields) => {
                for (name, message) in fields {
                    self.errors.insert(name.clone(), message.clone());
                }
            }
            SubmitError::General(message) => {
                let on_code_step = self
                    .step_def
                    .as_ref()
                    .is_some_and(StepDefinition::has_invitation_code);
                if on_code_step && message.to_ascii_lowercase().contains("invitation") {
                    self.errors
                        .insert("invitationCode".to_owned(), message.clone());
                } else {
                    self.general_error = Some(message.clone());
                }
            }
        }
    }

    /// Backend confirmed the step regression; `step` is already 0-based.
    pub fn on_previous_ok(&mut self, epoch: u64, step: usize) -> Vec<Effect> {
        if self.stale(epoch) {
            return Vec::new();
        }
        let step = step.min(step::TOTAL_STEPS - 1);
        self.phase = Phase::Loading { step };
        if let Some(id) = self.session_id.clone() {
            session::persist(&mut self.store, &id, step);
        }
        if self.offline {
            self.serve_local_step(step);
            return Vec::new();
        }
        let Some(session_id) = self.session_id.clone() else {
            self.serve_local_step(step);
            return Vec::new();
        };
        vec![Effect::FetchStep {
            epoch: self.epoch,
            session_id,
        }]
    }

    /// Backend could not move back; keep the local decrement already applied.
    pub fn on_previous_failed(&mut self, epoch: u64) {
        if self.stale(epoch) {
            return;
        }
        let step = self.phase.step().unwrap_or(0);
        tracing::debug!(step, "previous-step request failed, falling back locally");
        if let Some(id) = self.session_id.clone() {
            session::persist(&mut self.store, &id, step);
        }
        self.serve_local_step(step);
    }

    /// Result of the out-of-band email existence probe.
    ///
    /// Taints are keyed by address, so a result for an email the user has
    /// since replaced is still recorded but no longer surfaces.
    pub fn on_email_checked(&mut self, email: &str, exists: bool) {
        let normalized = email.to_ascii_lowercase();
        if exists {
            self.duplicate_emails.insert(normalized.clone());
        } else {
            self.duplicate_emails.remove(&normalized);
        }
        let current = self
            .form
            .text("email")
            .is_some_and(|value| value.eq_ignore_ascii_case(email));
        if current && exists && matches!(self.phase, Phase::Ready { .. }) {
            self.errors.insert(
                "email".to_owned(),
                "this email is already registered".to_owned(),
            );
        }
    }

    /// Identity batch uploaded; the staged files are dropped.
    pub fn on_upload_ok(&mut self) {
        self.files.clear();
        self.upload_warning = None;
    }

    /// Identity batch upload failed. Registration stands; surface a warning.
    pub fn on_upload_failed(&mut self, message: &str) {
        tracing::warn!(%message, "identity upload failed after successful registration");
        self.upload_warning = Some(format!("identity photos could not be uploaded: {message}"));
    }

    // --- Queries ---

    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    #[must_use]
    pub fn step_def(&self) -> Option<&StepDefinition> {
        self.step_def.as_ref()
    }

    #[must_use]
    pub fn form(&self) -> &FormData {
        &self.form
    }

    #[must_use]
    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    #[must_use]
    pub fn general_error(&self) -> Option<&str> {
        self.general_error.as_deref()
    }

    #[must_use]
    pub fn upload_warning(&self) -> Option<&str> {
        self.upload_warning.as_deref()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    #[must_use]
    pub fn staged_files(&self) -> &BTreeMap<String, CapturedFile> {
        &self.files
    }

    /// Whether the flow degraded to the local step tables.
    #[must_use]
    pub fn is_offline(&self) -> bool {
        self.offline
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // --- Internals ---

    fn stale(&self, epoch: u64) -> bool {
        if epoch != self.epoch {
            tracing::debug!(got = epoch, current = self.epoch, "dropping stale completion");
            return true;
        }
        self.phase.is_terminal()
    }

    fn serve_local_step(&mut self, step: usize) {
        let with_invitation = matches!(self.origin, Origin::Invitation { .. });
        let def = step::local_step(step, with_invitation, &self.form);
        let step = def.index;
        self.step_def = Some(def);
        self.phase = Phase::Ready { step };
    }

    fn refresh_identity_step(&mut self) {
        let on_identity = self
            .step_def
            .as_ref()
            .is_some_and(|def| def.index == step::IDENTITY_STEP);
        if on_identity {
            let with_invitation = matches!(self.origin, Origin::Invitation { .. });
            self.step_def = Some(step::local_step(
                step::IDENTITY_STEP,
                with_invitation,
                &self.form,
            ));
        }
    }
}

/// Assemble the submission payload for one step.
///
/// Confirmation fields never leave the client; UI names map to the backend's
/// (`identification` becomes `cedula`); staged files submit as their
/// synthesized file names, with bytes following in the post-completion batch.
#[must_use]
pub fn build_payload(def: &StepDefinition, form: &FormData) -> Value {
    let mut payload = Map::new();
    for field in &def.fields {
        if field.counterpart.is_some() {
            continue;
        }
        let Some(value) = form.get(&field.name) else {
            continue;
        };
        let json = match value {
            FieldValue::Text(text) => Value::String(text.clone()),
            FieldValue::Flag(flag) => Value::Bool(*flag),
            FieldValue::File(file) => Value::String(file.name.clone()),
        };
        payload.insert(backend_name(&field.name).to_owned(), json);
    }
    Value::Object(payload)
}

/// Translate a UI field name to the backend's name for it.
#[must_use]
pub fn backend_name(ui_name: &str) -> &str {
    match ui_name {
        "identification" => "cedula",
        other => other,
    }
}
