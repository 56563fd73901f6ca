//! Shared wire model for the marketplace REST API.
//!
//! This crate owns the request and response shapes the clients exchange with
//! the backend — registration sessions, the email probe, invitation codes,
//! and identity-file uploads — plus decoding of the backend's several error
//! payload conventions. The API itself lives elsewhere; these types only
//! describe what crosses the wire, in the backend's camelCase JSON.
//!
//! Step indices are 1-based on the wire and 0-based everywhere in the
//! clients; [`to_client_step`] and [`to_server_step`] are the only place that
//! conversion happens.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod failure;

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;

pub use failure::ApiFailure;

// =============================================================================
// STEP INDEX CONVERSION
// =============================================================================

/// Convert a 1-based wire step index to the clients' 0-based form.
///
/// Zero, negative, and otherwise nonsensical values normalize to step 0.
#[must_use]
pub fn to_client_step(server: i64) -> usize {
    usize::try_from(server.saturating_sub(1)).unwrap_or(0)
}

/// Convert a 0-based client step index to the wire's 1-based form.
#[must_use]
pub fn to_server_step(client: usize) -> i64 {
    i64::try_from(client).unwrap_or(i64::MAX - 1) + 1
}

// =============================================================================
// REGISTRATION SESSIONS
// =============================================================================

/// `POST /api/registration/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    pub role: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionResponse {
    pub session_id: String,
    pub role: String,
    /// 1-based index of the step the session opened on.
    pub current_step: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

/// One field as the backend describes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireField {
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirms: Option<String>,
}

/// `GET /api/registration/session/:id/current`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentStepResponse {
    /// 1-based index of the step being described.
    pub step: i64,
    pub title: String,
    pub fields: Vec<WireField>,
    /// Values the session already holds, echoed for re-fill.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// `POST /api/registration/session/:id/submit`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitStepResponse {
    pub success: bool,
    /// 1-based index the session moved to, absent on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    /// Per-field messages or a general payload; see [`failure`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `POST /api/registration/session/:id/previous`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousStepResponse {
    pub success: bool,
    /// 1-based index the session moved back to.
    pub current_step: i64,
}

/// `DELETE /api/registration/session/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSessionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

// =============================================================================
// EMAIL PROBE
// =============================================================================

/// `POST /api/auth/verify-email`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailResponse {
    pub success: bool,
    /// Whether the address is already registered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exists: Option<bool>,
    /// Seconds to wait before probing again, when rate limited.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<i64>,
}

// =============================================================================
// INVITATION CODES
// =============================================================================

/// `POST /api/temporary-codes/validate`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCodeRequest {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_full_data: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateCodeResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<CodeData>,
}

/// The company/role grant behind a valid invitation code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Field values to pre-fill, keyed by UI field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preloaded_data: Option<Value>,
    /// Usage/expiry status, e.g. `"active"` or `"expired"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

// =============================================================================
// FILE UPLOADS
// =============================================================================

/// `POST /api/contractor-files/identity` and `/documents` (multipart).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_files: Option<Value>,
}

/// Field names accepted by the identity batch, in upload order.
pub const IDENTITY_FILE_FIELDS: [&str; 3] = ["selfie", "idFront", "idBack"];
