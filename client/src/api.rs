//! The transport trait and its HTTP implementation.
//!
//! [`Api`] is one method per backend endpoint, so the driver can run against
//! real HTTP, a scripted fake in tests, or [`OfflineApi`] when the flow should
//! stay fully local.

use async_trait::async_trait;
use serde_json::Value;

use wire::{
    ApiFailure, CurrentStepResponse, DeleteSessionResponse, PreviousStepResponse,
    StartSessionRequest, StartSessionResponse, SubmitStepResponse, UploadResponse,
    ValidateCodeRequest, ValidateCodeResponse, VerifyEmailRequest, VerifyEmailResponse,
};
use wizard::capture::CapturedFile;

/// Error from a transport call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("backend rejected the request: {failure}")]
    Backend { status: u16, failure: ApiFailure },
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("transport is offline")]
    Offline,
}

/// One method per backend endpoint the registration flow touches.
#[async_trait]
pub trait Api {
    async fn start_session(&self, role: &str) -> Result<StartSessionResponse, ApiError>;
    async fn current_step(&self, session_id: &str) -> Result<CurrentStepResponse, ApiError>;
    async fn submit_step(
        &self,
        session_id: &str,
        payload: &Value,
    ) -> Result<SubmitStepResponse, ApiError>;
    async fn previous_step(&self, session_id: &str) -> Result<PreviousStepResponse, ApiError>;
    async fn delete_session(&self, session_id: &str) -> Result<DeleteSessionResponse, ApiError>;
    async fn verify_email(&self, email: &str) -> Result<VerifyEmailResponse, ApiError>;
    async fn validate_code(&self, code: &str) -> Result<ValidateCodeResponse, ApiError>;
    async fn upload_identity(
        &self,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError>;
    async fn upload_documents(
        &self,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError>;
}

/// Real HTTP transport over `reqwest`.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpApi {
    /// Build a transport against a base URL like `http://127.0.0.1:3000`.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] when the underlying client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let status = response.status();
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ApiError::Backend {
                status: status.as_u16(),
                failure: ApiFailure::from_payload(status.as_u16(), &value),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    fn multipart_batch(
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new().text("userId", user_id.to_owned());
        for (field, file) in files {
            let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                .file_name(file.name.clone())
                .mime_str(&file.mime)?;
            form = form.part(field.clone(), part);
        }
        Ok(form)
    }

    async fn upload(
        &self,
        path: &str,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        let form = Self::multipart_batch(user_id, files)?;
        let response = self
            .client
            .post(self.url(path))
            .multipart(form)
            .send()
            .await?;
        Self::decode(response).await
    }
}

#[async_trait]
impl Api for HttpApi {
    async fn start_session(&self, role: &str) -> Result<StartSessionResponse, ApiError> {
        let body = serde_json::to_value(StartSessionRequest {
            role: role.to_owned(),
        })?;
        self.post_json("/api/registration/start", &body).await
    }

    async fn current_step(&self, session_id: &str) -> Result<CurrentStepResponse, ApiError> {
        self.get_json(&format!("/api/registration/session/{session_id}/current"))
            .await
    }

    async fn submit_step(
        &self,
        session_id: &str,
        payload: &Value,
    ) -> Result<SubmitStepResponse, ApiError> {
        self.post_json(
            &format!("/api/registration/session/{session_id}/submit"),
            payload,
        )
        .await
    }

    async fn previous_step(&self, session_id: &str) -> Result<PreviousStepResponse, ApiError> {
        self.post_json(
            &format!("/api/registration/session/{session_id}/previous"),
            &Value::Object(serde_json::Map::new()),
        )
        .await
    }

    async fn delete_session(&self, session_id: &str) -> Result<DeleteSessionResponse, ApiError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/registration/session/{session_id}")))
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn verify_email(&self, email: &str) -> Result<VerifyEmailResponse, ApiError> {
        let body = serde_json::to_value(VerifyEmailRequest {
            email: email.to_owned(),
        })?;
        self.post_json("/api/auth/verify-email", &body).await
    }

    async fn validate_code(&self, code: &str) -> Result<ValidateCodeResponse, ApiError> {
        let body = serde_json::to_value(ValidateCodeRequest {
            code: code.to_owned(),
            include_full_data: Some(true),
        })?;
        self.post_json("/api/temporary-codes/validate", &body).await
    }

    async fn upload_identity(
        &self,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        // The backend expects the batch in selfie/front/back order.
        let mut ordered = files.to_vec();
        ordered.sort_by_key(|(field, _)| {
            wire::IDENTITY_FILE_FIELDS
                .iter()
                .position(|name| *name == field.as_str())
                .unwrap_or(usize::MAX)
        });
        self.upload("/api/contractor-files/identity", user_id, &ordered)
            .await
    }

    async fn upload_documents(
        &self,
        user_id: &str,
        files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        self.upload("/api/contractor-files/documents", user_id, files)
            .await
    }
}

/// A transport that is never reachable.
///
/// Every call fails with [`ApiError::Offline`], which sends the driver down
/// the same local-fallback path a dead network would.
pub struct OfflineApi;

#[async_trait]
impl Api for OfflineApi {
    async fn start_session(&self, _role: &str) -> Result<StartSessionResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn current_step(&self, _session_id: &str) -> Result<CurrentStepResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn submit_step(
        &self,
        _session_id: &str,
        _payload: &Value,
    ) -> Result<SubmitStepResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn previous_step(&self, _session_id: &str) -> Result<PreviousStepResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn delete_session(&self, _session_id: &str) -> Result<DeleteSessionResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn verify_email(&self, _email: &str) -> Result<VerifyEmailResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn validate_code(&self, _code: &str) -> Result<ValidateCodeResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn upload_identity(
        &self,
        _user_id: &str,
        _files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        Err(ApiError::Offline)
    }

    async fn upload_documents(
        &self,
        _user_id: &str,
        _files: &[(String, CapturedFile)],
    ) -> Result<UploadResponse, ApiError> {
        Err(ApiError::Offline)
    }
}
