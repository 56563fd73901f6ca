//! Thin list/read/create wrappers for the marketplace resources.
//!
//! These endpoints carry presentation data the backend fully owns — service
//! catalogs, work requests and orders, inspections, reviews — so the rows
//! pass through as JSON values rather than being modeled field by field.

use serde_json::Value;

use crate::api::ApiError;

/// A marketplace resource reachable under `/api/<path>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Services,
    WorkRequests,
    WorkOrders,
    Inspections,
    Reviews,
}

impl Resource {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Services => "/api/services",
            Self::WorkRequests => "/api/work-requests",
            Self::WorkOrders => "/api/work-orders",
            Self::Inspections => "/api/inspections",
            Self::Reviews => "/api/reviews",
        }
    }
}

/// Passthrough client for the per-resource endpoints.
pub struct ResourceClient {
    client: reqwest::Client,
    base_url: String,
}

impl ResourceClient {
    /// Build a client against a base URL like `http://127.0.0.1:3000`.
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

    /// `GET /api/<resource>`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn list(&self, resource: Resource) -> Result<Value, ApiError> {
        self.request(reqwest::Method::GET, resource.path(), None)
            .await
    }

    /// `GET /api/<resource>/<id>`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn read(&self, resource: Resource, id: &str) -> Result<Value, ApiError> {
        self.request(
            reqwest::Method::GET,
            &format!("{}/{id}", resource.path()),
            None,
        )
        .await
    }

    /// `POST /api/<resource>`
    ///
    /// # Errors
    ///
    /// Returns [`ApiError`] on transport failure or a non-2xx status.
    pub async fn create(&self, resource: Resource, body: Value) -> Result<Value, ApiError> {
        self.request(reqwest::Method::POST, resource.path(), Some(body))
            .await
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{path}", self.base_url);
        let request = self.client.request(method, &url);
        let request = if let Some(json) = body {
            request.json(&json)
        } else {
            request
        };

        let response = request.send().await?;
        let status = response.status();
        let value = response.json::<Value>().await.unwrap_or(Value::Null);
        if !status.is_success() {
            return Err(ApiError::Backend {
                status: status.as_u16(),
                failure: wire::ApiFailure::from_payload(status.as_u16(), &value),
            });
        }
        Ok(value)
    }
}
