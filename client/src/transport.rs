//! HTTP transport for resource operations
//!
//! [`ResourceApi`] is the seam between the lifecycle engine and the network.
//! [`HttpResourceApi`] is the production implementation; tests substitute
//! in-memory fakes.

use crate::config::ApiConfig;
use crate::error::{ApiError, extract_error_message};
use crate::resource::{Operation, PayloadField, RequestBody, ResourceKind};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method};
use serde_json::Value;

/// One request to the shop backend
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,
    /// Path relative to the API base URL, id already substituted
    pub path: String,
    /// Body for create and update
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    /// Build the request for running `operation` against `kind`
    ///
    /// Also returns where the success envelope keeps the payload.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Unsupported`] if `kind` has no endpoint for the operation
    /// - [`ApiError::InvalidRequest`] if the endpoint needs an id the operation lacks
    pub fn for_operation(
        kind: ResourceKind,
        operation: Operation,
    ) -> Result<(Self, PayloadField), ApiError> {
        let operation_kind = operation.kind();
        let endpoint = kind.endpoint(operation_kind).ok_or(ApiError::Unsupported {
            kind,
            operation: operation_kind,
        })?;

        let path = if endpoint.needs_id() {
            let id = operation
                .id()
                .filter(|id| !id.trim().is_empty())
                .ok_or_else(|| ApiError::InvalidRequest(format!("{kind} {operation_kind} needs an id")))?;
            endpoint.path.replace("{id}", &urlencoding::encode(id))
        } else {
            endpoint.path.to_string()
        };

        let request = Self {
            method: endpoint.method,
            path,
            body: operation.into_body(),
        };

        Ok((request, endpoint.payload))
    }
}

/// Performs requests against the shop backend
///
/// Returns the whole success envelope; payload extraction is up to the
/// caller.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Perform one request
    ///
    /// # Errors
    ///
    /// Network failures, non-2xx responses and unreadable 2xx bodies.
    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

/// [`ResourceApi`] over HTTP
#[derive(Clone)]
pub struct HttpResourceApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpResourceApi {
    /// Create a transport from API settings
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Network`] if the HTTP client cannot be built.
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ResourceApi for HttpResourceApi {
    #[tracing::instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn call(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.client.request(request.method, url);

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = request.body {
            builder = if body.is_multipart() {
                builder.multipart(multipart_form(body)?)
            } else {
                builder.json(&Value::Object(body.fields))
            };
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        if status.is_success() {
            tracing::trace!(status = status.as_u16(), "Request succeeded");
            parse_envelope(&text)
        } else {
            tracing::debug!(status = status.as_u16(), "Request rejected");
            Err(ApiError::Rejected {
                status: status.as_u16(),
                message: extract_error_message(&text).unwrap_or_default(),
            })
        }
    }
}

/// Parse a 2xx body; an empty body is `null`
fn parse_envelope(text: &str) -> Result<Value, ApiError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ApiError::MalformedResponse(e.to_string()))
}

/// Text parts from the fields, file parts from the attachments
fn multipart_form(body: RequestBody) -> Result<Form, ApiError> {
    let mut form = Form::new();

    for (name, value) in body.fields {
        let text = match value {
            Value::String(text) => text,
            other => other.to_string(),
        };
        form = form.text(name, text);
    }

    for attachment in body.attachments {
        let part = Part::bytes(attachment.bytes)
            .file_name(attachment.file_name)
            .mime_str(&attachment.content_type)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        form = form.part(attachment.field, part);
    }

    Ok(form)
}
