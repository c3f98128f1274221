//! The single multipart POST of an edit, with cancellation and a deadline.

use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use retouch_core::{
    OperationKey, OperationRequest, PipelineError, SelectedFile, ValidationFailure,
};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Longest server error body kept in an error.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Why an in-flight upload was aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The user pressed cancel.
    User,
    /// A newer submission replaced this one.
    Superseded,
    /// The deadline passed.
    Timeout,
}

/// Abort handle for one upload attempt.
///
/// Clones share state. The first reason recorded is kept; later calls still cancel but
/// do not overwrite it.
#[derive(Debug, Clone, Default)]
pub struct UploadToken {
    token: CancellationToken,
    reason: Arc<OnceLock<AbortReason>>,
}

impl UploadToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort with `reason`. Returns true if this call recorded the reason.
    pub fn cancel(&self, reason: AbortReason) -> bool {
        let first = self.reason.set(reason).is_ok();
        self.token.cancel();
        first
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn reason(&self) -> Option<AbortReason> {
        self.reason.get().copied()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

/// Everything the edit endpoint receives.
#[derive(Debug, Clone)]
pub struct EditPayload {
    pub data: Bytes,
    /// Name the server should give the result (already made unique).
    pub filename: String,
    pub content_type: String,
    pub operation: OperationKey,
    pub fields: Vec<(&'static str, String)>,
}

impl EditPayload {
    pub fn new(file: &SelectedFile, filename: String, request: &OperationRequest) -> Self {
        Self {
            data: file.data().clone(),
            filename,
            content_type: file.content_type().to_string(),
            operation: request.operation,
            fields: request.wire_fields(),
        }
    }

    /// Parts: `file`, `new_name`, `operation`, then one text part per field.
    pub fn into_form(self) -> Result<Form, UploadError> {
        let file_part = Part::bytes(self.data.to_vec())
            .file_name(self.filename.clone())
            .mime_str(&self.content_type)
            .map_err(|e| UploadError::Payload {
                content_type: self.content_type.clone(),
                reason: e.to_string(),
            })?;

        let mut form = Form::new()
            .part("file", file_part)
            .text("new_name", self.filename)
            .text("operation", self.operation.as_str());

        for (name, value) in self.fields {
            form = form.text(name, value);
        }

        Ok(form)
    }
}

/// Successful edit: the processed image.
#[derive(Debug, Clone)]
pub struct UploadResponse {
    pub blob: Bytes,
    pub content_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Could not build request for content type {content_type}: {reason}")]
    Payload { content_type: String, reason: String },

    #[error("Request failed: {0}")]
    Network(String),

    #[error("Server responded with status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("No response within {0:?}")]
    Timeout(Duration),

    #[error("Upload aborted ({0:?})")]
    Aborted(AbortReason),
}

impl From<UploadError> for PipelineError {
    fn from(err: UploadError) -> Self {
        match err {
            // Only an unparsable content type fails the form, and no request was sent.
            UploadError::Payload { content_type, .. } => {
                PipelineError::Validation(ValidationFailure::DisallowedType {
                    content_type,
                    allowed: Vec::new(),
                })
            }
            UploadError::Network(msg) => PipelineError::Network(msg),
            UploadError::Server { status, body } => PipelineError::Server { status, body },
            UploadError::Timeout(after) => PipelineError::Timeout { after },
            UploadError::Aborted(_) => PipelineError::UserCancelled,
        }
    }
}

/// Sends one edit request and waits for the processed image.
///
/// The request races the token and the deadline. Whichever finishes first decides the
/// outcome; a response that arrives after an abort is dropped.
#[derive(Clone, Debug)]
pub struct UploadCoordinator {
    client: Client,
    url: String,
    timeout: Duration,
}

impl UploadCoordinator {
    pub fn new(client: Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[tracing::instrument(
        skip(self, payload, token),
        fields(url = %self.url, filename = %payload.filename, operation = %payload.operation)
    )]
    pub async fn upload(
        &self,
        payload: EditPayload,
        token: &UploadToken,
    ) -> Result<UploadResponse, UploadError> {
        if let Some(reason) = token.reason() {
            return Err(self.aborted(reason));
        }

        let size = payload.data.len();
        let form = payload.into_form()?;
        let request = self.client.post(&self.url).multipart(form);

        tracing::debug!(size, "Sending edit request");

        tokio::select! {
            biased;

            _ = token.cancelled() => {
                let reason = token.reason().unwrap_or(AbortReason::User);
                tracing::debug!(?reason, "Edit request aborted");
                Err(self.aborted(reason))
            }
            _ = tokio::time::sleep(self.timeout) => {
                if token.cancel(AbortReason::Timeout) {
                    tracing::warn!(timeout = ?self.timeout, "Edit request timed out");
                    Err(UploadError::Timeout(self.timeout))
                } else {
                    Err(self.aborted(token.reason().unwrap_or(AbortReason::User)))
                }
            }
            result = self.exchange(request) => result,
        }
    }

    async fn exchange(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<UploadResponse, UploadError> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
            tracing::warn!(status = status.as_u16(), body = %body, "Edit request rejected");
            return Err(UploadError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let blob = response.bytes().await.map_err(|e| self.transport_error(e))?;

        tracing::info!(
            status = status.as_u16(),
            size = blob.len(),
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "Edit request succeeded"
        );

        Ok(UploadResponse { blob, content_type })
    }

    fn transport_error(&self, err: reqwest::Error) -> UploadError {
        if err.is_timeout() {
            UploadError::Timeout(self.timeout)
        } else {
            UploadError::Network(err.to_string())
        }
    }

    fn aborted(&self, reason: AbortReason) -> UploadError {
        match reason {
            AbortReason::Timeout => UploadError::Timeout(self.timeout),
            other => UploadError::Aborted(other),
        }
    }
}
