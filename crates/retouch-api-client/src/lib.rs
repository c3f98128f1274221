//! HTTP client for the retouch edit service.
//!
//! Provides a thin [`ApiClient`] that owns the connection pool and base URL, and the
//! [`UploadCoordinator`] that performs the single cancellable multipart POST of an edit.

pub mod upload;

use anyhow::{Context, Result};
use reqwest::Client;
use retouch_core::ClientConfig;
use std::time::Duration;

pub use upload::{AbortReason, EditPayload, UploadCoordinator, UploadError, UploadResponse, UploadToken};

/// HTTP client for the edit service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: String) -> Result<Self> {
        // No client-wide timeout: each upload carries its own deadline.
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(config.api_url.clone())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Coordinator posting to `path` on this client's base URL.
    pub fn coordinator(&self, path: &str, timeout: Duration) -> UploadCoordinator {
        UploadCoordinator::new(self.client.clone(), self.build_url(path), timeout)
    }

    /// Raw client for custom requests.
    pub fn client(&self) -> &Client {
        &self.client
    }
}
