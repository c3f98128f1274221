//! Configuration module
//!
//! Static limits for the pre-upload pipeline and the location of the edit endpoint.
//! Values come from the environment (optionally a `.env` file) and fall back to the
//! defaults below. They are never negotiated with the server at runtime.

use std::env;
use std::time::Duration;

use crate::models::Dimensions;

// Common constants
const MAX_FILE_SIZE_MB: usize = 10;
const MAX_WIDTH: u32 = 4096;
const MAX_HEIGHT: u32 = 4096;
const RESIZE_WIDTH: u32 = 2048;
const RESIZE_HEIGHT: u32 = 2048;
const COMPRESS_TARGET_KB: usize = 2048;
const REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_API_URL: &str = "http://localhost:5000";
const DEFAULT_EDIT_PATH: &str = "/edit";
const DEFAULT_CONTENT_TYPES: &str = "image/jpeg,image/png,image/gif,image/webp";

/// Limits enforced on the client before anything is sent.
#[derive(Clone, Debug)]
pub struct PipelineLimits {
    pub max_file_size_bytes: usize,
    /// Hard ceiling: wider or taller images are rejected.
    pub max_width: u32,
    pub max_height: u32,
    /// Bounds images are downsized to before upload. Never above the ceiling.
    pub resize_width: u32,
    pub resize_height: u32,
    pub allowed_content_types: Vec<String>,
    /// Byte budget a file must fit after compression.
    pub compress_target_bytes: usize,
    pub request_timeout: Duration,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            max_width: MAX_WIDTH,
            max_height: MAX_HEIGHT,
            resize_width: RESIZE_WIDTH,
            resize_height: RESIZE_HEIGHT,
            allowed_content_types: split_list(DEFAULT_CONTENT_TYPES),
            compress_target_bytes: COMPRESS_TARGET_KB * 1024,
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
        }
    }
}

impl PipelineLimits {
    /// Box an image must fit after normalization.
    pub fn resize_bounds(&self) -> Dimensions {
        Dimensions::new(self.resize_width, self.resize_height)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_file_size_bytes == 0 {
            return Err(anyhow::anyhow!("RETOUCH_MAX_FILE_SIZE_MB must be greater than 0"));
        }

        if self.max_width == 0 || self.max_height == 0 {
            return Err(anyhow::anyhow!(
                "RETOUCH_MAX_WIDTH and RETOUCH_MAX_HEIGHT must be greater than 0"
            ));
        }

        if self.resize_width == 0
            || self.resize_height == 0
            || self.resize_width > self.max_width
            || self.resize_height > self.max_height
        {
            return Err(anyhow::anyhow!(
                "RETOUCH_RESIZE_WIDTH/HEIGHT must be between 1 and RETOUCH_MAX_WIDTH/HEIGHT"
            ));
        }

        if self.compress_target_bytes == 0 {
            return Err(anyhow::anyhow!(
                "RETOUCH_COMPRESS_TARGET_KB must be greater than 0"
            ));
        }

        if self.compress_target_bytes > self.max_file_size_bytes {
            return Err(anyhow::anyhow!(
                "RETOUCH_COMPRESS_TARGET_KB cannot exceed RETOUCH_MAX_FILE_SIZE_MB"
            ));
        }

        if self.allowed_content_types.is_empty() {
            return Err(anyhow::anyhow!(
                "RETOUCH_ALLOWED_CONTENT_TYPES must list at least one type"
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(anyhow::anyhow!(
                "RETOUCH_REQUEST_TIMEOUT_SECS must be greater than 0"
            ));
        }

        Ok(())
    }
}

/// Where edit requests are sent.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub api_url: String,
    pub edit_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            edit_path: DEFAULT_EDIT_PATH.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(anyhow::anyhow!(
                "RETOUCH_API_URL must be an http:// or https:// URL"
            ));
        }

        if !self.edit_path.starts_with('/') {
            return Err(anyhow::anyhow!("RETOUCH_EDIT_PATH must start with '/'"));
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    pub limits: PipelineLimits,
    pub client: ClientConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let max_file_size_mb = env::var("RETOUCH_MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<usize>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        let compress_target_kb = env::var("RETOUCH_COMPRESS_TARGET_KB")
            .unwrap_or_else(|_| COMPRESS_TARGET_KB.to_string())
            .parse::<usize>()
            .unwrap_or(COMPRESS_TARGET_KB);

        let allowed_content_types = split_list(
            &env::var("RETOUCH_ALLOWED_CONTENT_TYPES")
                .unwrap_or_else(|_| DEFAULT_CONTENT_TYPES.to_string()),
        );

        let limits = PipelineLimits {
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            max_width: env::var("RETOUCH_MAX_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_WIDTH),
            max_height: env::var("RETOUCH_MAX_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_HEIGHT),
            resize_width: env::var("RETOUCH_RESIZE_WIDTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(RESIZE_WIDTH),
            resize_height: env::var("RETOUCH_RESIZE_HEIGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(RESIZE_HEIGHT),
            allowed_content_types,
            compress_target_bytes: compress_target_kb * 1024,
            request_timeout: Duration::from_secs(
                env::var("RETOUCH_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(REQUEST_TIMEOUT_SECS),
            ),
        };

        let client = ClientConfig {
            api_url: env::var("RETOUCH_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            edit_path: env::var("RETOUCH_EDIT_PATH")
                .unwrap_or_else(|_| DEFAULT_EDIT_PATH.to_string()),
        };

        let config = Config { limits, client };
        tracing::debug!(
            api_url = %config.client.api_url,
            max_file_size_bytes = config.limits.max_file_size_bytes,
            compress_target_bytes = config.limits.compress_target_bytes,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.limits.validate()?;
        self.client.validate()
    }

    /// Full URL of the edit endpoint.
    pub fn edit_url(&self) -> String {
        format!("{}{}", self.client.api_url, self.client.edit_path)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.limits.max_file_size_bytes, 10 * 1024 * 1024);
        assert_eq!(config.edit_url(), "http://localhost:5000/edit");
    }

    #[test]
    fn test_budget_above_max_size_rejected() {
        let limits = PipelineLimits {
            compress_target_bytes: 20 * 1024 * 1024,
            ..PipelineLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let limits = PipelineLimits {
            max_width: 0,
            ..PipelineLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_non_http_url_rejected() {
        let client = ClientConfig {
            api_url: "ftp://example.com".to_string(),
            ..ClientConfig::default()
        };
        assert!(client.validate().is_err());
    }

    #[test]
    fn test_split_list_normalizes() {
        assert_eq!(
            split_list(" Image/PNG, image/jpeg ,,"),
            vec!["image/png".to_string(), "image/jpeg".to_string()]
        );
    }

    #[test]
    fn test_resize_bounds_above_ceiling_rejected() {
        let limits = PipelineLimits {
            max_width: 1000,
            resize_width: 1200,
            ..PipelineLimits::default()
        };
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_resize_bounds() {
        let limits = PipelineLimits {
            resize_width: 800,
            resize_height: 1200,
            ..PipelineLimits::default()
        };
        assert_eq!(limits.resize_bounds(), Dimensions::new(800, 1200));
    }
}
