//! Error types module
//!
//! Every way a submission can end without a result is a variant of [`PipelineError`].
//! Stage crates define their own narrower error enums and convert into this one, so the
//! controller and the UI collaborator only ever deal with a single taxonomy.
//!
//! All variants are terminal for the attempt that produced them. Nothing in the pipeline
//! retries; a retry is always a new submission.

use std::time::Duration;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected outcomes like a user cancelling
    Debug,
    /// Warning level - for bad input the user can fix
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata describing how an error should be presented to the user
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "VALIDATION_FAILED")
    fn error_code(&self) -> &'static str;

    /// Human-readable message suitable for the UI
    fn user_message(&self) -> String;

    /// Suggested next step for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// A rule rejected by the constraint checker, in precedence order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationFailure {
    #[error("No file selected")]
    NoFile,

    #[error("Invalid content type: {content_type} (allowed: {allowed:?})")]
    DisallowedType {
        content_type: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Image too large: {width}x{height} (max: {max_width}x{max_height})")]
    DimensionsTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Unsupported operation: {0}")]
    UnknownOperation(String),
}

impl ValidationFailure {
    /// Short description used inside user-facing messages.
    pub fn describe(&self) -> String {
        match self {
            ValidationFailure::NoFile => "Please select an image to edit.".to_string(),
            ValidationFailure::DisallowedType { content_type, .. } => {
                format!("Files of type '{}' are not supported.", content_type)
            }
            ValidationFailure::FileTooLarge { max, .. } => {
                format!("File size exceeds the {} limit.", format_size(*max))
            }
            ValidationFailure::DimensionsTooLarge {
                max_width,
                max_height,
                ..
            } => format!(
                "Image dimensions exceed the {}x{} limit.",
                max_width, max_height
            ),
            ValidationFailure::MissingField { field } => format!(
                "Please fill out all required fields for the selected operation ({} is missing).",
                field
            ),
            ValidationFailure::InvalidField { field, reason } => {
                format!("Field '{}' is invalid: {}.", field, reason)
            }
            ValidationFailure::UnknownOperation(key) => {
                format!("'{}' is not a supported operation.", key)
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationFailure),

    #[error("Image could not be decoded: {0}")]
    Decode(String),

    #[error("Resize failed: {0}")]
    Resize(String),

    #[error("Compression failed: {0}")]
    Compression(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with status {status}: {body}")]
    Server { status: u16, body: String },

    #[error("Request timed out after {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("Upload cancelled")]
    UserCancelled,
}

impl PipelineError {
    /// True when the attempt ended because the user (or a newer submission) aborted it.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, PipelineError::UserCancelled)
    }
}

/// Static metadata for each variant: (error_code, suggested_action, log_level).
fn pipeline_error_static_metadata(
    err: &PipelineError,
) -> (&'static str, Option<&'static str>, LogLevel) {
    match err {
        PipelineError::Validation(_) => (
            "VALIDATION_FAILED",
            Some("Fix the highlighted input and submit again"),
            LogLevel::Warn,
        ),
        PipelineError::Decode(_) => (
            "DECODE_FAILED",
            Some("Check that the file is a valid image"),
            LogLevel::Warn,
        ),
        PipelineError::Resize(_) => (
            "RESIZE_FAILED",
            Some("Try a different image or format"),
            LogLevel::Error,
        ),
        PipelineError::Compression(_) => (
            "COMPRESSION_FAILED",
            Some("Try a smaller image"),
            LogLevel::Error,
        ),
        PipelineError::Network(_) => (
            "NETWORK_ERROR",
            Some("Check your connection and submit again"),
            LogLevel::Error,
        ),
        PipelineError::Server { .. } => (
            "SERVER_ERROR",
            Some("Submit again later"),
            LogLevel::Error,
        ),
        PipelineError::Timeout { .. } => (
            "TIMEOUT",
            Some("Submit again or try a smaller image"),
            LogLevel::Warn,
        ),
        PipelineError::UserCancelled => ("CANCELLED", None, LogLevel::Debug),
    }
}

impl ErrorMetadata for PipelineError {
    fn error_code(&self) -> &'static str {
        pipeline_error_static_metadata(self).0
    }

    fn user_message(&self) -> String {
        match self {
            PipelineError::Validation(failure) => failure.describe(),
            PipelineError::Decode(_) => {
                "The selected file could not be read as an image.".to_string()
            }
            PipelineError::Resize(_) => "The image could not be resized for upload.".to_string(),
            PipelineError::Compression(_) => {
                "The image could not be compressed enough for upload.".to_string()
            }
            PipelineError::Network(_) => {
                "Could not reach the image service. Please check your connection.".to_string()
            }
            PipelineError::Server { status, .. } => format!(
                "The image service could not process your request (status {}).",
                status
            ),
            PipelineError::Timeout { after } => format!(
                "The image service did not respond within {}.",
                format_duration(*after)
            ),
            PipelineError::UserCancelled => "The upload was cancelled.".to_string(),
        }
    }

    fn suggested_action(&self) -> Option<&'static str> {
        pipeline_error_static_metadata(self).1
    }

    fn log_level(&self) -> LogLevel {
        pipeline_error_static_metadata(self).2
    }
}

/// Format a timeout for users ("30 seconds", "1.5 seconds", "200 milliseconds").
pub fn format_duration(duration: Duration) -> String {
    if duration < Duration::from_secs(1) {
        format!("{} milliseconds", duration.as_millis())
    } else if duration.subsec_nanos() == 0 {
        format!("{} seconds", duration.as_secs())
    } else {
        format!("{} seconds", duration.as_secs_f64())
    }
}

/// Format a byte count the way limits are shown to users ("10MB", "512KB").
pub fn format_size(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = 1024 * 1024;
    if bytes >= MB && bytes % MB == 0 {
        format!("{}MB", bytes / MB)
    } else if bytes >= KB && bytes % KB == 0 {
        format!("{}KB", bytes / KB)
    } else {
        format!("{} bytes", bytes)
    }
}
