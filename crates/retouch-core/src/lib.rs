//! Retouch Core Library
//!
//! This crate provides the domain models, error types and configuration shared by
//! every stage of the pre-upload pipeline (validation, resize, compression, upload)
//! and by the controller that sequences them.

pub mod config;
pub mod error;
pub mod models;

// Re-export commonly used types
pub use config::{ClientConfig, Config, PipelineLimits};
pub use error::{ErrorMetadata, LogLevel, PipelineError, ValidationFailure};
pub use models::{
    Dimensions, EditOutcome, EditSummary, FieldKind, FieldSpec, OperationKey, OperationRequest,
    PipelineState, SelectedFile,
};
