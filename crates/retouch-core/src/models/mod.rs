//! Data models for the upload pipeline
//!
//! Each sub-module covers one concept: the file being edited, the operation requested
//! by the form, the per-attempt state machine, and the delivered result.

mod file;
mod operation;
mod outcome;
mod state;

pub use file::*;
pub use operation::*;
pub use outcome::*;
pub use state::*;
