//! Retouch Pipeline
//!
//! Drives one form's submissions through validation, resizing, compression and
//! upload, and reports every state change to an observer.

pub mod controller;
pub mod download;
pub mod observer;

pub use controller::PipelineController;
pub use download::save_to;
pub use observer::{NoopObserver, StateObserver};
