//! Hooks for whoever renders the pipeline.
//!
//! The controller calls these synchronously, outside its internal lock, so an
//! implementation may query the controller from inside a callback.

use retouch_core::{EditOutcome, PipelineError, PipelineState};

/// Receives state changes and the final result of each attempt.
pub trait StateObserver: Send + Sync {
    /// Called after every accepted transition.
    fn on_state(&self, state: PipelineState);

    /// Called once when an attempt reaches Succeeded.
    fn on_success(&self, outcome: &EditOutcome);

    /// Called once when an attempt reaches Failed or Cancelled.
    fn on_failure(&self, error: &PipelineError);
}

/// No-op implementation for headless use
pub struct NoopObserver;

impl StateObserver for NoopObserver {
    fn on_state(&self, _state: PipelineState) {}

    fn on_success(&self, _outcome: &EditOutcome) {}

    fn on_failure(&self, _error: &PipelineError) {}
}
