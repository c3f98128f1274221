//! Submission state machine.
//!
//! One controller belongs to one form. It owns the stage components, the current
//! [`PipelineState`], the attempt counter and the token of the upload in flight.
//! Each `submit` is an attempt; starting a new one invalidates the previous one, whose
//! remaining transitions are then ignored.

use anyhow::{Context, Result};
use retouch_api_client::{
    AbortReason, ApiClient, EditPayload, UploadCoordinator, UploadError, UploadResponse,
    UploadToken,
};
use retouch_core::{
    Config, EditOutcome, ErrorMetadata, LogLevel, OperationRequest, PipelineError,
    PipelineLimits, PipelineState, SelectedFile, ValidationFailure,
};
use retouch_processing::{
    unique_name, DimensionNormalizer, FileConstraintChecker, SizeBudgetCompressor,
};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::observer::{NoopObserver, StateObserver};

#[derive(Debug, Default)]
struct Inner {
    state: PipelineState,
    attempt: u64,
    /// Token of the upload in flight, tagged with its attempt.
    active: Option<(u64, UploadToken)>,
}

pub struct PipelineController {
    checker: FileConstraintChecker,
    normalizer: DimensionNormalizer,
    compressor: SizeBudgetCompressor,
    coordinator: UploadCoordinator,
    observer: Arc<dyn StateObserver>,
    inner: Mutex<Inner>,
}

impl PipelineController {
    pub fn new(limits: &PipelineLimits, coordinator: UploadCoordinator) -> Self {
        Self {
            checker: FileConstraintChecker::from_limits(limits),
            normalizer: DimensionNormalizer::new(limits.resize_width, limits.resize_height),
            compressor: SizeBudgetCompressor::new(
                limits.compress_target_bytes,
                limits.resize_bounds(),
            ),
            coordinator,
            observer: Arc::new(NoopObserver),
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Build a controller posting to the configured edit endpoint.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;
        let client = ApiClient::from_config(&config.client)?;
        let coordinator =
            client.coordinator(&config.client.edit_path, config.limits.request_timeout);
        Ok(Self::new(&config.limits, coordinator))
    }

    pub fn with_observer(mut self, observer: Arc<dyn StateObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.lock().state
    }

    /// Token of the upload in flight, if any.
    pub fn active_token(&self) -> Option<UploadToken> {
        self.lock().active.as_ref().map(|(_, token)| token.clone())
    }

    /// Run one attempt to completion.
    ///
    /// Any attempt still running is superseded first: its upload (if started) is
    /// aborted and it resolves to [`PipelineError::UserCancelled`].
    #[tracing::instrument(
        skip(self, file, request),
        fields(
            file = file.as_ref().map(|f| f.name()).unwrap_or("<none>"),
            operation = %request.operation,
        )
    )]
    pub async fn submit(
        &self,
        file: Option<SelectedFile>,
        request: OperationRequest,
    ) -> Result<EditOutcome, PipelineError> {
        let attempt = self.begin_attempt();
        let result = self.run(attempt, file.as_ref(), &request).await;
        self.finish(attempt, &result);
        result
    }

    /// Abort the upload in flight. Returns false when nothing was aborted.
    pub fn cancel(&self) -> bool {
        let inner = self.lock();
        match &inner.active {
            Some((attempt, token)) => {
                let cancelled = token.cancel(AbortReason::User);
                if cancelled {
                    tracing::info!(attempt, "Upload cancelled by user");
                }
                cancelled
            }
            None => {
                tracing::debug!(state = %inner.state, "Nothing to cancel");
                false
            }
        }
    }

    /// Return a finished controller to Idle. Returns false unless the state was terminal.
    pub fn reset(&self) -> bool {
        let reset = {
            let mut inner = self.lock();
            if inner.state.is_terminal() {
                inner.state = PipelineState::Idle;
                true
            } else {
                false
            }
        };

        if reset {
            self.observer.on_state(PipelineState::Idle);
        }
        reset
    }

    async fn run(
        &self,
        attempt: u64,
        file: Option<&SelectedFile>,
        request: &OperationRequest,
    ) -> Result<EditOutcome, PipelineError> {
        self.transition(attempt, PipelineState::Validating);
        let dims = self.checker.check(file, request).await?;
        let Some(file) = file else {
            return Err(ValidationFailure::NoFile.into());
        };
        tracing::debug!(dimensions = %dims, size = file.size(), "Validated");

        self.ensure_current(attempt)?;
        self.transition(attempt, PipelineState::Resizing);
        let resized = self.normalizer.normalize(file).await?;

        self.ensure_current(attempt)?;
        self.transition(attempt, PipelineState::Compressing);
        let compressed = self.compressor.compress(&resized).await?;

        let filename = unique_name(file.name());
        let payload = EditPayload::new(&compressed, filename.clone(), request);

        let token = self.enter_uploading(attempt)?;
        let response = self.coordinator.upload(payload, &token).await;
        self.release_token(attempt);
        let response = settle(response, &token)?;

        Ok(EditOutcome {
            blob: response.blob,
            filename,
            content_type: response.content_type,
        })
    }

    /// Start a new attempt from Idle, superseding whatever was running.
    fn begin_attempt(&self) -> u64 {
        let (attempt, moved) = {
            let mut inner = self.lock();
            if let Some((previous, token)) = inner.active.take() {
                token.cancel(AbortReason::Superseded);
                tracing::info!(attempt = previous, "Upload superseded by a new submission");
            }
            inner.attempt += 1;
            let moved = inner.state != PipelineState::Idle;
            inner.state = PipelineState::Idle;
            (inner.attempt, moved)
        };

        if moved {
            self.observer.on_state(PipelineState::Idle);
        }
        attempt
    }

    fn finish(&self, attempt: u64, result: &Result<EditOutcome, PipelineError>) {
        match result {
            Ok(outcome) => {
                if self.transition(attempt, PipelineState::Succeeded) {
                    tracing::info!(
                        filename = %outcome.filename,
                        size = outcome.blob.len(),
                        "Edit succeeded"
                    );
                    self.observer.on_success(outcome);
                }
            }
            Err(err) => {
                let next = if err.is_cancellation() {
                    PipelineState::Cancelled
                } else {
                    PipelineState::Failed
                };
                if self.transition(attempt, next) {
                    log_failure(err);
                    self.observer.on_failure(err);
                }
            }
        }
    }

    /// Apply `next` if `attempt` is still current and the edge is allowed.
    fn transition(&self, attempt: u64, next: PipelineState) -> bool {
        {
            let mut inner = self.lock();
            if inner.attempt != attempt {
                tracing::debug!(attempt, state = %next, "Ignoring transition of stale attempt");
                return false;
            }
            if !inner.state.can_transition_to(next) {
                tracing::warn!(from = %inner.state, to = %next, "Rejected state transition");
                return false;
            }
            inner.state = next;
        }

        tracing::debug!(attempt, state = %next, "State changed");
        self.observer.on_state(next);
        true
    }

    fn ensure_current(&self, attempt: u64) -> Result<(), PipelineError> {
        if self.lock().attempt == attempt {
            Ok(())
        } else {
            Err(PipelineError::UserCancelled)
        }
    }

    /// The only place a token is created.
    fn enter_uploading(&self, attempt: u64) -> Result<UploadToken, PipelineError> {
        let token = {
            let mut inner = self.lock();
            if inner.attempt != attempt {
                return Err(PipelineError::UserCancelled);
            }
            if !inner.state.can_transition_to(PipelineState::Uploading) {
                tracing::warn!(from = %inner.state, "Rejected transition to uploading");
                return Err(PipelineError::UserCancelled);
            }
            let token = UploadToken::new();
            inner.active = Some((attempt, token.clone()));
            inner.state = PipelineState::Uploading;
            token
        };

        tracing::debug!(attempt, "State changed to uploading");
        self.observer.on_state(PipelineState::Uploading);
        Ok(token)
    }

    fn release_token(&self, attempt: u64) {
        let mut inner = self.lock();
        if matches!(inner.active, Some((owner, _)) if owner == attempt) {
            inner.active = None;
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Final result of an upload once its token is released.
///
/// A user or superseding abort recorded before the release wins over whatever the
/// exchange returned, so a `cancel()` that reported true always ends in cancellation.
fn settle(
    response: Result<UploadResponse, UploadError>,
    token: &UploadToken,
) -> Result<UploadResponse, UploadError> {
    match token.reason() {
        Some(reason @ (AbortReason::User | AbortReason::Superseded)) => {
            if response.is_ok() {
                tracing::debug!(?reason, "Dropping response of an aborted upload");
            }
            Err(UploadError::Aborted(reason))
        }
        _ => response,
    }
}

fn log_failure(err: &PipelineError) {
    match err.log_level() {
        LogLevel::Debug => tracing::debug!(code = err.error_code(), error = %err, "Edit ended"),
        LogLevel::Warn => tracing::warn!(code = err.error_code(), error = %err, "Edit failed"),
        LogLevel::Error => tracing::error!(code = err.error_code(), error = %err, "Edit failed"),
    }
}
