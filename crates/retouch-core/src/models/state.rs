use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Where a submission attempt currently is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    #[default]
    Idle,
    Validating,
    Resizing,
    Compressing,
    Uploading,
    Succeeded,
    Failed,
    Cancelled,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::Failed | PipelineState::Cancelled
        )
    }

    /// A stage is running; the UI should disable the submit button and show a loader.
    pub fn is_busy(self) -> bool {
        matches!(
            self,
            PipelineState::Validating
                | PipelineState::Resizing
                | PipelineState::Compressing
                | PipelineState::Uploading
        )
    }

    /// Allowed edges of the attempt state machine.
    pub fn can_transition_to(self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Resizing)
                | (Resizing, Compressing)
                | (Compressing, Uploading)
                | (Validating | Resizing | Compressing | Uploading, Failed)
                | (Uploading, Cancelled)
                | (Uploading, Succeeded)
                | (Succeeded | Failed | Cancelled, Idle)
        )
    }
}

impl Display for PipelineState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            PipelineState::Idle => write!(f, "idle"),
            PipelineState::Validating => write!(f, "validating"),
            PipelineState::Resizing => write!(f, "resizing"),
            PipelineState::Compressing => write!(f, "compressing"),
            PipelineState::Uploading => write!(f, "uploading"),
            PipelineState::Succeeded => write!(f, "succeeded"),
            PipelineState::Failed => write!(f, "failed"),
            PipelineState::Cancelled => write!(f, "cancelled"),
        }
    }
}
