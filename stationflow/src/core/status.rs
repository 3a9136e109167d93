//! Station type and lifecycle status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of work a station performs.
///
/// Each type is served by exactly one processor in a `ProcessorSet`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StationType {
    /// Analyses existing production material (episodes, scenes, pacing).
    Analysis,
    /// Generates new content from upstream analysis.
    Generation,
    /// Refines or expands generated content.
    Enhancement,
    /// Checks upstream outputs against production rules.
    Validation,
}

impl StationType {
    /// Returns true if stations of this type must declare output-length bounds.
    #[must_use]
    pub fn requires_output_bounds(&self) -> bool {
        matches!(self, Self::Generation | Self::Enhancement)
    }
}

impl fmt::Display for StationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Analysis => write!(f, "analysis"),
            Self::Generation => write!(f, "generation"),
            Self::Enhancement => write!(f, "enhancement"),
            Self::Validation => write!(f, "validation"),
        }
    }
}

/// The lifecycle status of a station run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Waiting for dependencies.
    #[default]
    Pending,
    /// An attempt has been dispatched to the worker pool.
    Running,
    /// A failed attempt is waiting out its backoff before re-dispatch.
    RetryScheduled,
    /// Output persisted.
    Succeeded,
    /// Retries exhausted. Never attempted again.
    Failed,
    /// Not attempted because an upstream station failed.
    Skipped,
    /// Stopped by session cancellation.
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::RetryScheduled => write!(f, "retry_scheduled"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl RunStatus {
    /// Returns true if the run will not change status again.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::Skipped | Self::Cancelled
        )
    }

    /// Returns true if dependents of this run can never start.
    #[must_use]
    pub fn blocks_dependents(&self) -> bool {
        matches!(self, Self::Failed | Self::Skipped | Self::Cancelled)
    }
}

/// The aggregate status of a session, derived from its runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// At least one run is unsettled.
    Running,
    /// Every run succeeded.
    Complete,
    /// At least one run failed terminally or was skipped.
    Partial,
    /// Cancelled before reaching a fixed point.
    Cancelled,
}

impl SessionStatus {
    /// Derives the session status from run statuses.
    pub fn derive<I>(statuses: I, cancelled: bool) -> Self
    where
        I: IntoIterator<Item = RunStatus>,
    {
        if cancelled {
            return Self::Cancelled;
        }

        let mut all_succeeded = true;
        for status in statuses {
            if !status.is_settled() {
                return Self::Running;
            }
            if status != RunStatus::Succeeded {
                all_succeeded = false;
            }
        }

        if all_succeeded {
            Self::Complete
        } else {
            Self::Partial
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => write!(f, "Running"),
            Self::Complete => write!(f, "Complete"),
            Self::Partial => write!(f, "Partial"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
