//! Stack and change set status enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a remote stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StackStatus {
    /// Creation is in progress.
    CreateInProgress,
    /// Creation failed.
    CreateFailed,
    /// Creation completed.
    CreateComplete,
    /// Rollback is in progress.
    RollbackInProgress,
    /// Rollback failed.
    RollbackFailed,
    /// Rollback completed.
    RollbackComplete,
    /// Deletion is in progress.
    DeleteInProgress,
    /// Deletion failed.
    DeleteFailed,
    /// Deletion completed.
    DeleteComplete,
    /// Update is in progress.
    UpdateInProgress,
    /// Update is cleaning up replaced resources.
    UpdateCompleteCleanupInProgress,
    /// Update completed.
    UpdateComplete,
    /// Update failed.
    UpdateFailed,
    /// Update rollback is in progress.
    UpdateRollbackInProgress,
    /// Update rollback failed.
    UpdateRollbackFailed,
    /// Update rollback is cleaning up.
    UpdateRollbackCompleteCleanupInProgress,
    /// Update rollback completed.
    UpdateRollbackComplete,
    /// The stack was created by a change set that has not been executed yet.
    ReviewInProgress,
    /// Any status this crate does not know about.
    Unknown,
}

impl StackStatus {
    /// Parses the control plane's status string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_FAILED" => Self::CreateFailed,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "ROLLBACK_IN_PROGRESS" => Self::RollbackInProgress,
            "ROLLBACK_FAILED" => Self::RollbackFailed,
            "ROLLBACK_COMPLETE" => Self::RollbackComplete,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_FAILED" => Self::DeleteFailed,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "UPDATE_IN_PROGRESS" => Self::UpdateInProgress,
            "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS" => Self::UpdateCompleteCleanupInProgress,
            "UPDATE_COMPLETE" => Self::UpdateComplete,
            "UPDATE_FAILED" => Self::UpdateFailed,
            "UPDATE_ROLLBACK_IN_PROGRESS" => Self::UpdateRollbackInProgress,
            "UPDATE_ROLLBACK_FAILED" => Self::UpdateRollbackFailed,
            "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS" => {
                Self::UpdateRollbackCompleteCleanupInProgress
            }
            "UPDATE_ROLLBACK_COMPLETE" => Self::UpdateRollbackComplete,
            "REVIEW_IN_PROGRESS" => Self::ReviewInProgress,
            _ => Self::Unknown,
        }
    }

    /// Returns the control plane's status string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateFailed => "CREATE_FAILED",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::RollbackInProgress => "ROLLBACK_IN_PROGRESS",
            Self::RollbackFailed => "ROLLBACK_FAILED",
            Self::RollbackComplete => "ROLLBACK_COMPLETE",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::UpdateInProgress => "UPDATE_IN_PROGRESS",
            Self::UpdateCompleteCleanupInProgress => "UPDATE_COMPLETE_CLEANUP_IN_PROGRESS",
            Self::UpdateComplete => "UPDATE_COMPLETE",
            Self::UpdateFailed => "UPDATE_FAILED",
            Self::UpdateRollbackInProgress => "UPDATE_ROLLBACK_IN_PROGRESS",
            Self::UpdateRollbackFailed => "UPDATE_ROLLBACK_FAILED",
            Self::UpdateRollbackCompleteCleanupInProgress => {
                "UPDATE_ROLLBACK_COMPLETE_CLEANUP_IN_PROGRESS"
            }
            Self::UpdateRollbackComplete => "UPDATE_ROLLBACK_COMPLETE",
            Self::ReviewInProgress => "REVIEW_IN_PROGRESS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Returns true if no operation is running against the stack.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        !self.as_str().ends_with("_IN_PROGRESS")
    }

    /// Returns true if the last operation failed or was rolled back.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        let s = self.as_str();
        s.ends_with("_FAILED") || s.contains("ROLLBACK")
    }
}

impl Default for StackStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for StackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a change set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeSetStatus {
    /// Submitted, not yet being computed.
    CreatePending,
    /// Being computed.
    CreateInProgress,
    /// Ready for review or execution.
    CreateComplete,
    /// Deletion pending.
    DeletePending,
    /// Deletion in progress.
    DeleteInProgress,
    /// Deleted.
    DeleteComplete,
    /// Deletion failed.
    DeleteFailed,
    /// The control plane could not compute the change set.
    Failed,
    /// Any status this crate does not know about.
    Unknown,
}

impl ChangeSetStatus {
    /// Parses the control plane's status string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "CREATE_PENDING" => Self::CreatePending,
            "CREATE_IN_PROGRESS" => Self::CreateInProgress,
            "CREATE_COMPLETE" => Self::CreateComplete,
            "DELETE_PENDING" => Self::DeletePending,
            "DELETE_IN_PROGRESS" => Self::DeleteInProgress,
            "DELETE_COMPLETE" => Self::DeleteComplete,
            "DELETE_FAILED" => Self::DeleteFailed,
            "FAILED" => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Returns the control plane's status string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePending => "CREATE_PENDING",
            Self::CreateInProgress => "CREATE_IN_PROGRESS",
            Self::CreateComplete => "CREATE_COMPLETE",
            Self::DeletePending => "DELETE_PENDING",
            Self::DeleteInProgress => "DELETE_IN_PROGRESS",
            Self::DeleteComplete => "DELETE_COMPLETE",
            Self::DeleteFailed => "DELETE_FAILED",
            Self::Failed => "FAILED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl Default for ChangeSetStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl fmt::Display for ChangeSetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a change set is in the update protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeSetPhase {
    /// Submitted to the control plane.
    Created,
    /// Waiting for the control plane to compute it.
    AwaitingReview,
    /// Executed and the stack update has stabilized.
    Executed,
    /// Ready, intentionally left unexecuted.
    Planned,
    /// Computed to contain no changes.
    Empty,
    /// Could not be computed or executed.
    Failed,
}

impl ChangeSetPhase {
    /// Returns true if the phase ends the protocol.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Planned | Self::Empty | Self::Failed)
    }
}

impl fmt::Display for ChangeSetPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::AwaitingReview => write!(f, "awaiting_review"),
            Self::Executed => write!(f, "executed"),
            Self::Planned => write!(f, "planned"),
            Self::Empty => write!(f, "empty"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
