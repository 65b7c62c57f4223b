//! Deployment outcomes and run reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::errors::{AggregateError, DeployError, FailureRecord};

/// Declared stack outputs, keyed by logical output key.
pub type OutputMap = BTreeMap<String, String>;

/// Stack id published when a deployment resolved no identifier.
pub const UNKNOWN_STACK_ID: &str = "UNKNOWN";

/// What a successful deployment did to the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployAction {
    /// The stack did not exist and was created.
    Created,
    /// A change set was executed and the update stabilized.
    Updated,
    /// A change set is ready but was intentionally not executed.
    Planned,
    /// The change set contained no changes.
    Unchanged,
    /// The change set wait failed but the change set never reached a
    /// failed state; nothing is known about the stack.
    Unresolved,
}

/// A successful deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// The stack id, absent only for [`DeployAction::Unresolved`].
    pub stack_id: Option<String>,
    /// What happened.
    pub action: DeployAction,
}

impl Deployment {
    /// A newly created stack.
    #[must_use]
    pub fn created(stack_id: impl Into<String>) -> Self {
        Self::with_id(stack_id, DeployAction::Created)
    }

    /// An executed update.
    #[must_use]
    pub fn updated(stack_id: impl Into<String>) -> Self {
        Self::with_id(stack_id, DeployAction::Updated)
    }

    /// A change set left for review.
    #[must_use]
    pub fn planned(stack_id: impl Into<String>) -> Self {
        Self::with_id(stack_id, DeployAction::Planned)
    }

    /// An update with nothing to change.
    #[must_use]
    pub fn unchanged(stack_id: impl Into<String>) -> Self {
        Self::with_id(stack_id, DeployAction::Unchanged)
    }

    /// A deployment that resolved no identifier.
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            stack_id: None,
            action: DeployAction::Unresolved,
        }
    }

    fn with_id(stack_id: impl Into<String>, action: DeployAction) -> Self {
        Self {
            stack_id: Some(stack_id.into()),
            action,
        }
    }
}

/// The result of deploying one stack request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeploymentOutcome {
    /// Deployment succeeded.
    Succeeded(Deployment),
    /// Deployment failed.
    Failed {
        /// Error kind name.
        error_type: String,
        /// Descriptive failure message.
        reason: String,
    },
}

impl DeploymentOutcome {
    /// Builds a failed outcome from an error.
    #[must_use]
    pub fn failed(error: &DeployError) -> Self {
        Self::Failed {
            error_type: error.kind().to_string(),
            reason: error.to_string(),
        }
    }

    /// Returns true if the deployment succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Returns the stack id, if one was resolved.
    #[must_use]
    pub fn stack_id(&self) -> Option<&str> {
        match self {
            Self::Succeeded(deployment) => deployment.stack_id.as_deref(),
            Self::Failed { .. } => None,
        }
    }
}

/// Per-stack report produced by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackReport {
    /// Stack name.
    pub stack: String,
    /// Outcome.
    pub outcome: DeploymentOutcome,
    /// Declared outputs, empty on failure.
    pub outputs: OutputMap,
    /// When the stack's deployment started.
    pub started_at: DateTime<Utc>,
    /// When the stack's deployment finished.
    pub finished_at: DateTime<Utc>,
}

impl StackReport {
    /// Wall-clock duration in milliseconds.
    #[must_use]
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Report for one scheduler run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run id, also attached to every log span of the run.
    pub run_id: Uuid,
    /// One report per submitted stack, in submission order.
    pub reports: Vec<StackReport>,
    /// Failures in the order they were observed.
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// Returns true if every stack succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns the names of the failed stacks.
    #[must_use]
    pub fn failed_stacks(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.stack.as_str()).collect()
    }

    /// Returns the report for a stack.
    #[must_use]
    pub fn get(&self, stack: &str) -> Option<&StackReport> {
        self.reports.iter().find(|r| r.stack == stack)
    }

    /// Flattens the run into named output values:
    /// `<stack>-stack-id` and `<stack>_output_<key>`.
    #[must_use]
    pub fn output_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        for report in &self.reports {
            let stack_id = report.outcome.stack_id().unwrap_or(UNKNOWN_STACK_ID);
            pairs.push((format!("{}-stack-id", report.stack), stack_id.to_string()));
            for (key, value) in &report.outputs {
                pairs.push((format!("{}_output_{}", report.stack, key), value.clone()));
            }
        }
        pairs
    }

    /// Converts the report into an error if any stack failed.
    pub fn into_result(self) -> Result<Self, DeployError> {
        if self.succeeded() {
            Ok(self)
        } else {
            Err(DeployError::Aggregate(AggregateError {
                failures: self.failures,
                reports: self.reports,
            }))
        }
    }
}
