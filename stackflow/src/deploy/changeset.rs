//! Change set orchestration for existing stacks.
//!
//! An update moves through `Created -> AwaitingReview` and ends in one of
//! `Executed`, `Planned`, `Empty` or `Failed`. The wait for the change set
//! is the only step whose failure is classified; every other remote failure
//! is fatal for the stack.

use serde_json::json;
use tracing::{debug, warn};

use super::classify::NoOpClassifier;
use crate::client::StackClient;
use crate::core::{
    ChangeSetPhase, ChangeSetRequest, ChangeSetStatus, Deployment, StackDescriptor, StackRequest,
};
use crate::errors::DeployError;
use crate::events::{self, EventSink};

/// Drives one stack update through a change set.
///
/// Borrows its collaborators for the duration of a single update.
pub struct ChangeSetOrchestrator<'a> {
    client: &'a dyn StackClient,
    classifier: &'a NoOpClassifier,
    events: &'a dyn EventSink,
}

impl<'a> ChangeSetOrchestrator<'a> {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        client: &'a dyn StackClient,
        classifier: &'a NoOpClassifier,
        events: &'a dyn EventSink,
    ) -> Self {
        Self {
            client,
            classifier,
            events,
        }
    }

    /// Updates `stack` with the change set derived from `request`.
    ///
    /// Returns the existing stack id when the change set was executed, left
    /// unexecuted, or found empty with empty change sets allowed.
    pub async fn update_stack(
        &self,
        stack: &StackDescriptor,
        request: &StackRequest,
    ) -> Result<Deployment, DeployError> {
        let params = ChangeSetRequest::new(request, stack);
        let name = params.stack_name.as_str();
        let change_set = params.change_set_name.as_str();

        debug!(stack = %name, change_set = %change_set, "Creating CloudFormation Change Set");
        let change_set_id = self
            .client
            .create_change_set(&params)
            .await
            .map_err(|e| DeployError::remote("create_change_set", name, e))?;
        self.phase(name, ChangeSetPhase::Created);
        self.events.try_emit(
            events::CHANGE_SET_CREATED,
            Some(json!({"stack": name, "change_set": change_set, "change_set_id": change_set_id})),
        );

        debug!(stack = %name, change_set = %change_set, "Waiting for CloudFormation Change Set creation");
        self.phase(name, ChangeSetPhase::AwaitingReview);
        if let Err(err) = self
            .client
            .wait_change_set_create_complete(name, change_set)
            .await
        {
            debug!(stack = %name, error = %err, "Change Set creation did not complete");
            return self.cleanup_change_set(stack, &params, request).await;
        }

        if !request.execute_change_set() {
            debug!(stack = %name, change_set = %change_set, "Not executing the change set");
            self.phase(name, ChangeSetPhase::Planned);
            self.events.try_emit(
                events::CHANGE_SET_PLANNED,
                Some(json!({"stack": name, "change_set": change_set})),
            );
            return Ok(Deployment::planned(&stack.stack_id));
        }

        debug!(stack = %name, change_set = %change_set, "Executing CloudFormation change set");
        self.client
            .execute_change_set(name, change_set, request.disable_rollback())
            .await
            .map_err(|e| DeployError::remote("execute_change_set", name, e))?;

        debug!(stack = %name, stack_id = %stack.stack_id, "Updating CloudFormation stack");
        let updated = self
            .client
            .wait_stack_update_complete(&stack.stack_id)
            .await
            .map_err(|e| DeployError::remote("wait_stack_update_complete", name, e))?;

        self.phase(name, ChangeSetPhase::Executed);
        self.events.try_emit(
            events::CHANGE_SET_EXECUTED,
            Some(json!({"stack": name, "change_set": change_set, "status": updated.status.as_str()})),
        );
        Ok(Deployment::updated(&stack.stack_id))
    }

    /// Handles a change set whose creation wait failed.
    ///
    /// Reads the change set back. A `FAILED` change set is deleted when the
    /// request asks for it, then its reason is classified: an empty change
    /// set succeeds with the existing stack id if allowed, anything else is
    /// [`DeployError::ChangeSetFailed`]. A change set in any other status is
    /// left alone and resolves to no stack id.
    pub async fn cleanup_change_set(
        &self,
        stack: &StackDescriptor,
        params: &ChangeSetRequest,
        request: &StackRequest,
    ) -> Result<Deployment, DeployError> {
        let name = params.stack_name.as_str();
        let change_set = params.change_set_name.as_str();

        let description = self
            .client
            .describe_change_set(name, change_set)
            .await
            .map_err(|e| DeployError::remote("describe_change_set", name, e))?;

        if description.status != ChangeSetStatus::Failed {
            warn!(
                stack = %name,
                change_set = %change_set,
                status = %description.status,
                "Change Set wait failed but the change set has not failed; leaving it in place"
            );
            return Ok(Deployment::unresolved());
        }

        let reason = description.status_reason.unwrap_or_default();

        if request.delete_failed_change_set() {
            debug!(stack = %name, change_set = %change_set, "Deleting failed Change Set");
            self.client
                .delete_change_set(name, change_set)
                .await
                .map_err(|e| DeployError::remote("delete_change_set", name, e))?;
            self.events.try_emit(
                events::CHANGE_SET_DELETED,
                Some(json!({"stack": name, "change_set": change_set})),
            );
        }

        match self.classify(name, reason) {
            DeployError::ChangeSetEmpty { reason, .. } if request.allow_empty_change_set() => {
                debug!(stack = %name, reason = %reason, "Change Set contains no changes");
                self.phase(name, ChangeSetPhase::Empty);
                self.events.try_emit(
                    events::CHANGE_SET_EMPTY,
                    Some(json!({"stack": name, "change_set": change_set, "reason": reason})),
                );
                Ok(Deployment::unchanged(&stack.stack_id))
            }
            DeployError::ChangeSetEmpty { stack, reason } => {
                self.phase(name, ChangeSetPhase::Failed);
                Err(DeployError::change_set_failed(stack, reason))
            }
            other => {
                self.phase(name, ChangeSetPhase::Failed);
                Err(other)
            }
        }
    }

    fn classify(&self, stack: &str, reason: String) -> DeployError {
        if self.classifier.is_no_op(&reason) {
            DeployError::ChangeSetEmpty {
                stack: stack.to_string(),
                reason,
            }
        } else {
            DeployError::change_set_failed(stack, reason)
        }
    }

    fn phase(&self, stack: &str, phase: ChangeSetPhase) {
        debug!(stack = %stack, phase = %phase, terminal = phase.is_terminal(), "Change Set phase");
    }
}
