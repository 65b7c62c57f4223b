//! Remote stack client contract.
//!
//! The deployment core talks to the control plane only through
//! [`StackClient`]. Each "wait" method blocks until the control plane reports
//! a terminal state and owns any polling internally; the core sees exactly two
//! outcomes, stabilized or failed.

mod config;
mod retry;

#[cfg(feature = "aws")]
mod aws;

use async_trait::async_trait;

use crate::core::{
    ChangeSetDescription, ChangeSetRequest, CreateStackParams, StackDescriptor,
};
use crate::errors::ClientError;

pub use config::{ClientConfig, DEFAULT_USER_AGENT};
pub use retry::{RetryConfig, RetryingClient};

#[cfg(feature = "aws")]
pub use aws::CloudFormationClient;

/// Authenticated handle to the declarative-stack control plane.
///
/// Implementations hold read-only configuration and are shared across all
/// concurrently deploying stacks.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StackClient: Send + Sync {
    /// Describes a stack by name or id.
    ///
    /// A missing stack is reported as an error whose message contains
    /// "does not exist".
    async fn describe_stack(&self, stack_name_or_id: &str) -> Result<StackDescriptor, ClientError>;

    /// Submits a stack creation and returns the new stack id.
    async fn create_stack(&self, params: &CreateStackParams) -> Result<String, ClientError>;

    /// Blocks until the stack reports creation complete.
    async fn wait_stack_create_complete(
        &self,
        stack_name: &str,
    ) -> Result<StackDescriptor, ClientError>;

    /// Submits a change set and returns its id.
    async fn create_change_set(&self, params: &ChangeSetRequest) -> Result<String, ClientError>;

    /// Blocks until the change set is ready for execution.
    ///
    /// Fails when the control plane cannot compute the change set or the
    /// wait times out.
    async fn wait_change_set_create_complete(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError>;

    /// Describes a change set.
    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ClientError>;

    /// Deletes a change set.
    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError>;

    /// Executes a ready change set.
    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        disable_rollback: bool,
    ) -> Result<(), ClientError>;

    /// Blocks until the stack reports update complete.
    async fn wait_stack_update_complete(
        &self,
        stack_id: &str,
    ) -> Result<StackDescriptor, ClientError>;
}
