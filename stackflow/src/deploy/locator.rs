//! Stack lookup.

use tracing::debug;

use crate::client::StackClient;
use crate::core::StackDescriptor;
use crate::errors::DeployError;

/// Describes a stack by name or id.
///
/// Returns `Ok(None)` when the control plane reports that the stack does not
/// exist. Every other client error is returned as
/// [`DeployError::RemoteOperationFailed`].
pub async fn get_stack(
    client: &dyn StackClient,
    stack_name_or_id: &str,
) -> Result<Option<StackDescriptor>, DeployError> {
    match client.describe_stack(stack_name_or_id).await {
        Ok(stack) => Ok(Some(stack)),
        Err(err) if err.is_not_found() => {
            debug!(stack = %stack_name_or_id, "Stack does not exist");
            Ok(None)
        }
        Err(err) => Err(DeployError::remote("describe_stack", stack_name_or_id, err)),
    }
}
