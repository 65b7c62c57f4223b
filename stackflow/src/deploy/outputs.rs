//! Stack output extraction.

use tracing::debug;

use super::locator::get_stack;
use crate::client::StackClient;
use crate::core::OutputMap;
use crate::errors::DeployError;

/// Fetches the declared outputs of a stabilized stack.
///
/// Always describes the stack again. Outputs missing a key or a value are
/// skipped. A stack that no longer exists yields an empty map.
pub async fn get_stack_outputs(
    client: &dyn StackClient,
    stack_id: &str,
) -> Result<OutputMap, DeployError> {
    let Some(stack) = get_stack(client, stack_id).await? else {
        debug!(stack_id = %stack_id, "Stack disappeared before reading outputs");
        return Ok(OutputMap::new());
    };

    let outputs: OutputMap = stack
        .outputs
        .into_iter()
        .filter_map(|output| match (output.key, output.value) {
            (Some(key), Some(value)) if !key.is_empty() && !value.is_empty() => Some((key, value)),
            _ => None,
        })
        .collect();

    debug!(stack_id = %stack_id, count = outputs.len(), "Read stack outputs");
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockStackClient;
    use crate::core::{StackDescriptor, StackOutput, StackStatus};
    use crate::errors::ClientError;
    use pretty_assertions::assert_eq;

    fn client_with_outputs(outputs: Vec<StackOutput>) -> MockStackClient {
        let mut client = MockStackClient::new();
        client.expect_describe_stack().times(1).returning(move |id| {
            Ok(StackDescriptor::new(id, "app", StackStatus::UpdateComplete)
                .with_outputs(outputs.clone()))
        });
        client
    }

    #[tokio::test]
    async fn test_outputs_without_value_are_skipped() {
        let client = client_with_outputs(vec![
            StackOutput::new("K1", "V1"),
            StackOutput::new("K2", ""),
            StackOutput {
                key: None,
                value: Some("orphan".to_string()),
                ..StackOutput::default()
            },
        ]);

        let outputs = get_stack_outputs(&client, "arn:app").await.unwrap();

        let expected: OutputMap = [("K1".to_string(), "V1".to_string())].into_iter().collect();
        assert_eq!(outputs, expected);
    }

    #[tokio::test]
    async fn test_no_outputs_is_empty() {
        let client = client_with_outputs(Vec::new());
        assert!(get_stack_outputs(&client, "arn:app").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_stack_is_empty() {
        let mut client = MockStackClient::new();
        client
            .expect_describe_stack()
            .returning(|id| Err(ClientError::new(format!("Stack with id {id} does not exist"))));

        assert!(get_stack_outputs(&client, "arn:gone").await.unwrap().is_empty());
    }
}
