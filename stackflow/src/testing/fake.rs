//! In-memory control plane.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use uuid::Uuid;

use crate::client::StackClient;
use crate::core::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, CreateStackParams, Parameter,
    StackDescriptor, StackOutput, StackStatus, TemplateSource,
};
use crate::errors::ClientError;

/// Reason the control plane gives for a change set with no changes.
pub const NO_CHANGES_REASON: &str =
    "The submitted information didn't contain changes. Submit different information to create a change set.";

const ACCOUNT_PREFIX: &str = "arn:aws:cloudformation:us-east-1:123456789012";

/// A remote call made against the fake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `describe_stack`
    DescribeStack,
    /// `create_stack`
    CreateStack,
    /// `wait_stack_create_complete`
    WaitStackCreate,
    /// `create_change_set`
    CreateChangeSet,
    /// `wait_change_set_create_complete`
    WaitChangeSet,
    /// `describe_change_set`
    DescribeChangeSet,
    /// `delete_change_set`
    DeleteChangeSet,
    /// `execute_change_set`
    ExecuteChangeSet,
    /// `wait_stack_update_complete`
    WaitStackUpdate,
}

impl Operation {
    /// Returns the client method name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DescribeStack => "describe_stack",
            Self::CreateStack => "create_stack",
            Self::WaitStackCreate => "wait_stack_create_complete",
            Self::CreateChangeSet => "create_change_set",
            Self::WaitChangeSet => "wait_change_set_create_complete",
            Self::DescribeChangeSet => "describe_change_set",
            Self::DeleteChangeSet => "delete_change_set",
            Self::ExecuteChangeSet => "execute_change_set",
            Self::WaitStackUpdate => "wait_stack_update_complete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// The operation.
    pub operation: Operation,
    /// Stack name the call resolved to, or the raw target if unknown.
    pub stack: String,
}

#[derive(Debug, Clone)]
struct FakeStack {
    stack_id: String,
    name: String,
    status: StackStatus,
    template: Option<TemplateSource>,
    parameters: Vec<Parameter>,
}

#[derive(Debug, Clone)]
struct FakeChangeSet {
    id: String,
    status: ChangeSetStatus,
    reason: Option<String>,
    template: TemplateSource,
    parameters: Vec<Parameter>,
}

/// A [`StackClient`] backed by maps instead of a remote API.
///
/// Creates and updates complete immediately. A change set whose template
/// and parameters equal the stack's fails with [`NO_CHANGES_REASON`], like
/// the real control plane. Failures, stalls and latency can be scripted per
/// stack, and every call is recorded.
#[derive(Debug, Default)]
pub struct FakeControlPlane {
    stacks: DashMap<String, FakeStack>,
    outputs: DashMap<String, Vec<StackOutput>>,
    change_sets: DashMap<(String, String), FakeChangeSet>,
    failures: DashMap<(String, Operation), ClientError>,
    change_set_reasons: DashMap<String, String>,
    stalled: DashMap<String, ()>,
    calls: Mutex<Vec<RecordedCall>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeControlPlane {
    /// Creates an empty control plane.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call take `latency`.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Adds an existing stack whose template is unknown, so any change set
    /// against it has changes. Returns the stack id.
    pub fn add_stack(&self, name: &str) -> String {
        self.insert_stack(name, None, Vec::new())
    }

    /// Adds an existing stack already deployed with `template` and
    /// `parameters`. Returns the stack id.
    pub fn add_deployed_stack(
        &self,
        name: &str,
        template: TemplateSource,
        parameters: Vec<Parameter>,
    ) -> String {
        self.insert_stack(name, Some(template), parameters)
    }

    /// Sets the outputs a stack reports.
    pub fn set_outputs(&self, stack: &str, outputs: Vec<StackOutput>) {
        self.outputs.insert(stack.to_string(), outputs);
    }

    /// Makes every `operation` against `stack` fail with `error`.
    pub fn fail_operation(&self, stack: &str, operation: Operation, error: ClientError) {
        self.failures.insert((stack.to_string(), operation), error);
    }

    /// Makes change sets for `stack` fail to compute with `reason`.
    pub fn fail_change_set(&self, stack: &str, reason: impl Into<String>) {
        self.change_set_reasons.insert(stack.to_string(), reason.into());
    }

    /// Makes change sets for `stack` stay pending, so their wait times out.
    pub fn stall_change_set(&self, stack: &str) {
        self.stalled.insert(stack.to_string(), ());
    }

    /// Returns a descriptor of a stack, if it exists.
    #[must_use]
    pub fn stack(&self, name: &str) -> Option<StackDescriptor> {
        self.stacks.get(name).map(|s| self.describe(&s))
    }

    /// Returns true if the named change set exists.
    #[must_use]
    pub fn has_change_set(&self, stack: &str, change_set: &str) -> bool {
        self.change_sets
            .contains_key(&(stack.to_string(), change_set.to_string()))
    }

    /// Returns every recorded call, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Returns the operations made against one stack, in order.
    #[must_use]
    pub fn operations_for(&self, stack: &str) -> Vec<Operation> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.stack == stack)
            .map(|c| c.operation)
            .collect()
    }

    /// Returns how many times `operation` was called.
    #[must_use]
    pub fn count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    /// Returns the highest number of calls that were in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn insert_stack(
        &self,
        name: &str,
        template: Option<TemplateSource>,
        parameters: Vec<Parameter>,
    ) -> String {
        let stack_id = format!("{ACCOUNT_PREFIX}:stack/{name}/{}", Uuid::new_v4());
        self.stacks.insert(
            name.to_string(),
            FakeStack {
                stack_id: stack_id.clone(),
                name: name.to_string(),
                status: StackStatus::CreateComplete,
                template,
                parameters,
            },
        );
        stack_id
    }

    fn describe(&self, stack: &FakeStack) -> StackDescriptor {
        let outputs = self
            .outputs
            .get(&stack.name)
            .map(|o| o.value().clone())
            .unwrap_or_default();
        StackDescriptor::new(&stack.stack_id, &stack.name, stack.status).with_outputs(outputs)
    }

    fn resolve(&self, name_or_id: &str) -> Option<String> {
        if self.stacks.contains_key(name_or_id) {
            return Some(name_or_id.to_string());
        }
        self.stacks
            .iter()
            .find(|s| s.stack_id == name_or_id)
            .map(|s| s.name.clone())
    }

    async fn enter(&self, operation: Operation, target: &str) -> Result<InFlight<'_>, ClientError> {
        let stack = self.resolve(target).unwrap_or_else(|| target.to_string());
        self.calls.lock().push(RecordedCall {
            operation,
            stack: stack.clone(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.failures.get(&(stack, operation)) {
            Some(error) => Err(error.clone()),
            None => Ok(guard),
        }
    }

    fn not_found(target: &str) -> ClientError {
        ClientError::new(format!("Stack with id {target} does not exist")).with_code("ValidationError")
    }

    fn change_set_not_found(change_set: &str) -> ClientError {
        ClientError::new(format!("ChangeSet [{change_set}] does not exist"))
            .with_code("ChangeSetNotFound")
    }

    fn key(stack: &str, change_set: &str) -> (String, String) {
        (stack.to_string(), change_set.to_string())
    }
}

#[async_trait]
impl StackClient for FakeControlPlane {
    async fn describe_stack(&self, stack_name_or_id: &str) -> Result<StackDescriptor, ClientError> {
        let _guard = self.enter(Operation::DescribeStack, stack_name_or_id).await?;
        let name = self
            .resolve(stack_name_or_id)
            .ok_or_else(|| Self::not_found(stack_name_or_id))?;
        self.stack(&name).ok_or_else(|| Self::not_found(stack_name_or_id))
    }

    async fn create_stack(&self, params: &CreateStackParams) -> Result<String, ClientError> {
        let _guard = self.enter(Operation::CreateStack, &params.stack_name).await?;
        if self.stacks.contains_key(&params.stack_name) {
            return Err(ClientError::new(format!("Stack [{}] already exists", params.stack_name))
                .with_code("AlreadyExistsException"));
        }
        let stack_id = self.insert_stack(
            &params.stack_name,
            Some(params.template.clone()),
            params.parameters.clone(),
        );
        if let Some(mut stack) = self.stacks.get_mut(&params.stack_name) {
            stack.status = StackStatus::CreateInProgress;
        }
        Ok(stack_id)
    }

    async fn wait_stack_create_complete(
        &self,
        stack_name: &str,
    ) -> Result<StackDescriptor, ClientError> {
        let _guard = self.enter(Operation::WaitStackCreate, stack_name).await?;
        let mut stack = self
            .stacks
            .get_mut(stack_name)
            .ok_or_else(|| Self::not_found(stack_name))?;
        stack.status = StackStatus::CreateComplete;
        Ok(self.describe(&stack))
    }

    async fn create_change_set(&self, params: &ChangeSetRequest) -> Result<String, ClientError> {
        let _guard = self.enter(Operation::CreateChangeSet, &params.stack_name).await?;
        let key = Self::key(&params.stack_name, &params.change_set_name);
        if self.change_sets.contains_key(&key) {
            return Err(ClientError::new(format!(
                "ChangeSet {} already exists",
                params.change_set_name
            ))
            .with_code("AlreadyExistsException"));
        }

        let (status, reason) = {
            let stack = self
                .stacks
                .get(&params.stack_name)
                .ok_or_else(|| Self::not_found(&params.stack_name))?;
            let unchanged = stack.template.as_ref() == Some(&params.template)
                && stack.parameters == params.parameters;

            if self.stalled.contains_key(&params.stack_name) {
                (ChangeSetStatus::CreatePending, None)
            } else if let Some(reason) = self.change_set_reasons.get(&params.stack_name) {
                (ChangeSetStatus::Failed, Some(reason.value().clone()))
            } else if unchanged {
                (ChangeSetStatus::Failed, Some(NO_CHANGES_REASON.to_string()))
            } else {
                (ChangeSetStatus::CreateComplete, None)
            }
        };

        let id = format!(
            "{ACCOUNT_PREFIX}:changeSet/{}/{}",
            params.change_set_name,
            Uuid::new_v4()
        );
        self.change_sets.insert(
            key,
            FakeChangeSet {
                id: id.clone(),
                status,
                reason,
                template: params.template.clone(),
                parameters: params.parameters.clone(),
            },
        );
        Ok(id)
    }

    async fn wait_change_set_create_complete(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        let _guard = self.enter(Operation::WaitChangeSet, stack_name).await?;
        let change_set = self
            .change_sets
            .get(&Self::key(stack_name, change_set_name))
            .ok_or_else(|| Self::change_set_not_found(change_set_name))?;
        match change_set.status {
            ChangeSetStatus::CreateComplete => Ok(()),
            ChangeSetStatus::Failed => Err(ClientError::new(
                "Waiter ChangeSetCreateComplete failed: Waiter encountered a terminal failure state",
            )),
            _ => Err(ClientError::new(
                "Waiter ChangeSetCreateComplete failed: max wait time exceeded",
            )),
        }
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ClientError> {
        let _guard = self.enter(Operation::DescribeChangeSet, stack_name).await?;
        let change_set = self
            .change_sets
            .get(&Self::key(stack_name, change_set_name))
            .ok_or_else(|| Self::change_set_not_found(change_set_name))?;
        Ok(ChangeSetDescription {
            change_set_id: Some(change_set.id.clone()),
            status: change_set.status,
            status_reason: change_set.reason.clone(),
        })
    }

    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        let _guard = self.enter(Operation::DeleteChangeSet, stack_name).await?;
        self.change_sets
            .remove(&Self::key(stack_name, change_set_name))
            .map(|_| ())
            .ok_or_else(|| Self::change_set_not_found(change_set_name))
    }

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        _disable_rollback: bool,
    ) -> Result<(), ClientError> {
        let _guard = self.enter(Operation::ExecuteChangeSet, stack_name).await?;
        let key = Self::key(stack_name, change_set_name);
        let change_set = self
            .change_sets
            .get(&key)
            .map(|c| c.value().clone())
            .ok_or_else(|| Self::change_set_not_found(change_set_name))?;
        if change_set.status != ChangeSetStatus::CreateComplete {
            return Err(ClientError::new(format!(
                "ChangeSet [{}] cannot be executed in its current status of [{}]",
                change_set.id, change_set.status
            ))
            .with_code("InvalidChangeSetStatus"));
        }

        let mut stack = self
            .stacks
            .get_mut(stack_name)
            .ok_or_else(|| Self::not_found(stack_name))?;
        stack.template = Some(change_set.template);
        stack.parameters = change_set.parameters;
        stack.status = StackStatus::UpdateInProgress;
        drop(stack);

        self.change_sets.retain(|(stack, _), _| stack != stack_name);
        Ok(())
    }

    async fn wait_stack_update_complete(
        &self,
        stack_id: &str,
    ) -> Result<StackDescriptor, ClientError> {
        let _guard = self.enter(Operation::WaitStackUpdate, stack_id).await?;
        let name = self.resolve(stack_id).ok_or_else(|| Self::not_found(stack_id))?;
        let mut stack = self
            .stacks
            .get_mut(&name)
            .ok_or_else(|| Self::not_found(stack_id))?;
        stack.status = StackStatus::UpdateComplete;
        Ok(self.describe(&stack))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StackRequest;

    fn body(text: &str) -> TemplateSource {
        TemplateSource::Body(text.to_string())
    }

    #[tokio::test]
    async fn test_missing_stack_reports_not_found() {
        let fake = FakeControlPlane::new();
        let err = fake.describe_stack("app").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(fake.count(Operation::DescribeStack), 1);
    }

    #[tokio::test]
    async fn test_describe_by_id() {
        let fake = FakeControlPlane::new();
        let stack_id = fake.add_stack("app");

        let stack = fake.describe_stack(&stack_id).await.unwrap();
        assert_eq!(stack.stack_name, "app");
        assert_eq!(fake.operations_for("app"), vec![Operation::DescribeStack]);
    }

    #[tokio::test]
    async fn test_identical_change_set_fails_with_no_changes() {
        let fake = FakeControlPlane::new();
        fake.add_deployed_stack("app", body("{}"), Vec::new());
        let stack = fake.stack("app").unwrap();
        let request = StackRequest::builder("app", body("{}")).build().unwrap();
        let params = ChangeSetRequest::new(&request, &stack);

        fake.create_change_set(&params).await.unwrap();
        assert!(fake.wait_change_set_create_complete("app", "app-CS").await.is_err());

        let description = fake.describe_change_set("app", "app-CS").await.unwrap();
        assert_eq!(description.status, ChangeSetStatus::Failed);
        assert_eq!(description.status_reason.as_deref(), Some(NO_CHANGES_REASON));
    }

    #[tokio::test]
    async fn test_execute_applies_template() {
        let fake = FakeControlPlane::new();
        let stack_id = fake.add_deployed_stack("app", body("{}"), Vec::new());
        let stack = fake.stack("app").unwrap();
        let request = StackRequest::builder("app", body(r#"{"Resources":{}}"#))
            .build()
            .unwrap();

        fake.create_change_set(&ChangeSetRequest::new(&request, &stack))
            .await
            .unwrap();
        fake.wait_change_set_create_complete("app", "app-CS").await.unwrap();
        fake.execute_change_set("app", "app-CS", false).await.unwrap();
        let updated = fake.wait_stack_update_complete(&stack_id).await.unwrap();

        assert_eq!(updated.status, StackStatus::UpdateComplete);
        assert!(!fake.has_change_set("app", "app-CS"));
    }

    #[tokio::test]
    async fn test_scripted_failure() {
        let fake = FakeControlPlane::new();
        fake.fail_operation(
            "app",
            Operation::DescribeStack,
            ClientError::new("Rate exceeded").retryable(),
        );

        let err = fake.describe_stack("app").await.unwrap_err();
        assert!(err.retryable);
    }
}
