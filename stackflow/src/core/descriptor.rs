//! Snapshots of remote stack and change set state.

use serde::{Deserialize, Serialize};

use super::request::{Parameter, StackRequest, Tag, TemplateSource};
use super::status::{ChangeSetStatus, StackStatus};

/// A declared stack output as reported by the control plane.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOutput {
    /// Logical output key.
    pub key: Option<String>,
    /// Output value.
    pub value: Option<String>,
    /// Output description.
    pub description: Option<String>,
    /// Export name, when the output is exported.
    pub export_name: Option<String>,
}

impl StackOutput {
    /// Creates an output with a key and value.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: Some(value.into()),
            ..Self::default()
        }
    }
}

/// A remote stack as observed by one describe call.
///
/// Never cached: every read fetches a fresh descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackDescriptor {
    /// Stack id.
    pub stack_id: String,
    /// Stack name.
    pub stack_name: String,
    /// Lifecycle status.
    pub status: StackStatus,
    /// Status reason text.
    pub status_reason: Option<String>,
    /// Declared outputs.
    #[serde(default)]
    pub outputs: Vec<StackOutput>,
}

impl StackDescriptor {
    /// Creates a descriptor with no outputs.
    #[must_use]
    pub fn new(
        stack_id: impl Into<String>,
        stack_name: impl Into<String>,
        status: StackStatus,
    ) -> Self {
        Self {
            stack_id: stack_id.into(),
            stack_name: stack_name.into(),
            status,
            status_reason: None,
            outputs: Vec::new(),
        }
    }

    /// Sets the outputs.
    #[must_use]
    pub fn with_outputs(mut self, outputs: Vec<StackOutput>) -> Self {
        self.outputs = outputs;
        self
    }
}

/// A change set as observed by one describe call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSetDescription {
    /// Change set id.
    pub change_set_id: Option<String>,
    /// Status.
    pub status: ChangeSetStatus,
    /// Status reason text.
    pub status_reason: Option<String>,
}

/// Parameters for creating a stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateStackParams {
    /// Stack name.
    pub stack_name: String,
    /// Template body or reference.
    pub template: TemplateSource,
    /// Parameter overrides.
    pub parameters: Vec<Parameter>,
    /// Capability flags.
    pub capabilities: Vec<String>,
    /// Execution role.
    pub role_arn: Option<String>,
    /// Disable rollback on failure.
    pub disable_rollback: bool,
    /// Creation timeout.
    pub timeout_in_minutes: Option<u32>,
    /// Notification targets.
    pub notification_arns: Vec<String>,
    /// Tags.
    pub tags: Vec<Tag>,
    /// Termination protection.
    pub enable_termination_protection: bool,
}

impl From<&StackRequest> for CreateStackParams {
    fn from(request: &StackRequest) -> Self {
        Self {
            stack_name: request.name().to_string(),
            template: request.template().clone(),
            parameters: request.parameters().to_vec(),
            capabilities: request.capabilities().to_vec(),
            role_arn: request.role_arn().map(str::to_string),
            disable_rollback: request.disable_rollback(),
            timeout_in_minutes: request.timeout_in_minutes(),
            notification_arns: request.notification_arns().to_vec(),
            tags: request.tags().to_vec(),
            enable_termination_protection: request.termination_protection(),
        }
    }
}

/// Parameters for creating an update change set on an existing stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeSetRequest {
    /// Change set name, always `<stack>-CS`.
    pub change_set_name: String,
    /// Stack name.
    pub stack_name: String,
    /// Id of the stack the change set targets.
    pub stack_id: String,
    /// Template body or reference.
    pub template: TemplateSource,
    /// Parameter overrides.
    pub parameters: Vec<Parameter>,
    /// Capability flags.
    pub capabilities: Vec<String>,
    /// Execution role.
    pub role_arn: Option<String>,
    /// Disable rollback when the change set is executed.
    pub disable_rollback: bool,
    /// Notification targets.
    pub notification_arns: Vec<String>,
    /// Tags.
    pub tags: Vec<Tag>,
}

impl ChangeSetRequest {
    /// Derives the change set for `request` against the existing `stack`.
    #[must_use]
    pub fn new(request: &StackRequest, stack: &StackDescriptor) -> Self {
        Self {
            change_set_name: request.change_set_name(),
            stack_name: request.name().to_string(),
            stack_id: stack.stack_id.clone(),
            template: request.template().clone(),
            parameters: request.parameters().to_vec(),
            capabilities: request.capabilities().to_vec(),
            role_arn: request.role_arn().map(str::to_string),
            disable_rollback: request.disable_rollback(),
            notification_arns: request.notification_arns().to_vec(),
            tags: request.tags().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> StackRequest {
        StackRequest::builder("app", TemplateSource::Url("https://bucket/app.json".into()))
            .parameter("Env", "prod")
            .capability("CAPABILITY_IAM")
            .timeout_in_minutes(30)
            .termination_protection(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_create_params_from_request() {
        let params = CreateStackParams::from(&request());

        assert_eq!(params.stack_name, "app");
        assert_eq!(params.timeout_in_minutes, Some(30));
        assert!(params.enable_termination_protection);
        assert_eq!(params.template.url(), Some("https://bucket/app.json"));
    }

    #[test]
    fn test_change_set_request_is_named_after_stack() {
        let stack = StackDescriptor::new("arn:stack/app/1", "app", StackStatus::CreateComplete);
        let change_set = ChangeSetRequest::new(&request(), &stack);

        assert_eq!(change_set.change_set_name, "app-CS");
        assert_eq!(change_set.stack_id, "arn:stack/app/1");
        assert_eq!(change_set.parameters, vec![Parameter::new("Env", "prod")]);
    }
}
