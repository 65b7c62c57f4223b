//! CloudFormation-backed [`StackClient`].
//!
//! Uses the SDK's waiters for the three "wait until stable" primitives, so
//! polling and its interval live here and not in the deployment core.

use async_trait::async_trait;
use aws_config::{AppName, BehaviorVersion, Region};
use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_cloudformation::types::{
    Capability, ChangeSetType, Parameter as CfnParameter, Stack, Tag as CfnTag,
};
use aws_sdk_cloudformation::Client;
use std::time::Duration;
use tracing::debug;

use super::{ClientConfig, StackClient};
use crate::core::{
    ChangeSetDescription, ChangeSetRequest, ChangeSetStatus, CreateStackParams, Parameter,
    StackDescriptor, StackOutput, StackStatus, Tag,
};
use crate::errors::{ClientError, ConfigError};

const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Stack client backed by the CloudFormation API.
#[derive(Debug, Clone)]
pub struct CloudFormationClient {
    client: Client,
    max_wait: Duration,
}

impl CloudFormationClient {
    /// Resolves region and credentials from `config` and the default
    /// provider chain, once.
    pub async fn connect(config: &ClientConfig) -> Result<Self, ConfigError> {
        let app_name = AppName::new(config.user_agent.clone())
            .map_err(|e| ConfigError::invalid_value("user_agent", e.to_string()))?;

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).app_name(app_name);
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        debug!(region = ?sdk_config.region(), "Loaded CloudFormation client configuration");

        Ok(Self::from_client(Client::new(&sdk_config), config.max_wait()))
    }

    /// Wraps an already configured SDK client.
    #[must_use]
    pub fn from_client(client: Client, max_wait: Duration) -> Self {
        Self { client, max_wait }
    }
}

fn sdk_error<E>(err: &E) -> ClientError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let mut error = ClientError::new(DisplayErrorContext(err).to_string());
    if let Some(code) = err.code() {
        if THROTTLING_CODES.contains(&code) {
            error = error.retryable();
        }
        error = error.with_code(code);
    }
    error
}

fn wait_error<E>(err: &E) -> ClientError
where
    E: std::error::Error + 'static,
{
    ClientError::new(DisplayErrorContext(err).to_string())
}

fn to_parameters(parameters: &[Parameter]) -> Vec<CfnParameter> {
    parameters
        .iter()
        .map(|p| {
            CfnParameter::builder()
                .parameter_key(&p.key)
                .parameter_value(&p.value)
                .build()
        })
        .collect()
}

fn to_tags(tags: &[Tag]) -> Result<Vec<CfnTag>, ClientError> {
    tags.iter()
        .map(|t| {
            CfnTag::builder()
                .key(&t.key)
                .value(&t.value)
                .build()
                .map_err(|e| ClientError::new(e.to_string()))
        })
        .collect()
}

fn to_capabilities(capabilities: &[String]) -> Vec<Capability> {
    capabilities.iter().map(|c| Capability::from(c.as_str())).collect()
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn to_descriptor(stack: &Stack) -> StackDescriptor {
    StackDescriptor {
        stack_id: stack.stack_id().unwrap_or_default().to_string(),
        stack_name: stack.stack_name().unwrap_or_default().to_string(),
        status: stack
            .stack_status()
            .map_or(StackStatus::Unknown, |s| StackStatus::parse(s.as_str())),
        status_reason: stack.stack_status_reason().map(str::to_string),
        outputs: stack
            .outputs()
            .iter()
            .map(|o| StackOutput {
                key: o.output_key().map(str::to_string),
                value: o.output_value().map(str::to_string),
                description: o.description().map(str::to_string),
                export_name: o.export_name().map(str::to_string),
            })
            .collect(),
    }
}

fn first_stack(stacks: &[Stack], name: &str) -> Result<StackDescriptor, ClientError> {
    stacks
        .first()
        .map(to_descriptor)
        .ok_or_else(|| ClientError::new(format!("Stack with id {name} does not exist")))
}

#[async_trait]
impl StackClient for CloudFormationClient {
    async fn describe_stack(&self, stack_name_or_id: &str) -> Result<StackDescriptor, ClientError> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_name_or_id)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        first_stack(output.stacks(), stack_name_or_id)
    }

    async fn create_stack(&self, params: &CreateStackParams) -> Result<String, ClientError> {
        let output = self
            .client
            .create_stack()
            .stack_name(&params.stack_name)
            .set_template_body(params.template.body().map(str::to_string))
            .set_template_url(params.template.url().map(str::to_string))
            .set_parameters(non_empty(to_parameters(&params.parameters)))
            .set_capabilities(non_empty(to_capabilities(&params.capabilities)))
            .set_role_arn(params.role_arn.clone())
            .disable_rollback(params.disable_rollback)
            .set_timeout_in_minutes(params.timeout_in_minutes.and_then(|m| i32::try_from(m).ok()))
            .set_notification_arns(non_empty(params.notification_arns.clone()))
            .set_tags(non_empty(to_tags(&params.tags)?))
            .enable_termination_protection(params.enable_termination_protection)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        Ok(output.stack_id().unwrap_or_default().to_string())
    }

    async fn wait_stack_create_complete(
        &self,
        stack_name: &str,
    ) -> Result<StackDescriptor, ClientError> {
        let output = self
            .client
            .wait_until_stack_create_complete()
            .stack_name(stack_name)
            .wait(self.max_wait)
            .await
            .map_err(|e| wait_error(&e))?
            .into_result()
            .map_err(|e| sdk_error(&e))?;
        first_stack(output.stacks(), stack_name)
    }

    async fn create_change_set(&self, params: &ChangeSetRequest) -> Result<String, ClientError> {
        let output = self
            .client
            .create_change_set()
            .change_set_name(&params.change_set_name)
            .stack_name(&params.stack_name)
            .change_set_type(ChangeSetType::Update)
            .set_template_body(params.template.body().map(str::to_string))
            .set_template_url(params.template.url().map(str::to_string))
            .set_parameters(non_empty(to_parameters(&params.parameters)))
            .set_capabilities(non_empty(to_capabilities(&params.capabilities)))
            .set_role_arn(params.role_arn.clone())
            .set_notification_arns(non_empty(params.notification_arns.clone()))
            .set_tags(non_empty(to_tags(&params.tags)?))
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        Ok(output.id().unwrap_or_default().to_string())
    }

    async fn wait_change_set_create_complete(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        self.client
            .wait_until_change_set_create_complete()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .wait(self.max_wait)
            .await
            .map_err(|e| wait_error(&e))?;
        Ok(())
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ClientError> {
        let output = self
            .client
            .describe_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        Ok(ChangeSetDescription {
            change_set_id: output.change_set_id().map(str::to_string),
            status: output
                .status()
                .map_or(ChangeSetStatus::Unknown, |s| ChangeSetStatus::parse(s.as_str())),
            status_reason: output.status_reason().map(str::to_string),
        })
    }

    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        self.client
            .delete_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        Ok(())
    }

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        disable_rollback: bool,
    ) -> Result<(), ClientError> {
        self.client
            .execute_change_set()
            .stack_name(stack_name)
            .change_set_name(change_set_name)
            .disable_rollback(disable_rollback)
            .send()
            .await
            .map_err(|e| sdk_error(&e))?;
        Ok(())
    }

    async fn wait_stack_update_complete(
        &self,
        stack_id: &str,
    ) -> Result<StackDescriptor, ClientError> {
        let output = self
            .client
            .wait_until_stack_update_complete()
            .stack_name(stack_id)
            .wait(self.max_wait)
            .await
            .map_err(|e| wait_error(&e))?
            .into_result()
            .map_err(|e| sdk_error(&e))?;
        first_stack(output.stacks(), stack_id)
    }
}
