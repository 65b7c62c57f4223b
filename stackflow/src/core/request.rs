//! Stack requests: the immutable unit of work handed to the scheduler.

use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::errors::{ConfigError, DeployError};

/// Longest stack name the control plane accepts.
pub const MAX_STACK_NAME_LEN: usize = 128;

/// Where the template for a stack comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    /// The rendered template body.
    Body(String),
    /// An https URL the control plane fetches the template from.
    Url(String),
}

impl TemplateSource {
    /// Returns the body, if this is an inline template.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        match self {
            Self::Body(body) => Some(body),
            Self::Url(_) => None,
        }
    }

    /// Returns the URL, if this is a template reference.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Body(_) => None,
        }
    }
}

/// A template parameter override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Parameter name.
    #[serde(rename = "ParameterKey")]
    pub key: String,
    /// Parameter value.
    #[serde(rename = "ParameterValue", default)]
    pub value: String,
}

impl Parameter {
    /// Creates a new parameter.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A stack tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    #[serde(rename = "Key")]
    pub key: String,
    /// Tag value.
    #[serde(rename = "Value")]
    pub value: String,
}

impl Tag {
    /// Creates a new tag.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Everything needed to deploy one stack.
///
/// Built through [`StackRequestBuilder`]; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRequest {
    name: String,
    template: TemplateSource,
    capabilities: Vec<String>,
    role_arn: Option<String>,
    notification_arns: Vec<String>,
    tags: Vec<Tag>,
    timeout_in_minutes: Option<u32>,
    parameters: Vec<Parameter>,
    disable_rollback: bool,
    termination_protection: bool,
    allow_empty_change_set: bool,
    execute_change_set: bool,
    delete_failed_change_set: bool,
}

impl StackRequest {
    /// Starts building a request for the named stack.
    #[must_use]
    pub fn builder(name: impl Into<String>, template: TemplateSource) -> StackRequestBuilder {
        StackRequestBuilder::new(name, template)
    }

    /// Returns the stack name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the template source.
    #[must_use]
    pub fn template(&self) -> &TemplateSource {
        &self.template
    }

    /// Returns the capability flags.
    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    /// Returns the execution role.
    #[must_use]
    pub fn role_arn(&self) -> Option<&str> {
        self.role_arn.as_deref()
    }

    /// Returns the notification targets.
    #[must_use]
    pub fn notification_arns(&self) -> &[String] {
        &self.notification_arns
    }

    /// Returns the tags.
    #[must_use]
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Returns the creation timeout.
    #[must_use]
    pub fn timeout_in_minutes(&self) -> Option<u32> {
        self.timeout_in_minutes
    }

    /// Returns the parameter overrides.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Whether rollback on failure is disabled.
    #[must_use]
    pub fn disable_rollback(&self) -> bool {
        self.disable_rollback
    }

    /// Whether termination protection is enabled on creation.
    #[must_use]
    pub fn termination_protection(&self) -> bool {
        self.termination_protection
    }

    /// Whether a change set with no changes counts as success.
    #[must_use]
    pub fn allow_empty_change_set(&self) -> bool {
        self.allow_empty_change_set
    }

    /// Whether a ready change set is executed.
    #[must_use]
    pub fn execute_change_set(&self) -> bool {
        self.execute_change_set
    }

    /// Whether a failed change set is deleted.
    #[must_use]
    pub fn delete_failed_change_set(&self) -> bool {
        self.delete_failed_change_set
    }

    /// Returns the name of the change set used to update this stack.
    #[must_use]
    pub fn change_set_name(&self) -> String {
        format!("{}-CS", self.name)
    }

    /// Returns a hex SHA-256 digest of the template source.
    #[must_use]
    pub fn template_digest(&self) -> String {
        let mut hasher = Sha256::new();
        match &self.template {
            TemplateSource::Body(body) => hasher.update(body.as_bytes()),
            TemplateSource::Url(url) => hasher.update(url.as_bytes()),
        }
        hex::encode(hasher.finalize())
    }
}

/// A stack queued for deployment: its request, or the error that kept the
/// request from being built. A failed entry fails only its own stack.
#[derive(Debug)]
pub struct PreparedStack {
    /// The stack name.
    pub stack: String,
    /// The request, or why it could not be built.
    pub request: Result<StackRequest, DeployError>,
}

impl PreparedStack {
    /// An entry that failed before any remote call.
    #[must_use]
    pub fn failed(stack: impl Into<String>, error: DeployError) -> Self {
        Self {
            stack: stack.into(),
            request: Err(error),
        }
    }

    /// Returns true if the request was built.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.request.is_ok()
    }
}

impl From<StackRequest> for PreparedStack {
    fn from(request: StackRequest) -> Self {
        Self {
            stack: request.name().to_string(),
            request: Ok(request),
        }
    }
}

/// Builder for [`StackRequest`].
#[derive(Debug, Clone)]
pub struct StackRequestBuilder {
    request: StackRequest,
}

impl StackRequestBuilder {
    /// Creates a builder with the default flags: empty change sets fail,
    /// ready change sets are executed, failed change sets are deleted.
    #[must_use]
    pub fn new(name: impl Into<String>, template: TemplateSource) -> Self {
        Self {
            request: StackRequest {
                name: name.into(),
                template,
                capabilities: Vec::new(),
                role_arn: None,
                notification_arns: Vec::new(),
                tags: Vec::new(),
                timeout_in_minutes: None,
                parameters: Vec::new(),
                disable_rollback: false,
                termination_protection: false,
                allow_empty_change_set: false,
                execute_change_set: true,
                delete_failed_change_set: true,
            },
        }
    }

    /// Adds a capability flag.
    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        let capability = capability.into();
        if !self.request.capabilities.contains(&capability) {
            self.request.capabilities.push(capability);
        }
        self
    }

    /// Adds several capability flags.
    #[must_use]
    pub fn capabilities<I, S>(self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        capabilities.into_iter().fold(self, |b, c| b.capability(c))
    }

    /// Sets the execution role.
    #[must_use]
    pub fn role_arn(mut self, role_arn: impl Into<String>) -> Self {
        self.request.role_arn = Some(role_arn.into());
        self
    }

    /// Sets the notification targets.
    #[must_use]
    pub fn notification_arns(mut self, arns: Vec<String>) -> Self {
        self.request.notification_arns = arns;
        self
    }

    /// Adds a tag. A repeated key replaces the earlier value.
    #[must_use]
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let tag = Tag::new(key, value);
        match self.request.tags.iter_mut().find(|t| t.key == tag.key) {
            Some(existing) => existing.value = tag.value,
            None => self.request.tags.push(tag),
        }
        self
    }

    /// Adds several tags.
    #[must_use]
    pub fn tags(self, tags: Vec<Tag>) -> Self {
        tags.into_iter().fold(self, |b, t| b.tag(t.key, t.value))
    }

    /// Sets the creation timeout.
    #[must_use]
    pub fn timeout_in_minutes(mut self, minutes: u32) -> Self {
        self.request.timeout_in_minutes = Some(minutes);
        self
    }

    /// Adds a parameter override. A repeated key has its values comma-joined.
    #[must_use]
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let param = Parameter::new(key, value);
        match self.request.parameters.iter_mut().find(|p| p.key == param.key) {
            Some(existing) => {
                existing.value = format!("{},{}", existing.value, param.value);
            }
            None => self.request.parameters.push(param),
        }
        self
    }

    /// Adds several parameter overrides.
    #[must_use]
    pub fn parameters(self, parameters: Vec<Parameter>) -> Self {
        parameters.into_iter().fold(self, |b, p| b.parameter(p.key, p.value))
    }

    /// Disables rollback on failure.
    #[must_use]
    pub fn disable_rollback(mut self, disable: bool) -> Self {
        self.request.disable_rollback = disable;
        self
    }

    /// Enables termination protection on creation.
    #[must_use]
    pub fn termination_protection(mut self, enabled: bool) -> Self {
        self.request.termination_protection = enabled;
        self
    }

    /// Treats a change set with no changes as success.
    #[must_use]
    pub fn allow_empty_change_set(mut self, allow: bool) -> Self {
        self.request.allow_empty_change_set = allow;
        self
    }

    /// Controls whether a ready change set is executed.
    #[must_use]
    pub fn execute_change_set(mut self, execute: bool) -> Self {
        self.request.execute_change_set = execute;
        self
    }

    /// Controls whether a failed change set is deleted.
    #[must_use]
    pub fn delete_failed_change_set(mut self, delete: bool) -> Self {
        self.request.delete_failed_change_set = delete;
        self
    }

    /// Validates the stack name and returns the request.
    pub fn build(self) -> Result<StackRequest, ConfigError> {
        validate_stack_name(&self.request.name)?;
        Ok(self.request)
    }
}

/// Checks a stack name against the control plane's naming rules.
pub fn validate_stack_name(name: &str) -> Result<(), ConfigError> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*$").ok());

    let invalid = |reason: &str| ConfigError::InvalidStackName {
        name: name.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name is empty"));
    }
    if name.len() > MAX_STACK_NAME_LEN {
        return Err(invalid("name is longer than 128 characters"));
    }
    if !pattern.as_ref().is_some_and(|re| re.is_match(name)) {
        return Err(invalid(
            "must start with a letter and contain only letters, digits and hyphens",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body() -> TemplateSource {
        TemplateSource::Body("{\"Resources\":{}}".to_string())
    }

    #[test]
    fn test_builder_defaults() {
        let request = StackRequest::builder("app", body()).build().unwrap();

        assert_eq!(request.name(), "app");
        assert!(!request.allow_empty_change_set());
        assert!(request.execute_change_set());
        assert!(request.delete_failed_change_set());
        assert_eq!(request.change_set_name(), "app-CS");
    }

    #[test]
    fn test_repeated_parameter_values_are_comma_joined() {
        let request = StackRequest::builder("app", body())
            .parameter("Subnets", "subnet-a")
            .parameter("Env", "prod")
            .parameter("Subnets", "subnet-b")
            .build()
            .unwrap();

        assert_eq!(
            request.parameters(),
            &[
                Parameter::new("Subnets", "subnet-a,subnet-b"),
                Parameter::new("Env", "prod"),
            ]
        );
    }

    #[test]
    fn test_tag_keys_are_unique() {
        let request = StackRequest::builder("app", body())
            .tag("team", "a")
            .tag("team", "b")
            .build()
            .unwrap();

        assert_eq!(request.tags(), &[Tag::new("team", "b")]);
    }

    #[test]
    fn test_capabilities_deduplicated() {
        let request = StackRequest::builder("app", body())
            .capabilities(["CAPABILITY_IAM", "CAPABILITY_IAM", "CAPABILITY_AUTO_EXPAND"])
            .build()
            .unwrap();

        assert_eq!(request.capabilities().len(), 2);
    }

    #[test]
    fn test_invalid_stack_names() {
        assert!(StackRequest::builder("", body()).build().is_err());
        assert!(StackRequest::builder("1app", body()).build().is_err());
        assert!(StackRequest::builder("app_stack", body()).build().is_err());
        assert!(StackRequest::builder("a".repeat(129), body()).build().is_err());
        assert!(StackRequest::builder("App-Stack-2", body()).build().is_ok());
    }

    #[test]
    fn test_template_digest_is_stable() {
        let a = StackRequest::builder("app", body()).build().unwrap();
        let b = StackRequest::builder("other", body()).build().unwrap();
        assert_eq!(a.template_digest(), b.template_digest());
        assert_eq!(a.template_digest().len(), 64);
    }

    #[test]
    fn test_parameter_serde_names() {
        let json = serde_json::to_value(Parameter::new("Env", "prod")).unwrap();
        assert_eq!(json, serde_json::json!({"ParameterKey": "Env", "ParameterValue": "prod"}));
    }
}
