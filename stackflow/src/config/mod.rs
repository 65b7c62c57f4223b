//! Deployment configuration.
//!
//! This module provides:
//! - [`DeployConfig`] and per-stack [`StackOptions`]
//! - Per-stack input resolution and value parsers
//! - Template loading

mod inputs;
mod template;

pub use inputs::{
    is_url, parse_arns, parse_capabilities, parse_flag, parse_number, parse_parameters,
    parse_string, parse_tags, split_lines, InputSet, RawInputs,
};
pub use template::{template_from_input, FileTemplateLoader, TemplateLoader, DEFAULT_TEMPLATE_DIR};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::core::{PreparedStack, StackRequest, Tag};
use crate::deploy::DEFAULT_CONCURRENCY;
use crate::errors::{ConfigError, DeployError};

/// Options for one stack.
///
/// The negative flags keep the names of the action inputs they come from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StackOptions {
    /// Explicit template: an https URL or a template body. When unset the
    /// template is loaded from the template directory.
    #[serde(default)]
    pub template: Option<String>,
    /// Capability flags.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Execution role.
    #[serde(default)]
    pub role_arn: Option<String>,
    /// Disable rollback on failure.
    #[serde(default)]
    pub disable_rollback: bool,
    /// Creation timeout in minutes.
    #[serde(default)]
    pub timeout_in_minutes: Option<u32>,
    /// Notification targets.
    #[serde(default)]
    pub notification_arns: Option<Vec<String>>,
    /// Tags.
    #[serde(default)]
    pub tags: Option<Vec<Tag>>,
    /// Termination protection.
    #[serde(default)]
    pub termination_protection: bool,
    /// Parameter overrides in `Key=Value,...` or `file://` form.
    #[serde(default)]
    pub parameter_overrides: Option<String>,
    /// Succeed when the change set is empty.
    #[serde(default)]
    pub no_fail_on_empty_changeset: bool,
    /// Create the change set but do not execute it.
    #[serde(default)]
    pub no_execute_changeset: bool,
    /// Keep change sets that failed to create.
    #[serde(default)]
    pub no_delete_failed_changeset: bool,
}

impl StackOptions {
    /// Builds the request for `stack`, loading its template through
    /// `loader` unless one is set explicitly.
    pub fn to_request(
        &self,
        stack: &str,
        loader: &dyn TemplateLoader,
    ) -> Result<StackRequest, DeployError> {
        let template = match self.template.as_deref().map(str::trim) {
            Some(value) if !value.is_empty() => template_from_input(value),
            _ => loader.load(stack)?,
        };

        let mut builder = StackRequest::builder(stack, template)
            .capabilities(self.capabilities.iter().cloned())
            .disable_rollback(self.disable_rollback)
            .termination_protection(self.termination_protection)
            .allow_empty_change_set(self.no_fail_on_empty_changeset)
            .execute_change_set(!self.no_execute_changeset)
            .delete_failed_change_set(!self.no_delete_failed_changeset);

        if let Some(role_arn) = &self.role_arn {
            builder = builder.role_arn(role_arn);
        }
        if let Some(minutes) = self.timeout_in_minutes {
            builder = builder.timeout_in_minutes(minutes);
        }
        if let Some(arns) = &self.notification_arns {
            builder = builder.notification_arns(arns.clone());
        }
        if let Some(tags) = &self.tags {
            builder = builder.tags(tags.clone());
        }
        if let Some(overrides) = self.parameter_overrides.as_deref().map(str::trim) {
            if !overrides.is_empty() {
                builder = builder.parameters(parse_parameters(overrides)?);
            }
        }

        Ok(builder.build()?)
    }
}

/// Configuration for one deployment run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Stack names, in submission order.
    pub stacks: Vec<String>,
    /// Most stacks deployed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Directory holding `<stack>.template.json` files, relative to the
    /// workspace.
    #[serde(default = "default_template_dir")]
    pub template_dir: PathBuf,
    /// Workspace root.
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,
    /// Stack options: none for defaults, one for every stack, or one per
    /// stack.
    #[serde(default)]
    pub options: Vec<StackOptions>,
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

fn default_template_dir() -> PathBuf {
    PathBuf::from(DEFAULT_TEMPLATE_DIR)
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

impl DeployConfig {
    /// Creates a configuration for `stacks` with defaults.
    #[must_use]
    pub fn new<I, S>(stacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            stacks: stacks.into_iter().map(Into::into).collect(),
            concurrency: default_concurrency(),
            template_dir: default_template_dir(),
            workspace: default_workspace(),
            options: Vec::new(),
        }
    }

    /// Sets the concurrency ceiling.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the workspace root.
    #[must_use]
    pub fn with_workspace(mut self, workspace: impl Into<PathBuf>) -> Self {
        self.workspace = workspace.into();
        self
    }

    /// Sets the template directory.
    #[must_use]
    pub fn with_template_dir(mut self, template_dir: impl Into<PathBuf>) -> Self {
        self.template_dir = template_dir.into();
        self
    }

    /// Applies `options` to every stack.
    #[must_use]
    pub fn with_options(mut self, options: StackOptions) -> Self {
        self.options = vec![options];
        self
    }

    /// Builds a configuration from action-style inputs.
    ///
    /// `name` is required and lists one stack per line. Every other input
    /// follows the per-stack line rule of [`InputSet`].
    pub fn from_inputs(inputs: &RawInputs, workspace: Option<&Path>) -> Result<Self, ConfigError> {
        let stacks: Vec<String> = split_lines(inputs.required("name")?)
            .iter()
            .map(|name| name.trim().to_string())
            .collect();
        let count = stacks.len();

        let template = inputs.per_stack("template", count)?;
        let capabilities = inputs.per_stack("capabilities", count)?;
        let parameter_overrides = inputs.per_stack("parameter-overrides", count)?;
        let no_fail_on_empty = inputs.per_stack("no-fail-on-empty-changeset", count)?;
        let no_execute = inputs.per_stack("no-execute-changeset", count)?;
        let no_delete_failed = inputs.per_stack("no-delete-failed-changeset", count)?;
        let disable_rollback = inputs.per_stack("disable-rollback", count)?;
        let timeout = inputs.per_stack("timeout-in-minutes", count)?;
        let notification_arns = inputs.per_stack("notification-arns", count)?;
        let role_arn = inputs.per_stack("role-arn", count)?;
        let tags = inputs.per_stack("tags", count)?;
        let termination_protection = inputs.per_stack("termination-protection", count)?;

        let options = (0..count)
            .map(|i| StackOptions {
                template: parse_string(template.get(i).trim()),
                capabilities: parse_capabilities(capabilities.get(i)),
                role_arn: parse_string(role_arn.get(i)),
                disable_rollback: parse_flag(disable_rollback.get(i)),
                timeout_in_minutes: parse_number(timeout.get(i)),
                notification_arns: parse_arns(notification_arns.get(i)),
                tags: parse_tags(tags.get(i)),
                termination_protection: parse_flag(termination_protection.get(i)),
                parameter_overrides: parse_string(parameter_overrides.get(i).trim()),
                no_fail_on_empty_changeset: parse_flag(no_fail_on_empty.get(i)),
                no_execute_changeset: parse_flag(no_execute.get(i)),
                no_delete_failed_changeset: parse_flag(no_delete_failed.get(i)),
            })
            .collect();

        let concurrency = inputs
            .get("concurrency")
            .and_then(parse_number)
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(DEFAULT_CONCURRENCY);

        let mut config = Self::new(stacks);
        config.concurrency = concurrency;
        config.options = options;
        if let Some(workspace) = workspace {
            config.workspace = workspace.to_path_buf();
        }
        if let Some(dir) = inputs.get("template-dir").and_then(parse_string) {
            config.template_dir = PathBuf::from(dir);
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ConfigError::invalid_value("config", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::read(path.display().to_string(), e.to_string()))?;
        Self::from_json(&raw)
    }

    /// Checks stack names and the options count.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stacks.is_empty() {
            return Err(ConfigError::MissingInput {
                input: "name".to_string(),
            });
        }
        let count = self.options.len();
        if count > 1 && count != self.stacks.len() {
            return Err(ConfigError::LineCountMismatch {
                input: "options".to_string(),
            });
        }
        for name in &self.stacks {
            crate::core::validate_stack_name(name)?;
        }
        Ok(())
    }

    /// Returns the concurrency ceiling, at least 1.
    #[must_use]
    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }

    /// Returns the options for the stack at `index`.
    #[must_use]
    pub fn options_for(&self, index: usize) -> StackOptions {
        match self.options.len() {
            0 => StackOptions::default(),
            1 => self.options[0].clone(),
            _ => self.options.get(index).cloned().unwrap_or_default(),
        }
    }

    /// Returns the loader for the configured template directory.
    #[must_use]
    pub fn template_loader(&self) -> FileTemplateLoader {
        FileTemplateLoader::new(&self.workspace, &self.template_dir)
    }

    /// Builds one request per stack, in order.
    ///
    /// A stack whose template or options cannot be resolved gets a failed
    /// entry; the other stacks are unaffected.
    pub fn stack_requests(&self, loader: &dyn TemplateLoader) -> Vec<PreparedStack> {
        self.stacks
            .iter()
            .enumerate()
            .map(|(i, stack)| PreparedStack {
                stack: stack.clone(),
                request: self
                    .options_for(i)
                    .to_request(stack, loader)
                    .map_err(|e| e.for_stack(stack)),
            })
            .collect()
    }
}
