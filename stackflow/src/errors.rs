//! Error types for stack deployment.
//!
//! The taxonomy separates the recoverable signals that drive the deployment
//! decision tree (a stack that does not exist yet, an empty change set) from
//! the fatal, per-stack failures and the aggregate failure of a whole run.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;
use thiserror::Error;

use crate::core::StackReport;

/// Error returned by a remote stack client.
///
/// The control plane reports most conditions only through the message text,
/// so the message is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ClientError {
    /// The message reported by the control plane.
    pub message: String,
    /// The error code, when the client exposes one (e.g. `ValidationError`).
    pub code: Option<String>,
    /// Whether the call may succeed if repeated (throttling and similar).
    pub retryable: bool,
}

impl ClientError {
    /// Creates a new client error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            retryable: false,
        }
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Marks the error as retryable.
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    /// Returns true if the message says the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
        PATTERN
            .get_or_init(|| Regex::new(r"does not exist").ok())
            .as_ref()
            .is_some_and(|re| re.is_match(&self.message))
    }
}

/// Error raised while turning configuration into stack requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A required input was missing or empty.
    #[error("Input required and not supplied: {input}")]
    MissingInput {
        /// The input name.
        input: String,
    },

    /// A per-stack input had neither one line nor one line per stack.
    #[error("number input {input} lines must match name lines or must be a single line")]
    LineCountMismatch {
        /// The input name.
        input: String,
    },

    /// A stack name is not acceptable to the control plane.
    #[error("Invalid stack name '{name}': {reason}")]
    InvalidStackName {
        /// The offending name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The same stack appeared twice in one run.
    #[error("Stack '{name}' was submitted more than once in the same run")]
    DuplicateStack {
        /// The duplicated name.
        name: String,
    },

    /// A value could not be parsed.
    #[error("Invalid value for {input}: {message}")]
    InvalidValue {
        /// The input name.
        input: String,
        /// Parse failure detail.
        message: String,
    },

    /// A template or parameter file could not be read.
    #[error("Failed to read {path}: {message}")]
    Read {
        /// The file path.
        path: String,
        /// The underlying error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid_value(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Creates a file read error.
    #[must_use]
    pub fn read(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Read {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The main error type for deployment operations.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The stack does not exist. Only produced by the existence check.
    #[error("Stack {stack} does not exist")]
    NotFound {
        /// The stack name or id.
        stack: String,
    },

    /// The change set could not be created because nothing changed.
    #[error("Change Set for {stack} contains no changes: {reason}")]
    ChangeSetEmpty {
        /// The stack name.
        stack: String,
        /// The control plane's reason text.
        reason: String,
    },

    /// The change set could not be created.
    #[error("Failed to create Change Set: {reason}")]
    ChangeSetFailed {
        /// The stack name.
        stack: String,
        /// The control plane's reason text, verbatim.
        reason: String,
    },

    /// A remote create/update/execute/wait call failed.
    #[error("{operation} failed for {stack}: {source}")]
    RemoteOperationFailed {
        /// The remote operation name.
        operation: &'static str,
        /// The stack name or id the call targeted.
        stack: String,
        /// The client error.
        source: ClientError,
    },

    /// A per-stack error, attributed to its stack.
    #[error("{stack}: {source}")]
    Stack {
        /// The stack name.
        stack: String,
        /// The underlying error.
        source: Box<DeployError>,
    },

    /// One or more stacks in a run failed.
    #[error("{0}")]
    Aggregate(#[from] AggregateError),

    /// Invalid configuration.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The template for a stack could not be resolved.
    #[error("Template error for {stack}: {message}")]
    Template {
        /// The stack name.
        stack: String,
        /// Detail.
        message: String,
    },

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DeployError {
    /// Creates a remote operation error.
    #[must_use]
    pub fn remote(operation: &'static str, stack: impl Into<String>, source: ClientError) -> Self {
        Self::RemoteOperationFailed {
            operation,
            stack: stack.into(),
            source,
        }
    }

    /// Creates a change set failure.
    #[must_use]
    pub fn change_set_failed(stack: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ChangeSetFailed {
            stack: stack.into(),
            reason: reason.into(),
        }
    }

    /// Attaches a stack name, unless the error already carries one.
    #[must_use]
    pub fn for_stack(self, stack: &str) -> Self {
        match self {
            Self::Stack { .. } | Self::Template { .. } | Self::Aggregate(_) => self,
            other => Self::Stack {
                stack: stack.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the innermost error, skipping stack attribution.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stack { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the stack name this error is attributed to, if any.
    #[must_use]
    pub fn stack(&self) -> Option<&str> {
        match self {
            Self::NotFound { stack }
            | Self::ChangeSetEmpty { stack, .. }
            | Self::ChangeSetFailed { stack, .. }
            | Self::RemoteOperationFailed { stack, .. }
            | Self::Stack { stack, .. }
            | Self::Template { stack, .. } => Some(stack),
            _ => None,
        }
    }

    /// Returns a short name for the error kind.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self.root() {
            Self::NotFound { .. } => "NotFound",
            Self::ChangeSetEmpty { .. } => "ChangeSetEmpty",
            Self::ChangeSetFailed { .. } => "ChangeSetFailed",
            Self::RemoteOperationFailed { .. } => "RemoteOperationFailed",
            Self::Aggregate(_) => "AggregateFailure",
            Self::Config(_) => "Config",
            Self::Template { .. } => "Template",
            Self::Internal(_) => "Internal",
            Self::Io(_) => "Io",
            Self::Stack { .. } => "Stack",
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(self.kind()));
        if let Some(stack) = self.stack() {
            map.insert("stack".to_string(), serde_json::json!(stack));
        }
        match self.root() {
            Self::ChangeSetEmpty { reason, .. } | Self::ChangeSetFailed { reason, .. } => {
                map.insert("reason".to_string(), serde_json::json!(reason));
            }
            Self::RemoteOperationFailed { operation, source, .. } => {
                map.insert("operation".to_string(), serde_json::json!(operation));
                map.insert("code".to_string(), serde_json::json!(source.code));
            }
            _ => {}
        }
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// Record of one stack's failure within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Stack name.
    pub stack: String,
    /// Error message.
    pub error: String,
    /// Error kind name.
    pub error_type: String,
    /// When the failure was observed.
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    /// Creates a new failure record stamped with the current time.
    #[must_use]
    pub fn new(stack: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
            error: error.into(),
            error_type: "Error".to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Creates a record from a deployment error.
    #[must_use]
    pub fn from_error(stack: impl Into<String>, error: &DeployError) -> Self {
        Self::new(stack, error.to_string()).with_error_type(error.kind())
    }

    /// Sets the error type.
    #[must_use]
    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }
}

/// One or more stacks failed during a run.
///
/// Carries every failure plus the full per-stack reports, so partial
/// successes stay visible to the caller.
#[derive(Debug, Clone, Error)]
#[error("{} of {} stacks failed: {}", failures.len(), reports.len(), summary(failures))]
pub struct AggregateError {
    /// Failures in the order they were observed.
    pub failures: Vec<FailureRecord>,
    /// Reports for every submitted stack, in submission order.
    pub reports: Vec<StackReport>,
}

fn summary(failures: &[FailureRecord]) -> String {
    failures
        .iter()
        .map(|f| format!("[{}] {}", f.stack, f.error))
        .collect::<Vec<_>>()
        .join("; ")
}

impl AggregateError {
    /// Returns the first observed failure.
    #[must_use]
    pub fn first(&self) -> Option<&FailureRecord> {
        self.failures.first()
    }

    /// Returns the names of the failed stacks.
    #[must_use]
    pub fn failed_stacks(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.stack.as_str()).collect()
    }

    /// Returns the names of the stacks that deployed successfully.
    #[must_use]
    pub fn succeeded_stacks(&self) -> Vec<&str> {
        self.reports
            .iter()
            .filter(|r| r.outcome.is_success())
            .map(|r| r.stack.as_str())
            .collect()
    }
}
