//! Core domain model types for stackflow.
//!
//! This module contains the data that flows through a deployment:
//! - Stack requests and their builder
//! - Stack and change set descriptors and statuses
//! - Deployment outcomes and run reports

mod descriptor;
mod outcome;
mod request;
mod status;

pub use descriptor::{
    ChangeSetDescription, ChangeSetRequest, CreateStackParams, StackDescriptor, StackOutput,
};
pub use outcome::{
    DeployAction, Deployment, DeploymentOutcome, OutputMap, RunReport, StackReport,
    UNKNOWN_STACK_ID,
};
pub use request::{
    validate_stack_name, Parameter, PreparedStack, StackRequest, StackRequestBuilder, Tag,
    TemplateSource,
    MAX_STACK_NAME_LEN,
};
pub use status::{ChangeSetPhase, ChangeSetStatus, StackStatus};
