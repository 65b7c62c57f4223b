//! # Stackflow
//!
//! Concurrent deployment of declarative infrastructure stacks.
//!
//! Stackflow deploys a batch of stacks against a CloudFormation-style
//! control plane:
//!
//! - **Create or update**: missing stacks are created, existing stacks are
//!   updated through a reviewable change set
//! - **Empty change sets**: a change set with nothing to change can be
//!   treated as success
//! - **Plan only**: change sets can be created and left unexecuted
//! - **Bounded fan-out**: stacks deploy concurrently under a ceiling, and one
//!   stack's failure never cancels another
//! - **Outputs**: declared outputs are read back after each stack stabilizes
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use stackflow::prelude::*;
//! use std::sync::Arc;
//!
//! let client_config = ClientConfig::new().with_region("us-east-1");
//! let client = CloudFormationClient::connect(&client_config).await?;
//! let client = Arc::new(client_config.retrying(client));
//! let config = DeployConfig::from_file("deploy.json")?;
//! let prepared = config.stack_requests(&config.template_loader());
//!
//! let report = deploy_prepared(client, prepared, config.effective_concurrency()).await?;
//! for (name, value) in report.output_pairs() {
//!     println!("{name}={value}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod client;
pub mod config;
pub mod core;
pub mod deploy;
pub mod errors;
pub mod events;
pub mod observability;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{ClientConfig, RetryConfig, RetryingClient, StackClient};
    pub use crate::config::{DeployConfig, FileTemplateLoader, StackOptions, TemplateLoader};
    pub use crate::core::{
        DeployAction, Deployment, DeploymentOutcome, OutputMap, PreparedStack, RunReport,
        StackReport, StackRequest, TemplateSource,
    };
    pub use crate::deploy::{
        deploy_all, deploy_prepared, Deployer, FanOutScheduler, NoOpClassifier,
    };
    pub use crate::errors::{AggregateError, ClientError, ConfigError, DeployError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, TracingConfig};

    #[cfg(feature = "aws")]
    pub use crate::client::CloudFormationClient;
}
