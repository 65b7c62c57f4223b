//! Stack deployment.
//!
//! This module provides:
//! - Stack lookup and output extraction
//! - Change set orchestration and no-op classification
//! - The per-stack [`Deployer`]
//! - The bounded [`FanOutScheduler`]

mod changeset;
mod classify;
mod decision;
mod locator;
mod outputs;
mod scenario_tests;
mod scheduler;

pub use changeset::ChangeSetOrchestrator;
pub use classify::{NoOpClassifier, DEFAULT_NO_OP_PHRASES};
pub use decision::Deployer;
pub use locator::get_stack;
pub use outputs::get_stack_outputs;
pub use scheduler::{deploy_all, deploy_prepared, FanOutScheduler, DEFAULT_CONCURRENCY};
