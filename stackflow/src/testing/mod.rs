//! Testing utilities for stackflow deployments.
//!
//! This module provides:
//! - An in-memory control plane implementing [`StackClient`](crate::client::StackClient)
//! - Request fixtures
//! - Assertions over run reports

mod assertions;
pub mod fixtures;
mod fake;

pub use assertions::{
    assert_failure_contains, assert_stack_action, assert_stack_failed, assert_stack_succeeded,
};
pub use fake::{FakeControlPlane, Operation, RecordedCall, NO_CHANGES_REASON};
