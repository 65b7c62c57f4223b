//! Assertions over run reports.

use crate::core::{DeployAction, DeploymentOutcome, RunReport};

fn outcome<'a>(report: &'a RunReport, stack: &str) -> &'a DeploymentOutcome {
    match report.get(stack) {
        Some(r) => &r.outcome,
        None => panic!("no report for stack {stack}"),
    }
}

/// Asserts that the stack deployed successfully.
pub fn assert_stack_succeeded(report: &RunReport, stack: &str) {
    let outcome = outcome(report, stack);
    assert!(outcome.is_success(), "Expected {stack} to succeed, got {outcome:?}");
}

/// Asserts that the stack failed.
pub fn assert_stack_failed(report: &RunReport, stack: &str) {
    let outcome = outcome(report, stack);
    assert!(!outcome.is_success(), "Expected {stack} to fail, got {outcome:?}");
}

/// Asserts that the stack deployed with the given action.
pub fn assert_stack_action(report: &RunReport, stack: &str, expected: DeployAction) {
    match outcome(report, stack) {
        DeploymentOutcome::Succeeded(deployment) => assert_eq!(
            deployment.action, expected,
            "Expected {stack} to be {expected:?}, got {:?}",
            deployment.action
        ),
        DeploymentOutcome::Failed { reason, .. } => {
            panic!("Expected {stack} to be {expected:?}, but it failed: {reason}")
        }
    }
}

/// Asserts that the stack failed with a reason containing `text`.
pub fn assert_failure_contains(report: &RunReport, stack: &str, text: &str) {
    match outcome(report, stack) {
        DeploymentOutcome::Failed { reason, .. } => assert!(
            reason.contains(text),
            "Expected failure of {stack} to contain {text:?}, got {reason:?}"
        ),
        other => panic!("Expected {stack} to fail, got {other:?}"),
    }
}
