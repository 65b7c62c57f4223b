//! Bounded fan-out over many stacks.
//!
//! Each stack runs in its own task, gated by a semaphore sized to the
//! concurrency ceiling. Tasks are admitted in submission order. A failing
//! stack never cancels its siblings; every stack gets a report.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::decision::Deployer;
use crate::client::StackClient;
use crate::core::{
    DeploymentOutcome, OutputMap, PreparedStack, RunReport, StackReport, StackRequest,
};
use crate::errors::{ConfigError, DeployError, FailureRecord};
use crate::events;
use crate::observability::SpanTimer;

/// Default number of stacks deployed at once.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Deploys a batch of stacks with a concurrency ceiling.
#[derive(Debug, Clone)]
pub struct FanOutScheduler {
    deployer: Arc<Deployer>,
    concurrency: usize,
}

impl FanOutScheduler {
    /// Creates a scheduler with the default ceiling.
    #[must_use]
    pub fn new(deployer: Deployer) -> Self {
        Self {
            deployer: Arc::new(deployer),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the concurrency ceiling. Values below 1 are raised to 1.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Returns the concurrency ceiling.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the deployer.
    #[must_use]
    pub fn deployer(&self) -> &Deployer {
        &self.deployer
    }

    /// Deploys every request and reports one outcome per stack.
    ///
    /// Per-stack failures are recorded in the report rather than returned;
    /// use [`RunReport::into_result`] to turn them into an error. Fails
    /// before any remote call if a stack name appears twice.
    pub async fn run(&self, requests: Vec<StackRequest>) -> Result<RunReport, DeployError> {
        self.run_prepared(requests.into_iter().map(PreparedStack::from).collect())
            .await
    }

    /// Like [`FanOutScheduler::run`], for stacks whose requests may have
    /// failed to build. Those stacks are reported as failed without any
    /// remote call and without taking a slot; the rest deploy as usual.
    pub async fn run_prepared(
        &self,
        prepared: Vec<PreparedStack>,
    ) -> Result<RunReport, DeployError> {
        reject_duplicates(&prepared)?;

        let run_id = Uuid::new_v4();
        let timer = SpanTimer::start("deploy_run");
        info!(run_id = %run_id, stacks = prepared.len(), concurrency = self.concurrency, "Starting deployment");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut handles = Vec::with_capacity(prepared.len());

        for PreparedStack { stack, request } in prepared {
            let deployer = Arc::clone(&self.deployer);
            let span = info_span!("deploy_stack", stack = %stack, run_id = %run_id);

            let handle = match request {
                Ok(request) => {
                    let permit = Arc::clone(&semaphore)
                        .acquire_owned()
                        .await
                        .map_err(|e| DeployError::Internal(e.to_string()))?;
                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            deploy_one(&deployer, &request).await
                        }
                        .instrument(span),
                    )
                }
                Err(err) => {
                    let name = stack.clone();
                    tokio::spawn(
                        async move { failed(&deployer, &name, &err.for_stack(&name), Utc::now()) }
                            .instrument(span),
                    )
                }
            };
            handles.push((stack, handle));
        }

        let (names, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut reports = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (stack, result) in names.into_iter().zip(results) {
            let (report, failure) = match result {
                Ok(done) => done,
                Err(join_err) => {
                    let err = DeployError::Internal(format!("deployment task failed: {join_err}"))
                        .for_stack(&stack);
                    error!(stack = %stack, error = %err, "{}: Error", stack);
                    let now = Utc::now();
                    let report = StackReport {
                        stack: stack.clone(),
                        outcome: DeploymentOutcome::failed(&err),
                        outputs: OutputMap::new(),
                        started_at: now,
                        finished_at: now,
                    };
                    (report, Some(FailureRecord::from_error(stack, &err)))
                }
            };
            reports.push(report);
            failures.extend(failure);
        }
        failures.sort_by_key(|f| f.timestamp);

        info!(
            run_id = %run_id,
            succeeded = reports.len() - failures.len(),
            failed = failures.len(),
            duration_ms = timer.finish(),
            "Deployment finished"
        );
        self.deployer.events().try_emit(
            events::RUN_COMPLETED,
            Some(json!({
                "run_id": run_id.to_string(),
                "stacks": reports.len(),
                "failed": failures.iter().map(|f| f.stack.as_str()).collect::<Vec<_>>(),
            })),
        );

        Ok(RunReport {
            run_id,
            reports,
            failures,
        })
    }
}

/// Deploys `requests` over `client` and fails if any stack failed.
///
/// The error is [`DeployError::Aggregate`] naming every failed stack and
/// carrying the reports of the ones that succeeded.
pub async fn deploy_all(
    client: Arc<dyn StackClient>,
    requests: Vec<StackRequest>,
    concurrency: usize,
) -> Result<RunReport, DeployError> {
    FanOutScheduler::new(Deployer::new(client))
        .with_concurrency(concurrency)
        .run(requests)
        .await?
        .into_result()
}

/// Deploys prepared stacks over `client` and fails if any stack failed,
/// including stacks whose requests could not be built.
pub async fn deploy_prepared(
    client: Arc<dyn StackClient>,
    prepared: Vec<PreparedStack>,
    concurrency: usize,
) -> Result<RunReport, DeployError> {
    FanOutScheduler::new(Deployer::new(client))
        .with_concurrency(concurrency)
        .run_prepared(prepared)
        .await?
        .into_result()
}

fn reject_duplicates(prepared: &[PreparedStack]) -> Result<(), ConfigError> {
    let mut seen = HashSet::with_capacity(prepared.len());
    for entry in prepared {
        if !seen.insert(entry.stack.as_str()) {
            return Err(ConfigError::DuplicateStack {
                name: entry.stack.clone(),
            });
        }
    }
    Ok(())
}

async fn deploy_one(
    deployer: &Deployer,
    request: &StackRequest,
) -> (StackReport, Option<FailureRecord>) {
    let stack = request.name();
    let started_at = Utc::now();
    deployer
        .events()
        .try_emit(events::STACK_STARTED, Some(json!({"stack": stack})));

    let result = async {
        let deployment = deployer.deploy_stack(request).await?;
        let outputs = match deployment.stack_id.as_deref() {
            Some(stack_id) => deployer
                .get_stack_outputs(stack_id)
                .await
                .map_err(|e| e.for_stack(stack))?,
            None => OutputMap::new(),
        };
        Ok::<_, DeployError>((deployment, outputs))
    }
    .await;

    match result {
        Ok((deployment, outputs)) => {
            info!(
                stack = %stack,
                action = ?deployment.action,
                stack_id = deployment.stack_id.as_deref().unwrap_or_default(),
                outputs = outputs.len(),
                "Stack deployed"
            );
            deployer.events().try_emit(
                events::STACK_COMPLETED,
                Some(json!({"stack": stack, "stack_id": deployment.stack_id, "action": deployment.action})),
            );
            let report = StackReport {
                stack: stack.to_string(),
                outcome: DeploymentOutcome::Succeeded(deployment),
                outputs,
                started_at,
                finished_at: Utc::now(),
            };
            (report, None)
        }
        Err(err) => failed(deployer, stack, &err, started_at),
    }
}

fn failed(
    deployer: &Deployer,
    stack: &str,
    err: &DeployError,
    started_at: DateTime<Utc>,
) -> (StackReport, Option<FailureRecord>) {
    error!(stack = %stack, error = %err, "{}: Error", stack);
    deployer.events().try_emit(
        events::STACK_FAILED,
        Some(json!({"stack": stack, "error": err.to_dict()})),
    );
    let report = StackReport {
        stack: stack.to_string(),
        outcome: DeploymentOutcome::failed(err),
        outputs: OutputMap::new(),
        started_at,
        finished_at: Utc::now(),
    };
    (report, Some(FailureRecord::from_error(stack, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, FakeControlPlane};

    #[tokio::test]
    async fn test_duplicate_names_rejected_before_any_call() {
        let fake = Arc::new(FakeControlPlane::new());
        let scheduler = FanOutScheduler::new(Deployer::new(fake.clone()));

        let err = scheduler
            .run(vec![fixtures::request("app"), fixtures::request("app")])
            .await
            .unwrap_err();

        assert!(matches!(err, DeployError::Config(ConfigError::DuplicateStack { .. })));
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn test_concurrency_is_at_least_one() {
        let fake = Arc::new(FakeControlPlane::new());
        let scheduler = FanOutScheduler::new(Deployer::new(fake)).with_concurrency(0);
        assert_eq!(scheduler.concurrency(), 1);
    }

    #[tokio::test]
    async fn test_empty_run_succeeds() {
        let fake = Arc::new(FakeControlPlane::new());
        let report = deploy_all(fake, Vec::new(), 5).await.unwrap();
        assert!(report.succeeded());
        assert!(report.reports.is_empty());
    }

    #[tokio::test]
    async fn test_reports_follow_submission_order() {
        let fake = Arc::new(FakeControlPlane::new());
        let requests = vec![
            fixtures::request("alpha"),
            fixtures::request("beta"),
            fixtures::request("gamma"),
        ];

        let report = deploy_all(fake, requests, 3).await.unwrap();

        let stacks: Vec<_> = report.reports.iter().map(|r| r.stack.as_str()).collect();
        assert_eq!(stacks, vec!["alpha", "beta", "gamma"]);
    }
}
