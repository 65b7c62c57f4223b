//! End-to-end deployment scenarios against the in-memory control plane.

#[cfg(test)]
mod tests {
    use crate::client::{MockStackClient, StackClient};
    use crate::core::{
        ChangeSetDescription, ChangeSetStatus, DeployAction, StackDescriptor, StackOutput,
        StackStatus,
    };
    use crate::config::{DeployConfig, DEFAULT_TEMPLATE_DIR};
    use crate::deploy::{deploy_all, deploy_prepared, Deployer, FanOutScheduler};
    use crate::errors::{ClientError, DeployError};
    use crate::events::{self, CollectingEventSink};
    use crate::testing::{
        assert_failure_contains, assert_stack_action, assert_stack_failed,
        assert_stack_succeeded, fixtures, FakeControlPlane, Operation, NO_CHANGES_REASON,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    const NO_UPDATES: &str = "No updates are to be performed.";

    fn deployer(fake: &Arc<FakeControlPlane>) -> Deployer {
        let client: Arc<dyn StackClient> = fake.clone();
        Deployer::new(client)
    }

    #[tokio::test]
    async fn test_missing_stack_is_created_never_change_set() {
        let fake = Arc::new(FakeControlPlane::new());

        let deployment = deployer(&fake)
            .deploy_stack(&fixtures::request("app"))
            .await
            .unwrap();

        assert_eq!(deployment.action, DeployAction::Created);
        assert_eq!(
            fake.operations_for("app"),
            vec![
                Operation::DescribeStack,
                Operation::CreateStack,
                Operation::WaitStackCreate
            ]
        );
        assert_eq!(fake.count(Operation::CreateChangeSet), 0);
        assert_eq!(
            deployment.stack_id.as_deref(),
            fake.stack("app").map(|s| s.stack_id).as_deref()
        );
    }

    #[tokio::test]
    async fn test_existing_stack_is_updated_through_change_set() {
        let fake = Arc::new(FakeControlPlane::new());
        let stack_id = fake.add_stack("app");

        let deployment = deployer(&fake)
            .deploy_stack(&fixtures::request("app"))
            .await
            .unwrap();

        assert_eq!(deployment.action, DeployAction::Updated);
        assert_eq!(deployment.stack_id.as_deref(), Some(stack_id.as_str()));
        assert_eq!(fake.count(Operation::CreateStack), 0);
        assert_eq!(
            fake.operations_for("app"),
            vec![
                Operation::DescribeStack,
                Operation::CreateChangeSet,
                Operation::WaitChangeSet,
                Operation::ExecuteChangeSet,
                Operation::WaitStackUpdate
            ]
        );
        assert_eq!(fake.stack("app").unwrap().status, StackStatus::UpdateComplete);
    }

    #[tokio::test]
    async fn test_repeated_deploy_without_drift_is_idempotent() {
        let fake = Arc::new(FakeControlPlane::new());
        let stack_id = fake.add_deployed_stack("app", fixtures::template(), Vec::new());
        let deployer = deployer(&fake);
        let request = fixtures::idempotent_request("app");

        let first = deployer.deploy_stack(&request).await.unwrap();
        let second = deployer.deploy_stack(&request).await.unwrap();

        assert_eq!(first.action, DeployAction::Unchanged);
        assert_eq!(first, second);
        assert_eq!(first.stack_id.as_deref(), Some(stack_id.as_str()));
        assert_eq!(fake.count(Operation::DeleteChangeSet), 2);
        assert_eq!(fake.count(Operation::ExecuteChangeSet), 0);
    }

    #[tokio::test]
    async fn test_create_then_redeploy_returns_same_id() {
        let fake = Arc::new(FakeControlPlane::new());
        let deployer = deployer(&fake);
        let request = fixtures::idempotent_request("app");

        let created = deployer.deploy_stack(&request).await.unwrap();
        let again = deployer.deploy_stack(&request).await.unwrap();

        assert_eq!(created.action, DeployAction::Created);
        assert_eq!(again.action, DeployAction::Unchanged);
        assert_eq!(created.stack_id, again.stack_id);
    }

    #[tokio::test]
    async fn test_no_updates_reason_with_empty_allowed_succeeds() {
        let fake = Arc::new(FakeControlPlane::new());
        let stack_id = fake.add_stack("app");
        fake.fail_change_set("app", NO_UPDATES);

        let deployment = deployer(&fake)
            .deploy_stack(&fixtures::idempotent_request("app"))
            .await
            .unwrap();

        assert_eq!(deployment.action, DeployAction::Unchanged);
        assert_eq!(deployment.stack_id, Some(stack_id));
        assert_eq!(fake.count(Operation::ExecuteChangeSet), 0);
    }

    #[tokio::test]
    async fn test_no_updates_reason_without_empty_allowed_fails() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_stack("app");
        fake.fail_change_set("app", NO_UPDATES);

        let err = deployer(&fake)
            .deploy_stack(&fixtures::request("app"))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ChangeSetFailed");
        assert_eq!(err.stack(), Some("app"));
        assert!(matches!(
            err.root(),
            DeployError::ChangeSetFailed { reason, .. } if reason == NO_UPDATES
        ));
        assert_eq!(
            err.to_string(),
            format!("app: Failed to create Change Set: {NO_UPDATES}")
        );
    }

    #[tokio::test]
    async fn test_plan_only_returns_existing_id_without_executing() {
        let fake = Arc::new(FakeControlPlane::new());
        let stack_id = fake.add_stack("app");
        let request = fixtures::builder("app")
            .execute_change_set(false)
            .build()
            .unwrap();

        let deployment = deployer(&fake).deploy_stack(&request).await.unwrap();

        assert_eq!(deployment.action, DeployAction::Planned);
        assert_eq!(deployment.stack_id, Some(stack_id));
        assert_eq!(fake.count(Operation::ExecuteChangeSet), 0);
        assert!(fake.has_change_set("app", "app-CS"));
    }

    #[tokio::test]
    async fn test_stalled_change_set_resolves_no_id() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_stack("app");
        fake.stall_change_set("app");

        let report = deploy_all(fake.clone(), vec![fixtures::request("app")], 1)
            .await
            .unwrap();

        assert_stack_action(&report, "app", DeployAction::Unresolved);
        assert!(report.get("app").unwrap().outputs.is_empty());
        assert_eq!(
            report.output_pairs(),
            vec![("app-stack-id".to_string(), "UNKNOWN".to_string())]
        );
        assert_eq!(fake.count(Operation::DeleteChangeSet), 0);
    }

    #[tokio::test]
    async fn test_serial_run_isolates_failure() {
        let fake = Arc::new(FakeControlPlane::new().with_latency(Duration::from_millis(5)));
        fake.add_stack("stack-2");
        fake.fail_change_set("stack-2", "Template format error: Unresolved resource dependencies");
        let requests = vec![
            fixtures::request("stack-1"),
            fixtures::request("stack-2"),
            fixtures::request("stack-3"),
        ];

        let err = deploy_all(fake.clone(), requests, 1).await.unwrap_err();

        assert_eq!(fake.max_in_flight(), 1);
        let DeployError::Aggregate(aggregate) = err else {
            panic!("expected aggregate failure");
        };
        assert_eq!(aggregate.failed_stacks(), vec!["stack-2"]);
        assert_eq!(aggregate.succeeded_stacks(), vec!["stack-1", "stack-3"]);
        assert!(aggregate.to_string().contains("stack-2"));
        assert!(fake.stack("stack-3").is_some());
    }

    #[tokio::test]
    async fn test_failure_does_not_cancel_in_flight_siblings() {
        let fake = Arc::new(FakeControlPlane::new().with_latency(Duration::from_millis(10)));
        fake.fail_operation(
            "broken",
            Operation::CreateStack,
            ClientError::new("Requires capabilities : [CAPABILITY_IAM]")
                .with_code("InsufficientCapabilitiesException"),
        );
        let sink = Arc::new(CollectingEventSink::new());
        let scheduler = FanOutScheduler::new(deployer(&fake).with_event_sink(sink.clone()))
            .with_concurrency(3);

        let report = scheduler
            .run(vec![
                fixtures::request("first"),
                fixtures::request("broken"),
                fixtures::request("last"),
            ])
            .await
            .unwrap();

        assert!(fake.max_in_flight() > 1);
        assert_stack_succeeded(&report, "first");
        assert_stack_succeeded(&report, "last");
        assert_stack_failed(&report, "broken");
        assert_failure_contains(&report, "broken", "CAPABILITY_IAM");
        assert_eq!(report.failed_stacks(), vec!["broken"]);

        assert_eq!(sink.events_for_stack("broken").last().unwrap().event_type, events::STACK_FAILED);
        assert_eq!(sink.event_types().last().unwrap(), events::RUN_COMPLETED);
        assert!(report.into_result().is_err());
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_bounds_in_flight_calls() {
        let fake = Arc::new(FakeControlPlane::new().with_latency(Duration::from_millis(5)));
        let requests = (1..=6).map(|i| fixtures::request(&format!("stack-{i}"))).collect();

        let report = deploy_all(fake.clone(), requests, 2).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.reports.len(), 6);
        assert!(fake.max_in_flight() <= 2);
    }

    #[tokio::test]
    async fn test_outputs_skip_empty_values() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_stack("app");
        fake.set_outputs(
            "app",
            vec![StackOutput::new("K1", "V1"), StackOutput::new("K2", "")],
        );

        let report = deploy_all(fake.clone(), vec![fixtures::request("app")], 5)
            .await
            .unwrap();

        let outputs = &report.get("app").unwrap().outputs;
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs.get("K1").map(String::as_str), Some("V1"));

        let stack_id = fake.stack("app").unwrap().stack_id;
        assert_eq!(
            report.output_pairs(),
            vec![
                ("app-stack-id".to_string(), stack_id),
                ("app_output_K1".to_string(), "V1".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_outputs_are_read_with_a_fresh_describe() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.set_outputs("app", vec![StackOutput::new("Url", "https://app.example.com")]);

        deploy_all(fake.clone(), vec![fixtures::request("app")], 5)
            .await
            .unwrap();

        assert_eq!(
            fake.operations_for("app"),
            vec![
                Operation::DescribeStack,
                Operation::CreateStack,
                Operation::WaitStackCreate,
                Operation::DescribeStack
            ]
        );
    }

    fn failed_change_set_client(delete_times: usize) -> MockStackClient {
        let mut client = MockStackClient::new();
        client.expect_describe_stack().returning(|name| {
            Ok(StackDescriptor::new("arn:stack/app/1", name, StackStatus::UpdateComplete))
        });
        client
            .expect_create_change_set()
            .times(1)
            .returning(|_| Ok("arn:changeSet/app-CS/1".to_string()));
        client
            .expect_wait_change_set_create_complete()
            .times(1)
            .returning(|_, _| Err(ClientError::new("Waiter encountered a terminal failure state")));
        client.expect_describe_change_set().times(1).returning(|_, _| {
            Ok(ChangeSetDescription {
                change_set_id: Some("arn:changeSet/app-CS/1".to_string()),
                status: ChangeSetStatus::Failed,
                status_reason: Some(NO_CHANGES_REASON.to_string()),
            })
        });
        client
            .expect_delete_change_set()
            .withf(|stack, change_set| stack == "app" && change_set == "app-CS")
            .times(delete_times)
            .returning(|_, _| Ok(()));
        client
    }

    #[tokio::test]
    async fn test_failed_change_set_deleted_exactly_once() {
        let client = failed_change_set_client(1);
        let request = fixtures::idempotent_request("app");

        let deployment = Deployer::new(Arc::new(client))
            .deploy_stack(&request)
            .await
            .unwrap();

        assert_eq!(deployment.action, DeployAction::Unchanged);
    }

    #[tokio::test]
    async fn test_failed_change_set_kept_when_deletion_disabled() {
        let client = failed_change_set_client(0);
        let request = fixtures::builder("app")
            .allow_empty_change_set(true)
            .delete_failed_change_set(false)
            .build()
            .unwrap();

        let deployment = Deployer::new(Arc::new(client))
            .deploy_stack(&request)
            .await
            .unwrap();

        assert_eq!(deployment.stack_id.as_deref(), Some("arn:stack/app/1"));
    }

    #[tokio::test]
    async fn test_kept_change_set_blocks_next_run() {
        let fake = Arc::new(FakeControlPlane::new());
        fake.add_deployed_stack("app", fixtures::template(), Vec::new());
        let request = fixtures::builder("app")
            .allow_empty_change_set(true)
            .delete_failed_change_set(false)
            .build()
            .unwrap();
        let deployer = deployer(&fake);

        deployer.deploy_stack(&request).await.unwrap();
        let err = deployer.deploy_stack(&request).await.unwrap_err();

        assert_eq!(err.kind(), "RemoteOperationFailed");
        assert!(fake.has_change_set("app", "app-CS"));
    }

    fn workspace_with_templates(stacks: &[&str]) -> tempfile::TempDir {
        let workspace = tempfile::tempdir().unwrap();
        let dir = workspace.path().join(DEFAULT_TEMPLATE_DIR);
        std::fs::create_dir_all(&dir).unwrap();
        for stack in stacks {
            std::fs::write(dir.join(format!("{stack}.template.json")), fixtures::TEMPLATE_BODY)
                .unwrap();
        }
        workspace
    }

    #[tokio::test]
    async fn test_missing_template_fails_only_its_stack() {
        let workspace = workspace_with_templates(&["alpha", "gamma"]);
        let config = DeployConfig::new(["alpha", "beta", "gamma"]).with_workspace(workspace.path());
        let fake = Arc::new(FakeControlPlane::new());
        let sink = Arc::new(CollectingEventSink::new());
        let scheduler = FanOutScheduler::new(deployer(&fake).with_event_sink(sink.clone()))
            .with_concurrency(1);

        let report = scheduler
            .run_prepared(config.stack_requests(&config.template_loader()))
            .await
            .unwrap();

        assert_stack_action(&report, "alpha", DeployAction::Created);
        assert_stack_action(&report, "gamma", DeployAction::Created);
        assert_stack_failed(&report, "beta");
        assert_failure_contains(&report, "beta", "beta.template.json");
        assert_eq!(report.failed_stacks(), vec!["beta"]);
        assert!(fake.operations_for("beta").is_empty());
        assert_eq!(
            sink.events_for_stack("beta").last().unwrap().event_type,
            events::STACK_FAILED
        );
    }

    #[tokio::test]
    async fn test_deploy_prepared_aggregates_template_failure() {
        let workspace = workspace_with_templates(&["alpha", "gamma"]);
        let config = DeployConfig::new(["alpha", "beta", "gamma"]).with_workspace(workspace.path());
        let fake = Arc::new(FakeControlPlane::new());

        let err = deploy_prepared(fake.clone(), config.stack_requests(&config.template_loader()), 2)
            .await
            .unwrap_err();

        let DeployError::Aggregate(aggregate) = err else {
            panic!("expected aggregate failure");
        };
        assert_eq!(aggregate.failed_stacks(), vec!["beta"]);
        assert_eq!(aggregate.succeeded_stacks(), vec!["alpha", "gamma"]);
        assert_eq!(aggregate.first().unwrap().error_type, "Template");
        assert!(fake.stack("alpha").is_some());
        assert!(fake.stack("gamma").is_some());
    }
}
