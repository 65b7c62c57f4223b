//! Per-stack deployment entry point.

use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use super::changeset::ChangeSetOrchestrator;
use super::classify::NoOpClassifier;
use super::locator::get_stack;
use super::outputs::get_stack_outputs;
use crate::client::StackClient;
use crate::core::{CreateStackParams, Deployment, OutputMap, StackRequest};
use crate::errors::DeployError;
use crate::events::{self, EventSink, NoOpEventSink};

/// Deploys single stacks: creates missing ones, updates existing ones
/// through a change set.
///
/// Cheap to share; holds only the client handle, the no-op classifier and
/// the event sink.
#[derive(Clone)]
pub struct Deployer {
    client: Arc<dyn StackClient>,
    classifier: NoOpClassifier,
    events: Arc<dyn EventSink>,
}

impl fmt::Debug for Deployer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployer")
            .field("classifier", &self.classifier)
            .finish_non_exhaustive()
    }
}

impl Deployer {
    /// Creates a deployer over `client`.
    #[must_use]
    pub fn new(client: Arc<dyn StackClient>) -> Self {
        Self {
            client,
            classifier: NoOpClassifier::default(),
            events: Arc::new(NoOpEventSink),
        }
    }

    /// Replaces the no-op classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: NoOpClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the client.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn StackClient> {
        &self.client
    }

    /// Returns the event sink.
    #[must_use]
    pub fn events(&self) -> &Arc<dyn EventSink> {
        &self.events
    }

    /// Deploys one stack and waits for it to stabilize.
    ///
    /// A stack that does not exist is created; an existing one is updated
    /// through a change set, never directly. Errors are attributed to the
    /// stack name.
    pub async fn deploy_stack(&self, request: &StackRequest) -> Result<Deployment, DeployError> {
        self.decide(request)
            .await
            .map_err(|e| e.for_stack(request.name()))
    }

    /// Reads the outputs of a deployed stack.
    pub async fn get_stack_outputs(&self, stack_id: &str) -> Result<OutputMap, DeployError> {
        get_stack_outputs(self.client.as_ref(), stack_id).await
    }

    async fn decide(&self, request: &StackRequest) -> Result<Deployment, DeployError> {
        let name = request.name();
        debug!(stack = %name, digest = %request.template_digest(), "Looking up stack");

        match get_stack(self.client.as_ref(), name).await? {
            None => self.create_stack(request).await,
            Some(stack) => {
                debug!(stack = %name, stack_id = %stack.stack_id, status = %stack.status, "Stack exists");
                ChangeSetOrchestrator::new(self.client.as_ref(), &self.classifier, self.events.as_ref())
                    .update_stack(&stack, request)
                    .await
            }
        }
    }

    async fn create_stack(&self, request: &StackRequest) -> Result<Deployment, DeployError> {
        let name = request.name();
        let params = CreateStackParams::from(request);

        debug!(stack = %name, "Creating CloudFormation Stack");
        let stack_id = self
            .client
            .create_stack(&params)
            .await
            .map_err(|e| DeployError::remote("create_stack", name, e))?;

        self.client
            .wait_stack_create_complete(name)
            .await
            .map_err(|e| DeployError::remote("wait_stack_create_complete", name, e))?;

        self.events.try_emit(
            events::STACK_CREATED,
            Some(json!({"stack": name, "stack_id": stack_id})),
        );
        Ok(Deployment::created(stack_id))
    }
}
