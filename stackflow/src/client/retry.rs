//! Retry decorator for stack clients.
//!
//! Retries calls that fail with a retryable [`ClientError`] (throttling)
//! using capped backoff with jitter. Waits are never retried: a wait that
//! fails is a real outcome the deployment core has to classify.

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use super::StackClient;
use crate::core::{
    ChangeSetDescription, ChangeSetRequest, CreateStackParams, StackDescriptor,
};
use crate::errors::ClientError;

/// Retry policy for throttled control plane calls.
///
/// Delays double from `base_delay_ms` up to `max_delay_ms`. With `jitter`
/// set, each delay is drawn uniformly from zero to that bound so that
/// stacks throttled together do not retry in lockstep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per call, including the first. Zero behaves like one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Delay bound after the first failed attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Randomize delays below the bound.
    #[serde(default = "default_jitter")]
    pub jitter: bool,
}

const fn default_max_attempts() -> usize {
    5
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    20_000
}

const fn default_jitter() -> bool {
    true
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter: default_jitter(),
        }
    }
}

impl RetryConfig {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the attempts per call.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the first delay bound.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sleeps for the full bound every time.
    #[must_use]
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Upper bound of the delay after failed attempt `attempt` (0-indexed).
    #[must_use]
    pub fn backoff_ceiling(&self, attempt: usize) -> Duration {
        let factor = u32::try_from(attempt)
            .ok()
            .and_then(|a| 1u64.checked_shl(a))
            .unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor).min(self.max_delay_ms))
    }

    /// Delay to sleep after failed attempt `attempt`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let ceiling = self.backoff_ceiling(attempt);
        if !self.jitter || ceiling.is_zero() {
            return ceiling;
        }
        let ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::thread_rng().gen_range(0..=ms))
    }
}

/// A [`StackClient`] that retries throttled calls of an inner client.
#[derive(Debug, Clone)]
pub struct RetryingClient<C> {
    inner: C,
    config: RetryConfig,
}

impl<C: StackClient> RetryingClient<C> {
    /// Wraps `inner` with the given retry policy.
    #[must_use]
    pub fn new(inner: C, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// Returns the wrapped client.
    #[must_use]
    pub fn inner(&self) -> &C {
        &self.inner
    }

    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, ClientError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, ClientError>> + Send,
        T: Send,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(err) if err.retryable && attempt + 1 < self.config.max_attempts.max(1) => {
                    let delay = self.config.delay_for_attempt(attempt);
                    attempt += 1;
                    debug!(
                        operation,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying after error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl<C: StackClient> StackClient for RetryingClient<C> {
    async fn describe_stack(&self, stack_name_or_id: &str) -> Result<StackDescriptor, ClientError> {
        self.with_retry("describe_stack", || self.inner.describe_stack(stack_name_or_id))
            .await
    }

    async fn create_stack(&self, params: &CreateStackParams) -> Result<String, ClientError> {
        self.with_retry("create_stack", || self.inner.create_stack(params))
            .await
    }

    async fn wait_stack_create_complete(
        &self,
        stack_name: &str,
    ) -> Result<StackDescriptor, ClientError> {
        self.inner.wait_stack_create_complete(stack_name).await
    }

    async fn create_change_set(&self, params: &ChangeSetRequest) -> Result<String, ClientError> {
        self.with_retry("create_change_set", || self.inner.create_change_set(params))
            .await
    }

    async fn wait_change_set_create_complete(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        self.inner
            .wait_change_set_create_complete(stack_name, change_set_name)
            .await
    }

    async fn describe_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<ChangeSetDescription, ClientError> {
        self.with_retry("describe_change_set", || {
            self.inner.describe_change_set(stack_name, change_set_name)
        })
        .await
    }

    async fn delete_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
    ) -> Result<(), ClientError> {
        self.with_retry("delete_change_set", || {
            self.inner.delete_change_set(stack_name, change_set_name)
        })
        .await
    }

    async fn execute_change_set(
        &self,
        stack_name: &str,
        change_set_name: &str,
        disable_rollback: bool,
    ) -> Result<(), ClientError> {
        self.with_retry("execute_change_set", || {
            self.inner
                .execute_change_set(stack_name, change_set_name, disable_rollback)
        })
        .await
    }

    async fn wait_stack_update_complete(
        &self,
        stack_id: &str,
    ) -> Result<StackDescriptor, ClientError> {
        self.inner.wait_stack_update_complete(stack_id).await
    }
}
