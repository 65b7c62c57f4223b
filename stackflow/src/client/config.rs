//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::retry::{RetryConfig, RetryingClient};
use super::StackClient;

/// User agent sent with every control plane call.
pub const DEFAULT_USER_AGENT: &str = "aws-cloudformation-github-deploy-for-github-actions";

/// Configuration for a remote stack client.
///
/// Region and credentials are resolved once, when the client is built from
/// this value. The deployment core never reads them from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Region to deploy to. Falls back to the provider chain when unset.
    #[serde(default)]
    pub region: Option<String>,
    /// Named credentials profile.
    #[serde(default)]
    pub profile: Option<String>,
    /// Custom user agent.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Longest a single "wait until stable" call may block, in seconds.
    #[serde(default = "default_max_wait_seconds")]
    pub max_wait_seconds: u64,
    /// Retry policy for throttled calls.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_max_wait_seconds() -> u64 {
    3600
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            region: None,
            profile: None,
            user_agent: default_user_agent(),
            max_wait_seconds: default_max_wait_seconds(),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the credentials profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Sets the maximum wait duration.
    #[must_use]
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait_seconds = max_wait.as_secs();
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the maximum wait as a duration.
    #[must_use]
    pub fn max_wait(&self) -> Duration {
        Duration::from_secs(self.max_wait_seconds)
    }

    /// Wraps `client` with this configuration's retry policy.
    #[must_use]
    pub fn retrying<C: StackClient>(&self, client: C) -> RetryingClient<C> {
        RetryingClient::new(client, self.retry.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ClientError;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::new();
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
        assert_eq!(config.max_wait(), Duration::from_secs(3600));
        assert!(config.region.is_none());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig =
            serde_json::from_str(r#"{"region": "eu-west-1"}"#).unwrap();
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert_eq!(config.max_wait_seconds, 3600);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[tokio::test]
    async fn test_retrying_uses_configured_policy() {
        use crate::client::MockStackClient;

        let mut mock = MockStackClient::new();
        mock.expect_delete_change_set()
            .times(2)
            .returning(|_, _| Err(ClientError::new("Rate exceeded").retryable()));

        let config = ClientConfig::new().with_retry(
            RetryConfig::new()
                .with_max_attempts(2)
                .with_base_delay_ms(1)
                .without_jitter(),
        );
        let client = config.retrying(mock);
        assert!(client.delete_change_set("app", "app-CS").await.is_err());
    }
}
