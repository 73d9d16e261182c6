//! Configuration for the agent API client.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::agent::error::{AgentError, AgentResult, RETRYABLE_STATUSES};

/// Environment variable overriding the API base URL.
pub const BASE_URL_ENV: &str = "BTV_AGENT_API_BASE_URL";

/// Base URL used when nothing is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";

/// Settings for [`crate::agent::AgentClient`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentClientConfig {
    /// Scheme, host and port of the agent server.
    pub base_url: String,
    /// Path of the query endpoint.
    pub query_path: String,
    /// Per-request timeout.
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Backoff unit: retry `n` waits `n × retry_delay`.
    #[serde(with = "duration_millis")]
    pub retry_delay: Duration,
    /// Statuses that trigger a retry.
    pub retry_statuses: Vec<u16>,
}

impl Default for AgentClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query_path: "/api/query".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
            retry_delay: Duration::from_secs(2),
            retry_statuses: RETRYABLE_STATUSES.to_vec(),
        }
    }
}

impl AgentClientConfig {
    /// Defaults, with the base URL taken from `BTV_AGENT_API_BASE_URL` when set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_base_url_override(std::env::var(BASE_URL_ENV).ok())
    }

    /// Replace the base URL when `value` is a non-blank string.
    #[must_use]
    pub fn with_base_url_override(self, value: Option<String>) -> Self {
        match value {
            Some(url) if !url.trim().is_empty() => self.with_base_url(url.trim()),
            _ => self,
        }
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count and backoff unit.
    #[must_use]
    pub const fn with_retries(mut self, max_retries: u32, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }

    /// Whether `err` should be retried under this configuration.
    #[must_use]
    pub fn should_retry(&self, err: &AgentError) -> bool {
        err.status()
            .is_some_and(|status| self.retry_statuses.contains(&status))
    }

    /// Full URL of the query endpoint.
    ///
    /// # Errors
    /// Returns an error if the base URL or path does not parse.
    pub fn endpoint(&self) -> AgentResult<Url> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.join(&self.query_path)?)
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if the URL is unusable or the timeout is zero.
    pub fn validate(&self) -> AgentResult<()> {
        let endpoint = self.endpoint()?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(AgentError::Config(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        if self.timeout.is_zero() {
            return Err(AgentError::Config("timeout must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Serde module for millisecond `Duration` fields.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentClientConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.max_retries, 2);
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "http://127.0.0.1:8080/api/query"
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_base_url_override() {
        let config = AgentClientConfig::default()
            .with_base_url_override(Some(" https://agent.example:8443 ".to_string()));
        assert_eq!(
            config.endpoint().unwrap().as_str(),
            "https://agent.example:8443/api/query"
        );

        let unchanged = AgentClientConfig::default().with_base_url_override(Some("  ".to_string()));
        assert_eq!(unchanged.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_linear_backoff() {
        let config = AgentClientConfig::default();
        assert_eq!(config.retry_delay_for(1), Duration::from_secs(2));
        assert_eq!(config.retry_delay_for(2), Duration::from_secs(4));
    }

    #[test]
    fn test_validate_rejects_bad_urls() {
        let bad = AgentClientConfig::default().with_base_url("not a url");
        assert!(matches!(bad.validate(), Err(AgentError::InvalidUrl(_))));

        let ftp = AgentClientConfig::default().with_base_url("ftp://host");
        assert!(matches!(ftp.validate(), Err(AgentError::Config(_))));

        let zero = AgentClientConfig::default().with_timeout(Duration::ZERO);
        assert!(matches!(zero.validate(), Err(AgentError::Config(_))));
    }
}
