//! Configuration module for the megaverse client.
//!
//! Holds the candidate id, the API location and the knobs of the
//! resilience layer and the execution orchestrator.

use secrecy::{ExposeSecret, SecretString};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use crate::errors::{MegaverseError, MegaverseResult};
use crate::resilience::{
    ResilienceConfig, RetryConfig, DEFAULT_REQUESTS_PER_SECOND, MIN_REQUESTS_PER_SECOND,
};
use crate::types::{DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY};

/// Default base URL for the megaverse API.
pub const DEFAULT_BASE_URL: &str = "https://challenge.crossmint.io/api";

/// Default per-request timeout (30 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default deadline for a whole command (5 minutes).
pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the megaverse client.
#[derive(Clone)]
pub struct MegaverseConfig {
    /// Candidate id sent with every call (stored securely).
    pub(crate) candidate_id: SecretString,
    /// Base URL for API requests, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Retry configuration.
    pub retry: RetryConfig,
    /// Steady admission rate shared by every call.
    pub requests_per_second: f64,
    /// Worker count for bounded-parallel plans.
    pub max_workers: usize,
    /// Default batch size for batched plans.
    pub batch_size: usize,
    /// Deadline for a whole command.
    pub execution_timeout: Duration,
}

impl MegaverseConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MegaverseConfigBuilder {
        MegaverseConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CROSSMINT_CANDIDATE_ID` (required): candidate id
    /// - `CROSSMINT_API_URL` (optional): custom base URL
    /// - `CROSSMINT_TIMEOUT_SECS` (optional): request timeout in seconds
    /// - `CROSSMINT_REQUESTS_PER_SECOND` (optional): admission rate
    /// - `CROSSMINT_MAX_ATTEMPTS` (optional): attempts per call
    /// - `CROSSMINT_MAX_WORKERS` (optional): parallel worker count
    /// - `CROSSMINT_BATCH_SIZE` (optional): batch size
    pub fn from_env() -> MegaverseResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`MegaverseConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> MegaverseResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let candidate_id = lookup("CROSSMINT_CANDIDATE_ID").ok_or_else(|| {
            MegaverseError::configuration("CROSSMINT_CANDIDATE_ID environment variable not set")
        })?;

        let mut builder = MegaverseConfigBuilder::new().candidate_id(candidate_id);

        if let Some(base_url) = lookup("CROSSMINT_API_URL") {
            builder = builder.base_url(base_url);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "CROSSMINT_TIMEOUT_SECS")? {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(rps) = parse_var::<f64, _>(&lookup, "CROSSMINT_REQUESTS_PER_SECOND")? {
            builder = builder.requests_per_second(rps);
        }
        if let Some(attempts) = parse_var::<u32, _>(&lookup, "CROSSMINT_MAX_ATTEMPTS")? {
            builder = builder.max_attempts(attempts);
        }
        if let Some(workers) = parse_var::<usize, _>(&lookup, "CROSSMINT_MAX_WORKERS")? {
            builder = builder.max_workers(workers);
        }
        if let Some(size) = parse_var::<usize, _>(&lookup, "CROSSMINT_BATCH_SIZE")? {
            builder = builder.batch_size(size);
        }

        builder.build()
    }

    /// Returns the candidate id (exposing the secret).
    pub(crate) fn candidate_id(&self) -> &str {
        self.candidate_id.expose_secret()
    }

    /// Returns the last 4 characters of the candidate id for display.
    pub fn candidate_id_hint(&self) -> String {
        let id = self.candidate_id.expose_secret();
        let chars: Vec<char> = id.chars().collect();
        if chars.len() > 4 {
            format!("...{}", chars[chars.len() - 4..].iter().collect::<String>())
        } else {
            "****".to_string()
        }
    }

    /// Resilience settings derived from this configuration.
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            retry: self.retry.clone(),
            requests_per_second: self.requests_per_second,
        }
    }
}

impl std::fmt::Debug for MegaverseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MegaverseConfig")
            .field("candidate_id", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("requests_per_second", &self.requests_per_second)
            .field("max_workers", &self.max_workers)
            .field("batch_size", &self.batch_size)
            .field("execution_timeout", &self.execution_timeout)
            .finish()
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> MegaverseResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            MegaverseError::configuration(format!("{} has an invalid value: '{}'", name, raw))
        }),
    }
}

/// Builder for `MegaverseConfig`.
#[derive(Default)]
pub struct MegaverseConfigBuilder {
    candidate_id: Option<String>,
    base_url: Option<String>,
    timeout: Option<Duration>,
    retry: Option<RetryConfig>,
    max_attempts: Option<u32>,
    requests_per_second: Option<f64>,
    max_workers: Option<usize>,
    batch_size: Option<usize>,
    execution_timeout: Option<Duration>,
}

impl MegaverseConfigBuilder {
    /// Creates a new configuration builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the candidate id.
    pub fn candidate_id(mut self, candidate_id: impl Into<String>) -> Self {
        self.candidate_id = Some(candidate_id.into());
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the whole retry configuration.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Sets the number of attempts per call.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the admission rate.
    pub fn requests_per_second(mut self, rps: f64) -> Self {
        self.requests_per_second = Some(rps);
        self
    }

    /// Sets the worker count for bounded-parallel plans.
    pub fn max_workers(mut self, workers: usize) -> Self {
        self.max_workers = Some(workers);
        self
    }

    /// Sets the batch size for batched plans.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    /// Sets the deadline for a whole command.
    pub fn execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MegaverseResult<MegaverseConfig> {
        let candidate_id = self
            .candidate_id
            .map(|id| id.trim().to_string())
            .ok_or_else(|| MegaverseError::configuration("candidate id is required"))?;
        if candidate_id.is_empty() {
            return Err(MegaverseError::configuration("candidate id cannot be empty"));
        }

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let parsed = Url::parse(&base_url)?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(MegaverseError::configuration(format!(
                "base URL must use http or https, got '{}'",
                parsed.scheme()
            )));
        }

        let timeout = self.timeout.unwrap_or(DEFAULT_TIMEOUT);
        if timeout.is_zero() {
            return Err(MegaverseError::configuration("timeout must be positive"));
        }

        let mut retry = self.retry.unwrap_or_default();
        if let Some(attempts) = self.max_attempts {
            retry.max_attempts = attempts;
        }
        retry.validate()?;

        let requests_per_second = self
            .requests_per_second
            .unwrap_or(DEFAULT_REQUESTS_PER_SECOND);
        if !requests_per_second.is_finite() || requests_per_second < MIN_REQUESTS_PER_SECOND {
            return Err(MegaverseError::configuration(format!(
                "requests_per_second must be at least {}",
                MIN_REQUESTS_PER_SECOND
            )));
        }

        let max_workers = self.max_workers.unwrap_or(DEFAULT_CONCURRENCY);
        if max_workers == 0 {
            return Err(MegaverseError::configuration("max_workers must be at least 1"));
        }

        let batch_size = match self.batch_size {
            Some(0) | None => DEFAULT_BATCH_SIZE,
            Some(size) => size,
        };

        let execution_timeout = self.execution_timeout.unwrap_or(DEFAULT_EXECUTION_TIMEOUT);
        if execution_timeout.is_zero() {
            return Err(MegaverseError::configuration(
                "execution timeout must be positive",
            ));
        }

        Ok(MegaverseConfig {
            candidate_id: SecretString::new(candidate_id),
            base_url,
            timeout,
            retry,
            requests_per_second,
            max_workers,
            batch_size,
            execution_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = MegaverseConfig::builder()
            .candidate_id("candidate-1234")
            .build()
            .unwrap();

        assert_eq!(config.candidate_id(), "candidate-1234");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.requests_per_second, 2.0);
        assert_eq!(config.max_workers, 5);
        assert_eq!(config.batch_size, 5);
        assert_eq!(config.execution_timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_config_builder_overrides() {
        let config = MegaverseConfig::builder()
            .candidate_id("abc")
            .base_url("http://localhost:8080/api/")
            .timeout(Duration::from_secs(5))
            .max_attempts(2)
            .requests_per_second(0.5)
            .max_workers(3)
            .batch_size(0)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/api");
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.requests_per_second, 0.5);
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.resilience().requests_per_second, 0.5);
    }

    #[test]
    fn test_config_builder_rejects_invalid_values() {
        assert!(MegaverseConfig::builder().build().is_err());
        assert!(MegaverseConfig::builder().candidate_id("  ").build().is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .base_url("ftp://example.com")
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .base_url("not a url")
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .requests_per_second(0.0)
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .requests_per_second(1e-20)
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .max_workers(0)
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .max_attempts(0)
            .build()
            .is_err());
        assert!(MegaverseConfig::builder()
            .candidate_id("abc")
            .timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = MegaverseConfig::from_lookup(lookup_from(&[
            ("CROSSMINT_CANDIDATE_ID", "cand-42"),
            ("CROSSMINT_API_URL", "http://127.0.0.1:9999"),
            ("CROSSMINT_TIMEOUT_SECS", "7"),
            ("CROSSMINT_REQUESTS_PER_SECOND", "4.5"),
            ("CROSSMINT_MAX_ATTEMPTS", "3"),
            ("CROSSMINT_MAX_WORKERS", "8"),
            ("CROSSMINT_BATCH_SIZE", "10"),
        ]))
        .unwrap();

        assert_eq!(config.candidate_id(), "cand-42");
        assert_eq!(config.base_url, "http://127.0.0.1:9999");
        assert_eq!(config.timeout, Duration::from_secs(7));
        assert_eq!(config.requests_per_second, 4.5);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.batch_size, 10);
    }

    #[test]
    fn test_from_lookup_requires_candidate_id() {
        let err = MegaverseConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(err.to_string().contains("CROSSMINT_CANDIDATE_ID"));
    }

    #[test]
    fn test_from_lookup_rejects_garbage_numbers() {
        let err = MegaverseConfig::from_lookup(lookup_from(&[
            ("CROSSMINT_CANDIDATE_ID", "cand-42"),
            ("CROSSMINT_MAX_WORKERS", "many"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("CROSSMINT_MAX_WORKERS"));
    }

    #[test]
    fn test_config_debug_redacts_candidate_id() {
        let config = MegaverseConfig::builder()
            .candidate_id("super-secret-candidate")
            .build()
            .unwrap();

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("[REDACTED]"));
        assert!(!debug_str.contains("super-secret-candidate"));
        assert_eq!(config.candidate_id_hint(), "...date");
    }
}
