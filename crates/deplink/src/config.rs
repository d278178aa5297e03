//! Configuration for deplink runs.
//!
//! Settings come from an optional YAML file, then environment overrides, then
//! validation. A missing file is not an error: every field has a default.
//!
//! ```yaml
//! api-url: https://api.github.com
//! request-timeout-secs: 30
//! max-attempts: 5
//! initial-backoff-ms: 500
//! max-backoff-secs: 60
//! max-concurrency: 8
//! max-graph-depth: 64
//! ```

use crate::error::{Error, Result};
use crate::transport::{BackoffPolicy, TransportSettings};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Name of the configuration file looked up by the binary
pub const CONFIG_FILE_NAME: &str = "deplink.yaml";

/// Runtime settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct DeplinkConfig {
    /// REST API base URL
    pub api_url: String,

    /// Total deadline per remote call, retries included
    pub request_timeout_secs: u64,

    /// Attempts per remote call before giving up on transient failures
    pub max_attempts: u32,

    /// First backoff delay
    pub initial_backoff_ms: u64,

    /// Cap on computed backoff delays
    pub max_backoff_secs: u64,

    /// Concurrent reads while planning a batch
    pub max_concurrency: usize,

    /// Levels of prerequisites explored when checking for cycles
    pub max_graph_depth: usize,
}

impl Default for DeplinkConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: 30,
            max_attempts: 5,
            initial_backoff_ms: 500,
            max_backoff_secs: 60,
            max_concurrency: 8,
            max_graph_depth: 64,
        }
    }
}

impl DeplinkConfig {
    /// Load configuration from a YAML file, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the file exists but cannot be read, and
    /// `Error::Config` if it is not valid YAML for this structure.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Recognized variables: `DEPLINK_API_URL`, `GH_HOST` (enterprise host,
    /// mapped to `https://{host}/api/v3`; ignored when `DEPLINK_API_URL` is
    /// set), `DEPLINK_MAX_ATTEMPTS` and `DEPLINK_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` for numeric variables that do not parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("DEPLINK_API_URL").filter(|v| !v.is_empty()) {
            self.api_url = url;
        } else if let Some(host) = lookup("GH_HOST").filter(|v| !v.is_empty()) {
            if !host.eq_ignore_ascii_case("github.com") {
                self.api_url = format!("https://{host}/api/v3");
            }
        }

        if let Some(value) = lookup("DEPLINK_MAX_ATTEMPTS") {
            self.max_attempts = parse_env("DEPLINK_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("DEPLINK_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_env("DEPLINK_TIMEOUT_SECS", &value)?;
        }
        Ok(())
    }

    /// Reject settings no run could work with.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::Config("max-attempts must be at least 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(Error::Config(
                "max-concurrency must be at least 1".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request-timeout-secs must be at least 1".to_string(),
            ));
        }
        if !self.api_url.starts_with("https://") && !self.api_url.starts_with("http://") {
            return Err(Error::Config(format!(
                "api-url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }
        Ok(())
    }

    /// Load, apply the process environment and validate.
    ///
    /// # Errors
    ///
    /// Any error from [`load`](Self::load), [`apply_env`](Self::apply_env) or
    /// [`validate`](Self::validate).
    pub async fn resolve(path: &Path) -> Result<Self> {
        let mut config = Self::load(path).await?;
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Per-call deadline.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transport retry settings.
    pub fn transport_settings(&self) -> TransportSettings {
        TransportSettings {
            timeout: self.request_timeout(),
            max_attempts: self.max_attempts,
        }
    }

    /// Backoff policy for the run's rate limiter.
    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(self.initial_backoff_ms),
            max: Duration::from_secs(self.max_backoff_secs),
            jitter: true,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{name} must be a number, got '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = DeplinkConfig::load(&temp.path().join(CONFIG_FILE_NAME))
            .await
            .unwrap();
        assert_eq!(config, DeplinkConfig::default());
    }

    #[tokio::test]
    async fn test_partial_file_keeps_other_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "max-attempts: 2\nmax-graph-depth: 10\n")
            .await
            .unwrap();

        let config = DeplinkConfig::load(&path).await.unwrap();
        assert_eq!(config.max_attempts, 2);
        assert_eq!(config.max_graph_depth, 10);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_invalid_yaml_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "max-attempts: [oops\n").await.unwrap();

        let err = DeplinkConfig::load(&path).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "max-retries: 3\n").await.unwrap();

        assert!(DeplinkConfig::load(&path).await.is_err());
    }

    #[rstest]
    #[case::explicit_url(&[("DEPLINK_API_URL", "http://localhost:8080")], "http://localhost:8080")]
    #[case::enterprise_host(&[("GH_HOST", "git.example.com")], "https://git.example.com/api/v3")]
    #[case::public_host(&[("GH_HOST", "github.com")], DEFAULT_API_URL)]
    #[case::url_wins_over_host(
        &[("DEPLINK_API_URL", "http://localhost:8080"), ("GH_HOST", "git.example.com")],
        "http://localhost:8080"
    )]
    #[case::nothing_set(&[], DEFAULT_API_URL)]
    fn test_api_url_overrides(#[case] vars: &[(&str, &str)], #[case] expected: &str) {
        let mut config = DeplinkConfig::default();
        config.apply_env(env(vars)).unwrap();
        assert_eq!(config.api_url, expected);
    }

    #[test]
    fn test_numeric_overrides() {
        let mut config = DeplinkConfig::default();
        config
            .apply_env(env(&[
                ("DEPLINK_MAX_ATTEMPTS", "3"),
                ("DEPLINK_TIMEOUT_SECS", " 12 "),
            ]))
            .unwrap();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(12));

        let err = config
            .apply_env(env(&[("DEPLINK_MAX_ATTEMPTS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("DEPLINK_MAX_ATTEMPTS"));
    }

    #[rstest]
    #[case::zero_attempts(DeplinkConfig { max_attempts: 0, ..DeplinkConfig::default() })]
    #[case::zero_concurrency(DeplinkConfig { max_concurrency: 0, ..DeplinkConfig::default() })]
    #[case::zero_timeout(DeplinkConfig { request_timeout_secs: 0, ..DeplinkConfig::default() })]
    #[case::bad_url(DeplinkConfig { api_url: "api.github.com".into(), ..DeplinkConfig::default() })]
    fn test_validate_rejects(#[case] config: DeplinkConfig) {
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_default_is_valid() {
        assert!(DeplinkConfig::default().validate().is_ok());
        let policy = DeplinkConfig::default().backoff_policy();
        assert_eq!(policy.initial, Duration::from_millis(500));
        assert_eq!(policy.max, Duration::from_secs(60));
    }
}
