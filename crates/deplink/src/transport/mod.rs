//! Remote transport with timeout, retry and rate-limit handling.
//!
//! The transport knows nothing about dependencies. It sends an
//! [`ApiRequest`] through an [`HttpBackend`] and classifies the response:
//!
//! | Response                  | Result                                   |
//! |---------------------------|------------------------------------------|
//! | 2xx                       | `Ok(ApiResponse)`                        |
//! | 401                       | `Unauthenticated`, never retried         |
//! | 403                       | `Forbidden`, never retried               |
//! | 404                       | `NotFound`, never retried                |
//! | 429                       | retried, then `RateLimited`              |
//! | 5xx, connection failures  | retried, then `ServiceUnavailable`       |
//! | anything else             | `Unexpected(status, excerpt)`            |
//!
//! Every call has a total deadline covering all of its attempts and the
//! waits between them. Backoff state lives in a [`RateLimiter`] shared by all
//! calls of a run.
//!
//! # Architecture
//!
//! The backend is a trait object so the same retry logic runs against the
//! real service ([`ReqwestBackend`]) and against in-memory fakes in tests.

mod http;
mod rate_limit;

pub use http::ReqwestBackend;
pub use rate_limit::{BackoffPolicy, RateLimiter};

use crate::error::TransportError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Longest response body excerpt carried in errors.
const EXCERPT_LEN: usize = 200;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// A request relative to the API base URL.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// HTTP method
    pub method: Method,

    /// Path beginning with `/`
    pub path: String,

    /// Query parameters
    pub query: Vec<(String, String)>,

    /// JSON body
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    /// A GET request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    /// A POST request with a JSON body.
    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            body: Some(body),
            ..Self::new(Method::Post, path)
        }
    }

    /// A DELETE request.
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    #[must_use]
    pub fn with_query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A raw response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status
    pub status: u16,

    /// Headers with lower-cased names
    pub headers: HashMap<String, String>,

    /// Body text
    pub body: String,
}

impl ApiResponse {
    /// A response with a JSON body.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.to_string(),
        }
    }

    /// A response with no body.
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl ToString) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    fn rate_limit_remaining(&self) -> Option<u64> {
        self.header("x-ratelimit-remaining")?.trim().parse().ok()
    }

    /// Time until the quota resets, from `x-ratelimit-reset` (epoch seconds).
    fn rate_limit_reset_in(&self) -> Option<Duration> {
        let reset: i64 = self.header("x-ratelimit-reset")?.trim().parse().ok()?;
        let seconds = reset.saturating_sub(Utc::now().timestamp()).max(0);
        Some(Duration::from_secs(seconds.unsigned_abs()))
    }

    /// `Retry-After` as seconds or an HTTP date.
    fn retry_after(&self) -> Option<Duration> {
        let value = self.header("retry-after")?.trim();
        if let Ok(seconds) = value.parse::<u64>() {
            return Some(Duration::from_secs(seconds));
        }
        let at = DateTime::parse_from_rfc2822(value).ok()?;
        let seconds = (at.with_timezone(&Utc) - Utc::now()).num_seconds().max(0);
        Some(Duration::from_secs(seconds.unsigned_abs()))
    }

    /// Message from a JSON error body, falling back to a body excerpt.
    pub fn message(&self) -> String {
        serde_json::from_str::<serde_json::Value>(&self.body)
            .ok()
            .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
            .unwrap_or_else(|| self.excerpt())
    }

    /// Body truncated for error messages.
    pub fn excerpt(&self) -> String {
        let mut excerpt: String = self.body.chars().take(EXCERPT_LEN).collect();
        if self.body.chars().count() > EXCERPT_LEN {
            excerpt.push('…');
        }
        excerpt
    }
}

/// Failure below HTTP: no response was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend's own timeout fired
    #[error("request timed out")]
    Timeout,

    /// Connecting or exchanging data failed
    #[error("connection failed: {0}")]
    Connection(String),
}

/// A raw HTTP exchange.
///
/// Implementations carry authentication; the transport never sees
/// credentials.
#[async_trait]
pub trait HttpBackend: Send + Sync {
    /// Perform one request without retrying.
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, BackendError>;
}

/// Retry and timeout settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportSettings {
    /// Total deadline per call, covering all attempts
    pub timeout: Duration,

    /// Attempts before giving up on transient failures
    pub max_attempts: u32,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

/// What went wrong with a single attempt.
enum AttemptError {
    /// Give up immediately
    Fatal(TransportError),
    /// 429: retry, honoring the hint
    RateLimited(Option<Duration>),
    /// 5xx or no response: retry, honoring the hint
    Unavailable(String, Option<Duration>),
}

/// Authenticated API client with retries.
#[derive(Clone)]
pub struct Transport {
    backend: Arc<dyn HttpBackend>,
    limiter: Arc<RateLimiter>,
    settings: TransportSettings,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transport")
            .field("backend", &"<dyn HttpBackend>")
            .field("limiter", &self.limiter)
            .field("settings", &self.settings)
            .finish()
    }
}

impl Transport {
    /// Create a transport over `backend`, sharing `limiter` with every other
    /// transport of the same run.
    pub fn new(
        backend: Arc<dyn HttpBackend>,
        limiter: Arc<RateLimiter>,
        settings: TransportSettings,
    ) -> Self {
        Self {
            backend,
            limiter,
            settings,
        }
    }

    /// The run's shared limiter.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Send a request, retrying transient failures.
    ///
    /// # Errors
    ///
    /// See the module documentation for the status → error mapping.
    /// `TransportError::Timeout` if the deadline passes first.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        let deadline = Instant::now() + self.settings.timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                attempt,
                "Sending request"
            );

            let result = tokio::time::timeout_at(deadline, self.attempt(request)).await;
            let (exhausted, hint) = match result {
                Err(_) => {
                    tracing::warn!(path = %request.path, attempt, "Request deadline exceeded");
                    return Err(self.timeout_error());
                }
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(AttemptError::Fatal(e))) => return Err(e),
                Ok(Err(AttemptError::RateLimited(hint))) => {
                    (TransportError::RateLimited { attempts: attempt }, hint)
                }
                Ok(Err(AttemptError::Unavailable(detail, hint))) => (
                    TransportError::ServiceUnavailable {
                        attempts: attempt,
                        detail,
                    },
                    hint,
                ),
            };

            if attempt >= self.settings.max_attempts {
                tracing::warn!(
                    path = %request.path,
                    attempts = attempt,
                    error = %exhausted,
                    "Retries exhausted"
                );
                return Err(exhausted);
            }

            let delay = self.limiter.record_failure(hint).await;
            if Instant::now() + delay > deadline {
                tracing::warn!(
                    path = %request.path,
                    delay_ms = delay.as_millis() as u64,
                    "Backoff would pass the request deadline"
                );
                return Err(exhausted);
            }
            tracing::debug!(
                path = %request.path,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %exhausted,
                "Retrying after backoff"
            );
        }
    }

    /// Send a request and decode the JSON body.
    ///
    /// # Errors
    ///
    /// As [`Transport::send`], plus `TransportError::Decode` for bodies that
    /// do not match `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, TransportError> {
        let response = self.send(request).await?;
        serde_json::from_str(&response.body).map_err(|e| TransportError::Decode(e.to_string()))
    }

    async fn attempt(&self, request: &ApiRequest) -> Result<ApiResponse, AttemptError> {
        self.limiter.wait_turn().await;

        let response = match self.backend.execute(request).await {
            Ok(response) => response,
            Err(e) => return Err(AttemptError::Unavailable(e.to_string(), None)),
        };

        match response.status {
            200..=299 => {
                self.limiter
                    .record_success(
                        response.rate_limit_remaining(),
                        response.rate_limit_reset_in(),
                    )
                    .await;
                Ok(response)
            }
            401 => Err(AttemptError::Fatal(TransportError::Unauthenticated)),
            403 => Err(AttemptError::Fatal(TransportError::Forbidden {
                message: response.message(),
            })),
            404 => Err(AttemptError::Fatal(TransportError::NotFound)),
            429 => Err(AttemptError::RateLimited(
                response
                    .retry_after()
                    .or_else(|| response.rate_limit_reset_in()),
            )),
            500..=599 => Err(AttemptError::Unavailable(
                format!("status {}", response.status),
                response.retry_after(),
            )),
            status => Err(AttemptError::Fatal(TransportError::Unexpected {
                status,
                excerpt: response.excerpt(),
            })),
        }
    }

    fn timeout_error(&self) -> TransportError {
        TransportError::Timeout {
            seconds: self.settings.timeout.as_secs(),
        }
    }
}
