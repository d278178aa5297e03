//! Per-run application context.
//!
//! The `App` wires one run together: a fresh [`RateLimiter`] shared by every
//! request, the [`Transport`] on top of it, the GitHub repository and the
//! [`Orchestrator`]. Nothing is reused across runs.
//!
//! # Example
//!
//! ```no_run
//! use deplink::app::App;
//! use deplink::auth::TokenCredentials;
//! use deplink::config::DeplinkConfig;
//! use deplink::domain::OperationRequest;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DeplinkConfig::default();
//!     let app = App::new(&config, &TokenCredentials::new("ghp_..."), None)?;
//!     let report = app.execute(&OperationRequest::list("octo/tools#7")).await?;
//!     println!("{report:?}");
//!     Ok(())
//! }
//! ```

use crate::auth::CredentialProvider;
use crate::config::DeplinkConfig;
use crate::domain::{OperationReport, OperationRequest, RepoIdentity};
use crate::error::{OperationError, Result};
use crate::orchestrator::Orchestrator;
use crate::repository::GitHubRepository;
use crate::transport::{RateLimiter, Transport};
use std::sync::Arc;

/// One run's wiring.
#[derive(Debug)]
pub struct App {
    orchestrator: Orchestrator,
    limiter: Arc<RateLimiter>,
}

impl App {
    /// Build the run from configuration and credentials.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential provider cannot produce a backend.
    pub fn new(
        config: &DeplinkConfig,
        credentials: &dyn CredentialProvider,
        ambient: Option<RepoIdentity>,
    ) -> Result<Self> {
        let backend = credentials.backend(config)?;
        let limiter = Arc::new(RateLimiter::new(config.backoff_policy()));
        let transport = Transport::new(backend, limiter.clone(), config.transport_settings());
        let repo = GitHubRepository::new(transport);
        let orchestrator = Orchestrator::new(
            Box::new(repo),
            ambient,
            config.max_concurrency,
            config.max_graph_depth,
        );

        tracing::debug!(api_url = %config.api_url, "Initialized run");
        Ok(Self {
            orchestrator,
            limiter,
        })
    }

    /// Run one operation.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::execute`].
    pub async fn execute(
        &self,
        request: &OperationRequest,
    ) -> std::result::Result<OperationReport, OperationError> {
        self.orchestrator.execute(request).await
    }

    /// The run's rate limiter.
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{IssueRef, RelationshipKind};
    use crate::testing::{FakeCredentials, FakeTracker};

    #[tokio::test]
    async fn test_app_runs_against_backend() {
        let tracker = Arc::new(FakeTracker::new());
        tracker.add_issues(&RepoIdentity::new("acme", "widgets"), [1, 2]);
        tracker.link(&IssueRef::new("acme", "widgets", 1), &IssueRef::new("acme", "widgets", 2));

        let app = App::new(
            &DeplinkConfig::default(),
            &FakeCredentials(tracker.clone()),
            Some(RepoIdentity::new("acme", "widgets")),
        )
        .unwrap();

        let report = app.execute(&OperationRequest::list("1")).await.unwrap();
        match report {
            OperationReport::View(view) => {
                assert_eq!(view.blocked_by.len(), 1);
                assert_eq!(view.blocked_by[0].reference.number, 2);
            }
            OperationReport::Batch(_) => panic!("expected a view"),
        }
        assert_eq!(app.limiter().consecutive_failures().await, 0);

        let add = OperationRequest::add("2", RelationshipKind::BlockedBy, ["1"]);
        let report = app.execute(&add).await.unwrap();
        assert!(report.has_failures());
        assert_eq!(tracker.mutation_count(), 0);
    }
}
