//! Dependency repository abstraction.
//!
//! The [`DependencyRepository`] trait is the seam between the orchestrator
//! and the remote tracker. Every method is one logical remote operation;
//! retries, backoff and deadlines live below it in the transport.
//!
//! # Implementations
//!
//! - [`GitHubRepository`]: the GitHub issue-dependencies REST API
//!
//! Tests drive the GitHub implementation against
//! [`crate::testing::FakeTracker`], an in-memory stand-in for the API.

mod github;

pub use github::{GitHubRepository, PER_PAGE};

use crate::domain::{DependencyEdge, EdgeSet, IssueRef, IssueSummary, RelatedIssue, RepoIdentity};
use crate::error::RepoError;
use async_trait::async_trait;

/// Remote operations on issue dependencies.
#[async_trait]
pub trait DependencyRepository: Send + Sync {
    /// Issues `issue` is blocked by, every page.
    async fn blocked_by(&self, issue: &IssueRef) -> Result<Vec<RelatedIssue>, RepoError>;

    /// Issues `issue` blocks, every page.
    async fn blocking(&self, issue: &IssueRef) -> Result<Vec<RelatedIssue>, RepoError>;

    /// Both directions, fetched concurrently.
    ///
    /// A failure on either side fails the whole fetch; the other request is
    /// dropped.
    async fn fetch_edges(&self, issue: &IssueRef) -> Result<EdgeSet, RepoError> {
        let (blocked_by, blocks) = tokio::try_join!(self.blocked_by(issue), self.blocking(issue))?;
        Ok(EdgeSet { blocked_by, blocks })
    }

    /// Look up an issue, failing with `IssueNotFound` if it is absent.
    async fn issue_exists(&self, reference: &IssueRef) -> Result<IssueSummary, RepoError>;

    /// Whether the caller may modify issues in `repo`.
    async fn has_write_permission(&self, repo: &RepoIdentity) -> Result<bool, RepoError>;

    /// Create the relationship, returning it with its remote id.
    async fn create_edge(&self, edge: &DependencyEdge) -> Result<DependencyEdge, RepoError>;

    /// Delete the relationship.
    ///
    /// Deleting a relationship that does not exist is `RelationshipNotFound`,
    /// never success.
    async fn delete_edge(&self, edge: &DependencyEdge) -> Result<(), RepoError>;
}
