//! GitHub REST implementation of [`DependencyRepository`].

use super::DependencyRepository;
use crate::domain::{
    DependencyEdge, IssueRef, IssueState, IssueSummary, RelatedIssue, RelationshipKind,
    RepoIdentity,
};
use crate::error::{RepoError, TransportError};
use crate::transport::{ApiRequest, Transport};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Page size for dependency listings.
pub const PER_PAGE: usize = 100;

/// Issue object as returned by the API.
#[derive(Debug, Deserialize)]
struct WireIssue {
    id: u64,
    number: u64,
    title: String,
    state: String,
    #[serde(default)]
    repository_url: Option<String>,
}

impl WireIssue {
    /// Convert, taking the repository from `repository_url` when present.
    fn into_summary(self, fallback: &RepoIdentity) -> IssueSummary {
        let repo = self
            .repository_url
            .as_deref()
            .and_then(RepoIdentity::from_api_url)
            .unwrap_or_else(|| fallback.clone());
        let state = if self.state.eq_ignore_ascii_case("closed") {
            IssueState::Closed
        } else {
            IssueState::Open
        };
        IssueSummary {
            reference: repo.issue(self.number),
            remote_id: self.id,
            title: self.title,
            state,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct WirePermissions {
    #[serde(default)]
    admin: bool,
    #[serde(default)]
    maintain: bool,
    #[serde(default)]
    push: bool,
}

#[derive(Debug, Deserialize)]
struct WireRepository {
    #[serde(default)]
    permissions: Option<WirePermissions>,
}

fn issue_path(issue: &IssueRef) -> String {
    format!("/repos/{}/{}/issues/{}", issue.owner, issue.repo, issue.number)
}

fn dependencies_path(issue: &IssueRef, kind: RelationshipKind) -> String {
    format!("{}/dependencies/{}", issue_path(issue), kind.as_str())
}

/// Map a transport error in the context of `repo`, with a call-specific
/// meaning for 404.
fn map_error(
    error: TransportError,
    repo: &RepoIdentity,
    not_found: impl FnOnce() -> RepoError,
) -> RepoError {
    match error {
        TransportError::NotFound => not_found(),
        TransportError::Forbidden { message } => RepoError::Forbidden {
            repo: repo.full_name(),
            detail: message,
        },
        other => other.into(),
    }
}

/// [`DependencyRepository`] over the GitHub issue-dependencies API.
#[derive(Debug, Clone)]
pub struct GitHubRepository {
    transport: Transport,
}

impl GitHubRepository {
    /// Create a repository on top of `transport`.
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    async fn list_related(
        &self,
        issue: &IssueRef,
        kind: RelationshipKind,
    ) -> Result<Vec<RelatedIssue>, RepoError> {
        let path = dependencies_path(issue, kind);
        let repo = issue.repository();
        let mut related = Vec::new();
        let mut page = 1;

        loop {
            let request = ApiRequest::get(path.as_str())
                .with_query("per_page", PER_PAGE)
                .with_query("page", page);
            let items: Vec<WireIssue> = self
                .transport
                .send_json(&request)
                .await
                .map_err(|e| map_error(e, &repo, || RepoError::IssueNotFound(issue.clone())))?;

            let count = items.len();
            for item in items {
                let summary = item.into_summary(&repo);
                let edge = DependencyEdge::new(issue.clone(), summary.reference.clone(), kind)
                    .with_remote_id(summary.remote_id.to_string());
                related.push(RelatedIssue { edge, summary });
            }

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        tracing::debug!(
            issue = %issue,
            kind = kind.as_str(),
            count = related.len(),
            pages = page,
            "Listed dependencies"
        );
        Ok(related)
    }
}

#[async_trait]
impl DependencyRepository for GitHubRepository {
    async fn blocked_by(&self, issue: &IssueRef) -> Result<Vec<RelatedIssue>, RepoError> {
        self.list_related(issue, RelationshipKind::BlockedBy).await
    }

    async fn blocking(&self, issue: &IssueRef) -> Result<Vec<RelatedIssue>, RepoError> {
        self.list_related(issue, RelationshipKind::Blocks).await
    }

    async fn issue_exists(&self, reference: &IssueRef) -> Result<IssueSummary, RepoError> {
        let repo = reference.repository();
        let issue: WireIssue = self
            .transport
            .send_json(&ApiRequest::get(issue_path(reference)))
            .await
            .map_err(|e| map_error(e, &repo, || RepoError::IssueNotFound(reference.clone())))?;
        Ok(issue.into_summary(&repo))
    }

    async fn has_write_permission(&self, repo: &RepoIdentity) -> Result<bool, RepoError> {
        let path = format!("/repos/{}/{}", repo.owner, repo.repo);
        let wire: WireRepository = self
            .transport
            .send_json(&ApiRequest::get(path))
            .await
            .map_err(|e| {
                map_error(e, repo, || RepoError::Forbidden {
                    repo: repo.full_name(),
                    detail: "repository is not visible with these credentials".to_string(),
                })
            })?;

        let permissions = wire.permissions.unwrap_or_default();
        let can_write = permissions.push || permissions.maintain || permissions.admin;
        tracing::debug!(repo = %repo, can_write, "Checked repository permission");
        Ok(can_write)
    }

    async fn create_edge(&self, edge: &DependencyEdge) -> Result<DependencyEdge, RepoError> {
        let body = json!({
            "kind": edge.kind.as_str(),
            "issue": {
                "owner": edge.target.owner,
                "repo": edge.target.repo,
                "number": edge.target.number,
            },
        });
        let request = ApiRequest::post(dependencies_path(&edge.source, edge.kind), body);

        let related: WireIssue = self
            .transport
            .send_json(&request)
            .await
            .map_err(|e| match e {
                TransportError::Unexpected { status: 422, excerpt } => RepoError::Conflict(excerpt),
                other => map_error(other, &edge.source.repository(), || {
                    RepoError::IssueNotFound(edge.target.clone())
                }),
            })?;

        tracing::info!(edge = %edge, remote_id = related.id, "Created dependency");
        Ok(edge.clone().with_remote_id(related.id.to_string()))
    }

    async fn delete_edge(&self, edge: &DependencyEdge) -> Result<(), RepoError> {
        let remote_id = match &edge.remote_id {
            Some(id) => id.clone(),
            None => self.issue_exists(&edge.target).await?.remote_id.to_string(),
        };

        let path = format!("{}/{}", dependencies_path(&edge.source, edge.kind), remote_id);
        self.transport
            .send(&ApiRequest::delete(path))
            .await
            .map_err(|e| {
                map_error(e, &edge.source.repository(), || {
                    RepoError::RelationshipNotFound(edge.clone())
                })
            })?;

        tracing::info!(edge = %edge, remote_id = %remote_id, "Removed dependency");
        Ok(())
    }
}
