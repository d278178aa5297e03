//! Domain types for issue dependency management.
//!
//! This module contains the value types shared by every layer: repository and
//! issue references, relationship kinds, dependency edges and the summaries
//! returned by the remote service. Request and outcome types exchanged with
//! the command surface and presenter live in [`operation`].

pub mod operation;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use operation::{
    DependencyView, OperationKind, OperationOutcome, OperationReport, OperationRequest,
    OutcomeStatus, Rejection,
};

/// A repository on the remote service, identified by owner and name.
///
/// Both parts are lower-cased on construction since the remote service
/// treats them case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoIdentity {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,
}

impl RepoIdentity {
    /// Create a repository identity, normalizing case.
    pub fn new(owner: impl AsRef<str>, repo: impl AsRef<str>) -> Self {
        Self {
            owner: owner.as_ref().to_ascii_lowercase(),
            repo: repo.as_ref().to_ascii_lowercase(),
        }
    }

    /// Canonical `owner/repo` form.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// Reference to issue `number` in this repository.
    pub fn issue(&self, number: u64) -> IssueRef {
        IssueRef {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
            number,
        }
    }
}

impl fmt::Display for RepoIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Canonical reference to a single issue.
///
/// Produced by [`crate::resolver::resolve`]; the `owner/repo#number` form
/// returned by [`IssueRef::key`] is the node key of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssueRef {
    /// Repository owner
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// Issue number (always positive)
    pub number: u64,
}

impl IssueRef {
    /// Create an issue reference, normalizing owner and repo case.
    pub fn new(owner: impl AsRef<str>, repo: impl AsRef<str>, number: u64) -> Self {
        RepoIdentity::new(owner, repo).issue(number)
    }

    /// The repository this issue lives in.
    pub fn repository(&self) -> RepoIdentity {
        RepoIdentity {
            owner: self.owner.clone(),
            repo: self.repo.clone(),
        }
    }

    /// Canonical node key: `owner/repo#number`.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IssueRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Kind of dependency relationship as expressed by the user or the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// The subject cannot proceed until the related issue completes
    BlockedBy,

    /// The subject must complete before the related issue can proceed
    Blocks,
}

impl RelationshipKind {
    /// Wire name used in API paths and payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            RelationshipKind::BlockedBy => "blocked_by",
            RelationshipKind::Blocks => "blocks",
        }
    }

    /// The same relationship seen from the other endpoint.
    pub fn inverse(self) -> Self {
        match self {
            RelationshipKind::BlockedBy => RelationshipKind::Blocks,
            RelationshipKind::Blocks => RelationshipKind::BlockedBy,
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelationshipKind::BlockedBy => write!(f, "blocked by"),
            RelationshipKind::Blocks => write!(f, "blocks"),
        }
    }
}

/// A dependency relationship between two issues.
///
/// `remote_id` is only known for edges read back from the remote service; it
/// is the remote id of `target` and is what deletion is keyed on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    /// Issue the relationship is expressed from
    pub source: IssueRef,

    /// The related issue
    pub target: IssueRef,

    /// How `source` relates to `target`
    pub kind: RelationshipKind,

    /// Remote identifier, present once the edge is known to exist remotely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl DependencyEdge {
    /// Create an edge that does not (yet) exist remotely.
    pub fn new(source: IssueRef, target: IssueRef, kind: RelationshipKind) -> Self {
        Self {
            source,
            target,
            kind,
            remote_id: None,
        }
    }

    /// Shorthand for `source` blocked by `target`.
    pub fn blocked_by(source: IssueRef, target: IssueRef) -> Self {
        Self::new(source, target, RelationshipKind::BlockedBy)
    }

    /// Attach the remote identifier.
    #[must_use]
    pub fn with_remote_id(mut self, remote_id: impl Into<String>) -> Self {
        self.remote_id = Some(remote_id.into());
        self
    }

    /// Canonical direction as `(dependent, prerequisite)`.
    ///
    /// The prerequisite must complete before the dependent can proceed;
    /// `Blocks` edges are inverted so both kinds map onto one direction.
    pub fn canonical(&self) -> (&IssueRef, &IssueRef) {
        match self.kind {
            RelationshipKind::BlockedBy => (&self.source, &self.target),
            RelationshipKind::Blocks => (&self.target, &self.source),
        }
    }

    /// Whether both edges describe the same canonical relationship.
    pub fn same_relationship(&self, other: &DependencyEdge) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.source, self.kind, self.target)
    }
}

/// Open/closed state of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    /// Issue is open
    Open,

    /// Issue has been closed
    Closed,
}

/// Display data for an issue, as returned by existence lookups and listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSummary {
    /// Canonical reference
    pub reference: IssueRef,

    /// Remote numeric identifier
    pub remote_id: u64,

    /// Issue title
    pub title: String,

    /// Current state
    pub state: IssueState,
}

/// One listed relationship together with the other endpoint's summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedIssue {
    /// The relationship, expressed from the listed issue
    pub edge: DependencyEdge,

    /// Summary of `edge.target`
    pub summary: IssueSummary,
}

/// Both relationship directions of a single issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeSet {
    /// Issues the subject is blocked by
    pub blocked_by: Vec<RelatedIssue>,

    /// Issues the subject blocks
    pub blocks: Vec<RelatedIssue>,
}

impl EdgeSet {
    /// Relationships of the given kind.
    pub fn of_kind(&self, kind: RelationshipKind) -> &[RelatedIssue] {
        match kind {
            RelationshipKind::BlockedBy => &self.blocked_by,
            RelationshipKind::Blocks => &self.blocks,
        }
    }

    /// All edges in both directions.
    pub fn edges(&self) -> impl Iterator<Item = &DependencyEdge> {
        self.blocked_by
            .iter()
            .chain(self.blocks.iter())
            .map(|related| &related.edge)
    }

    /// Whether the issue has no relationships at all.
    pub fn is_empty(&self) -> bool {
        self.blocked_by.is_empty() && self.blocks.is_empty()
    }
}
