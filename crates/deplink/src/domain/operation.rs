//! Requests accepted from the command surface and results handed to the
//! presenter.

use super::{IssueRef, IssueSummary, RelationshipKind};
use crate::error::OperationError;
use crate::graph::VerdictReason;
use serde::Serialize;
use std::fmt;

/// Which of the three user-facing operations to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Show both relationship directions of one issue
    List,
    /// Create relationships
    Add,
    /// Delete relationships
    Remove,
}

/// A validated request from the command surface.
///
/// References are still raw strings: resolving them is the first step of
/// every operation so that a malformed target only fails that target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    /// Operation to run
    pub operation: OperationKind,

    /// The issue the relationships are expressed from
    pub source: String,

    /// Related issues, in the order the user gave them
    pub targets: Vec<String>,

    /// How `source` relates to each target
    pub relationship: RelationshipKind,

    /// Validate only, never mutate
    pub dry_run: bool,

    /// The user has confirmed destructive changes
    pub confirmed: bool,

    /// For removal: treat every current relationship of the issue as a target
    pub all: bool,

    /// With `all`: keep only relationships of `relationship`
    pub only_kind: bool,
}

impl OperationRequest {
    /// A `list` request.
    pub fn list(source: impl Into<String>) -> Self {
        Self {
            operation: OperationKind::List,
            source: source.into(),
            targets: Vec::new(),
            relationship: RelationshipKind::BlockedBy,
            dry_run: false,
            confirmed: false,
            all: false,
            only_kind: false,
        }
    }

    /// An `add` request.
    pub fn add(
        source: impl Into<String>,
        relationship: RelationshipKind,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            operation: OperationKind::Add,
            source: source.into(),
            targets: targets.into_iter().map(Into::into).collect(),
            relationship,
            dry_run: false,
            confirmed: false,
            all: false,
            only_kind: false,
        }
    }

    /// A `remove` request.
    pub fn remove(
        source: impl Into<String>,
        relationship: RelationshipKind,
        targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            operation: OperationKind::Remove,
            ..Self::add(source, relationship, targets)
        }
    }

    /// Mark as a dry run.
    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Mark as confirmed.
    #[must_use]
    pub fn confirmed(mut self) -> Self {
        self.confirmed = true;
        self
    }

    /// Remove every current relationship of the source, in both directions.
    #[must_use]
    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }

    /// Remove every current relationship of the requested kind only.
    #[must_use]
    pub fn all_of_kind(mut self) -> Self {
        self.all = true;
        self.only_kind = true;
        self
    }
}

/// Result of `list`: both directions of one issue, enriched with summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyView {
    /// The listed issue
    pub target: IssueSummary,

    /// Issues the target is blocked by, ordered by canonical key
    pub blocked_by: Vec<IssueSummary>,

    /// Issues the target blocks, ordered by canonical key
    pub blocks: Vec<IssueSummary>,
}

/// Why a target was rejected without touching the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Source and target are the same issue
    SelfReference,
    /// The relationship already exists
    DuplicateEdge,
    /// The relationship would close a cycle; `path` runs target → … → source
    WouldCreateCycle {
        /// Existing dependency chain from the target back to the source
        path: Vec<IssueRef>,
    },
    /// Removal of a relationship that does not exist
    RelationshipNotFound,
}

impl Rejection {
    /// Rejection for a refused verdict; `None` when the verdict accepted.
    pub fn from_verdict(reason: &VerdictReason) -> Option<Self> {
        match reason {
            VerdictReason::Ok => None,
            VerdictReason::SelfReference => Some(Rejection::SelfReference),
            VerdictReason::DuplicateEdge => Some(Rejection::DuplicateEdge),
            VerdictReason::WouldCreateCycle { path } => {
                Some(Rejection::WouldCreateCycle { path: path.clone() })
            }
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::SelfReference => write!(f, "an issue cannot depend on itself"),
            Rejection::DuplicateEdge => write!(f, "relationship already exists"),
            Rejection::WouldCreateCycle { path } => {
                write!(f, "would create a dependency cycle: ")?;
                for reference in path {
                    write!(f, "{reference} → ")?;
                }
                match path.first() {
                    Some(first) => write!(f, "{first}"),
                    None => Ok(()),
                }
            }
            Rejection::RelationshipNotFound => write!(f, "relationship does not exist"),
        }
    }
}

/// Per-target status of an add or remove batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The relationship was created
    Created,
    /// The relationship was removed
    Removed,
    /// Dry run: the change would be made
    WouldChange,
    /// The change is valid but needs the user's confirmation first
    RequiresConfirmation,
    /// Validation refused the change
    Rejected(Rejection),
    /// A lookup or remote call failed
    Failed(OperationError),
}

impl OutcomeStatus {
    /// Short machine-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeStatus::Created => "created",
            OutcomeStatus::Removed => "removed",
            OutcomeStatus::WouldChange => "would_change",
            OutcomeStatus::RequiresConfirmation => "requires_confirmation",
            OutcomeStatus::Rejected(_) => "rejected",
            OutcomeStatus::Failed(_) => "failed",
        }
    }

    /// Whether the target ended in rejection or failure.
    pub fn is_unsuccessful(&self) -> bool {
        matches!(self, OutcomeStatus::Rejected(_) | OutcomeStatus::Failed(_))
    }
}

/// Outcome for one target of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    /// The target as the user typed it
    pub input: String,

    /// The resolved target, when resolution succeeded
    pub target: Option<IssueRef>,

    /// What happened
    pub status: OutcomeStatus,

    /// Human-readable explanation
    pub detail: String,
}

impl OperationOutcome {
    pub(crate) fn new(
        input: impl Into<String>,
        target: Option<IssueRef>,
        status: OutcomeStatus,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            target,
            status,
            detail: detail.into(),
        }
    }

    pub(crate) fn rejected(input: &str, target: IssueRef, rejection: Rejection) -> Self {
        let detail = rejection.to_string();
        Self::new(input, Some(target), OutcomeStatus::Rejected(rejection), detail)
    }

    pub(crate) fn failed(input: &str, target: Option<IssueRef>, error: OperationError) -> Self {
        let detail = error.to_string();
        Self::new(input, target, OutcomeStatus::Failed(error), detail)
    }
}

/// Everything an operation hands to the presenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationReport {
    /// Result of `list`
    View(DependencyView),
    /// Ordered per-target outcomes of `add` or `remove`
    Batch(Vec<OperationOutcome>),
}

impl OperationReport {
    /// Whether any target was rejected or failed.
    pub fn has_failures(&self) -> bool {
        match self {
            OperationReport::View(_) => false,
            OperationReport::Batch(outcomes) => outcomes.iter().any(|o| o.status.is_unsuccessful()),
        }
    }

    /// Whether any target waits on confirmation.
    pub fn needs_confirmation(&self) -> bool {
        match self {
            OperationReport::View(_) => false,
            OperationReport::Batch(outcomes) => outcomes
                .iter()
                .any(|o| o.status == OutcomeStatus::RequiresConfirmation),
        }
    }
}
