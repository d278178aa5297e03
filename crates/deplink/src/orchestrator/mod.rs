//! Operation orchestration: list, add and remove.
//!
//! The [`Orchestrator`] drives one run of one operation through the
//! resolver, repository and graph validator, and turns the results into an
//! [`OperationReport`] for the presenter.
//!
//! # Batch semantics
//!
//! - Targets are independent: a malformed, missing or rejected target fails
//!   alone and there is no rollback.
//! - Outcomes come back in input order.
//! - Reads needed to plan a batch run concurrently, bounded by
//!   `max_concurrency`; mutations run one at a time in input order.
//! - Edges accepted earlier in a batch are visible when validating later
//!   targets, in dry runs too, so a batch cannot contradict itself.
//! - An `Unauthenticated` failure stops all further remote calls. If nothing
//!   was mutated yet the whole operation fails; otherwise the remaining
//!   targets are reported failed.

mod explore;

use crate::domain::{
    DependencyEdge, DependencyView, IssueRef, IssueSummary, OperationKind, OperationOutcome,
    OperationReport, OperationRequest, OutcomeStatus, Rejection, RelatedIssue, RepoIdentity,
};
use crate::error::{OperationError, RepoError, ResolutionError};
use crate::graph::{DependencyGraph, validate, validate_removal};
use crate::repository::DependencyRepository;
use crate::resolver::resolve;
use futures::stream::{self, StreamExt};

/// A target after the planning phase.
enum Plan {
    /// Ready for validation against its subgraph
    Ready {
        input: String,
        edge: DependencyEdge,
        graph: DependencyGraph,
    },
    /// Finished during planning
    Done(OperationOutcome),
}

fn unauthenticated(outcome: &OperationOutcome) -> Option<&OperationError> {
    match &outcome.status {
        OutcomeStatus::Failed(error) if error.is_unauthenticated() => Some(error),
        _ => None,
    }
}

/// Runs operations against a [`DependencyRepository`].
pub struct Orchestrator {
    repo: Box<dyn DependencyRepository>,
    ambient: Option<RepoIdentity>,
    max_concurrency: usize,
    max_depth: usize,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("repo", &"<dyn DependencyRepository>")
            .field("ambient", &self.ambient)
            .field("max_concurrency", &self.max_concurrency)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}

impl Orchestrator {
    /// Create an orchestrator.
    ///
    /// `ambient` is the repository bare issue numbers resolve against.
    pub fn new(
        repo: Box<dyn DependencyRepository>,
        ambient: Option<RepoIdentity>,
        max_concurrency: usize,
        max_depth: usize,
    ) -> Self {
        Self {
            repo,
            ambient,
            max_concurrency: max_concurrency.max(1),
            max_depth,
        }
    }

    fn resolve(&self, raw: &str) -> Result<IssueRef, ResolutionError> {
        resolve(raw, self.ambient.as_ref())
    }

    /// Run the requested operation.
    ///
    /// # Errors
    ///
    /// Failures that affect the operation as a whole: an unresolvable source,
    /// a failed `list`, or `Unauthenticated` before anything was mutated.
    /// Per-target failures are reported inside the batch instead.
    pub async fn execute(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationReport, OperationError> {
        tracing::debug!(
            operation = ?request.operation,
            source = %request.source,
            targets = request.targets.len(),
            dry_run = request.dry_run,
            "Executing operation"
        );
        match request.operation {
            OperationKind::List => self.list(&request.source).await.map(OperationReport::View),
            OperationKind::Add => self.add(request).await.map(OperationReport::Batch),
            OperationKind::Remove => self.remove(request).await.map(OperationReport::Batch),
        }
    }

    // ========== List ==========

    /// Both relationship directions of one issue, ordered by canonical key.
    ///
    /// # Errors
    ///
    /// Resolution failure, or the first failing remote read.
    pub async fn list(&self, raw: &str) -> Result<DependencyView, OperationError> {
        let reference = self.resolve(raw)?;
        let (target, edges) = tokio::try_join!(
            self.repo.issue_exists(&reference),
            self.repo.fetch_edges(&reference)
        )?;

        let summaries = |related: Vec<RelatedIssue>| -> Vec<IssueSummary> {
            let mut summaries: Vec<IssueSummary> = related.into_iter().map(|r| r.summary).collect();
            summaries.sort_by(|a, b| a.reference.cmp(&b.reference));
            summaries
        };

        Ok(DependencyView {
            target,
            blocked_by: summaries(edges.blocked_by),
            blocks: summaries(edges.blocks),
        })
    }

    // ========== Shared ==========

    /// Source existence and write permission, checked once per batch.
    async fn preflight(&self, source: &IssueRef) -> Result<(), OperationError> {
        self.repo.issue_exists(source).await?;
        let repo = source.repository();
        if !self.repo.has_write_permission(&repo).await? {
            return Err(RepoError::Forbidden {
                repo: repo.full_name(),
                detail: "write access is required to change issue dependencies".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Every target failed with `error`, except those that did not resolve.
    fn fail_all(
        targets: Vec<(String, Result<IssueRef, ResolutionError>)>,
        error: &OperationError,
    ) -> Vec<OperationOutcome> {
        targets
            .into_iter()
            .map(|(input, resolved)| match resolved {
                Ok(target) => OperationOutcome::failed(&input, Some(target), error.clone()),
                Err(e) => OperationOutcome::failed(&input, None, e.into()),
            })
            .collect()
    }

    fn resolve_targets(&self, raw: &[String]) -> Vec<(String, Result<IssueRef, ResolutionError>)> {
        raw.iter()
            .map(|input| (input.clone(), self.resolve(input)))
            .collect()
    }

    // ========== Add ==========

    async fn add(
        &self,
        request: &OperationRequest,
    ) -> Result<Vec<OperationOutcome>, OperationError> {
        let source = self.resolve(&request.source)?;
        let targets = self.resolve_targets(&request.targets);

        if let Err(error) = self.preflight(&source).await {
            if error.is_unauthenticated() {
                return Err(error);
            }
            tracing::warn!(source = %source, error = %error, "Source check failed");
            return Ok(Self::fail_all(targets, &error));
        }

        let mut plans = stream::iter(targets)
            .map(|(input, resolved)| self.plan_addition(&source, request, input, resolved))
            .buffered(self.max_concurrency);

        let mut planned = Vec::with_capacity(request.targets.len());
        while let Some(plan) = plans.next().await {
            if let Plan::Done(outcome) = &plan {
                if let Some(error) = unauthenticated(outcome) {
                    return Err(error.clone());
                }
            }
            planned.push(plan);
        }
        drop(plans);

        self.apply_additions(planned, request.dry_run).await
    }

    /// Concurrent part of an addition: existence and subgraph reads.
    async fn plan_addition(
        &self,
        source: &IssueRef,
        request: &OperationRequest,
        input: String,
        resolved: Result<IssueRef, ResolutionError>,
    ) -> Plan {
        let target = match resolved {
            Ok(target) => target,
            Err(e) => return Plan::Done(OperationOutcome::failed(&input, None, e.into())),
        };
        let edge = DependencyEdge::new(source.clone(), target.clone(), request.relationship);

        // Rejected without any lookup
        if &target == source {
            return Plan::Ready {
                input,
                edge,
                graph: DependencyGraph::new(),
            };
        }

        if let Err(e) = self.repo.issue_exists(&target).await {
            return Plan::Done(OperationOutcome::failed(&input, Some(target), e.into()));
        }

        let explored =
            explore::subgraph(self.repo.as_ref(), &edge, self.max_depth, self.max_concurrency)
                .await;
        match explored {
            Ok(graph) => Plan::Ready { input, edge, graph },
            Err(e) => Plan::Done(OperationOutcome::failed(&input, Some(target), e.into())),
        }
    }

    /// Serialized part of an addition: validate and create in input order.
    async fn apply_additions(
        &self,
        planned: Vec<Plan>,
        dry_run: bool,
    ) -> Result<Vec<OperationOutcome>, OperationError> {
        let mut outcomes = Vec::with_capacity(planned.len());
        let mut accepted: Vec<DependencyEdge> = Vec::new();
        let mut halted: Option<OperationError> = None;

        for plan in planned {
            let (input, edge, mut graph) = match plan {
                Plan::Done(outcome) => {
                    outcomes.push(outcome);
                    continue;
                }
                Plan::Ready { input, edge, graph } => (input, edge, graph),
            };

            if let Some(error) = &halted {
                outcomes.push(OperationOutcome::failed(&input, Some(edge.target), error.clone()));
                continue;
            }

            for earlier in &accepted {
                graph.insert_edge(earlier.clone());
            }

            let verdict = validate(&graph, &edge);
            if let Some(rejection) = Rejection::from_verdict(&verdict.reason) {
                tracing::debug!(edge = %edge, reason = %rejection, "Rejected dependency");
                outcomes.push(OperationOutcome::rejected(&input, edge.target, rejection));
                continue;
            }

            if dry_run {
                let detail = format!("would add: {edge}");
                outcomes.push(OperationOutcome::new(
                    input,
                    Some(edge.target.clone()),
                    OutcomeStatus::WouldChange,
                    detail,
                ));
                accepted.push(edge);
                continue;
            }

            match self.repo.create_edge(&edge).await {
                Ok(created) => {
                    let detail = format!("added: {created}");
                    outcomes.push(OperationOutcome::new(
                        input,
                        Some(created.target.clone()),
                        OutcomeStatus::Created,
                        detail,
                    ));
                    accepted.push(created);
                }
                Err(e) => {
                    let error = OperationError::from(e);
                    if error.is_unauthenticated() {
                        if accepted.is_empty() {
                            return Err(error);
                        }
                        halted = Some(error.clone());
                    }
                    outcomes.push(OperationOutcome::failed(&input, Some(edge.target), error));
                }
            }
        }

        Ok(outcomes)
    }

    // ========== Remove ==========

    async fn remove(
        &self,
        request: &OperationRequest,
    ) -> Result<Vec<OperationOutcome>, OperationError> {
        let source = self.resolve(&request.source)?;
        let explicit = self.resolve_targets(&request.targets);

        let edges = match self.preflight(&source).await {
            Ok(()) => self.repo.fetch_edges(&source).await.map_err(OperationError::from),
            Err(error) => Err(error),
        };
        let edges = match edges {
            Ok(edges) => edges,
            Err(error) if error.is_unauthenticated() => return Err(error),
            Err(error) => {
                tracing::warn!(source = %source, error = %error, "Source check failed");
                return Ok(Self::fail_all(explicit, &error));
            }
        };

        // With `all`, every stored edge is its own target and keeps its kind.
        let targets: Vec<(String, Result<DependencyEdge, ResolutionError>)> = if request.all {
            edges
                .edges()
                .filter(|edge| !request.only_kind || edge.kind == request.relationship)
                .map(|edge| (edge.target.key(), Ok(edge.clone())))
                .collect()
        } else {
            explicit
                .into_iter()
                .map(|(input, resolved)| {
                    let edge = resolved.map(|target| {
                        DependencyEdge::new(source.clone(), target, request.relationship)
                    });
                    (input, edge)
                })
                .collect()
        };

        let mut graph = DependencyGraph::from_edges(edges.edges().cloned());
        let mut outcomes = Vec::with_capacity(targets.len());
        let mut removed = 0usize;
        let mut halted: Option<OperationError> = None;

        for (input, resolved) in targets {
            let proposed = match resolved {
                Ok(proposed) => proposed,
                Err(e) => {
                    outcomes.push(OperationOutcome::failed(&input, None, e.into()));
                    continue;
                }
            };
            let target = proposed.target.clone();

            if let Some(error) = &halted {
                outcomes.push(OperationOutcome::failed(&input, Some(target), error.clone()));
                continue;
            }

            let Ok(stored) = validate_removal(&graph, &proposed) else {
                outcomes.push(OperationOutcome::rejected(
                    &input,
                    target,
                    Rejection::RelationshipNotFound,
                ));
                continue;
            };

            if request.dry_run {
                graph.remove_edge(&stored);
                let detail = format!("would remove: {proposed}");
                outcomes.push(OperationOutcome::new(
                    input,
                    Some(target),
                    OutcomeStatus::WouldChange,
                    detail,
                ));
                continue;
            }

            if !request.confirmed {
                let detail = format!("confirm removal of: {proposed}");
                outcomes.push(OperationOutcome::new(
                    input,
                    Some(target),
                    OutcomeStatus::RequiresConfirmation,
                    detail,
                ));
                continue;
            }

            match self.repo.delete_edge(&stored).await {
                Ok(()) => {
                    graph.remove_edge(&stored);
                    removed += 1;
                    let detail = format!("removed: {proposed}");
                    outcomes.push(OperationOutcome::new(
                        input,
                        Some(target),
                        OutcomeStatus::Removed,
                        detail,
                    ));
                }
                Err(RepoError::RelationshipNotFound(_)) => {
                    graph.remove_edge(&stored);
                    outcomes.push(OperationOutcome::rejected(
                        &input,
                        target,
                        Rejection::RelationshipNotFound,
                    ));
                }
                Err(e) => {
                    let error = OperationError::from(e);
                    if error.is_unauthenticated() {
                        if removed == 0 {
                            return Err(error);
                        }
                        halted = Some(error.clone());
                    }
                    outcomes.push(OperationOutcome::failed(&input, Some(target), error));
                }
            }
        }

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationshipKind;
    use crate::error::ErrorKind;
    use crate::repository::GitHubRepository;
    use crate::testing::FakeTracker;
    use std::sync::Arc;

    fn issue(number: u64) -> IssueRef {
        IssueRef::new("acme", "widgets", number)
    }

    fn setup(numbers: &[u64]) -> (Arc<FakeTracker>, Orchestrator) {
        let tracker = Arc::new(FakeTracker::new());
        tracker.add_issues(&RepoIdentity::new("acme", "widgets"), numbers.iter().copied());
        let repo = GitHubRepository::new(FakeTracker::transport(&tracker));
        let orchestrator = Orchestrator::new(
            Box::new(repo),
            Some(RepoIdentity::new("acme", "widgets")),
            4,
            64,
        );
        (tracker, orchestrator)
    }

    fn batch(report: OperationReport) -> Vec<OperationOutcome> {
        match report {
            OperationReport::Batch(outcomes) => outcomes,
            OperationReport::View(_) => panic!("expected a batch"),
        }
    }

    #[tokio::test]
    async fn test_duplicate_target_in_one_batch() {
        let (tracker, orchestrator) = setup(&[1, 2]);
        let request = OperationRequest::add("1", RelationshipKind::BlockedBy, ["2", "#2"]);
        let outcomes = batch(orchestrator.execute(&request).await.unwrap());

        assert_eq!(outcomes[0].status, OutcomeStatus::Created);
        assert_eq!(
            outcomes[1].status,
            OutcomeStatus::Rejected(Rejection::DuplicateEdge)
        );
        assert_eq!(tracker.mutation_count(), 1);
    }

    #[tokio::test]
    async fn test_self_reference_makes_no_lookup() {
        let (tracker, orchestrator) = setup(&[1]);
        let request = OperationRequest::add("1", RelationshipKind::Blocks, ["acme/widgets#1"]);
        let outcomes = batch(orchestrator.execute(&request).await.unwrap());

        assert_eq!(
            outcomes[0].status,
            OutcomeStatus::Rejected(Rejection::SelfReference)
        );
        // Only the source preflight touched the remote
        assert_eq!(tracker.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_source_fails_operation() {
        let (_tracker, orchestrator) = setup(&[1]);
        let request = OperationRequest::add("nope", RelationshipKind::BlockedBy, ["1"]);
        let err = orchestrator.execute(&request).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[tokio::test]
    async fn test_missing_write_permission_fails_each_target() {
        let (tracker, orchestrator) = setup(&[1, 2, 3]);
        tracker.deny_write(&RepoIdentity::new("acme", "widgets"));

        let request = OperationRequest::add("1", RelationshipKind::BlockedBy, ["2", "x", "3"]);
        let outcomes = batch(orchestrator.execute(&request).await.unwrap());

        let kinds: Vec<ErrorKind> = outcomes
            .iter()
            .map(|o| match &o.status {
                OutcomeStatus::Failed(e) => e.kind(),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::Forbidden, ErrorKind::MalformedInput, ErrorKind::Forbidden]
        );
        assert!(outcomes[0].detail.contains("acme/widgets"));
        assert_eq!(tracker.mutation_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_target_fails_alone() {
        let (_tracker, orchestrator) = setup(&[1, 2]);
        let request = OperationRequest::add("1", RelationshipKind::BlockedBy, ["404", "2"]);
        let outcomes = batch(orchestrator.execute(&request).await.unwrap());

        assert!(matches!(
            &outcomes[0].status,
            OutcomeStatus::Failed(e) if e.kind() == ErrorKind::NotFound
        ));
        assert_eq!(outcomes[1].status, OutcomeStatus::Created);
    }

    #[tokio::test]
    async fn test_remove_requires_confirmation() {
        let (tracker, orchestrator) = setup(&[1, 2]);
        tracker.link(&issue(1), &issue(2));

        let request = OperationRequest::remove("1", RelationshipKind::BlockedBy, ["2"]);
        let report = orchestrator.execute(&request).await.unwrap();
        assert!(report.needs_confirmation());
        assert!(tracker.has_edge(&issue(1), &issue(2)));

        let confirmed = orchestrator.execute(&request.confirmed()).await.unwrap();
        assert_eq!(batch(confirmed)[0].status, OutcomeStatus::Removed);
        assert!(!tracker.has_edge(&issue(1), &issue(2)));
    }

    #[tokio::test]
    async fn test_remove_in_blocks_form() {
        let (tracker, orchestrator) = setup(&[1, 2]);
        tracker.link(&issue(1), &issue(2));

        // "2 blocks 1" is the same relationship
        let request = OperationRequest::remove("2", RelationshipKind::Blocks, ["1"]).confirmed();
        let outcomes = batch(orchestrator.execute(&request).await.unwrap());
        assert_eq!(outcomes[0].status, OutcomeStatus::Removed);
        assert_eq!(tracker.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_list_unknown_issue_is_not_found() {
        let (_tracker, orchestrator) = setup(&[1]);
        let err = orchestrator.list("77").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
