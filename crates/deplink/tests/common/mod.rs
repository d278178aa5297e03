//! Common test utilities shared across integration tests.

#![allow(dead_code)]

use deplink::domain::{IssueRef, OperationOutcome, OperationReport, OutcomeStatus, RepoIdentity};
use deplink::orchestrator::Orchestrator;
use deplink::repository::GitHubRepository;
use deplink::testing::FakeTracker;
use std::sync::Arc;

/// The repository bare numbers resolve against
pub fn widgets() -> RepoIdentity {
    RepoIdentity::new("acme", "widgets")
}

/// Issue `number` in `acme/widgets`
pub fn issue(number: u64) -> IssueRef {
    widgets().issue(number)
}

/// A tracker seeded with `numbers` in `acme/widgets` and an orchestrator over it
pub fn setup(numbers: &[u64]) -> (Arc<FakeTracker>, Orchestrator) {
    let tracker = Arc::new(FakeTracker::new());
    tracker.add_issues(&widgets(), numbers.iter().copied());
    let orchestrator = orchestrator(&tracker);
    (tracker, orchestrator)
}

/// An orchestrator over an existing tracker
pub fn orchestrator(tracker: &Arc<FakeTracker>) -> Orchestrator {
    let repo = GitHubRepository::new(FakeTracker::transport(tracker));
    Orchestrator::new(Box::new(repo), Some(widgets()), 4, 64)
}

/// The "100 blocked-by 45, 45 blocked-by 67" fixture
pub fn chain_fixture() -> (Arc<FakeTracker>, Orchestrator) {
    let (tracker, orchestrator) = setup(&[45, 67, 100, 200]);
    tracker.link(&issue(100), &issue(45));
    tracker.link(&issue(45), &issue(67));
    (tracker, orchestrator)
}

/// Unwrap a batch report
pub fn batch(report: OperationReport) -> Vec<OperationOutcome> {
    match report {
        OperationReport::Batch(outcomes) => outcomes,
        OperationReport::View(view) => panic!("expected a batch, got view of {}", view.target.reference),
    }
}

/// Status labels in order
pub fn labels(outcomes: &[OperationOutcome]) -> Vec<&'static str> {
    outcomes.iter().map(|o| o.status.label()).collect()
}

/// Whether the outcome failed
pub fn is_failed(outcome: &OperationOutcome) -> bool {
    matches!(outcome.status, OutcomeStatus::Failed(_))
}
