//! Minimal subgraph materialization for cycle checks.
//!
//! A proposed edge `dependent -> prerequisite` closes a cycle only if the
//! prerequisite already reaches the dependent. So the only remote state
//! needed is:
//!
//! - the dependent's direct prerequisites (duplicate detection)
//! - the prerequisite's blocked-by chain, walked breadth first
//!
//! The walk stops at `max_depth` levels or as soon as the dependent shows up.

use crate::domain::{DependencyEdge, IssueRef};
use crate::error::RepoError;
use crate::graph::DependencyGraph;
use crate::repository::DependencyRepository;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashSet;

/// Build the subgraph needed to validate `proposed`.
///
/// # Errors
///
/// The first repository error hit while reading; in-flight reads are dropped.
pub(crate) async fn subgraph(
    repo: &dyn DependencyRepository,
    proposed: &DependencyEdge,
    max_depth: usize,
    concurrency: usize,
) -> Result<DependencyGraph, RepoError> {
    let (dependent, prerequisite) = proposed.canonical();

    let (direct, chain) = tokio::try_join!(
        repo.blocked_by(dependent),
        walk_prerequisites(repo, prerequisite, dependent, max_depth, concurrency)
    )?;

    let mut graph = DependencyGraph::new();
    graph.insert_node(dependent);
    graph.insert_node(prerequisite);
    for related in direct {
        graph.insert_edge(related.edge);
    }
    for edge in chain {
        graph.insert_edge(edge);
    }

    tracing::debug!(
        edge = %proposed,
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "Materialized subgraph"
    );
    Ok(graph)
}

/// Breadth-first walk of `start`'s blocked-by chain.
async fn walk_prerequisites(
    repo: &dyn DependencyRepository,
    start: &IssueRef,
    goal: &IssueRef,
    max_depth: usize,
    concurrency: usize,
) -> Result<Vec<DependencyEdge>, RepoError> {
    let mut edges = Vec::new();
    let mut visited: HashSet<IssueRef> = HashSet::from([start.clone()]);
    let mut frontier = vec![start.clone()];
    let mut depth = 0;

    while !frontier.is_empty() && depth < max_depth {
        let level: Vec<_> = stream::iter(frontier.iter())
            .map(|issue| repo.blocked_by(issue))
            .buffered(concurrency.max(1))
            .try_collect()
            .await?;
        depth += 1;

        let mut next = Vec::new();
        for related in level.into_iter().flatten() {
            let reached = related.edge.target.clone();
            edges.push(related.edge);

            if &reached == goal {
                tracing::debug!(
                    start = %start,
                    goal = %goal,
                    depth,
                    "Reached dependent, stopping walk"
                );
                return Ok(edges);
            }
            if visited.insert(reached.clone()) {
                next.push(reached);
            }
        }
        frontier = next;
    }

    if !frontier.is_empty() {
        tracing::warn!(
            start = %start,
            max_depth,
            unexplored = frontier.len(),
            "Dependency chain deeper than max-graph-depth, cycle check is partial"
        );
    }
    Ok(edges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::VerdictReason;
    use crate::repository::GitHubRepository;
    use crate::testing::FakeTracker;
    use std::sync::Arc;

    fn issue(number: u64) -> IssueRef {
        IssueRef::new("acme", "widgets", number)
    }

    /// Chain 1 -> 2 -> ... -> n
    fn chain(n: u64) -> (Arc<FakeTracker>, GitHubRepository) {
        let tracker = Arc::new(FakeTracker::new());
        for number in 1..=n {
            tracker.add_issue(&issue(number), "chain link");
        }
        for number in 1..n {
            tracker.link(&issue(number), &issue(number + 1));
        }
        let repo = GitHubRepository::new(FakeTracker::transport(&tracker));
        (tracker, repo)
    }

    #[tokio::test]
    async fn test_subgraph_contains_closing_path() {
        let (_tracker, repo) = chain(4);
        // 4 blocked-by 1 would close 1 -> 2 -> 3 -> 4
        let proposed = DependencyEdge::blocked_by(issue(4), issue(1));
        let graph = subgraph(&repo, &proposed, 64, 4).await.unwrap();
        assert_eq!(graph.edge_count(), 3);
        let verdict = crate::graph::validate(&graph, &proposed);
        assert_eq!(
            verdict.reason,
            VerdictReason::WouldCreateCycle {
                path: vec![issue(1), issue(2), issue(3), issue(4)]
            }
        );
    }

    #[tokio::test]
    async fn test_walk_respects_depth_limit() {
        let (_tracker, repo) = chain(10);
        let edges = walk_prerequisites(&repo, &issue(1), &issue(99), 3, 4)
            .await
            .unwrap();
        let targets: Vec<u64> = edges.iter().map(|e| e.target.number).collect();
        assert_eq!(targets, vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_walk_stops_at_goal() {
        let (tracker, repo) = chain(10);
        let edges = walk_prerequisites(&repo, &issue(1), &issue(3), 64, 4)
            .await
            .unwrap();
        assert_eq!(edges.len(), 2);
        let fetches = tracker
            .calls()
            .iter()
            .filter(|c| c.ends_with("/dependencies/blocked_by"))
            .count();
        assert_eq!(fetches, 2);
    }

    #[tokio::test]
    async fn test_walk_terminates_on_shared_prerequisites() {
        let tracker = Arc::new(FakeTracker::new());
        for number in 1..=4 {
            tracker.add_issue(&issue(number), "diamond");
        }
        tracker.link(&issue(1), &issue(2));
        tracker.link(&issue(1), &issue(3));
        tracker.link(&issue(2), &issue(4));
        tracker.link(&issue(3), &issue(4));
        let repo = GitHubRepository::new(FakeTracker::transport(&tracker));

        let edges = walk_prerequisites(&repo, &issue(1), &issue(99), 64, 4)
            .await
            .unwrap();
        assert_eq!(edges.len(), 4);
    }
}
