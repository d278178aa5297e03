//! Validation of proposed graph mutations.
//!
//! Pure functions over a [`DependencyGraph`]; no I/O happens here.
//!
//! # Edge Direction Reminder
//!
//! - Edges point from **dependent -> prerequisite**
//! - A proposed `S blocked-by T` becomes `S -> T`
//! - It closes a cycle exactly when `T` already reaches `S`

use super::DependencyGraph;
use crate::domain::{DependencyEdge, IssueRef};
use crate::error::RepoError;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};

/// Why a proposed edge was accepted or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictReason {
    /// The edge may be added
    Ok,
    /// Source and target are the same issue
    SelfReference,
    /// The canonical relationship already exists
    DuplicateEdge,
    /// Adding the edge would close a cycle.
    ///
    /// `path` runs from the proposed target along existing edges back to the
    /// proposed source.
    WouldCreateCycle {
        /// Existing chain target → … → source
        path: Vec<IssueRef>,
    },
}

/// Result of [`validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationVerdict {
    /// Whether the edge may be added
    pub accepted: bool,
    /// The deciding reason
    pub reason: VerdictReason,
}

impl ValidationVerdict {
    fn accept() -> Self {
        Self {
            accepted: true,
            reason: VerdictReason::Ok,
        }
    }

    fn reject(reason: VerdictReason) -> Self {
        Self {
            accepted: false,
            reason,
        }
    }
}

/// Decide whether `proposed` may be added to `graph`.
///
/// Checks run in order: self reference, duplicate, cycle. The cycle search is
/// a depth-first walk from the canonical prerequisite with a visited set, so
/// it terminates on graphs with shared sub-dependencies and is bounded only by
/// the size of the materialized graph. The first path found is reported.
pub fn validate(graph: &DependencyGraph, proposed: &DependencyEdge) -> ValidationVerdict {
    let (dependent, prerequisite) = proposed.canonical();

    if dependent == prerequisite {
        return ValidationVerdict::reject(VerdictReason::SelfReference);
    }

    if graph.contains_edge(proposed) {
        return ValidationVerdict::reject(VerdictReason::DuplicateEdge);
    }

    match find_path(graph, prerequisite, dependent) {
        Some(path) => ValidationVerdict::reject(VerdictReason::WouldCreateCycle { path }),
        None => ValidationVerdict::accept(),
    }
}

/// Check that `edge` exists so it can be removed.
///
/// Returns the stored edge, which carries the remote id when it was read from
/// the remote service. Removing an edge can never introduce a cycle, so no
/// graph search is needed.
///
/// # Errors
///
/// `RepoError::RelationshipNotFound` if the relationship is absent.
pub fn validate_removal(
    graph: &DependencyGraph,
    edge: &DependencyEdge,
) -> Result<DependencyEdge, RepoError> {
    graph
        .find_edge(edge)
        .cloned()
        .ok_or_else(|| RepoError::RelationshipNotFound(edge.clone()))
}

/// Depth-first search for a path `from -> ... -> to` along existing edges.
fn find_path(graph: &DependencyGraph, from: &IssueRef, to: &IssueRef) -> Option<Vec<IssueRef>> {
    let start = graph.index_of(from)?;
    let goal = graph.index_of(to)?;
    let inner = graph.inner();

    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
    let mut stack = vec![start];

    while let Some(node) = stack.pop() {
        if !visited.insert(node) {
            continue;
        }

        if node == goal {
            let mut path = vec![inner[node].clone()];
            let mut current = node;
            while let Some(&previous) = parent.get(&current) {
                path.push(inner[previous].clone());
                current = previous;
            }
            path.reverse();
            return Some(path);
        }

        // Push in descending key order so the smallest key is explored first
        let mut next: Vec<NodeIndex> = inner
            .edges(node)
            .map(|edge| edge.target())
            .filter(|target| !visited.contains(target))
            .collect();
        next.sort_by(|a, b| inner[*b].cmp(&inner[*a]));

        for target in next {
            parent.insert(target, node);
            stack.push(target);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RelationshipKind;

    fn issue(number: u64) -> IssueRef {
        IssueRef::new("acme", "widgets", number)
    }

    fn blocked_by(source: u64, target: u64) -> DependencyEdge {
        DependencyEdge::blocked_by(issue(source), issue(target))
    }

    /// `100 blocked-by 45`, `45 blocked-by 67`
    fn chain() -> DependencyGraph {
        DependencyGraph::from_edges([blocked_by(100, 45), blocked_by(45, 67)])
    }

    #[test]
    fn test_closing_edge_reports_cycle_path() {
        let verdict = validate(&chain(), &blocked_by(67, 100));
        assert!(!verdict.accepted);
        assert_eq!(
            verdict.reason,
            VerdictReason::WouldCreateCycle {
                path: vec![issue(100), issue(45), issue(67)]
            }
        );
    }

    #[test]
    fn test_blocks_form_detects_same_cycle() {
        // "100 blocks 67" is "67 blocked-by 100"
        let proposed = DependencyEdge::new(issue(100), issue(67), RelationshipKind::Blocks);
        let verdict = validate(&chain(), &proposed);
        assert!(matches!(verdict.reason, VerdictReason::WouldCreateCycle { .. }));
    }

    #[test]
    fn test_new_node_is_accepted() {
        let verdict = validate(&chain(), &blocked_by(200, 45));
        assert_eq!(verdict, ValidationVerdict::accept());
    }

    #[test]
    fn test_self_reference_regardless_of_graph() {
        for graph in [DependencyGraph::new(), chain()] {
            let verdict = validate(&graph, &blocked_by(45, 45));
            assert_eq!(verdict.reason, VerdictReason::SelfReference);
            assert!(!verdict.accepted);
        }
    }

    #[test]
    fn test_duplicate_after_insert() {
        let mut graph = DependencyGraph::new();
        let edge = blocked_by(1, 2);

        let first = validate(&graph, &edge);
        assert!(first.accepted);
        graph.insert_edge(edge.clone());

        let second = validate(&graph, &edge);
        assert_eq!(second.reason, VerdictReason::DuplicateEdge);
    }

    #[test]
    fn test_shared_sub_dependencies_terminate() {
        // Diamond: 1 -> {2, 3} -> 4 -> 5
        let graph = DependencyGraph::from_edges([
            blocked_by(1, 2),
            blocked_by(1, 3),
            blocked_by(2, 4),
            blocked_by(3, 4),
            blocked_by(4, 5),
        ]);
        assert!(validate(&graph, &blocked_by(6, 1)).accepted);

        let verdict = validate(&graph, &blocked_by(5, 1));
        assert_eq!(
            verdict.reason,
            VerdictReason::WouldCreateCycle {
                path: vec![issue(1), issue(2), issue(4), issue(5)]
            }
        );
    }

    #[test]
    fn test_transitive_edge_in_same_direction_is_fine() {
        // 1 -> 2 -> 3; adding 1 -> 3 is redundant but acyclic
        let graph = DependencyGraph::from_edges([blocked_by(1, 2), blocked_by(2, 3)]);
        assert!(validate(&graph, &blocked_by(1, 3)).accepted);
    }

    #[test]
    fn test_cross_repository_cycle() {
        let other = IssueRef::new("octo", "tools", 9);
        let graph = DependencyGraph::from_edges([
            DependencyEdge::blocked_by(issue(1), other.clone()),
        ]);
        let verdict = validate(&graph, &DependencyEdge::blocked_by(other.clone(), issue(1)));
        assert_eq!(
            verdict.reason,
            VerdictReason::WouldCreateCycle {
                path: vec![issue(1), other]
            }
        );
    }

    #[test]
    fn test_removal_requires_existence() {
        let mut graph = chain();
        let edge = blocked_by(100, 45);

        assert!(validate_removal(&graph, &edge).is_ok());
        graph.remove_edge(&edge);
        assert_eq!(
            validate_removal(&graph, &edge),
            Err(RepoError::RelationshipNotFound(edge))
        );
    }

    #[test]
    fn test_removal_of_absent_edge() {
        let edge = blocked_by(7, 8);
        assert!(matches!(
            validate_removal(&chain(), &edge),
            Err(RepoError::RelationshipNotFound(_))
        ));
    }
}
