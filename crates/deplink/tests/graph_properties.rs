//! Property-based tests for the dependency graph validator.
//!
//! Any sequence of proposed relationships, applied only when accepted, must
//! leave the graph acyclic; every rejection must be justified.

use deplink::domain::{DependencyEdge, IssueRef, RelationshipKind};
use deplink::graph::{DependencyGraph, VerdictReason, validate};
use proptest::prelude::*;

/// Issues spread over two repositories so cross-repo edges are exercised.
fn arb_issue() -> impl Strategy<Value = IssueRef> {
    (prop_oneof![Just("widgets"), Just("tools")], 1u64..=8)
        .prop_map(|(repo, number)| IssueRef::new("acme", repo, number))
}

fn arb_kind() -> impl Strategy<Value = RelationshipKind> {
    prop_oneof![Just(RelationshipKind::BlockedBy), Just(RelationshipKind::Blocks)]
}

fn arb_edge() -> impl Strategy<Value = DependencyEdge> {
    (arb_issue(), arb_issue(), arb_kind())
        .prop_map(|(source, target, kind)| DependencyEdge::new(source, target, kind))
}

proptest! {
    /// Accepted edges never introduce a cycle.
    #[test]
    fn prop_accepted_edges_keep_graph_acyclic(proposals in prop::collection::vec(arb_edge(), 0..60)) {
        let mut graph = DependencyGraph::new();

        for proposed in proposals {
            let verdict = validate(&graph, &proposed);
            prop_assert_eq!(verdict.accepted, verdict.reason == VerdictReason::Ok);

            if verdict.accepted {
                prop_assert!(graph.insert_edge(proposed));
            }
            prop_assert!(!graph.is_cyclic());
        }
    }

    /// A cycle rejection is real: forcing the edge in would make the graph cyclic,
    /// and the reported path is a chain of existing edges from target to source.
    #[test]
    fn prop_cycle_rejections_are_justified(proposals in prop::collection::vec(arb_edge(), 0..60)) {
        let mut graph = DependencyGraph::new();

        for proposed in proposals {
            match validate(&graph, &proposed).reason {
                VerdictReason::Ok => {
                    graph.insert_edge(proposed);
                }
                VerdictReason::WouldCreateCycle { path } => {
                    let (dependent, prerequisite) = proposed.canonical();
                    prop_assert_eq!(path.first(), Some(prerequisite));
                    prop_assert_eq!(path.last(), Some(dependent));
                    for pair in path.windows(2) {
                        let link = DependencyEdge::blocked_by(pair[0].clone(), pair[1].clone());
                        prop_assert!(graph.contains_edge(&link));
                    }

                    let mut forced = graph.clone();
                    forced.insert_edge(proposed);
                    prop_assert!(forced.is_cyclic());
                }
                VerdictReason::DuplicateEdge => {
                    prop_assert!(graph.contains_edge(&proposed));
                }
                VerdictReason::SelfReference => {
                    prop_assert_eq!(&proposed.source, &proposed.target);
                }
            }
        }
    }

    /// Expressing a relationship from either side is the same relationship.
    #[test]
    fn prop_blocks_is_inverse_of_blocked_by(a in arb_issue(), b in arb_issue()) {
        let blocked_by = DependencyEdge::blocked_by(a.clone(), b.clone());
        let blocks = DependencyEdge::new(b, a, RelationshipKind::Blocks);
        prop_assert!(blocked_by.same_relationship(&blocks));

        let graph = DependencyGraph::from_edges([blocked_by]);
        prop_assert!(graph.contains_edge(&blocks));
    }
}
