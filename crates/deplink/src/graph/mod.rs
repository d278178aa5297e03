//! In-memory dependency graph using petgraph.
//!
//! The graph is an explicit adjacency structure keyed by the canonical
//! `owner/repo#number` node key. Every edge is stored in canonical direction,
//! dependent → prerequisite, whatever kind it was expressed as; the edge
//! weight keeps the original [`DependencyEdge`] so its remote id survives.
//!
//! A graph is materialized fresh for each run from the part of the remote
//! state the operation needs and dropped at the end of it.

mod validator;

pub use validator::{ValidationVerdict, VerdictReason, validate, validate_removal};

use crate::domain::{DependencyEdge, IssueRef};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Partially materialized dependency graph.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<IssueRef, DependencyEdge>,
    node_map: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from a sequence of edges, skipping duplicates.
    pub fn from_edges(edges: impl IntoIterator<Item = DependencyEdge>) -> Self {
        let mut graph = Self::new();
        for edge in edges {
            graph.insert_edge(edge);
        }
        graph
    }

    fn node(&mut self, reference: &IssueRef) -> NodeIndex {
        if let Some(&index) = self.node_map.get(&reference.key()) {
            return index;
        }
        let index = self.graph.add_node(reference.clone());
        self.node_map.insert(reference.key(), index);
        index
    }

    pub(crate) fn index_of(&self, reference: &IssueRef) -> Option<NodeIndex> {
        self.node_map.get(&reference.key()).copied()
    }

    pub(crate) fn inner(&self) -> &DiGraph<IssueRef, DependencyEdge> {
        &self.graph
    }

    /// Add an issue with no edges.
    pub fn insert_node(&mut self, reference: &IssueRef) {
        self.node(reference);
    }

    /// Insert an edge in canonical direction.
    ///
    /// Returns `false` if the canonical relationship was already present.
    /// No cycle check happens here; run [`validate`] first.
    pub fn insert_edge(&mut self, edge: DependencyEdge) -> bool {
        let (dependent, prerequisite) = edge.canonical();
        let from = self.node(dependent);
        let to = self.node(prerequisite);
        if self.graph.find_edge(from, to).is_some() {
            return false;
        }
        self.graph.add_edge(from, to, edge);
        true
    }

    /// The stored edge for the same canonical relationship, if present.
    pub fn find_edge(&self, edge: &DependencyEdge) -> Option<&DependencyEdge> {
        let (dependent, prerequisite) = edge.canonical();
        let from = self.index_of(dependent)?;
        let to = self.index_of(prerequisite)?;
        self.graph
            .find_edge(from, to)
            .and_then(|index| self.graph.edge_weight(index))
    }

    /// Whether the canonical relationship is present.
    pub fn contains_edge(&self, edge: &DependencyEdge) -> bool {
        self.find_edge(edge).is_some()
    }

    /// Remove the canonical relationship, returning the stored edge.
    pub fn remove_edge(&mut self, edge: &DependencyEdge) -> Option<DependencyEdge> {
        let (dependent, prerequisite) = edge.canonical();
        let from = self.index_of(dependent)?;
        let to = self.index_of(prerequisite)?;
        let index = self.graph.find_edge(from, to)?;
        self.graph.remove_edge(index)
    }

    /// Direct prerequisites of an issue, ordered by key.
    pub fn prerequisites(&self, reference: &IssueRef) -> Vec<&IssueRef> {
        let Some(index) = self.index_of(reference) else {
            return Vec::new();
        };
        let mut result: Vec<&IssueRef> = self
            .graph
            .edges(index)
            .map(|edge| &self.graph[edge.target()])
            .collect();
        result.sort();
        result
    }

    /// Number of issues.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of relationships.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Canonical `(dependent, prerequisite)` key pairs, sorted.
    ///
    /// Stable across insertion order, which makes graphs easy to compare in
    /// tests.
    pub fn canonical_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .graph
            .edge_references()
            .map(|edge| {
                (
                    self.graph[edge.source()].key(),
                    self.graph[edge.target()].key(),
                )
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Whether any directed cycle exists.
    pub fn is_cyclic(&self) -> bool {
        petgraph::algo::is_cyclic_directed(&self.graph)
    }
}
