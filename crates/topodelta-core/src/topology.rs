//! Boundary nesting diagnostics built on petgraph::StableDiGraph

use std::collections::{HashMap, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};

use crate::model::{Edge, Node, NodeKind};

/// Findings about a diagram's nesting forest. The engine never rejects
/// input because of these; they are reported for inspection only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NestingReport {
    /// Nodes whose parent chain loops back on itself.
    pub cyclic: Vec<String>,
    /// `(child, missing parent)` pairs.
    pub dangling_parents: Vec<(String, String)>,
    /// Edges whose source or target is not a known node.
    pub dangling_edges: Vec<String>,
    /// Nodes parented to something that is not a boundary.
    pub non_boundary_parents: Vec<(String, String)>,
    /// Longest acyclic parent chain.
    pub max_depth: usize,
}

impl NestingReport {
    pub fn is_clean(&self) -> bool {
        self.cyclic.is_empty()
            && self.dangling_parents.is_empty()
            && self.dangling_edges.is_empty()
            && self.non_boundary_parents.is_empty()
    }
}

/// Parent → child containment graph of a diagram.
pub struct Topology {
    inner: StableDiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
    kinds: HashMap<String, NodeKind>,
    dangling_parents: Vec<(String, String)>,
    dangling_edges: Vec<String>,
}

impl std::fmt::Debug for Topology {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Topology")
            .field("node_count", &self.inner.node_count())
            .field("containment_count", &self.inner.edge_count())
            .finish()
    }
}

impl Topology {
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Self {
        let mut inner = StableDiGraph::new();
        let mut index = HashMap::new();
        let mut kinds = HashMap::new();

        for node in nodes {
            let idx = inner.add_node(node.id.clone());
            index.insert(node.id.clone(), idx);
            kinds.insert(node.id.clone(), node.kind);
        }

        let mut dangling_parents = Vec::new();
        for node in nodes {
            let Some(parent_id) = &node.parent_id else {
                continue;
            };
            match (index.get(parent_id), index.get(&node.id)) {
                (Some(&parent), Some(&child)) => {
                    inner.add_edge(parent, child, ());
                }
                _ => dangling_parents.push((node.id.clone(), parent_id.clone())),
            }
        }

        let dangling_edges = edges
            .iter()
            .filter(|e| !index.contains_key(&e.source) || !index.contains_key(&e.target))
            .map(|e| e.id.clone())
            .collect();

        Topology {
            inner,
            index,
            kinds,
            dangling_parents,
            dangling_edges,
        }
    }

    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Enclosing boundaries of `id`, innermost first. Stops at a cycle.
    pub fn boundary_chain(&self, id: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let Some(&start) = self.index.get(id) else {
            return chain;
        };

        let mut seen = HashSet::from([start]);
        let mut current = start;
        while let Some(parent) = self
            .inner
            .neighbors_directed(current, Direction::Incoming)
            .next()
        {
            if !seen.insert(parent) {
                break;
            }
            if let Some(name) = self.inner.node_weight(parent) {
                chain.push(name.clone());
            }
            current = parent;
        }
        chain
    }

    /// Ids caught in a parent cycle, sorted.
    pub fn cyclic_nodes(&self) -> Vec<String> {
        let mut cyclic: Vec<String> = tarjan_scc(&self.inner)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.inner.contains_edge(n, n))
            })
            .flatten()
            .filter_map(|idx| self.inner.node_weight(idx).cloned())
            .collect();
        cyclic.sort();
        cyclic
    }

    pub fn report(&self) -> NestingReport {
        let mut non_boundary_parents: Vec<(String, String)> = self
            .inner
            .edge_indices()
            .filter_map(|e| self.inner.edge_endpoints(e))
            .filter_map(|(parent, child)| {
                let parent = self.inner.node_weight(parent)?;
                let child = self.inner.node_weight(child)?;
                (self.kinds.get(parent) != Some(&NodeKind::Boundary))
                    .then(|| (child.clone(), parent.clone()))
            })
            .collect();
        non_boundary_parents.sort();

        let max_depth = self
            .index
            .keys()
            .map(|id| self.boundary_chain(id).len())
            .max()
            .unwrap_or(0);

        NestingReport {
            cyclic: self.cyclic_nodes(),
            dangling_parents: self.dangling_parents.clone(),
            dangling_edges: self.dangling_edges.clone(),
            non_boundary_parents,
            max_depth,
        }
    }
}
