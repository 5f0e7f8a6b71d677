//! Edit journals and the in-memory diagram they drive
//!
//! A journal is a JSON Lines file of edit events, one per line. Blank lines
//! and lines starting with `#` are ignored:
//!
//! ```text
//! {"op":"addNode","node":{"id":"fw","type":"device","position":{"x":0,"y":0}}}
//! {"op":"updateNode","node":{"id":"fw","type":"device","position":{"x":40,"y":0}}}
//! {"op":"addEdge","edge":{"id":"e1","source":"fw","target":"fw"}}
//! {"op":"save"}
//! ```

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use topodelta_core::{Edge, Node, TrackingSession};

use crate::coordinator::GraphSource;

/// One editor action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum EditEvent {
    AddNode { node: Node },
    UpdateNode { node: Node },
    RemoveNode { id: String },
    AddEdge { edge: Edge },
    UpdateEdge { edge: Edge },
    RemoveEdge { id: String },
    /// Persist what has been tracked so far.
    Save,
}

pub fn parse_journal(text: &str) -> anyhow::Result<Vec<EditEvent>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("journal line {}: invalid edit event", index + 1))
        })
        .collect()
}

/// Authoritative editor state. Every mutation goes through
/// [`Diagram::apply`], which reports it to the tracking session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagram {
    nodes: BTreeMap<String, Node>,
    edges: BTreeMap<String, Edge>,
}

impl Diagram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Diagram {
            nodes: nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            edges: edges.into_iter().map(|e| (e.id.clone(), e)).collect(),
        }
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.nodes.values().cloned().collect()
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.edges.values().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Apply `event` and track it. Removing a node also removes the edges
    /// attached to it. `Save` changes nothing here.
    pub fn apply(&mut self, event: &EditEvent, session: &mut TrackingSession) {
        match event {
            EditEvent::AddNode { node } => {
                self.nodes.insert(node.id.clone(), node.clone());
                session.track_node_add(node.clone());
            }
            EditEvent::UpdateNode { node } => {
                self.nodes.insert(node.id.clone(), node.clone());
                session.track_node_update(&node.id, node.clone());
            }
            EditEvent::RemoveNode { id } => {
                let attached: Vec<String> = self
                    .edges
                    .values()
                    .filter(|e| e.touches(id))
                    .map(|e| e.id.clone())
                    .collect();
                for edge_id in attached {
                    debug!("Removing edge {} with node {}", edge_id, id);
                    self.edges.remove(&edge_id);
                    session.track_edge_remove(&edge_id);
                }
                self.nodes.remove(id);
                session.track_node_remove(id);
            }
            EditEvent::AddEdge { edge } => {
                self.edges.insert(edge.id.clone(), edge.clone());
                session.track_edge_add(edge.clone());
            }
            EditEvent::UpdateEdge { edge } => {
                self.edges.insert(edge.id.clone(), edge.clone());
                session.track_edge_update(&edge.id, edge.clone());
            }
            EditEvent::RemoveEdge { id } => {
                self.edges.remove(id);
                session.track_edge_remove(id);
            }
            EditEvent::Save => {}
        }
    }
}

/// A [`Diagram`] shared between the editing task and the save coordinator.
#[derive(Debug, Clone, Default)]
pub struct SharedDiagram(Arc<RwLock<Diagram>>);

impl SharedDiagram {
    pub fn new(diagram: Diagram) -> Self {
        SharedDiagram(Arc::new(RwLock::new(diagram)))
    }

    pub fn apply(&self, event: &EditEvent, session: &mut TrackingSession) {
        self.0
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .apply(event, session);
    }

    pub fn snapshot(&self) -> Diagram {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl GraphSource for SharedDiagram {
    fn graph(&self) -> (Vec<Node>, Vec<Edge>) {
        let diagram = self.0.read().unwrap_or_else(PoisonError::into_inner);
        (diagram.nodes(), diagram.edges())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topodelta_core::ChangeType;

    #[test]
    fn test_parse_journal_skips_comments() {
        let text = r#"
# seed
{"op":"addNode","node":{"id":"fw","type":"device","position":{"x":0,"y":0}}}

{"op":"removeEdge","id":"e9"}
{"op":"save"}
"#;
        let events = parse_journal(text).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], EditEvent::AddNode { node: Node::device("fw", 0.0, 0.0) });
        assert_eq!(events[2], EditEvent::Save);
    }

    #[test]
    fn test_parse_journal_reports_line() {
        let text = "{\"op\":\"save\"}\n{\"op\":\"teleport\"}\n";
        let err = parse_journal(text).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_remove_node_cascades_to_edges() {
        let nodes = vec![Node::device("a", 0.0, 0.0), Node::device("b", 10.0, 0.0)];
        let edges = vec![Edge::new("ab", "a", "b")];
        let mut session = TrackingSession::default();
        session.initialize(nodes.clone(), edges.clone());
        let mut diagram = Diagram::from_parts(nodes, edges);

        diagram.apply(&EditEvent::RemoveNode { id: "a".into() }, &mut session);

        assert_eq!(diagram.node_count(), 1);
        assert_eq!(diagram.edge_count(), 0);
        assert_eq!(session.pending_node_change("a"), Some(ChangeType::Remove));
        assert_eq!(session.pending_edge_change("ab"), Some(ChangeType::Remove));
    }

    #[test]
    fn test_update_of_new_node_is_add() {
        let mut session = TrackingSession::default();
        session.initialize(vec![Node::device("a", 0.0, 0.0)], vec![]);
        let shared = SharedDiagram::default();

        shared.apply(
            &EditEvent::UpdateNode { node: Node::boundary("zone", 0.0, 0.0) },
            &mut session,
        );

        assert_eq!(session.pending_node_change("zone"), Some(ChangeType::Add));
        assert_eq!(shared.graph().0.len(), 1);
    }
}
