//! Serializable delta documents built from the pending ledgers

use serde::{Deserialize, Serialize};

use crate::ledger::{ChangeEntity, ChangeType, Ledger};
use crate::model::{Edge, Entity, Node, ProjectId};

/// One coalesced change as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaChange<T> {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    pub entity: ChangeEntity<T>,
}

/// Sequence-numbered set of pending changes, ready to persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub project_id: ProjectId,
    pub sequence: u64,
    pub node_changes: Vec<DeltaChange<Node>>,
    pub edge_changes: Vec<DeltaChange<Edge>>,
}

impl Delta {
    /// Total number of changes carried.
    pub fn len(&self) -> usize {
        self.node_changes.len() + self.edge_changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_changes.is_empty() && self.edge_changes.is_empty()
    }
}

/// Project the ledgers into a delta. `None` without a project or when
/// nothing is pending. Entries are ordered by id.
pub fn build_delta(
    project_id: Option<ProjectId>,
    sequence: u64,
    nodes: &Ledger<Node>,
    edges: &Ledger<Edge>,
) -> Option<Delta> {
    let project_id = project_id?;
    if nodes.is_empty() && edges.is_empty() {
        return None;
    }

    Some(Delta {
        project_id,
        sequence,
        node_changes: project(nodes),
        edge_changes: project(edges),
    })
}

fn project<T: Entity>(ledger: &Ledger<T>) -> Vec<DeltaChange<T>> {
    let mut entries: Vec<_> = ledger.iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));
    entries
        .into_iter()
        .map(|(_, pending)| DeltaChange {
            change_type: pending.change_type,
            entity: pending.entity.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PendingChange;
    use chrono::Utc;

    fn ledgers() -> (Ledger<Node>, Ledger<Edge>) {
        let mut nodes = Ledger::new();
        let mut edges = Ledger::new();
        let node = Node::device("fw", 10.0, 20.0).with_data("label", "Firewall");
        nodes.record(
            "fw",
            PendingChange::new(ChangeType::Add, ChangeEntity::Full(node), Utc::now()),
        );
        nodes.record(
            "old",
            PendingChange::new(
                ChangeType::Remove,
                ChangeEntity::Tombstone { id: "old".to_string() },
                Utc::now(),
            ),
        );
        edges.record(
            "e1",
            PendingChange::new(
                ChangeType::Update,
                ChangeEntity::Full(Edge::new("e1", "fw", "db")),
                Utc::now(),
            ),
        );
        (nodes, edges)
    }

    #[test]
    fn test_no_project_no_delta() {
        let (nodes, edges) = ledgers();
        assert!(build_delta(None, 0, &nodes, &edges).is_none());
    }

    #[test]
    fn test_empty_ledgers_no_delta() {
        assert!(build_delta(Some(1), 0, &Ledger::new(), &Ledger::new()).is_none());
    }

    #[test]
    fn test_delta_wire_format() {
        let (nodes, edges) = ledgers();
        let delta = build_delta(Some(42), 3, &nodes, &edges).unwrap();
        let json = serde_json::to_string_pretty(&delta).unwrap();

        insta::assert_snapshot!(json, @r#"
        {
          "projectId": 42,
          "sequence": 3,
          "nodeChanges": [
            {
              "type": "add",
              "entity": {
                "id": "fw",
                "type": "device",
                "position": {
                  "x": 10.0,
                  "y": 20.0
                },
                "data": {
                  "label": "Firewall"
                }
              }
            },
            {
              "type": "remove",
              "entity": {
                "id": "old"
              }
            }
          ],
          "edgeChanges": [
            {
              "type": "update",
              "entity": {
                "id": "e1",
                "source": "fw",
                "target": "db",
                "type": "default",
                "data": {}
              }
            }
          ]
        }
        "#);
    }

    #[test]
    fn test_delta_reads_back() {
        let (nodes, edges) = ledgers();
        let delta = build_delta(Some(7), 0, &nodes, &edges).unwrap();

        let json = serde_json::to_string(&delta).unwrap();
        let decoded: Delta = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded, delta);
        assert!(matches!(
            decoded.node_changes[1].entity,
            ChangeEntity::Tombstone { .. }
        ));
    }
}
