//! Full snapshots and replay of snapshot + deltas

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use topodelta_core::{
    ChangeEntity, ChangeType, Delta, DeltaChange, Edge, Entity, Node, ProjectId, StateHash,
    TransientFields, state_hash,
};

/// Complete diagram state written when the policy forces a full save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub project_id: ProjectId,
    pub sequence: u64,
    pub saved_at: DateTime<Utc>,
    /// Deny-list version the hash was computed with.
    pub transient_fields_version: u32,
    pub state_hash: StateHash,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn capture(
        project_id: ProjectId,
        sequence: u64,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        transient: &TransientFields,
        saved_at: DateTime<Utc>,
    ) -> Self {
        let state_hash = state_hash(&nodes, &edges, transient);
        Snapshot {
            project_id,
            sequence,
            saved_at,
            transient_fields_version: transient.version,
            state_hash,
            nodes,
            edges,
        }
    }
}

/// A project as reconstructed from storage.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredProject {
    pub project_id: ProjectId,
    /// Highest sequence reflected in `nodes`/`edges`.
    pub sequence: u64,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub deltas_applied: usize,
    pub transient_fields_version: Option<u32>,
}

impl StoredProject {
    /// Apply every delta newer than the snapshot, in sequence order.
    /// `None` when there is nothing stored at all.
    pub fn replay(
        project_id: ProjectId,
        snapshot: Option<Snapshot>,
        deltas: impl IntoIterator<Item = Delta>,
    ) -> Option<Self> {
        let mut deltas: Vec<Delta> = deltas.into_iter().collect();
        if snapshot.is_none() && deltas.is_empty() {
            return None;
        }
        deltas.sort_by_key(|d| d.sequence);

        let (mut sequence, transient_fields_version, mut nodes, mut edges) = match snapshot {
            Some(snapshot) => (
                Some(snapshot.sequence),
                Some(snapshot.transient_fields_version),
                by_id(snapshot.nodes),
                by_id(snapshot.edges),
            ),
            None => (None, None, BTreeMap::new(), BTreeMap::new()),
        };

        let mut deltas_applied = 0;
        for delta in deltas {
            if sequence.is_some_and(|seq| delta.sequence <= seq) {
                continue;
            }
            apply(&mut nodes, delta.node_changes);
            apply(&mut edges, delta.edge_changes);
            sequence = Some(delta.sequence);
            deltas_applied += 1;
        }

        Some(StoredProject {
            project_id,
            sequence: sequence.unwrap_or(0),
            nodes: nodes.into_values().collect(),
            edges: edges.into_values().collect(),
            deltas_applied,
            transient_fields_version,
        })
    }

    pub fn state_hash(&self, transient: &TransientFields) -> StateHash {
        state_hash(&self.nodes, &self.edges, transient)
    }
}

fn by_id<T: Entity>(entities: Vec<T>) -> BTreeMap<String, T> {
    entities
        .into_iter()
        .map(|e| (e.id().to_string(), e))
        .collect()
}

fn apply<T: Entity>(state: &mut BTreeMap<String, T>, changes: Vec<DeltaChange<T>>) {
    for change in changes {
        match (change.change_type, change.entity) {
            (ChangeType::Remove, entity) => {
                state.remove(entity.id());
            }
            (_, ChangeEntity::Full(entity)) => {
                state.insert(entity.id().to_string(), entity);
            }
            (change_type, ChangeEntity::Tombstone { id }) => {
                warn!("Ignoring {:?} of {} {} without a body", change_type, T::LABEL, id);
            }
        }
    }
}
