//! Tracking session: owns the baseline, ledgers and save bookkeeping for
//! one opened project.
//!
//! All operations are synchronous and infallible. Persistence happens
//! outside: callers read a [`Delta`] with [`TrackingSession::get_delta`],
//! write it, and only on success call
//! [`TrackingSession::clear_pending_changes`] (or
//! [`TrackingSession::acknowledge`], which keeps edits made while the write
//! was in flight).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::compare::TransientFields;
use crate::config::TrackingConfig;
use crate::delta::{Delta, build_delta};
use crate::hash::{StateHash, state_hash};
use crate::ledger::{ChangeCounts, ChangeType};
use crate::model::{Edge, Node, ProjectId};
use crate::policy::{FullSaveReason, SavePolicy};
use crate::tracker::EntityTracker;

/// Point-in-time summary of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingStats {
    pub project_id: Option<ProjectId>,
    pub sequence: u64,
    pub pending_nodes: ChangeCounts,
    pub pending_edges: ChangeCounts,
    pub baseline_nodes: usize,
    pub baseline_edges: usize,
    pub last_save: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl TrackingStats {
    pub fn pending_total(&self) -> usize {
        self.pending_nodes.total() + self.pending_edges.total()
    }
}

/// Change tracker for one open project. Never shared across projects.
#[derive(Debug)]
pub struct TrackingSession {
    project_id: Option<ProjectId>,
    sequence: u64,
    nodes: EntityTracker<Node>,
    edges: EntityTracker<Edge>,
    last_saved_state_hash: Option<StateHash>,
    last_save_timestamp: Option<DateTime<Utc>>,
    is_active: bool,
    policy: SavePolicy,
    transient: TransientFields,
    clock: Arc<dyn Clock>,
}

impl TrackingSession {
    pub fn new(config: &TrackingConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &TrackingConfig, clock: Arc<dyn Clock>) -> Self {
        TrackingSession {
            project_id: None,
            sequence: 0,
            nodes: EntityTracker::new(),
            edges: EntityTracker::new(),
            last_saved_state_hash: None,
            last_save_timestamp: None,
            is_active: false,
            policy: config.policy(),
            transient: config.transient_fields.clone(),
            clock,
        }
    }

    // ── Lifecycle ────────────────────────────────────────────

    /// Replace the baseline with the given state and drop all pending
    /// changes. Used when a project is opened and after a full snapshot
    /// has been written.
    ///
    /// An empty state records no save: nothing durable exists yet, so the
    /// first save of a fresh project is always a full one.
    pub fn initialize(&mut self, nodes: Vec<Node>, edges: Vec<Edge>) {
        let empty = nodes.is_empty() && edges.is_empty();
        if empty {
            self.last_saved_state_hash = None;
            self.last_save_timestamp = None;
        } else {
            self.last_saved_state_hash = Some(state_hash(&nodes, &edges, &self.transient));
            self.last_save_timestamp = Some(self.clock.now());
        }

        info!(
            "Tracking initialized with {} nodes, {} edges (project {:?})",
            nodes.len(),
            edges.len(),
            self.project_id
        );
        self.nodes.rebaseline(nodes);
        self.edges.rebaseline(edges);
        self.is_active = true;
    }

    /// [`initialize`](Self::initialize) for a project reopened from storage,
    /// continuing after the last sequence the store has persisted.
    pub fn initialize_from(&mut self, nodes: Vec<Node>, edges: Vec<Edge>, persisted_sequence: u64) {
        self.initialize(nodes, edges);
        self.sequence = persisted_sequence + 1;
        debug!("Resuming at sequence {}", self.sequence);
    }

    /// Return to the pristine state used before any project is opened.
    pub fn reset(&mut self) {
        info!("Tracking reset (project {:?})", self.project_id);
        self.project_id = None;
        self.sequence = 0;
        self.nodes.reset();
        self.edges.reset();
        self.last_saved_state_hash = None;
        self.last_save_timestamp = None;
        self.is_active = false;
    }

    pub fn set_project_id(&mut self, project_id: ProjectId) {
        self.project_id = Some(project_id);
    }

    pub fn project_id(&self) -> Option<ProjectId> {
        self.project_id
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    // ── Node tracking ────────────────────────────────────────

    pub fn track_node_add(&mut self, node: Node) {
        let now = self.clock.now();
        self.nodes.track_add(node, now);
    }

    pub fn track_node_update(&mut self, id: &str, node: Node) -> Option<ChangeType> {
        let now = self.clock.now();
        self.nodes.track_update(id, node, &self.transient, now)
    }

    pub fn track_node_remove(&mut self, id: &str) {
        let now = self.clock.now();
        self.nodes.track_remove(id, now);
    }

    pub fn track_node_changes(&mut self, old: &[Node], new: &[Node]) {
        let now = self.clock.now();
        self.nodes.track_changes(old, new, &self.transient, now);
    }

    // ── Edge tracking ────────────────────────────────────────

    pub fn track_edge_add(&mut self, edge: Edge) {
        let now = self.clock.now();
        self.edges.track_add(edge, now);
    }

    pub fn track_edge_update(&mut self, id: &str, edge: Edge) -> Option<ChangeType> {
        let now = self.clock.now();
        self.edges.track_update(id, edge, &self.transient, now)
    }

    pub fn track_edge_remove(&mut self, id: &str) {
        let now = self.clock.now();
        self.edges.track_remove(id, now);
    }

    pub fn track_edge_changes(&mut self, old: &[Edge], new: &[Edge]) {
        let now = self.clock.now();
        self.edges.track_changes(old, new, &self.transient, now);
    }

    // ── Save cycle ───────────────────────────────────────────

    /// Pending changes as a delta at the current sequence. Read-only.
    pub fn get_delta(&self) -> Option<Delta> {
        build_delta(
            self.project_id,
            self.sequence,
            self.nodes.ledger(),
            self.edges.ledger(),
        )
    }

    pub fn should_force_full_save(&self) -> bool {
        self.force_full_save_reason().is_some()
    }

    /// The policy's decision for the next save, with its reason.
    pub fn force_full_save_reason(&self) -> Option<FullSaveReason> {
        self.policy.evaluate(
            self.pending_change_count(),
            self.last_save_timestamp,
            self.clock.now(),
        )
    }

    /// Mark a save cycle complete: empty both ledgers and advance the
    /// sequence. Only call after the write is durable.
    pub fn clear_pending_changes(&mut self) {
        let cleared = self.pending_change_count();
        self.nodes.clear_ledger();
        self.edges.clear_ledger();
        self.complete_save_cycle();
        info!(
            "Cleared {} pending changes, sequence now {}",
            cleared, self.sequence
        );
    }

    /// Mark `delta` as durably written. Removes only the ledger entries
    /// that still match what the delta carried, so changes tracked while
    /// the write was in flight stay pending. Returns how many entries were
    /// removed.
    pub fn acknowledge(&mut self, delta: &Delta) -> usize {
        let mut removed = 0;
        for change in &delta.node_changes {
            let id = change.entity.id();
            if self.nodes.acknowledge(id, change.change_type, &change.entity) {
                removed += 1;
            }
        }
        for change in &delta.edge_changes {
            let id = change.entity.id();
            if self.edges.acknowledge(id, change.change_type, &change.entity) {
                removed += 1;
            }
        }
        self.complete_save_cycle();

        let retained = self.pending_change_count();
        info!(
            "Delta {} acknowledged: {} cleared, {} still pending",
            delta.sequence, removed, retained
        );
        removed
    }

    fn complete_save_cycle(&mut self) {
        self.sequence += 1;
        self.last_save_timestamp = Some(self.clock.now());
    }

    // ── Queries ──────────────────────────────────────────────

    pub fn pending_change_count(&self) -> usize {
        self.nodes.ledger().len() + self.edges.ledger().len()
    }

    pub fn has_pending_changes(&self) -> bool {
        self.pending_change_count() > 0
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn last_save_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_save_timestamp
    }

    pub fn last_saved_state_hash(&self) -> Option<StateHash> {
        self.last_saved_state_hash
    }

    /// Hash of what the baseline currently holds.
    pub fn baseline_hash(&self) -> StateHash {
        state_hash(
            self.nodes.baseline().values(),
            self.edges.baseline().values(),
            &self.transient,
        )
    }

    pub fn baseline_node(&self, id: &str) -> Option<&Node> {
        self.nodes.baseline().get(id)
    }

    pub fn baseline_edge(&self, id: &str) -> Option<&Edge> {
        self.edges.baseline().get(id)
    }

    pub fn pending_node_change(&self, id: &str) -> Option<ChangeType> {
        self.nodes.ledger().change_type(id)
    }

    pub fn pending_edge_change(&self, id: &str) -> Option<ChangeType> {
        self.edges.ledger().change_type(id)
    }

    pub fn transient_fields(&self) -> &TransientFields {
        &self.transient
    }

    pub fn policy(&self) -> SavePolicy {
        self.policy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn stats(&self) -> TrackingStats {
        TrackingStats {
            project_id: self.project_id,
            sequence: self.sequence,
            pending_nodes: self.nodes.ledger().counts(),
            pending_edges: self.edges.ledger().counts(),
            baseline_nodes: self.nodes.baseline().len(),
            baseline_edges: self.edges.baseline().len(),
            last_save: self.last_save_timestamp,
            is_active: self.is_active,
        }
    }
}

impl Default for TrackingSession {
    fn default() -> Self {
        Self::new(&TrackingConfig::default())
    }
}
