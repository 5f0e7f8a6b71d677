//! Save coordinator: drives one save cycle against a repository
//!
//! A cycle reads the pending delta (or a full snapshot when the policy asks
//! for one), writes it without holding the session lock, and only after a
//! successful write tells the session the changes are durable. Edits tracked
//! while the write is in flight stay pending for the next cycle. A failed
//! write leaves the session untouched.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, error, info, warn};

use topodelta_core::{
    Delta, Edge, FullSaveReason, Node, ProjectId, TrackingSession, TransientFields,
};

use crate::error::StoreError;
use crate::repository::Repository;
use crate::snapshot::Snapshot;

/// Default quiet period before an autosave fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Authoritative node/edge arrays, owned by the editor.
pub trait GraphSource: Send + Sync {
    fn graph(&self) -> (Vec<Node>, Vec<Edge>);
}

/// What a save cycle did.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// No project set, or nothing to save.
    Skipped,
    Delta {
        sequence: u64,
        /// Ledger entries cleared by the acknowledgement.
        cleared: usize,
        /// Entries tracked during the write, left for the next cycle.
        retained: usize,
    },
    Full {
        sequence: u64,
        reason: FullSaveReason,
        nodes: usize,
        edges: usize,
    },
}

/// Messages for the autosave loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveSignal {
    /// Something was edited; save once things go quiet.
    Dirty,
    /// Save now.
    Flush,
    /// Save anything outstanding and stop.
    Shutdown,
}

enum SavePlan {
    Full {
        project_id: ProjectId,
        sequence: u64,
        reason: FullSaveReason,
        transient: TransientFields,
        saved_at: DateTime<Utc>,
    },
    Delta(Delta),
}

pub struct SaveCoordinator<R, S> {
    session: Arc<Mutex<TrackingSession>>,
    repository: Arc<R>,
    source: Arc<S>,
    debounce: Duration,
    /// Serializes save cycles.
    cycle: Mutex<()>,
}

impl<R: Repository, S: GraphSource> SaveCoordinator<R, S> {
    pub fn new(session: Arc<Mutex<TrackingSession>>, repository: Arc<R>, source: Arc<S>) -> Self {
        SaveCoordinator {
            session,
            repository,
            source,
            debounce: DEFAULT_DEBOUNCE,
            cycle: Mutex::new(()),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn session(&self) -> Arc<Mutex<TrackingSession>> {
        Arc::clone(&self.session)
    }

    pub fn repository(&self) -> Arc<R> {
        Arc::clone(&self.repository)
    }

    /// Run one save cycle.
    pub async fn save_now(&self) -> Result<SaveOutcome, StoreError> {
        let _cycle = self.cycle.lock().await;

        let plan = {
            let session = self.session.lock().await;
            let Some(project_id) = session.project_id() else {
                debug!("No project set, skipping save");
                return Ok(SaveOutcome::Skipped);
            };

            match session.force_full_save_reason() {
                Some(reason)
                    if reason == FullSaveReason::NeverSaved || session.has_pending_changes() =>
                {
                    SavePlan::Full {
                        project_id,
                        sequence: session.sequence(),
                        reason,
                        transient: session.transient_fields().clone(),
                        saved_at: session.now(),
                    }
                }
                _ => match session.get_delta() {
                    Some(delta) => SavePlan::Delta(delta),
                    None => {
                        debug!("Nothing pending for project {}", project_id);
                        return Ok(SaveOutcome::Skipped);
                    }
                },
            }
        };

        match plan {
            SavePlan::Full {
                project_id,
                sequence,
                reason,
                transient,
                saved_at,
            } => {
                self.save_full(project_id, sequence, reason, transient, saved_at)
                    .await
            }
            SavePlan::Delta(delta) => self.save_delta(delta).await,
        }
    }

    async fn save_delta(&self, delta: Delta) -> Result<SaveOutcome, StoreError> {
        debug!(
            "Writing delta {} for project {} ({} changes)",
            delta.sequence,
            delta.project_id,
            delta.len()
        );
        if let Err(e) = self.repository.write_delta(&delta).await {
            warn!("Delta {} not written, changes stay pending: {}", delta.sequence, e);
            return Err(e);
        }

        let mut session = self.session.lock().await;
        if session.project_id() != Some(delta.project_id) || session.sequence() != delta.sequence {
            warn!(
                "Session moved on while delta {} was written, not acknowledging",
                delta.sequence
            );
            return Ok(SaveOutcome::Skipped);
        }

        let cleared = session.acknowledge(&delta);
        Ok(SaveOutcome::Delta {
            sequence: delta.sequence,
            cleared,
            retained: session.pending_change_count(),
        })
    }

    async fn save_full(
        &self,
        project_id: ProjectId,
        sequence: u64,
        reason: FullSaveReason,
        transient: TransientFields,
        saved_at: DateTime<Utc>,
    ) -> Result<SaveOutcome, StoreError> {
        info!(
            "Full save for project {} at sequence {}: {}",
            project_id, sequence, reason
        );

        let (nodes, edges) = {
            // Read the editor state under the session lock so no edit can
            // land in the ledger without also landing in the snapshot or in
            // the re-diff below.
            let _session = self.session.lock().await;
            self.source.graph()
        };
        let snapshot = Snapshot::capture(project_id, sequence, nodes, edges, &transient, saved_at);

        if let Err(e) = self.repository.write_snapshot(&snapshot).await {
            warn!("Snapshot {} not written, changes stay pending: {}", sequence, e);
            return Err(e);
        }

        let mut session = self.session.lock().await;
        if session.project_id() != Some(project_id) || session.sequence() != sequence {
            warn!(
                "Session moved on while snapshot {} was written, not re-baselining",
                sequence
            );
            return Ok(SaveOutcome::Skipped);
        }

        let (current_nodes, current_edges) = self.source.graph();
        session.initialize(snapshot.nodes.clone(), snapshot.edges.clone());
        session.clear_pending_changes();
        // Edits made during the write.
        session.track_node_changes(&snapshot.nodes, &current_nodes);
        session.track_edge_changes(&snapshot.edges, &current_edges);

        Ok(SaveOutcome::Full {
            sequence,
            reason,
            nodes: snapshot.nodes.len(),
            edges: snapshot.edges.len(),
        })
    }

    /// Debounced autosave loop. Runs until `Shutdown` or the channel closes.
    /// Failed saves are logged and retried after the next quiet period.
    pub async fn run(&self, mut signals: mpsc::UnboundedReceiver<SaveSignal>) {
        let mut dirty = false;
        loop {
            let signal = if dirty {
                tokio::select! {
                    signal = signals.recv() => signal,
                    _ = tokio::time::sleep(self.debounce) => Some(SaveSignal::Flush),
                }
            } else {
                signals.recv().await
            };

            match signal {
                Some(SaveSignal::Dirty) => dirty = true,
                Some(SaveSignal::Flush) => dirty = !self.flush().await,
                Some(SaveSignal::Shutdown) | None => {
                    if dirty {
                        self.flush().await;
                    }
                    info!("Autosave loop stopped");
                    break;
                }
            }
        }
    }

    /// One logged save cycle. Returns whether it succeeded.
    async fn flush(&self) -> bool {
        match self.save_now().await {
            Ok(outcome) => {
                debug!("Autosave: {:?}", outcome);
                true
            }
            Err(e) => {
                error!("Autosave failed: {}", e);
                false
            }
        }
    }
}
