//! Repository abstraction over durable storage, with file and in-memory
//! implementations

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use topodelta_core::{Delta, ProjectId};

use crate::error::StoreError;
use crate::snapshot::{Snapshot, StoredProject};

/// Default store directory.
pub const STORE_DIR: &str = ".topodelta";

/// Snapshot file inside a project directory.
pub const SNAPSHOT_FILE: &str = "snapshot.json";

/// Delta directory inside a project directory.
pub const DELTAS_DIR: &str = "deltas";

/// Durable storage for deltas and snapshots.
#[async_trait]
pub trait Repository: Send + Sync {
    /// Persist an incremental delta. Rejects a sequence that is not newer
    /// than everything already stored.
    async fn write_delta(&self, delta: &Delta) -> Result<(), StoreError>;

    /// Persist a full snapshot, superseding deltas at or below its sequence.
    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError>;

    /// Reconstruct the project from its snapshot and newer deltas.
    async fn load(&self, project_id: ProjectId) -> Result<Option<StoredProject>, StoreError>;

    /// Remove everything stored for the project.
    async fn clear(&self, project_id: ProjectId) -> Result<(), StoreError>;
}

fn check_delta_sequence(delta: &Delta, persisted: Option<u64>) -> Result<(), StoreError> {
    match persisted {
        Some(persisted) if delta.sequence <= persisted => Err(StoreError::StaleSequence {
            project_id: delta.project_id,
            got: delta.sequence,
            persisted,
        }),
        _ => Ok(()),
    }
}

fn check_snapshot_sequence(snapshot: &Snapshot, persisted: Option<u64>) -> Result<(), StoreError> {
    match persisted {
        Some(persisted) if snapshot.sequence < persisted => Err(StoreError::StaleSequence {
            project_id: snapshot.project_id,
            got: snapshot.sequence,
            persisted,
        }),
        _ => Ok(()),
    }
}

// ── File repository ─────────────────────────────────────────

/// Stores each project under `<root>/<projectId>/`:
/// `snapshot.json` plus `deltas/<sequence>.json`.
pub struct FileRepository {
    root: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for FileRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileRepository")
            .field("root", &self.root)
            .finish()
    }
}

impl FileRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileRepository {
            root: root.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project_id: ProjectId) -> PathBuf {
        self.root.join(project_id.to_string())
    }

    pub fn snapshot_path(&self, project_id: ProjectId) -> PathBuf {
        self.project_dir(project_id).join(SNAPSHOT_FILE)
    }

    pub fn delta_path(&self, project_id: ProjectId, sequence: u64) -> PathBuf {
        self.project_dir(project_id)
            .join(DELTAS_DIR)
            .join(format!("{:08}.json", sequence))
    }

    async fn read_snapshot(&self, project_id: ProjectId) -> Result<Option<Snapshot>, StoreError> {
        read_json(&self.snapshot_path(project_id)).await
    }

    /// Sequences of every stored delta, ascending.
    async fn delta_sequences(&self, project_id: ProjectId) -> Result<Vec<u64>, StoreError> {
        let dir = self.project_dir(project_id).join(DELTAS_DIR);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(&dir)(e)),
        };

        let mut sequences = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::io(&dir))? {
            let name = entry.file_name();
            let parsed = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(|stem| stem.parse::<u64>().ok());
            if let Some(sequence) = parsed {
                sequences.push(sequence);
            }
        }
        sequences.sort_unstable();
        Ok(sequences)
    }

    async fn persisted_sequence(&self, project_id: ProjectId) -> Result<Option<u64>, StoreError> {
        let snapshot = self.read_snapshot(project_id).await?.map(|s| s.sequence);
        let latest_delta = self.delta_sequences(project_id).await?.last().copied();
        Ok(snapshot.max(latest_delta))
    }
}

#[async_trait]
impl Repository for FileRepository {
    async fn write_delta(&self, delta: &Delta) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let persisted = self.persisted_sequence(delta.project_id).await?;
        check_delta_sequence(delta, persisted)?;

        let path = self.delta_path(delta.project_id, delta.sequence);
        write_json(&path, delta).await?;
        debug!(
            "Delta {} ({} changes) written to {}",
            delta.sequence,
            delta.len(),
            path.display()
        );
        Ok(())
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let persisted = self.persisted_sequence(snapshot.project_id).await?;
        check_snapshot_sequence(snapshot, persisted)?;

        let path = self.snapshot_path(snapshot.project_id);
        write_json(&path, snapshot).await?;

        let mut pruned = 0;
        for sequence in self.delta_sequences(snapshot.project_id).await? {
            if sequence <= snapshot.sequence {
                let delta_path = self.delta_path(snapshot.project_id, sequence);
                tokio::fs::remove_file(&delta_path)
                    .await
                    .map_err(StoreError::io(&delta_path))?;
                pruned += 1;
            }
        }

        info!(
            "Snapshot {} for project {} written ({} nodes, {} edges, {} deltas pruned)",
            snapshot.sequence,
            snapshot.project_id,
            snapshot.nodes.len(),
            snapshot.edges.len(),
            pruned
        );
        Ok(())
    }

    async fn load(&self, project_id: ProjectId) -> Result<Option<StoredProject>, StoreError> {
        let snapshot = self.read_snapshot(project_id).await?;
        let mut deltas = Vec::new();
        for sequence in self.delta_sequences(project_id).await? {
            if let Some(delta) = read_json::<Delta>(&self.delta_path(project_id, sequence)).await? {
                deltas.push(delta);
            }
        }
        Ok(StoredProject::replay(project_id, snapshot, deltas))
    }

    async fn clear(&self, project_id: ProjectId) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let dir = self.project_dir(project_id);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Cleared stored state for project {}", project_id);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&dir)(e)),
        }
    }
}

/// Write via a temp file and rename so readers never see a partial document.
async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(StoreError::io(parent))?;
    }
    let json = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json)
        .await
        .map_err(StoreError::io(&tmp))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(StoreError::io(path))?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path)(e)),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })
}

// ── In-memory repository ────────────────────────────────────

#[derive(Debug, Default, Clone)]
struct MemoryProject {
    snapshot: Option<Snapshot>,
    deltas: Vec<Delta>,
}

impl MemoryProject {
    fn persisted_sequence(&self) -> Option<u64> {
        let snapshot = self.snapshot.as_ref().map(|s| s.sequence);
        let latest_delta = self.deltas.iter().map(|d| d.sequence).max();
        snapshot.max(latest_delta)
    }
}

/// Process-local repository. Writes can be made to fail on demand.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    projects: Mutex<HashMap<ProjectId, MemoryProject>>,
    failing: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every write returns [`StoreError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn deltas(&self, project_id: ProjectId) -> Vec<Delta> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .map(|p| p.deltas.clone())
            .unwrap_or_default()
    }

    pub fn snapshot(&self, project_id: ProjectId) -> Option<Snapshot> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .and_then(|p| p.snapshot.clone())
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory repository set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn write_delta(&self, delta: &Delta) -> Result<(), StoreError> {
        self.check_available()?;
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let project = projects.entry(delta.project_id).or_default();
        check_delta_sequence(delta, project.persisted_sequence())?;
        project.deltas.push(delta.clone());
        Ok(())
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        self.check_available()?;
        let mut projects = self.projects.lock().unwrap_or_else(PoisonError::into_inner);
        let project = projects.entry(snapshot.project_id).or_default();
        check_snapshot_sequence(snapshot, project.persisted_sequence())?;
        project.deltas.retain(|d| d.sequence > snapshot.sequence);
        project.snapshot = Some(snapshot.clone());
        Ok(())
    }

    async fn load(&self, project_id: ProjectId) -> Result<Option<StoredProject>, StoreError> {
        let project = self
            .projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&project_id)
            .cloned();
        Ok(project.and_then(|p| StoredProject::replay(project_id, p.snapshot, p.deltas)))
    }

    async fn clear(&self, project_id: ProjectId) -> Result<(), StoreError> {
        self.projects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&project_id);
        Ok(())
    }
}
