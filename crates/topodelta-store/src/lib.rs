//! Topodelta Store: durable deltas and snapshots, and the save cycle that
//! writes them

pub mod error;
pub mod snapshot;
pub mod repository;
pub mod coordinator;
pub mod journal;

pub use error::StoreError;
pub use snapshot::{Snapshot, StoredProject};
pub use repository::{Repository, FileRepository, MemoryRepository, STORE_DIR, SNAPSHOT_FILE, DELTAS_DIR};
pub use coordinator::{GraphSource, SaveCoordinator, SaveOutcome, SaveSignal, DEFAULT_DEBOUNCE};
pub use journal::{EditEvent, Diagram, SharedDiagram, parse_journal};
