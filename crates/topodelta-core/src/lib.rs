//! Topodelta Core: change tracking and save decisions for a live
//! topology diagram

pub mod model;
pub mod compare;
pub mod baseline;
pub mod ledger;
pub mod tracker;
pub mod delta;
pub mod policy;
pub mod hash;
pub mod clock;
pub mod config;
pub mod session;
pub mod topology;


pub use model::{ProjectId, Payload, NodeKind, Position, Dimensions, Node, Edge, Entity};
pub use compare::{TransientFields, TRANSIENT_FIELDS_VERSION, node_changed, edge_changed, payload_eq};
pub use baseline::Baseline;
pub use ledger::{ChangeType, ChangeEntity, ChangeCounts, PendingChange, Ledger};
pub use tracker::EntityTracker;
pub use delta::{Delta, DeltaChange, build_delta};
pub use policy::{SavePolicy, FullSaveReason, MAX_PENDING_CHANGES, MAX_TIME_BETWEEN_FULL_SAVES};
pub use hash::{StateHash, state_hash};
pub use clock::{Clock, SystemClock, ManualClock};
pub use config::{CONFIG_FILE, ConfigError, TrackingConfig};
pub use session::{TrackingSession, TrackingStats};
pub use topology::{Topology, NestingReport};
