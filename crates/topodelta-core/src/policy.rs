//! Decides when the next save must be a full snapshot

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Default ceiling on pending changes before a full save is forced.
pub const MAX_PENDING_CHANGES: usize = 50;

/// Default ceiling on time between full saves.
pub const MAX_TIME_BETWEEN_FULL_SAVES: Duration = Duration::from_secs(30);

/// Why the policy escalated to a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullSaveReason {
    /// Nothing has been durably saved for this project yet.
    NeverSaved,
    TooManyPending { pending: usize, limit: usize },
    Stale { elapsed: Duration, limit: Duration },
}

impl fmt::Display for FullSaveReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullSaveReason::NeverSaved => write!(f, "no save recorded yet"),
            FullSaveReason::TooManyPending { pending, limit } => {
                write!(f, "{} pending changes exceed limit of {}", pending, limit)
            }
            FullSaveReason::Stale { elapsed, limit } => write!(
                f,
                "{}s since last save exceeds limit of {}s",
                elapsed.as_secs(),
                limit.as_secs()
            ),
        }
    }
}

/// Thresholds for escalating from incremental deltas to a full snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePolicy {
    pub max_pending_changes: usize,
    pub max_time_between_full_saves: Duration,
}

impl SavePolicy {
    pub fn new(max_pending_changes: usize, max_time_between_full_saves: Duration) -> Self {
        SavePolicy {
            max_pending_changes,
            max_time_between_full_saves,
        }
    }

    /// First threshold crossed, if any.
    pub fn evaluate(
        &self,
        pending: usize,
        last_save: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Option<FullSaveReason> {
        let Some(last_save) = last_save else {
            return Some(FullSaveReason::NeverSaved);
        };

        if pending > self.max_pending_changes {
            return Some(FullSaveReason::TooManyPending {
                pending,
                limit: self.max_pending_changes,
            });
        }

        // A clock that went backwards yields a negative span; treat it as fresh.
        if let Ok(elapsed) = now.signed_duration_since(last_save).to_std() {
            if elapsed > self.max_time_between_full_saves {
                return Some(FullSaveReason::Stale {
                    elapsed,
                    limit: self.max_time_between_full_saves,
                });
            }
        }

        None
    }

    pub fn should_force_full_save(
        &self,
        pending: usize,
        last_save: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> bool {
        self.evaluate(pending, last_save, now).is_some()
    }
}

impl Default for SavePolicy {
    fn default() -> Self {
        Self::new(MAX_PENDING_CHANGES, MAX_TIME_BETWEEN_FULL_SAVES)
    }
}
