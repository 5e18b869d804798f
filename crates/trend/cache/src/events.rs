//! Events emitted by the trend cache manager
//!
//! Published on a best-effort broadcast channel so operators and tests can
//! observe cache lifecycle transitions without participating in them.

use chrono::{DateTime, Utc};
use trend_types::MachineId;

/// Events emitted by the trend cache manager.
#[derive(Debug, Clone)]
pub enum TrendEvent {
    /// A machine's cache was created and its subscriptions registered.
    MachineTracked(MachineId),

    /// A machine's cache was dropped after an upstream state reset.
    CacheCleared(MachineId),

    /// Backfill merged snapshots into a machine's cache.
    BackfillCompleted {
        machine_id: MachineId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        points: usize,
    },

    /// A live minutely sample was merged.
    LiveSampleApplied {
        machine_id: MachineId,
        at: DateTime<Utc>,
    },

    /// A live tick could not be processed and was skipped.
    LiveTickSkipped {
        machine_id: MachineId,
        reason: String,
    },

    /// A historic correction was re-fetched and merged.
    CorrectionApplied {
        machine_id: MachineId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        columns: usize,
    },

    /// Rows fell out of the trend window and were removed.
    Evicted {
        machine_id: MachineId,
        removed: usize,
    },
}
