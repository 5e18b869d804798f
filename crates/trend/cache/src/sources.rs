//! Collaborator seams consumed by the trend cache manager
//!
//! The manager talks to four independent services: the snapshot store
//! (authoritative per-minute history), the machine clock (authoritative
//! current time per machine), the live sample feed, and the historic
//! correction feed. Production implementations wrap the platform's
//! microservice clients; [`crate::memory`] provides in-memory versions for
//! development and testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use trend_types::{ColumnId, MachineId, Snapshot, TrendWindow};

/// Failure from a remote collaborator.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("subscription failed: {0}")]
    Subscription(String),
}

/// Result type for collaborator calls.
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Outcome of a snapshot store query.
///
/// `NotYetProducing` reports the domain condition "this machine has never
/// emitted a sample". It travels out-of-band from [`SourceError`] so that
/// callers cannot confuse it with a real failure.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    /// The store produced data.
    Available(T),

    /// The machine has not started producing snapshots.
    NotYetProducing,
}

/// Authoritative source of per-minute sensor snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// The first snapshot the machine ever produced.
    async fn fetch_first(&self, machine_id: &MachineId) -> SourceResult<Fetched<Snapshot>>;

    /// Snapshots for `columns` inside `range`, ascending by minute.
    async fn fetch_range(
        &self,
        machine_id: &MachineId,
        columns: &[ColumnId],
        range: &TrendWindow,
    ) -> SourceResult<Fetched<Vec<Snapshot>>>;
}

/// Resolves the authoritative current time for a machine.
#[async_trait]
pub trait MachineClock: Send + Sync {
    /// The machine's current time, or `None` while it is not yet known.
    async fn current_time(&self, machine_id: &MachineId) -> SourceResult<Option<DateTime<Utc>>>;
}

/// Push notification from the live sample feed, one per sampling tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LiveUpdate {
    /// A new sample. `minutely` marks samples on a whole-minute boundary;
    /// sub-minute samples are outside the cache's resolution.
    Sample { snapshot: Snapshot, minutely: bool },

    /// The machine's telemetry state was reset upstream; cached history can
    /// no longer be trusted.
    Cleared,
}

/// Retroactive revision of previously delivered snapshot data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricCorrection {
    pub machine_id: MachineId,

    /// Columns whose history was revised.
    pub columns: Vec<ColumnId>,

    /// Start of the corrected range.
    pub changed_from: DateTime<Utc>,

    /// End of the corrected range.
    pub changed_to: DateTime<Utc>,
}

/// Per-machine live sample subscriptions.
#[async_trait]
pub trait LiveUpdateSource: Send + Sync {
    /// Subscribe to a machine's live feed. Updates arrive in sampling order.
    async fn subscribe(&self, machine_id: &MachineId)
        -> SourceResult<mpsc::Receiver<LiveUpdate>>;
}

/// Platform-wide historic correction subscription.
#[async_trait]
pub trait HistoricCorrectionSource: Send + Sync {
    /// Subscribe to correction messages for all machines.
    async fn subscribe(&self) -> SourceResult<mpsc::Receiver<HistoricCorrection>>;
}
