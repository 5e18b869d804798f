//! In-memory collaborator implementations
//!
//! These are suitable for development and testing. Production deployments
//! wrap the platform's snapshot, clock, and notification services behind
//! the same traits.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::mpsc;
use trend_types::{ColumnId, MachineId, Snapshot, TrendWindow};

use crate::sources::{
    Fetched, HistoricCorrection, HistoricCorrectionSource, LiveUpdate, LiveUpdateSource,
    MachineClock, SnapshotStore, SourceError, SourceResult,
};

const CHANNEL_BUFFER: usize = 64;

type MachineRows = BTreeMap<DateTime<Utc>, HashMap<ColumnId, Option<f64>>>;

/// Seedable in-memory snapshot store.
pub struct InMemorySnapshotStore {
    rows: DashMap<MachineId, MachineRows>,
    fetch_calls: AtomicU64,
    failing: AtomicBool,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            fetch_calls: AtomicU64::new(0),
            failing: AtomicBool::new(false),
        }
    }

    /// Seed one snapshot, merging column-wise with existing rows.
    pub fn insert(&self, machine_id: &MachineId, snapshot: Snapshot) {
        let mut rows = self.rows.entry(machine_id.clone()).or_default();
        let row = rows.entry(snapshot.taken_at).or_default();
        for (column, value) in snapshot.values {
            row.insert(column, value);
        }
    }

    /// Number of fetch calls served so far (first and range combined).
    pub fn fetch_calls(&self) -> u64 {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Make subsequent fetches fail with a remote error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record_call(&self) -> SourceResult<()> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Remote("injected failure".to_string()));
        }
        Ok(())
    }
}

impl Default for InMemorySnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn fetch_first(&self, machine_id: &MachineId) -> SourceResult<Fetched<Snapshot>> {
        self.record_call()?;

        let Some(rows) = self.rows.get(machine_id) else {
            return Ok(Fetched::NotYetProducing);
        };
        match rows.iter().next() {
            None => Ok(Fetched::NotYetProducing),
            Some((taken_at, row)) => Ok(Fetched::Available(Snapshot::new(
                *taken_at,
                row.clone(),
                false,
            ))),
        }
    }

    async fn fetch_range(
        &self,
        machine_id: &MachineId,
        columns: &[ColumnId],
        range: &TrendWindow,
    ) -> SourceResult<Fetched<Vec<Snapshot>>> {
        self.record_call()?;

        let Some(rows) = self.rows.get(machine_id) else {
            return Ok(Fetched::NotYetProducing);
        };
        if rows.is_empty() {
            return Ok(Fetched::NotYetProducing);
        }
        if range.from > range.to {
            return Ok(Fetched::Available(Vec::new()));
        }

        let snapshots = rows
            .range(range.from..=range.to)
            .map(|(taken_at, row)| {
                let values = columns
                    .iter()
                    .filter_map(|column| row.get(column).map(|value| (column.clone(), *value)))
                    .collect();
                Snapshot::new(*taken_at, values, false)
            })
            .collect();

        Ok(Fetched::Available(snapshots))
    }
}

/// Machine clock with manually set times.
pub struct ManualClock {
    times: DashMap<MachineId, DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            times: DashMap::new(),
        }
    }

    /// Set a machine's current time.
    pub fn set(&self, machine_id: &MachineId, now: DateTime<Utc>) {
        self.times.insert(machine_id.clone(), now);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MachineClock for ManualClock {
    async fn current_time(&self, machine_id: &MachineId) -> SourceResult<Option<DateTime<Utc>>> {
        Ok(self.times.get(machine_id).map(|entry| *entry.value()))
    }
}

/// Live update feed with a push handle per machine.
pub struct InMemoryLiveUpdates {
    senders: DashMap<MachineId, mpsc::Sender<LiveUpdate>>,
}

impl InMemoryLiveUpdates {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Deliver an update to a machine's subscriber, if one exists.
    ///
    /// Returns whether the update was accepted.
    pub async fn push(&self, machine_id: &MachineId, update: LiveUpdate) -> bool {
        let sender = self
            .senders
            .get(machine_id)
            .map(|entry| entry.value().clone());
        match sender {
            Some(sender) => sender.send(update).await.is_ok(),
            None => false,
        }
    }

    /// Whether a machine currently has a subscriber.
    pub fn has_subscriber(&self, machine_id: &MachineId) -> bool {
        self.senders.contains_key(machine_id)
    }
}

impl Default for InMemoryLiveUpdates {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LiveUpdateSource for InMemoryLiveUpdates {
    async fn subscribe(
        &self,
        machine_id: &MachineId,
    ) -> SourceResult<mpsc::Receiver<LiveUpdate>> {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER);
        self.senders.insert(machine_id.clone(), sender);
        Ok(receiver)
    }
}

/// Historic correction feed with a single push handle.
pub struct InMemoryCorrections {
    sender: Mutex<Option<mpsc::Sender<HistoricCorrection>>>,
}

impl InMemoryCorrections {
    pub fn new() -> Self {
        Self {
            sender: Mutex::new(None),
        }
    }

    /// Whether the feed currently has a subscriber.
    pub fn has_subscriber(&self) -> bool {
        self.sender
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Deliver a correction to the subscriber, if one exists.
    pub async fn push(&self, message: HistoricCorrection) -> bool {
        let sender = self
            .sender
            .lock()
            .ok()
            .and_then(|slot| slot.as_ref().cloned());
        match sender {
            Some(sender) => sender.send(message).await.is_ok(),
            None => false,
        }
    }
}

impl Default for InMemoryCorrections {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoricCorrectionSource for InMemoryCorrections {
    async fn subscribe(&self) -> SourceResult<mpsc::Receiver<HistoricCorrection>> {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER);
        match self.sender.lock() {
            Ok(mut slot) => {
                *slot = Some(sender);
                Ok(receiver)
            }
            Err(_) => Err(SourceError::Subscription(
                "correction feed lock poisoned".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
    }

    fn machine() -> MachineId {
        MachineId::new("press-01")
    }

    #[tokio::test]
    async fn empty_store_reports_not_yet_producing() {
        let store = InMemorySnapshotStore::new();
        let first = store.fetch_first(&machine()).await.unwrap();
        assert_eq!(first, Fetched::NotYetProducing);
    }

    #[tokio::test]
    async fn fetch_first_returns_oldest_row() {
        let store = InMemorySnapshotStore::new();
        store.insert(
            &machine(),
            Snapshot::at(at(10, 5)).with_value(ColumnId::new("pressure"), Some(2.0)),
        );
        store.insert(
            &machine(),
            Snapshot::at(at(10, 0)).with_value(ColumnId::new("pressure"), Some(1.0)),
        );

        match store.fetch_first(&machine()).await.unwrap() {
            Fetched::Available(snapshot) => assert_eq!(snapshot.taken_at, at(10, 0)),
            Fetched::NotYetProducing => panic!("expected a first snapshot"),
        }
    }

    #[tokio::test]
    async fn fetch_range_projects_requested_columns() {
        let store = InMemorySnapshotStore::new();
        store.insert(
            &machine(),
            Snapshot::at(at(10, 0))
                .with_value(ColumnId::new("pressure"), Some(1.0))
                .with_value(ColumnId::new("temperature"), Some(21.0)),
        );

        let range = TrendWindow::new(at(10, 0), at(10, 0));
        let fetched = store
            .fetch_range(&machine(), &[ColumnId::new("pressure")], &range)
            .await
            .unwrap();

        match fetched {
            Fetched::Available(snapshots) => {
                assert_eq!(snapshots.len(), 1);
                assert!(snapshots[0].values.contains_key(&ColumnId::new("pressure")));
                assert!(!snapshots[0]
                    .values
                    .contains_key(&ColumnId::new("temperature")));
            }
            Fetched::NotYetProducing => panic!("expected snapshots"),
        }
    }

    #[tokio::test]
    async fn failure_injection_turns_fetches_into_remote_errors() {
        let store = InMemorySnapshotStore::new();
        store.set_failing(true);
        assert!(store.fetch_first(&machine()).await.is_err());
    }

    #[tokio::test]
    async fn push_without_subscriber_is_rejected() {
        let live = InMemoryLiveUpdates::new();
        assert!(!live.push(&machine(), LiveUpdate::Cleared).await);

        let mut receiver = live.subscribe(&machine()).await.unwrap();
        assert!(live.push(&machine(), LiveUpdate::Cleared).await);
        assert!(matches!(receiver.recv().await, Some(LiveUpdate::Cleared)));
    }

    #[tokio::test]
    async fn corrections_reach_the_subscriber() {
        let corrections = InMemoryCorrections::new();
        let mut receiver = corrections.subscribe().await.unwrap();

        let delivered = corrections
            .push(HistoricCorrection {
                machine_id: machine(),
                columns: vec![ColumnId::new("pressure")],
                changed_from: at(9, 0),
                changed_to: at(9, 10),
            })
            .await;

        assert!(delivered);
        let message = receiver.recv().await.unwrap();
        assert_eq!(message.machine_id, machine());
    }
}
