//! Trend cache manager
//!
//! The manager owns the registry of per-machine trend caches and keeps each
//! cache warm for its machine's trailing trend window through three paths:
//!
//! - **Lazy backfill** on the read path, fetching from the snapshot store
//!   only what the cache is missing
//! - **Live updates**, one worker task per machine consuming its sample
//!   feed in arrival order
//! - **Historic corrections**, one platform-wide worker re-fetching exactly
//!   the revised columns and minutes that still fall inside the window
//!
//! Entries older than the window are evicted after every mutation, bounding
//! memory to one window's worth of rows per machine.

use std::sync::{Arc, Mutex, Weak};

use chrono::Duration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use trend_types::{
    floor_to_minute, ColumnId, MachineId, Snapshot, TrendConfig, TrendData, TrendWindow,
};

use crate::error::{Result, TrendError};
use crate::events::TrendEvent;
use crate::sources::{
    Fetched, HistoricCorrection, HistoricCorrectionSource, LiveUpdate, LiveUpdateSource,
    MachineClock, SnapshotStore,
};
use crate::store::TrendCache;

/// A cache whose newest row is less than this many minutes behind the window
/// end is current; the next live tick covers the difference.
const FRESH_GAP_MINUTES: i64 = 2;

/// Orchestrator for per-machine trend caches.
pub struct TrendCacheManager {
    /// Configuration.
    config: TrendConfig,

    /// Authoritative current time per machine.
    clock: Arc<dyn MachineClock>,

    /// Authoritative snapshot history.
    snapshots: Arc<dyn SnapshotStore>,

    /// Live sample feed.
    live: Arc<dyn LiveUpdateSource>,

    /// Historic correction feed.
    corrections: Arc<dyn HistoricCorrectionSource>,

    /// Per-machine caches, created on first read.
    caches: DashMap<MachineId, Arc<TrendCache>>,

    /// Per-machine live worker handles.
    live_workers: DashMap<MachineId, JoinHandle<()>>,

    /// Platform-wide correction worker handle.
    correction_worker: Mutex<Option<JoinHandle<()>>>,

    /// Event broadcaster.
    event_tx: broadcast::Sender<TrendEvent>,
}

impl TrendCacheManager {
    /// Create a new manager over the given collaborators.
    pub fn new(
        config: TrendConfig,
        clock: Arc<dyn MachineClock>,
        snapshots: Arc<dyn SnapshotStore>,
        live: Arc<dyn LiveUpdateSource>,
        corrections: Arc<dyn HistoricCorrectionSource>,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        Arc::new(Self {
            config,
            clock,
            snapshots,
            live,
            corrections,
            caches: DashMap::new(),
            live_workers: DashMap::new(),
            correction_worker: Mutex::new(None),
            event_tx,
        })
    }

    /// Subscribe to manager events.
    pub fn subscribe_events(&self) -> broadcast::Receiver<TrendEvent> {
        self.event_tx.subscribe()
    }

    /// Machines with an active trend cache.
    pub fn tracked_machines(&self) -> Vec<MachineId> {
        self.caches.iter().map(|r| r.key().clone()).collect()
    }

    /// Whether a machine currently has a trend cache.
    pub fn is_tracked(&self, machine_id: &MachineId) -> bool {
        self.caches.contains_key(machine_id)
    }

    /// The trend window currently valid for a machine.
    ///
    /// Recomputed from the machine clock on every call; "now" moves
    /// continuously, so the window is never cached.
    #[instrument(skip(self))]
    pub async fn current_trend_window(&self, machine_id: &MachineId) -> Result<TrendWindow> {
        let now = self
            .clock
            .current_time(machine_id)
            .await?
            .ok_or_else(|| TrendError::ClockUnknown(machine_id.clone()))?;

        Ok(TrendWindow::ending_at(now, self.config.span()))
    }

    /// Read a machine's trend for its current window.
    ///
    /// Creates the machine's cache and subscriptions on first read, then
    /// serves from the cache, backfilling from the snapshot store only when
    /// the cache is empty. A machine that has not produced its first sample
    /// yields [`TrendData::NoDataYet`] rather than an error.
    pub async fn get(
        self: &Arc<Self>,
        machine_id: &MachineId,
        cancel: &CancellationToken,
    ) -> Result<TrendData> {
        let window = self
            .with_cancel(cancel, self.current_trend_window(machine_id))
            .await?;

        let cache = self.cache_for(machine_id);

        if cache.is_empty()? {
            let filled = self
                .with_cancel(
                    cancel,
                    self.try_fill_latest_gaps(machine_id, &cache, &window),
                )
                .await?;

            if !filled {
                debug!(machine_id = %machine_id, "No samples produced yet");
                return Ok(TrendData::NoDataYet);
            }

            self.evict(machine_id, &cache, &window)?;
        }

        Ok(TrendData::Series(cache.slice(&window)?))
    }

    /// Tear down all workers and drop every cache.
    pub fn shutdown(&self) {
        info!("Shutting down trend cache manager");

        for item in self.live_workers.iter() {
            item.value().abort();
        }
        self.live_workers.clear();

        if let Ok(mut slot) = self.correction_worker.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }

        self.caches.clear();
    }

    /// Race a remote call against the caller's cancellation signal.
    async fn with_cancel<T>(
        &self,
        cancel: &CancellationToken,
        operation: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        tokio::select! {
            _ = cancel.cancelled() => Err(TrendError::Cancelled),
            result = operation => result,
        }
    }

    /// Get or create a machine's cache, registering its subscriptions on
    /// first creation.
    fn cache_for(self: &Arc<Self>, machine_id: &MachineId) -> Arc<TrendCache> {
        let cache = self
            .caches
            .entry(machine_id.clone())
            .or_insert_with(|| Arc::new(TrendCache::new()))
            .clone();

        self.ensure_workers(machine_id);
        cache
    }

    /// Start the machine's live worker and the shared correction worker.
    ///
    /// The entry guards make registration single-shot: one worker per
    /// machine and one correction worker per manager, even when racing
    /// reads create the cache concurrently.
    fn ensure_workers(self: &Arc<Self>, machine_id: &MachineId) {
        if let Entry::Vacant(slot) = self.live_workers.entry(machine_id.clone()) {
            let manager = Arc::downgrade(self);
            let live = Arc::clone(&self.live);
            let id = machine_id.clone();

            slot.insert(tokio::spawn(async move {
                run_live_worker(manager, live, id).await;
            }));

            info!(machine_id = %machine_id, "Tracking machine trend");
            let _ = self
                .event_tx
                .send(TrendEvent::MachineTracked(machine_id.clone()));
        }

        let Ok(mut slot) = self.correction_worker.lock() else {
            return;
        };
        if slot.is_none() {
            let manager = Arc::downgrade(self);
            let corrections = Arc::clone(&self.corrections);

            *slot = Some(tokio::spawn(async move {
                run_correction_worker(manager, corrections).await;
            }));
        }
    }

    /// Bring `cache` up to date with `window`, fetching only what is
    /// missing.
    ///
    /// Returns `false` when the machine has not produced its first sample
    /// yet; that state is expected and not an error. Any other remote
    /// failure propagates.
    async fn try_fill_latest_gaps(
        &self,
        machine_id: &MachineId,
        cache: &TrendCache,
        window: &TrendWindow,
    ) -> Result<bool> {
        match cache.latest()? {
            None => {
                let first = match self.snapshots.fetch_first(machine_id).await? {
                    Fetched::NotYetProducing => {
                        debug!(machine_id = %machine_id, "Machine not yet producing snapshots");
                        return Ok(false);
                    }
                    Fetched::Available(first) => first,
                };

                // Never ask for data older than what exists.
                let from = window.from.max(floor_to_minute(first.taken_at));
                let fetch = TrendWindow::new(from, window.to);

                match self
                    .snapshots
                    .fetch_range(machine_id, &self.config.columns, &fetch)
                    .await?
                {
                    Fetched::NotYetProducing => Ok(false),
                    Fetched::Available(snapshots) => {
                        self.merge_batch(machine_id, cache, &fetch, &snapshots)?;
                        Ok(true)
                    }
                }
            }
            Some(latest) => {
                let gap = window.to - latest;
                if gap < Duration::minutes(FRESH_GAP_MINUTES) {
                    return Ok(true);
                }

                // Re-fetch from the last cached minute to close any
                // partial-minute race with the live feed.
                let fetch = TrendWindow::new(latest, window.to);

                match self
                    .snapshots
                    .fetch_range(machine_id, &self.config.columns, &fetch)
                    .await?
                {
                    Fetched::NotYetProducing => Ok(true),
                    Fetched::Available(snapshots) => {
                        self.merge_batch(machine_id, cache, &fetch, &snapshots)?;
                        Ok(true)
                    }
                }
            }
        }
    }

    fn merge_batch(
        &self,
        machine_id: &MachineId,
        cache: &TrendCache,
        range: &TrendWindow,
        snapshots: &[Snapshot],
    ) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        cache.merge(snapshots)?;

        debug!(
            machine_id = %machine_id,
            from = %range.from,
            to = %range.to,
            points = snapshots.len(),
            "Backfilled trend cache"
        );
        let _ = self.event_tx.send(TrendEvent::BackfillCompleted {
            machine_id: machine_id.clone(),
            from: range.from,
            to: range.to,
            points: snapshots.len(),
        });

        Ok(())
    }

    fn evict(&self, machine_id: &MachineId, cache: &TrendCache, window: &TrendWindow) -> Result<()> {
        let removed = cache.evict_before(window.from)?;
        if removed > 0 {
            debug!(machine_id = %machine_id, removed = removed, "Evicted rows outside trend window");
            let _ = self.event_tx.send(TrendEvent::Evicted {
                machine_id: machine_id.clone(),
                removed,
            });
        }
        Ok(())
    }

    /// Handle one live update for a machine.
    ///
    /// Called from the machine's worker task, so updates for one machine
    /// are applied strictly in arrival order.
    async fn apply_live_update(&self, machine_id: &MachineId, update: LiveUpdate) {
        match update {
            LiveUpdate::Cleared => {
                if self.caches.remove(machine_id).is_some() {
                    info!(
                        machine_id = %machine_id,
                        "Machine state reset upstream, dropping cached trend"
                    );
                    let _ = self
                        .event_tx
                        .send(TrendEvent::CacheCleared(machine_id.clone()));
                }
            }
            LiveUpdate::Sample { snapshot, minutely } => {
                if !minutely {
                    // Sub-minute samples are below the cache's resolution.
                    return;
                }

                if let Err(error) = self.apply_live_sample(machine_id, snapshot).await {
                    warn!(machine_id = %machine_id, error = %error, "Skipping live tick");
                    let _ = self.event_tx.send(TrendEvent::LiveTickSkipped {
                        machine_id: machine_id.clone(),
                        reason: error.to_string(),
                    });
                }
            }
        }
    }

    async fn apply_live_sample(&self, machine_id: &MachineId, snapshot: Snapshot) -> Result<()> {
        let window = TrendWindow::ending_at(snapshot.taken_at, self.config.span());

        // A machine whose cache was cleared by a reset rebuilds here, paying
        // the first-snapshot fetch again.
        let cache = self
            .caches
            .entry(machine_id.clone())
            .or_insert_with(|| Arc::new(TrendCache::new()))
            .clone();

        // Catch up on anything missed since the last processed tick.
        self.try_fill_latest_gaps(machine_id, &cache, &window)
            .await?;

        cache.merge(std::slice::from_ref(&snapshot))?;
        self.evict(machine_id, &cache, &window)?;

        debug!(machine_id = %machine_id, at = %snapshot.taken_at, "Applied live sample");
        let _ = self.event_tx.send(TrendEvent::LiveSampleApplied {
            machine_id: machine_id.clone(),
            at: snapshot.taken_at,
        });

        Ok(())
    }

    /// Handle one historic correction message.
    async fn apply_correction(&self, message: &HistoricCorrection) -> Result<()> {
        // Only machines somebody reads are corrected.
        let Some(cache) = self
            .caches
            .get(&message.machine_id)
            .map(|entry| Arc::clone(entry.value()))
        else {
            return Ok(());
        };

        let affected: Vec<ColumnId> = message
            .columns
            .iter()
            .filter(|column| self.config.tracks(column))
            .cloned()
            .collect();
        if affected.is_empty() {
            return Ok(());
        }

        let window = self.current_trend_window(&message.machine_id).await?;
        let changed = TrendWindow::new(
            floor_to_minute(message.changed_from),
            floor_to_minute(message.changed_to),
        );
        let Some(overlap) = window.overlap(&changed) else {
            debug!(
                machine_id = %message.machine_id,
                "Correction outside live window, ignoring"
            );
            return Ok(());
        };

        match self
            .snapshots
            .fetch_range(&message.machine_id, &affected, &overlap)
            .await?
        {
            Fetched::NotYetProducing => Ok(()),
            Fetched::Available(snapshots) => {
                cache.merge(&snapshots)?;
                self.evict(&message.machine_id, &cache, &window)?;

                info!(
                    machine_id = %message.machine_id,
                    from = %overlap.from,
                    to = %overlap.to,
                    columns = affected.len(),
                    "Applied historic correction"
                );
                let _ = self.event_tx.send(TrendEvent::CorrectionApplied {
                    machine_id: message.machine_id.clone(),
                    from: overlap.from,
                    to: overlap.to,
                    columns: affected.len(),
                });

                Ok(())
            }
        }
    }
}

impl Drop for TrendCacheManager {
    fn drop(&mut self) {
        for item in self.live_workers.iter() {
            item.value().abort();
        }
        if let Ok(mut slot) = self.correction_worker.lock() {
            if let Some(handle) = slot.take() {
                handle.abort();
            }
        }
    }
}

/// Consume one machine's live feed, one update at a time.
///
/// The worker holds the manager weakly: it exits once the manager is gone,
/// and a failure on one machine's feed never affects another machine.
async fn run_live_worker(
    manager: Weak<TrendCacheManager>,
    live: Arc<dyn LiveUpdateSource>,
    machine_id: MachineId,
) {
    let mut updates = match live.subscribe(&machine_id).await {
        Ok(updates) => updates,
        Err(error) => {
            warn!(machine_id = %machine_id, error = %error, "Live update subscription failed");
            return;
        }
    };

    while let Some(update) = updates.recv().await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        manager.apply_live_update(&machine_id, update).await;
    }

    debug!(machine_id = %machine_id, "Live update stream closed");
}

/// Consume the platform-wide historic correction feed.
async fn run_correction_worker(
    manager: Weak<TrendCacheManager>,
    corrections: Arc<dyn HistoricCorrectionSource>,
) {
    let mut messages = match corrections.subscribe().await {
        Ok(messages) => messages,
        Err(error) => {
            warn!(error = %error, "Historic correction subscription failed");
            return;
        }
    };

    while let Some(message) = messages.recv().await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        if let Err(error) = manager.apply_correction(&message).await {
            warn!(
                machine_id = %message.machine_id,
                error = %error,
                "Skipping historic correction"
            );
        }
    }

    debug!("Historic correction stream closed");
}
