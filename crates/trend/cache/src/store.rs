//! Per-machine trend cache store
//!
//! An ordered, minute-keyed store of column values for one machine. The
//! store is the unit of cached state: the manager owns one per tracked
//! machine and mutates it from the read path, the live worker, and the
//! correction worker.
//!
//! Concurrency: all operations take the interior lock for the duration of
//! the call and never await, so readers observe each minute row either
//! before or after a merge, never partially updated.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use trend_types::{ColumnId, Snapshot, TrendPoint, TrendSeries, TrendWindow};

use crate::error::{Result, TrendError};

type Row = BTreeMap<ColumnId, Option<f64>>;

/// Minute-keyed store of one machine's sensor columns.
#[derive(Debug, Default)]
pub struct TrendCache {
    entries: RwLock<BTreeMap<DateTime<Utc>, Row>>,
}

impl TrendCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.entries.read().map_err(|_| TrendError::Lock)?.is_empty())
    }

    /// Number of cached minute rows.
    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| TrendError::Lock)?.len())
    }

    /// Newest cached minute, or `None` while empty.
    pub fn latest(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .entries
            .read()
            .map_err(|_| TrendError::Lock)?
            .keys()
            .next_back()
            .copied())
    }

    /// Rows whose minute falls inside `window`, ascending.
    pub fn slice(&self, window: &TrendWindow) -> Result<TrendSeries> {
        let entries = self.entries.read().map_err(|_| TrendError::Lock)?;
        let points = entries
            .range(window.from..=window.to)
            .map(|(at, row)| TrendPoint {
                at: *at,
                values: row.clone(),
            })
            .collect();
        Ok(TrendSeries::new(points))
    }

    /// Merge a batch of snapshots.
    ///
    /// Each snapshot upserts the row at its timestamp for exactly the
    /// columns it carries; columns absent from the snapshot keep their
    /// cached value at that minute.
    pub fn merge(&self, snapshots: &[Snapshot]) -> Result<()> {
        if snapshots.is_empty() {
            return Ok(());
        }

        let mut entries = self.entries.write().map_err(|_| TrendError::Lock)?;
        for snapshot in snapshots {
            let row = entries.entry(snapshot.taken_at).or_default();
            for (column, value) in &snapshot.values {
                row.insert(column.clone(), *value);
            }
        }
        Ok(())
    }

    /// Drop all rows older than `from`. Returns the number removed.
    pub fn evict_before(&self, from: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().map_err(|_| TrendError::Lock)?;
        let keep = entries.split_off(&from);
        let removed = entries.len();
        *entries = keep;
        Ok(removed)
    }
}
