//! Per-minute sensor snapshots
//!
//! A snapshot is one sample of a machine's tracked sensor columns. Snapshots
//! are immutable once received; the cache merges them column by column.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ColumnId;
use crate::window::floor_to_minute;

/// One sample of a machine's sensor columns.
///
/// A column mapped to `None` carries an explicit null ("no value at this
/// minute"); a column absent from `values` was simply not part of this
/// sample and must not overwrite cached data when merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the sample was taken.
    pub taken_at: DateTime<Utc>,

    /// Sampled value per column, `None` for an explicit null.
    pub values: HashMap<ColumnId, Option<f64>>,

    /// Sample was produced from virtual (simulated) time rather than
    /// wall-clock time.
    pub virtual_time: bool,
}

impl Snapshot {
    pub fn new(
        taken_at: DateTime<Utc>,
        values: HashMap<ColumnId, Option<f64>>,
        virtual_time: bool,
    ) -> Self {
        Self {
            taken_at,
            values,
            virtual_time,
        }
    }

    /// An empty snapshot at `taken_at`, for incremental construction.
    pub fn at(taken_at: DateTime<Utc>) -> Self {
        Self {
            taken_at,
            values: HashMap::new(),
            virtual_time: false,
        }
    }

    /// Add one column value.
    pub fn with_value(mut self, column: ColumnId, value: Option<f64>) -> Self {
        self.values.insert(column, value);
        self
    }

    /// Whether the sample sits on a whole-minute boundary.
    pub fn is_minute_aligned(&self) -> bool {
        floor_to_minute(self.taken_at) == self.taken_at
    }
}
