//! Trend cache configuration
//!
//! Span length and minute granularity are fixed constants of the deployment;
//! the trending column set is an allow-list known at startup.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ids::ColumnId;

/// Configuration for the trend cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendConfig {
    /// Length of the trailing trend window, in minutes.
    pub span_minutes: u32,

    /// Columns tracked for trending.
    pub columns: Vec<ColumnId>,

    /// Capacity of the manager's broadcast event channel.
    pub event_capacity: usize,

    /// Buffer size of per-machine live update subscriptions.
    pub live_buffer: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            span_minutes: 480, // 8 hours
            columns: Vec::new(),
            event_capacity: 1024,
            live_buffer: 64,
        }
    }
}

impl TrendConfig {
    /// Default configuration with the given trending columns.
    pub fn with_columns(columns: Vec<ColumnId>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    /// The trend span as a duration.
    pub fn span(&self) -> Duration {
        Duration::minutes(i64::from(self.span_minutes))
    }

    /// Upper bound on cached entries per machine (one per minute slot).
    pub fn max_entries(&self) -> usize {
        self.span_minutes as usize
    }

    /// Whether `column` is part of the trending allow-list.
    pub fn tracks(&self, column: &ColumnId) -> bool {
        self.columns.contains(column)
    }
}
