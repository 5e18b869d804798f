//! Trend series returned to readers
//!
//! The aggregation layer renders a chart from an ordered series of minute
//! rows. Every requested column is present in every row, with `None` marking
//! minutes where the column has no value, so consumers can distinguish "no
//! data yet" from "not requested".

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ColumnId;

/// One minute row of a trend series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    /// Minute this row describes.
    pub at: DateTime<Utc>,

    /// Value per column, `None` for an explicit null.
    pub values: BTreeMap<ColumnId, Option<f64>>,
}

/// An ordered (ascending by minute) series of trend points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrendSeries {
    pub points: Vec<TrendPoint>,
}

impl TrendSeries {
    pub fn new(points: Vec<TrendPoint>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Newest row of the series.
    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.last()
    }
}

/// Read-path result for a machine's trend.
///
/// `NoDataYet` means the machine has never produced a sample. It is an
/// expected state, not a failure; callers render a fully-null series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TrendData {
    /// Cached series for the current window.
    Series(TrendSeries),

    /// The machine has not produced its first sample yet.
    NoDataYet,
}

impl TrendData {
    pub fn is_no_data(&self) -> bool {
        matches!(self, TrendData::NoDataYet)
    }

    /// The contained series, if any.
    pub fn into_series(self) -> Option<TrendSeries> {
        match self {
            TrendData::Series(series) => Some(series),
            TrendData::NoDataYet => None,
        }
    }
}
