//! Error types for the trend cache crate
//!
//! "Not yet producing" is deliberately absent: a machine without a first
//! sample is an expected state surfaced as [`TrendData::NoDataYet`], never
//! as an error.
//!
//! [`TrendData::NoDataYet`]: trend_types::TrendData::NoDataYet

use thiserror::Error;
use trend_types::MachineId;

use crate::sources::SourceError;

/// Errors surfaced by the trend cache read path.
#[derive(Debug, Error)]
pub enum TrendError {
    /// The machine clock cannot resolve a current time; without it no trend
    /// window can be computed.
    #[error("machine clock unknown for {0}")]
    ClockUnknown(MachineId),

    /// A remote collaborator call failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The caller cancelled the read.
    #[error("trend read cancelled")]
    Cancelled,

    /// A cache lock was poisoned.
    #[error("trend cache lock poisoned")]
    Lock,
}

/// Result type for trend cache operations.
pub type Result<T> = std::result::Result<T, TrendError>;
