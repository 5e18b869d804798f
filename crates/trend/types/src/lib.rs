//! Core types for the machine telemetry trend cache
//!
//! This crate defines the data model shared between the trend cache and its
//! consumers:
//!
//! - **Identifiers**: strongly-typed machine and column ids
//! - **Snapshot**: one minute-aligned sample of tracked sensor columns
//! - **TrendWindow**: the trailing time range considered live for a machine
//! - **TrendSeries**: the ordered series returned to readers
//! - **TrendConfig**: deployment-fixed span and column allow-list

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod ids;
pub mod series;
pub mod snapshot;
pub mod window;

// Re-exports
pub use config::TrendConfig;
pub use ids::{ColumnId, MachineId};
pub use series::{TrendData, TrendPoint, TrendSeries};
pub use snapshot::Snapshot;
pub use window::{floor_to_minute, TrendWindow};
