//! Sliding-window machine telemetry trend cache
//!
//! This crate keeps a per-machine, minute-resolution cache of sensor
//! columns warm for the machine's trailing trend window:
//!
//! - **TrendCache**: the ordered, minute-keyed store for one machine
//! - **TrendCacheManager**: the orchestrator: lazy backfill on reads,
//!   per-machine live update workers, a platform-wide historic correction
//!   worker, and window eviction
//! - **sources**: the collaborator seams (snapshot store, machine clock,
//!   live and correction feeds)
//! - **memory**: in-memory collaborators for development and testing
//!
//! The cache is purely in-memory and rebuildable from the snapshot store;
//! each process instance keeps its own.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod events;
pub mod manager;
pub mod memory;
pub mod sources;
pub mod store;

// Re-exports
pub use error::{Result, TrendError};
pub use events::TrendEvent;
pub use manager::TrendCacheManager;
pub use sources::{
    Fetched, HistoricCorrection, HistoricCorrectionSource, LiveUpdate, LiveUpdateSource,
    MachineClock, SnapshotStore, SourceError, SourceResult,
};
pub use store::TrendCache;
