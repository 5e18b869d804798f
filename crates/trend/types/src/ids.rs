//! Strongly-typed identifiers for telemetry entities
//!
//! Machine ids are assigned by the upstream asset platform and treated as
//! opaque strings. Column ids name the sensor columns a machine reports.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a machine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MachineId(String);

impl MachineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MachineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "machine:{}", self.0)
    }
}

/// Identifier for a sensor column
///
/// Ordered so that per-minute rows iterate their columns deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "column:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_id_generation() {
        let id1 = MachineId::generate();
        let id2 = MachineId::generate();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_machine_id_display() {
        let id = MachineId::new("press-07");
        assert_eq!(format!("{}", id), "machine:press-07");
    }

    #[test]
    fn test_column_id_ordering() {
        let a = ColumnId::new("pressure");
        let b = ColumnId::new("temperature");
        assert!(a < b);
    }
}
