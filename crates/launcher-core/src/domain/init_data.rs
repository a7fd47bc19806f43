//! InitializationData: the caller-supplied description of one assignment.

use serde::{Deserialize, Serialize};

/// One unit-of-work bundle.
///
/// The launcher never looks inside the payloads. It only needs
/// `unit_data.len()` to know how many units to create, and hands each entry
/// to its unit untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitializationData {
    /// Metadata shared by every unit of the assignment.
    #[serde(default)]
    pub shared: serde_json::Value,

    /// One payload per unit, in delivery order.
    pub unit_data: Vec<serde_json::Value>,
}

impl InitializationData {
    pub fn new(shared: serde_json::Value, unit_data: Vec<serde_json::Value>) -> Self {
        Self { shared, unit_data }
    }

    /// Number of units this record expands into.
    pub fn unit_count(&self) -> usize {
        self.unit_data.len()
    }
}
