//! Assignment record: a group of units created from one InitializationData.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssignmentId, TaskRunId, UnitId};
use super::state::AssignmentState;

/// Assignment record.
///
/// The status is never set directly; it is derived from the units with
/// `update_status_from_units` (same pattern as a job aggregating its tasks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub task_run_id: TaskRunId,

    /// Units in the order of the record's `unit_data`.
    pub unit_ids: Vec<UnitId>,

    /// `InitializationData::shared`, kept for whoever serves the units.
    pub shared: serde_json::Value,

    pub status: AssignmentState,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(
        id: AssignmentId,
        task_run_id: TaskRunId,
        shared: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            task_run_id,
            unit_ids: Vec::new(),
            shared,
            status: AssignmentState::Created,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_unit(&mut self, unit_id: UnitId) {
        self.unit_ids.push(unit_id);
    }

    /// Recompute the status from unit states. Returns whether it changed.
    pub fn update_status_from_units(
        &mut self,
        unit_states: &[AssignmentState],
        now: DateTime<Utc>,
    ) -> bool {
        let derived = AssignmentState::derive(unit_states.iter().copied());
        if derived == self.status {
            return false;
        }
        self.status = derived;
        self.updated_at = now;
        true
    }
}
