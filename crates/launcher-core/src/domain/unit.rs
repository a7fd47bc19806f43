//! Unit record: the schedulable atom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{AssignmentId, TaskRunId, UnitId};
use super::state::AssignmentState;
use super::task_run::ProviderType;

/// What a provider hands back after a successful launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchHandle {
    pub provider_type: ProviderType,

    /// Provider-side identifier (HIT id, job id, ...).
    pub external_id: String,

    /// Where a worker reaches the unit, if the provider exposes one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AssignmentState,
    pub to: AssignmentState,
}

/// A single unit of work inside an assignment.
///
/// Design:
/// - The store owns the authoritative status; this record mirrors it.
/// - All status changes go through `transition`, never a field write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    pub assignment_id: AssignmentId,
    pub task_run_id: TaskRunId,

    /// Position inside the owning assignment.
    pub unit_index: usize,

    pub pay_amount: f64,

    /// Opaque payload taken from `InitializationData::unit_data`.
    pub payload: serde_json::Value,

    pub status: AssignmentState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_handle: Option<LaunchHandle>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Unit {
    pub fn new(
        id: UnitId,
        assignment_id: AssignmentId,
        task_run_id: TaskRunId,
        unit_index: usize,
        pay_amount: f64,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            assignment_id,
            task_run_id,
            unit_index,
            pay_amount,
            payload,
            status: AssignmentState::Created,
            launch_handle: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`.
    ///
    /// Returns `Ok(false)` when the unit is already in `next` and `next` is
    /// terminal, so re-expiring is a no-op rather than an error.
    pub fn transition(
        &mut self,
        next: AssignmentState,
        now: DateTime<Utc>,
    ) -> Result<bool, InvalidTransition> {
        if self.status == next && next.is_terminal() {
            return Ok(false);
        }
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next == AssignmentState::Created {
            // reverted admission: the old handle is meaningless now
            self.launch_handle = None;
        }
        self.updated_at = now;
        Ok(true)
    }

    pub fn attach_handle(&mut self, handle: LaunchHandle, now: DateTime<Utc>) {
        self.launch_handle = Some(handle);
        self.updated_at = now;
    }
}
