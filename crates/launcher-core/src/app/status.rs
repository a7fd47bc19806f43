//! Status - launcher snapshot for logs and callers.

use serde::{Deserialize, Serialize};

use crate::domain::AssignmentState;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateCounts {
    pub created: usize,
    pub launched: usize,
    pub assigned: usize,
    pub completed: usize,
    pub expired: usize,
}

impl StateCounts {
    pub fn record(&mut self, state: AssignmentState) {
        match state {
            AssignmentState::Created => self.created += 1,
            AssignmentState::Launched => self.launched += 1,
            AssignmentState::Assigned => self.assigned += 1,
            AssignmentState::Completed => self.completed += 1,
            AssignmentState::Expired => self.expired += 1,
        }
    }

    pub fn get(&self, state: AssignmentState) -> usize {
        match state {
            AssignmentState::Created => self.created,
            AssignmentState::Launched => self.launched,
            AssignmentState::Assigned => self.assigned,
            AssignmentState::Completed => self.completed,
            AssignmentState::Expired => self.expired,
        }
    }

    pub fn total(&self) -> usize {
        AssignmentState::ALL.iter().map(|s| self.get(*s)).sum()
    }

    /// Launched + Assigned.
    pub fn in_flight(&self) -> usize {
        self.launched + self.assigned
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.expired
    }
}

impl FromIterator<AssignmentState> for StateCounts {
    fn from_iter<I: IntoIterator<Item = AssignmentState>>(iter: I) -> Self {
        let mut counts = StateCounts::default();
        for state in iter {
            counts.record(state);
        }
        counts
    }
}

/// Point-in-time view of a launcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherStatus {
    pub units: StateCounts,
    pub assignments: StateCounts,

    /// Members of the in-flight set right now.
    pub in_flight: usize,
    pub peak_in_flight: usize,

    /// `None` = unbounded.
    pub capacity: Option<usize>,

    /// Units waiting for admission.
    pub pending: usize,

    /// `expire_all` has run; nothing will be admitted again.
    pub closed: bool,
}
