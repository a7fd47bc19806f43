//! Status state machine shared by Units and (in aggregate) Assignments.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of a Unit, and the derived status of an Assignment.
///
/// State transitions (Unit):
/// - Created -> Launched              (admission)
/// - Launched -> Assigned             (a worker picked the unit up)
/// - Launched | Assigned -> Completed (worker finished)
/// - Launched | Assigned -> Expired   (disconnect, timeout, or shutdown reclaim)
/// - Created -> Expired               (expired before ever launching)
/// - Launched -> Created              (delivery rejected, admission reverted)
///
/// Completed and Expired are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentState {
    /// Persisted, waiting for admission.
    Created,

    /// Handed to the delivery provider; occupies an in-flight slot.
    Launched,

    /// A worker accepted the unit; still occupies its slot.
    Assigned,

    /// Worker interaction finished successfully.
    Completed,

    /// Never consumed, or reclaimed.
    Expired,
}

impl AssignmentState {
    pub const ALL: [AssignmentState; 5] = [
        AssignmentState::Created,
        AssignmentState::Launched,
        AssignmentState::Assigned,
        AssignmentState::Completed,
        AssignmentState::Expired,
    ];

    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, AssignmentState::Completed | AssignmentState::Expired)
    }

    /// Does a unit in this state hold an in-flight slot?
    pub fn is_in_flight(self) -> bool {
        matches!(self, AssignmentState::Launched | AssignmentState::Assigned)
    }

    /// Whether a unit may move from `self` to `next`.
    pub fn can_transition_to(self, next: AssignmentState) -> bool {
        use AssignmentState::*;
        matches!(
            (self, next),
            (Created, Launched)
                | (Created, Expired)
                | (Launched, Assigned)
                | (Launched, Completed)
                | (Launched, Expired)
                | (Launched, Created)
                | (Assigned, Completed)
                | (Assigned, Expired)
        )
    }

    /// Derive an assignment's status from its units' statuses.
    ///
    /// Precedence: when every unit is terminal the assignment is Completed if
    /// any unit completed, otherwise Expired. While work remains, Assigned
    /// beats Launched, and Launched beats Created as soon as any unit has
    /// left Created.
    pub fn derive<I>(unit_states: I) -> AssignmentState
    where
        I: IntoIterator<Item = AssignmentState>,
    {
        let mut all_terminal = true;
        let mut any_completed = false;
        let mut any_assigned = false;
        let mut any_progressed = false;
        let mut seen = false;

        for state in unit_states {
            seen = true;
            all_terminal &= state.is_terminal();
            any_completed |= state == AssignmentState::Completed;
            any_assigned |= state == AssignmentState::Assigned;
            any_progressed |= state != AssignmentState::Created;
        }

        if !seen {
            AssignmentState::Created
        } else if all_terminal {
            if any_completed {
                AssignmentState::Completed
            } else {
                AssignmentState::Expired
            }
        } else if any_assigned {
            AssignmentState::Assigned
        } else if any_progressed {
            AssignmentState::Launched
        } else {
            AssignmentState::Created
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssignmentState::Created => "created",
            AssignmentState::Launched => "launched",
            AssignmentState::Assigned => "assigned",
            AssignmentState::Completed => "completed",
            AssignmentState::Expired => "expired",
        }
    }
}

impl fmt::Display for AssignmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
