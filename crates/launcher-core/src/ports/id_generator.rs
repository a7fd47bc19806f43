//! IdGenerator port - id allocation for runs, assignments and units.

use crate::domain::ids::{AssignmentId, TaskRunId, UnitId};
use crate::ports::Clock;
use ulid::Ulid;

/// IdGenerator hands out fresh identifiers.
///
/// `Send + Sync` because the launcher shares it across tasks.
pub trait IdGenerator: Send + Sync {
    fn generate_task_run_id(&self) -> TaskRunId;

    fn generate_assignment_id(&self) -> AssignmentId;

    fn generate_unit_id(&self) -> UnitId;
}

/// ULID-based generator.
///
/// The timestamp half comes from the clock, so a `FixedClock` pins it while
/// the random half keeps ids unique.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_run_id(&self) -> TaskRunId {
        TaskRunId::from(self.next_ulid())
    }

    fn generate_assignment_id(&self) -> AssignmentId {
        AssignmentId::from(self.next_ulid())
    }

    fn generate_unit_id(&self) -> UnitId {
        UnitId::from(self.next_ulid())
    }
}
