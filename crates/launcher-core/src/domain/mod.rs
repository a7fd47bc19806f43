//! Domain model (ids, task runs, initialization data, assignments, units, status).

pub mod assignment;
pub mod ids;
pub mod init_data;
pub mod state;
pub mod task_run;
pub mod unit;

pub use assignment::Assignment;
pub use ids::{AssignmentId, Id, IdMarker, TaskRunId, UnitId};
pub use init_data::InitializationData;
pub use state::AssignmentState;
pub use task_run::{ProviderType, TaskRun, TaskRunConfig};
pub use unit::{InvalidTransition, LaunchHandle, Unit};
