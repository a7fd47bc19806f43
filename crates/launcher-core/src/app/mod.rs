//! App - wiring of ports into the launcher.
//!
//! # Components
//! - **LauncherBuilder**: construction and fail-fast checks
//! - **TaskLauncher**: materialize / launch / outcomes / expire_all
//! - **InFlightSet**: the capacity bound
//! - **LauncherConfig**, **LauncherStatus**

pub mod builder;
pub mod capacity;
pub mod config;
pub mod launcher;
pub mod status;

pub use self::builder::LauncherBuilder;
pub use self::capacity::{CapacityError, InFlightSet};
pub use self::config::LauncherConfig;
pub use self::launcher::{ExpireReport, LaunchSummary, Materialized, TaskLauncher};
pub use self::status::{LauncherStatus, StateCounts};
