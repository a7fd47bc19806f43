//! launcher-core
//!
//! Admission-controlled launching of task units.
//!
//! # Modules
//! - **domain**: ids, task runs, initialization data, assignments, units, status
//! - **ports**: EntityStore, DeliveryProvider, Clock, IdGenerator
//! - **app**: TaskLauncher and its in-flight bound
//! - **impls**: InMemoryEntityStore, MockProvider
//! - **options**: option schema for configurable components

pub mod app;
pub mod domain;
pub mod error;
pub mod impls;
pub mod options;
pub mod ports;

pub use app::{ExpireReport, LaunchSummary, LauncherBuilder, LauncherConfig, TaskLauncher};
pub use error::{LauncherError, Result};
