//! TaskRun: one execution context under which assignments and units are created.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::ids::TaskRunId;

/// Name of a delivery provider ("mock", "mturk", "mturk_sandbox", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderType(String);

impl ProviderType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ProviderType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Per-run settings the launcher copies onto the units it creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRunConfig {
    /// Paid per unit; becomes `Unit::pay_amount`.
    #[serde(default)]
    pub task_reward: f64,

    /// How long a worker may hold an assigned unit.
    #[serde(default = "default_assignment_duration")]
    pub assignment_duration: Duration,
}

fn default_assignment_duration() -> Duration {
    Duration::from_secs(30 * 60)
}

impl Default for TaskRunConfig {
    fn default() -> Self {
        Self {
            task_reward: 0.0,
            assignment_duration: default_assignment_duration(),
        }
    }
}

/// Immutable identity of one run. The launcher holds it behind an `Arc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    pub id: TaskRunId,
    pub provider_type: ProviderType,
    #[serde(default)]
    pub config: TaskRunConfig,
}

impl TaskRun {
    pub fn new(id: TaskRunId, provider_type: impl Into<ProviderType>, config: TaskRunConfig) -> Self {
        Self {
            id,
            provider_type: provider_type.into(),
            config,
        }
    }
}
