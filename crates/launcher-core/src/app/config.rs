//! Launcher configuration

use serde::{Deserialize, Serialize};

use crate::domain::ProviderType;
use crate::impls::mock_provider::MOCK_PROVIDER_TYPE;
use crate::options::{DescribeOptions, OptionGroup, OptionKind, OptionSpec};

/// Launcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Max units launched at once (0 = unbounded)
    #[serde(default = "default_max_num_concurrent_units")]
    pub max_num_concurrent_units: usize,

    /// Provider the launcher delivers through; task runs must match it
    #[serde(default = "default_provider_type")]
    pub provider_type: ProviderType,
}

fn default_max_num_concurrent_units() -> usize {
    0
}

fn default_provider_type() -> ProviderType {
    ProviderType::new(MOCK_PROVIDER_TYPE)
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            max_num_concurrent_units: default_max_num_concurrent_units(),
            provider_type: default_provider_type(),
        }
    }
}

impl LauncherConfig {
    pub fn new(provider_type: impl Into<ProviderType>) -> Self {
        Self {
            provider_type: provider_type.into(),
            ..Self::default()
        }
    }

    pub fn with_max_num_concurrent_units(mut self, max: usize) -> Self {
        self.max_num_concurrent_units = max;
        self
    }

    /// In-flight bound, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match self.max_num_concurrent_units {
            0 => None,
            n => Some(n),
        }
    }
}

impl DescribeOptions for LauncherConfig {
    fn describe_options() -> OptionGroup {
        OptionGroup::new("TaskLauncher")
            .description("Admission control for unit launches.")
            .option(
                OptionSpec::new("max_num_concurrent_units", OptionKind::Int)
                    .help("units allowed in flight at once (0 for no limit)")
                    .default_value(default_max_num_concurrent_units()),
            )
            .option(
                OptionSpec::new("provider_type", OptionKind::Str)
                    .help("delivery provider the task run must use")
                    .default_value(MOCK_PROVIDER_TYPE),
            )
    }
}
