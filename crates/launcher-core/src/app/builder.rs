//! LauncherBuilder - wiring for a TaskLauncher.
//!
//! `build` fails fast when the provider is not the one the config names,
//! so a misconfigured launcher never gets as far as materializing anything.

use std::sync::Arc;

use crate::app::config::LauncherConfig;
use crate::app::launcher::TaskLauncher;
use crate::domain::TaskRun;
use crate::error::{LauncherError, Result};
use crate::ports::{Clock, DeliveryProvider, EntityStore, IdGenerator, SystemClock, UlidGenerator};

/// # Example
/// ```ignore
/// let launcher = LauncherBuilder::new(task_run, store, provider)
///     .max_num_concurrent_units(4)
///     .build()?;
/// ```
pub struct LauncherBuilder {
    task_run: Arc<TaskRun>,
    store: Arc<dyn EntityStore>,
    provider: Arc<dyn DeliveryProvider>,
    config: LauncherConfig,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
}

impl LauncherBuilder {
    pub fn new(
        task_run: Arc<TaskRun>,
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn DeliveryProvider>,
    ) -> Self {
        Self {
            task_run,
            store,
            provider,
            config: LauncherConfig::default(),
            clock: Arc::new(SystemClock),
            ids: None,
        }
    }

    pub fn config(mut self, config: LauncherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn max_num_concurrent_units(mut self, max: usize) -> Self {
        self.config.max_num_concurrent_units = max;
        self
    }

    /// Time source for timestamps (and ids, unless `id_generator` is set).
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn build(self) -> Result<TaskLauncher> {
        let actual = self.provider.provider_type();
        if actual != self.config.provider_type {
            return Err(LauncherError::ProviderMismatch {
                expected: self.config.provider_type,
                actual,
            });
        }

        let clock = self.clock;
        let ids: Arc<dyn IdGenerator> = match self.ids {
            Some(ids) => ids,
            None => Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        };

        Ok(TaskLauncher::from_parts(
            self.task_run,
            self.config,
            self.store,
            self.provider,
            clock,
            ids,
        ))
    }
}
