//! TaskLauncher - materialize work, launch it under a concurrency bound,
//! expire whatever was never consumed.
//!
//! # Flow
//! 1. `materialize`: InitializationData -> Assignments + Units (all Created)
//! 2. `launch`: pending Units -> in-flight set -> provider
//! 3. outcomes (`handle_outcome` / `listen`): free slots as workers finish
//! 4. `expire_all`: close admission, everything non-terminal -> Expired
//!
//! # Consistency
//! Every status change goes through `transition`, which holds the unit table
//! lock, re-reads the stored status, validates the move and writes it back.
//! A unit is inserted into the in-flight set before it becomes Launched and
//! removed only after it left Launched/Assigned, so the number of in-flight
//! units never exceeds the set's size. A unit's write and its assignment's
//! write land together; if the second fails the first is undone.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::builder::LauncherBuilder;
use crate::app::capacity::{CapacityError, InFlightSet};
use crate::app::config::LauncherConfig;
use crate::app::status::{LauncherStatus, StateCounts};
use crate::domain::{
    Assignment, AssignmentId, AssignmentState, InitializationData, LaunchHandle, TaskRun, Unit,
    UnitId,
};
use crate::error::{LauncherError, Result};
use crate::ports::{
    Clock, DeliveryEvent, DeliveryEvents, DeliveryOutcome, DeliveryProvider, Entity, EntityStore,
    IdGenerator,
};

/// Entities created by one `materialize` call, in creation order.
#[derive(Debug, Clone)]
pub struct Materialized {
    pub assignments: Vec<Assignment>,
    pub units: Vec<Unit>,
}

/// Result of one `launch` pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchSummary {
    /// Units the provider accepted.
    pub launched: usize,

    /// Units the provider rejected; back in the pending queue, oldest first.
    pub deferred: Vec<UnitId>,

    /// The pass stopped because `expire_all` closed admission.
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpireReport {
    /// Units moved to Expired by this call.
    pub expired: usize,

    /// Longest grace period any provider reported while reclaiming.
    pub max_delay: Duration,
}

/// In-memory mirror of everything this launcher created.
#[derive(Default)]
struct UnitTable {
    assignments: Vec<Assignment>,
    assignment_pos: HashMap<AssignmentId, usize>,
    units: Vec<Unit>,
    unit_pos: HashMap<UnitId, usize>,

    /// Created units waiting for admission, FIFO.
    pending: VecDeque<UnitId>,
}

impl UnitTable {
    fn unit(&self, unit_id: UnitId) -> Option<&Unit> {
        self.unit_pos.get(&unit_id).map(|&pos| &self.units[pos])
    }

    fn unit_mut(&mut self, unit_id: UnitId) -> Option<&mut Unit> {
        self.unit_pos.get(&unit_id).map(|&pos| &mut self.units[pos])
    }

    fn assignment(&self, assignment_id: AssignmentId) -> Option<&Assignment> {
        self.assignment_pos
            .get(&assignment_id)
            .map(|&pos| &self.assignments[pos])
    }

    fn unit_states_of(&self, assignment_id: AssignmentId) -> Vec<AssignmentState> {
        self.assignment(assignment_id)
            .map(|a| {
                a.unit_ids
                    .iter()
                    .filter_map(|id| self.unit(*id))
                    .map(|u| u.status)
                    .collect()
            })
            .unwrap_or_default()
    }

    fn register(&mut self, materialized: &Materialized) {
        for assignment in &materialized.assignments {
            self.assignment_pos
                .insert(assignment.id, self.assignments.len());
            self.assignments.push(assignment.clone());
        }
        for unit in &materialized.units {
            self.unit_pos.insert(unit.id, self.units.len());
            self.units.push(unit.clone());
            self.pending.push_back(unit.id);
        }
    }
}

struct Shared {
    task_run: Arc<TaskRun>,
    config: LauncherConfig,
    store: Arc<dyn EntityStore>,
    provider: Arc<dyn DeliveryProvider>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,

    table: Mutex<UnitTable>,
    in_flight: InFlightSet,

    /// One launch pass at a time, so only one task ever waits in `admit`.
    launch_gate: Mutex<()>,

    /// Stops `listen` tasks.
    shutdown: watch::Sender<bool>,
}

/// Launches the units of one task run.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct TaskLauncher {
    shared: Arc<Shared>,
}

impl TaskLauncher {
    /// Wire a launcher with the system clock and ULID ids.
    pub fn new(
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn DeliveryProvider>,
        task_run: Arc<TaskRun>,
        config: LauncherConfig,
    ) -> Result<Self> {
        LauncherBuilder::new(task_run, store, provider)
            .config(config)
            .build()
    }

    pub fn builder(
        task_run: Arc<TaskRun>,
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn DeliveryProvider>,
    ) -> LauncherBuilder {
        LauncherBuilder::new(task_run, store, provider)
    }

    pub(crate) fn from_parts(
        task_run: Arc<TaskRun>,
        config: LauncherConfig,
        store: Arc<dyn EntityStore>,
        provider: Arc<dyn DeliveryProvider>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        let in_flight = InFlightSet::new(config.capacity());
        let (shutdown, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                task_run,
                config,
                store,
                provider,
                clock,
                ids,
                table: Mutex::new(UnitTable::default()),
                in_flight,
                launch_gate: Mutex::new(()),
                shutdown,
            }),
        }
    }

    pub fn task_run(&self) -> &Arc<TaskRun> {
        &self.shared.task_run
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.shared.config
    }

    // ========================================
    // materialize
    // ========================================

    /// Expand `records` into Assignments and Units, all persisted Created.
    ///
    /// Every record is validated before the first store write, so a bad
    /// record leaves the store untouched. Units join the pending queue in
    /// record order, then `unit_data` order.
    pub async fn materialize(&self, records: &[InitializationData]) -> Result<Materialized> {
        let shared = &self.shared;
        info!(
            task_run_id = %shared.task_run.id,
            records = records.len(),
            "TaskLauncher::materialize: called"
        );

        self.check_provider()?;
        for (index, record) in records.iter().enumerate() {
            if record.unit_data.is_empty() {
                return Err(LauncherError::Validation(format!(
                    "record {index} has an empty unit_data list"
                )));
            }
        }

        let now = shared.clock.now();
        let task_run = &shared.task_run;
        let mut assignments = Vec::with_capacity(records.len());
        let mut units = Vec::new();

        for record in records {
            let mut assignment = Assignment::new(
                shared.ids.generate_assignment_id(),
                task_run.id,
                record.shared.clone(),
                now,
            );
            for (unit_index, payload) in record.unit_data.iter().enumerate() {
                let unit = Unit::new(
                    shared.ids.generate_unit_id(),
                    assignment.id,
                    task_run.id,
                    unit_index,
                    task_run.config.task_reward,
                    payload.clone(),
                    now,
                );
                assignment.add_unit(unit.id);
                units.push(unit);
            }
            assignments.push(assignment);
        }

        let materialized = Materialized { assignments, units };

        // hidden from expire_all until every entity is persisted
        let mut table = shared.table.lock().await;
        for assignment in &materialized.assignments {
            shared
                .store
                .create(Entity::Assignment(assignment.clone()))
                .await?;
        }
        for unit in &materialized.units {
            shared.store.create(Entity::Unit(unit.clone())).await?;
        }
        table.register(&materialized);

        info!(
            assignments = materialized.assignments.len(),
            units = materialized.units.len(),
            pending = table.pending.len(),
            "TaskLauncher::materialize: persisted"
        );
        Ok(materialized)
    }

    fn check_provider(&self) -> Result<()> {
        let expected = &self.shared.config.provider_type;
        let actual = &self.shared.task_run.provider_type;
        if expected != actual {
            return Err(LauncherError::ProviderMismatch {
                expected: expected.clone(),
                actual: actual.clone(),
            });
        }
        Ok(())
    }

    // ========================================
    // launch
    // ========================================

    /// Admit pending units one by one, never exceeding the capacity, and
    /// hand each to the provider.
    ///
    /// Returns once the pending queue is drained or `expire_all` closed
    /// admission. Units the provider rejects go back to Created and are
    /// re-queued at the front when the pass ends.
    pub async fn launch(&self, endpoint: &str) -> Result<LaunchSummary> {
        let shared = &self.shared;
        let _pass = shared.launch_gate.lock().await;
        info!(
            endpoint,
            capacity = ?shared.in_flight.capacity(),
            "TaskLauncher::launch: started"
        );

        if !shared.in_flight.is_closed().await {
            self.recover_undelivered().await?;
        }

        let mut summary = LaunchSummary::default();
        let result = self.launch_pass(endpoint, &mut summary).await;
        self.requeue_front(&summary.deferred).await;
        result?;

        info!(
            launched = summary.launched,
            deferred = summary.deferred.len(),
            cancelled = summary.cancelled,
            "TaskLauncher::launch: finished"
        );
        Ok(summary)
    }

    async fn launch_pass(&self, endpoint: &str, summary: &mut LaunchSummary) -> Result<()> {
        let shared = &self.shared;

        while let Some(unit_id) = self.next_pending().await {
            match self.claim_slot(unit_id).await {
                Ok(()) => {}
                Err(CapacityError::Closed) => {
                    debug!(%unit_id, "TaskLauncher::launch: admission closed");
                    summary.cancelled = true;
                    return Ok(());
                }
                Err(CapacityError::Duplicate(_)) => {
                    warn!(%unit_id, "TaskLauncher::launch: unit already in flight, skipping");
                    continue;
                }
                Err(CapacityError::Full { capacity }) => {
                    error!(%unit_id, capacity, "TaskLauncher::launch: admitted into a full set");
                    return Err(LauncherError::CapacityExceeded { capacity });
                }
            }

            match self.transition(unit_id, AssignmentState::Launched).await {
                Ok(true) => {}
                Ok(false) | Err(LauncherError::InvalidTransition { .. }) => {
                    // expired while waiting for the slot
                    shared.in_flight.remove(unit_id).await;
                    continue;
                }
                Err(err) => {
                    self.release_after_failure(unit_id).await;
                    return Err(err);
                }
            }
            self.ensure_within_capacity().await?;

            let unit = self
                .unit(unit_id)
                .await
                .ok_or(LauncherError::UnknownUnit(unit_id))?;

            match shared.provider.launch(&unit, endpoint).await {
                Ok(handle) => {
                    self.record_handle(unit_id, handle).await?;
                    summary.launched += 1;
                }
                Err(err) => {
                    warn!(
                        %unit_id,
                        error = %err,
                        "TaskLauncher::launch: delivery failed, reverting to created"
                    );
                    match self.transition(unit_id, AssignmentState::Created).await {
                        Ok(_) => {
                            shared.in_flight.remove(unit_id).await;
                            summary.deferred.push(unit_id);
                        }
                        // expired or finished while the provider was busy
                        Err(LauncherError::InvalidTransition { .. }) => {
                            shared.in_flight.remove(unit_id).await;
                        }
                        Err(err) => {
                            self.release_after_failure(unit_id).await;
                            return Err(err);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Take a slot for `unit_id`, waiting while the set is full.
    async fn claim_slot(&self, unit_id: UnitId) -> std::result::Result<(), CapacityError> {
        let in_flight = &self.shared.in_flight;
        match in_flight.try_insert(unit_id).await {
            Err(CapacityError::Full { capacity }) => {
                debug!(%unit_id, capacity, "TaskLauncher::launch: at capacity, waiting for a slot");
                in_flight.admit(unit_id).await
            }
            other => other,
        }
    }

    /// Settle the slot of a unit whose status write failed mid-launch.
    ///
    /// A unit back in Created gives up its slot and returns to the head of
    /// the queue. One the store still records as Launched keeps its slot
    /// until the next pass reverts it (see `recover_undelivered`).
    async fn release_after_failure(&self, unit_id: UnitId) {
        let shared = &self.shared;
        let mut table = shared.table.lock().await;
        let status = table.unit(unit_id).map(|u| u.status);
        match status {
            Some(AssignmentState::Created) => {
                table.pending.push_front(unit_id);
                drop(table);
                shared.in_flight.remove(unit_id).await;
            }
            Some(status) if status.is_in_flight() => {
                warn!(%unit_id, %status, "TaskLauncher::launch: undelivered unit keeps its slot");
            }
            _ => {
                drop(table);
                shared.in_flight.remove(unit_id).await;
            }
        }
    }

    /// Revert units left Launched by a failed pass back to Created.
    ///
    /// Runs under the launch gate, so a Launched unit without a handle was
    /// never accepted by the provider.
    async fn recover_undelivered(&self) -> Result<()> {
        let shared = &self.shared;
        let stranded: Vec<UnitId> = {
            let table = shared.table.lock().await;
            table
                .units
                .iter()
                .filter(|u| u.status == AssignmentState::Launched && u.launch_handle.is_none())
                .map(|u| u.id)
                .collect()
        };
        if stranded.is_empty() {
            return Ok(());
        }

        info!(units = stranded.len(), "TaskLauncher::launch: reverting undelivered units");
        let mut recovered = Vec::with_capacity(stranded.len());
        for unit_id in stranded {
            match self.transition(unit_id, AssignmentState::Created).await {
                Ok(_) => {
                    shared.in_flight.remove(unit_id).await;
                    recovered.push(unit_id);
                }
                Err(LauncherError::InvalidTransition { .. }) => {
                    shared.in_flight.remove(unit_id).await;
                }
                Err(err) => {
                    self.requeue_front(&recovered).await;
                    return Err(err);
                }
            }
        }
        self.requeue_front(&recovered).await;
        Ok(())
    }

    /// Push `unit_ids` to the head of the queue, keeping their order.
    async fn requeue_front(&self, unit_ids: &[UnitId]) {
        if unit_ids.is_empty() {
            return;
        }
        let mut table = self.shared.table.lock().await;
        for unit_id in unit_ids.iter().rev() {
            table.pending.push_front(*unit_id);
        }
    }

    async fn next_pending(&self) -> Option<UnitId> {
        let mut table = self.shared.table.lock().await;
        while let Some(unit_id) = table.pending.pop_front() {
            let waiting = table
                .unit(unit_id)
                .is_some_and(|u| u.status == AssignmentState::Created);
            if waiting {
                return Some(unit_id);
            }
        }
        None
    }

    /// Launched + Assigned units must fit in the capacity.
    async fn ensure_within_capacity(&self) -> Result<()> {
        let Some(capacity) = self.shared.in_flight.capacity() else {
            return Ok(());
        };
        let in_flight = {
            let table = self.shared.table.lock().await;
            table
                .units
                .iter()
                .filter(|u| u.status.is_in_flight())
                .count()
        };
        if in_flight > capacity {
            error!(in_flight, capacity, "TaskLauncher: in-flight capacity exceeded");
            return Err(LauncherError::CapacityExceeded { capacity });
        }
        Ok(())
    }

    async fn record_handle(&self, unit_id: UnitId, handle: LaunchHandle) -> Result<()> {
        let shared = &self.shared;
        let (unit, status) = {
            let mut table = shared.table.lock().await;
            let now = shared.clock.now();
            let unit = table
                .unit_mut(unit_id)
                .ok_or(LauncherError::UnknownUnit(unit_id))?;
            // attached first: a handle marks the unit as delivered
            unit.attach_handle(handle, now);
            let unit = unit.clone();
            let status = shared.store.get_status(unit_id.into()).await?;
            (unit, status)
        };

        if status == AssignmentState::Expired {
            // expire_all ran while the provider was launching; take it back
            debug!(%unit_id, "TaskLauncher::launch: unit expired mid-launch, withdrawing");
            if let Err(err) = shared.provider.expire(&unit).await {
                warn!(%unit_id, error = %err, "TaskLauncher::launch: withdraw failed");
            }
        } else {
            debug!(
                %unit_id,
                %status,
                external_id = unit.launch_handle.as_ref().map(|h| h.external_id.as_str()),
                "TaskLauncher::launch: unit launched"
            );
        }
        Ok(())
    }

    // ========================================
    // outcomes
    // ========================================

    /// Apply a provider outcome.
    ///
    /// Outcomes for unknown units, or that no longer fit the unit's status,
    /// are logged and dropped.
    pub async fn handle_outcome(&self, event: DeliveryEvent) -> Result<()> {
        let DeliveryEvent { unit_id, outcome } = event;
        let next = match outcome {
            DeliveryOutcome::Assigned => AssignmentState::Assigned,
            DeliveryOutcome::Completed => AssignmentState::Completed,
            DeliveryOutcome::Disconnected => AssignmentState::Expired,
        };

        match self.transition(unit_id, next).await {
            Ok(changed) => {
                if next.is_terminal() {
                    if let Some(held) = self.shared.in_flight.remove(unit_id).await {
                        debug!(%unit_id, ?held, "TaskLauncher: slot freed");
                    }
                } else if !self.shared.in_flight.contains(unit_id).await {
                    warn!(%unit_id, status = %next, "TaskLauncher: in-flight unit holds no slot");
                }
                if changed {
                    debug!(%unit_id, ?outcome, status = %next, "TaskLauncher: outcome applied");
                } else {
                    debug!(%unit_id, ?outcome, "TaskLauncher: repeated outcome ignored");
                }
                Ok(())
            }
            Err(LauncherError::UnknownUnit(_)) => {
                warn!(%unit_id, ?outcome, "TaskLauncher: outcome for unknown unit ignored");
                Ok(())
            }
            Err(LauncherError::InvalidTransition { from, .. }) => {
                warn!(%unit_id, ?outcome, %from, "TaskLauncher: stale outcome ignored");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Drain provider events in a background task until the channel closes
    /// or `shutdown` is called.
    pub fn listen(&self, mut events: DeliveryEvents) -> JoinHandle<()> {
        let launcher = self.clone();
        let mut shutdown = self.shared.shutdown.subscribe();

        tokio::spawn(async move {
            if *shutdown.borrow() {
                return;
            }
            debug!("TaskLauncher::listen: started");
            loop {
                tokio::select! {
                    event = events.recv() => {
                        let Some(event) = event else { break };
                        if let Err(err) = launcher.handle_outcome(event).await {
                            error!(
                                unit_id = %event.unit_id,
                                error = %err,
                                "TaskLauncher::listen: failed to apply outcome"
                            );
                        }
                    }
                    _ = shutdown.changed() => break,
                }
            }
            debug!("TaskLauncher::listen: stopped");
        })
    }

    // ========================================
    // expiration
    // ========================================

    /// Expire every non-terminal unit and stop admitting new ones.
    ///
    /// Safe to call before, during or after `launch`, and any number of
    /// times; a second call finds nothing left to expire.
    pub async fn expire_all(&self) -> Result<ExpireReport> {
        let shared = &self.shared;
        shared.in_flight.close().await;
        info!(task_run_id = %shared.task_run.id, "TaskLauncher::expire_all: called");

        let unit_ids: Vec<UnitId> = {
            let table = shared.table.lock().await;
            table.units.iter().map(|u| u.id).collect()
        };

        let mut report = ExpireReport::default();

        // reclaim from the provider first, oldest admission first
        for unit_id in shared.in_flight.members().await {
            let status = shared.store.get_status(unit_id.into()).await?;
            if !status.is_in_flight() {
                continue;
            }
            let Some(unit) = self.unit(unit_id).await else {
                continue;
            };
            match shared.provider.expire(&unit).await {
                Ok(delay) => report.max_delay = report.max_delay.max(delay),
                Err(err) => {
                    warn!(%unit_id, error = %err, "TaskLauncher::expire_all: provider reclaim failed");
                }
            }
        }

        for unit_id in unit_ids {
            let status = shared.store.get_status(unit_id.into()).await?;
            if status.is_terminal() {
                continue;
            }

            match self.transition(unit_id, AssignmentState::Expired).await {
                Ok(true) => report.expired += 1,
                Ok(false) => {}
                Err(LauncherError::InvalidTransition { from, .. }) => {
                    debug!(%unit_id, %from, "TaskLauncher::expire_all: finished before expiry");
                }
                Err(err) => return Err(err),
            }
            shared.in_flight.remove(unit_id).await;
        }
        shared.table.lock().await.pending.clear();

        info!(
            expired = report.expired,
            max_delay = ?report.max_delay,
            "TaskLauncher::expire_all: done"
        );
        Ok(report)
    }

    /// `expire_all`, then stop every `listen` task.
    pub async fn shutdown(&self) -> Result<ExpireReport> {
        let report = self.expire_all().await;
        self.shared.shutdown.send_replace(true);
        report
    }

    // ========================================
    // status transitions
    // ========================================

    /// Move `unit_id` to `next` and recompute its assignment.
    ///
    /// Returns `Ok(false)` when the unit already sits in terminal `next`.
    async fn transition(&self, unit_id: UnitId, next: AssignmentState) -> Result<bool> {
        let shared = &self.shared;
        let mut table = shared.table.lock().await;
        if table.unit(unit_id).is_none() {
            return Err(LauncherError::UnknownUnit(unit_id));
        }

        let stored = shared.store.get_status(unit_id.into()).await?;
        let now = shared.clock.now();

        let Some(unit) = table.unit_mut(unit_id) else {
            return Err(LauncherError::UnknownUnit(unit_id));
        };
        // the store wins over the mirror
        unit.status = stored;
        let synced = unit.clone();

        let changed = unit
            .transition(next, now)
            .map_err(|e| LauncherError::InvalidTransition {
                entity: unit_id.into(),
                from: e.from,
                to: e.to,
            })?;
        if !changed {
            return Ok(false);
        }
        let assignment_id = unit.assignment_id;

        if let Err(err) = shared.store.set_status(unit_id.into(), next).await {
            if let Some(unit) = table.unit_mut(unit_id) {
                *unit = synced;
            }
            return Err(err.into());
        }
        debug!(%unit_id, from = %stored, to = %next, "TaskLauncher: unit transitioned");

        let states = table.unit_states_of(assignment_id);
        let pos = table.assignment_pos.get(&assignment_id).copied();
        if let Some(pos) = pos {
            let assignment = &mut table.assignments[pos];
            let previous = (assignment.status, assignment.updated_at);
            if assignment.update_status_from_units(&states, now) {
                let status = assignment.status;
                if let Err(err) = shared.store.set_status(assignment_id.into(), status).await {
                    // unit and assignment move together or not at all
                    let assignment = &mut table.assignments[pos];
                    (assignment.status, assignment.updated_at) = previous;
                    self.roll_back_unit(&mut table, synced, next).await;
                    return Err(err.into());
                }
                debug!(%assignment_id, %status, "TaskLauncher: assignment status derived");
            }
        }
        Ok(true)
    }

    /// Put a unit whose assignment write failed back where it was.
    ///
    /// If even that write fails the mirror follows the store, which still
    /// holds `attempted`.
    async fn roll_back_unit(&self, table: &mut UnitTable, synced: Unit, attempted: AssignmentState) {
        let unit_id = synced.id;
        let restored = match self.shared.store.set_status(unit_id.into(), synced.status).await {
            Ok(()) => synced,
            Err(err) => {
                error!(
                    %unit_id,
                    from = %attempted,
                    to = %synced.status,
                    error = %err,
                    "TaskLauncher: unit rollback failed"
                );
                Unit {
                    status: attempted,
                    ..synced
                }
            }
        };
        if let Some(unit) = table.unit_mut(unit_id) {
            *unit = restored;
        }
    }

    // ========================================
    // queries
    // ========================================

    /// Resolve once nothing is in flight.
    pub async fn wait_idle(&self) {
        self.shared.in_flight.wait_empty().await;
    }

    pub async fn in_flight_len(&self) -> usize {
        self.shared.in_flight.len().await
    }

    pub async fn unit(&self, unit_id: UnitId) -> Option<Unit> {
        self.shared.table.lock().await.unit(unit_id).cloned()
    }

    pub async fn assignment(&self, assignment_id: AssignmentId) -> Option<Assignment> {
        self.shared
            .table
            .lock()
            .await
            .assignment(assignment_id)
            .cloned()
    }

    /// All units, in creation order.
    pub async fn units(&self) -> Vec<Unit> {
        self.shared.table.lock().await.units.clone()
    }

    /// All assignments, in creation order.
    pub async fn assignments(&self) -> Vec<Assignment> {
        self.shared.table.lock().await.assignments.clone()
    }

    pub async fn status(&self) -> LauncherStatus {
        let shared = &self.shared;
        let (units, assignments, pending) = {
            let table = shared.table.lock().await;
            let units: StateCounts = table.units.iter().map(|u| u.status).collect();
            let assignments: StateCounts = table.assignments.iter().map(|a| a.status).collect();
            (units, assignments, table.pending.len())
        };
        LauncherStatus {
            units,
            assignments,
            in_flight: shared.in_flight.len().await,
            peak_in_flight: shared.in_flight.peak().await,
            capacity: shared.in_flight.capacity(),
            pending,
            closed: shared.in_flight.is_closed().await,
        }
    }
}
