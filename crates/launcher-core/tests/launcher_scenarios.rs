//! End-to-end launcher scenarios against the in-memory store and the mock
//! provider.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rstest::rstest;
use serde_json::json;
use ulid::Ulid;

use launcher_core::domain::{
    AssignmentState, InitializationData, TaskRun, TaskRunConfig, TaskRunId, UnitId,
};
use launcher_core::impls::{InMemoryEntityStore, MockProvider};
use launcher_core::ports::{
    DeliveryEvents, Entity, EntityId, EntityKind, EntityStore, StoreError,
};
use launcher_core::{LauncherConfig, LauncherError, TaskLauncher};

const STEP: Duration = Duration::from_secs(5);

// =============================================================================
// Helpers
// =============================================================================

struct Harness {
    launcher: TaskLauncher,
    store: Arc<dyn EntityStore>,
    provider: Arc<MockProvider>,
    events: Option<DeliveryEvents>,
}

impl Harness {
    fn new(capacity: usize) -> Self {
        Self::with_store(Arc::new(InMemoryEntityStore::new()), capacity)
    }

    fn with_store(store: Arc<dyn EntityStore>, capacity: usize) -> Self {
        let (provider, events) = MockProvider::new();
        Self::with_provider(store, provider, events, capacity)
    }

    fn with_provider(
        store: Arc<dyn EntityStore>,
        provider: MockProvider,
        events: DeliveryEvents,
        capacity: usize,
    ) -> Self {
        let provider = Arc::new(provider);
        let task_run = Arc::new(TaskRun::new(
            TaskRunId::from_ulid(Ulid::new()),
            "mock",
            TaskRunConfig::default(),
        ));
        let config = LauncherConfig::default().with_max_num_concurrent_units(capacity);
        let launcher = TaskLauncher::new(store.clone(), provider.clone(), task_run, config)
            .expect("launcher should build");
        Self {
            launcher,
            store,
            provider,
            events: Some(events),
        }
    }

    /// Route provider events into the launcher.
    fn listen(&mut self) -> tokio::task::JoinHandle<()> {
        let events = self.events.take().expect("listen called twice");
        self.launcher.listen(events)
    }

    fn spawn_launch(
        &self,
    ) -> tokio::task::JoinHandle<launcher_core::Result<launcher_core::LaunchSummary>> {
        let launcher = self.launcher.clone();
        tokio::spawn(async move { launcher.launch("dummy-url:3000").await })
    }

    async fn unit_status(&self, unit_id: UnitId) -> AssignmentState {
        self.store
            .get_status(unit_id.into())
            .await
            .expect("unit should be stored")
    }

    async fn wait_for_status(&self, unit_id: UnitId, status: AssignmentState) {
        let waited = tokio::time::timeout(STEP, async {
            while self.unit_status(unit_id).await != status {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "{unit_id} never reached {status}");
    }

    async fn wait_for_launched(&self, count: usize) -> Vec<UnitId> {
        let waited = tokio::time::timeout(STEP, async {
            loop {
                let launched = self.provider.launched();
                if launched.len() >= count {
                    return launched;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        waited.unwrap_or_else(|_| panic!("fewer than {count} units were launched"))
    }
}

fn record(units: usize) -> InitializationData {
    InitializationData::new(
        json!({ "task": "label" }),
        (0..units).map(|i| json!({ "index": i })).collect(),
    )
}

type WriteRule = Box<dyn Fn(EntityId, AssignmentState) -> bool + Send + Sync>;

/// Store whose status writes fail while a rule matches them.
struct FlakyStore {
    inner: InMemoryEntityStore,
    rule: Mutex<Option<WriteRule>>,
}

impl FlakyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryEntityStore::new(),
            rule: Mutex::new(None),
        }
    }

    fn fail_when(&self, rule: impl Fn(EntityId, AssignmentState) -> bool + Send + Sync + 'static) {
        *self.rule.lock().unwrap() = Some(Box::new(rule));
    }

    fn fail_writes(&self, fail: bool) {
        if fail {
            self.fail_when(|_, _| true);
        } else {
            *self.rule.lock().unwrap() = None;
        }
    }

    fn fails(&self, id: EntityId, status: AssignmentState) -> bool {
        self.rule
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|rule| rule(id, status))
    }
}

#[async_trait]
impl EntityStore for FlakyStore {
    async fn create(&self, entity: Entity) -> Result<(), StoreError> {
        self.inner.create(entity).await
    }

    async fn get_status(&self, id: EntityId) -> Result<AssignmentState, StoreError> {
        self.inner.get_status(id).await
    }

    async fn set_status(&self, id: EntityId, status: AssignmentState) -> Result<(), StoreError> {
        if self.fails(id, status) {
            return Err(StoreError::Storage("disk full".to_string()));
        }
        self.inner.set_status(id, status).await
    }

    async fn query_by_status(
        &self,
        kind: EntityKind,
        status: AssignmentState,
    ) -> Result<Vec<EntityId>, StoreError> {
        self.inner.query_by_status(kind, status).await
    }
}

// =============================================================================
// Materialization
// =============================================================================

#[rstest]
#[case::single(vec![1])]
#[case::three_units(vec![3])]
#[case::mixed(vec![3, 1, 2])]
#[case::many(vec![2; 10])]
#[tokio::test]
async fn test_materialize_creates_sum_of_units(#[case] sizes: Vec<usize>) {
    let h = Harness::new(0);
    let records: Vec<InitializationData> = sizes.iter().map(|&n| record(n)).collect();

    let out = h.launcher.materialize(&records).await.unwrap();

    assert_eq!(out.assignments.len(), sizes.len());
    assert_eq!(out.units.len(), sizes.iter().sum::<usize>());
    for (assignment, &n) in out.assignments.iter().zip(&sizes) {
        assert_eq!(assignment.unit_ids.len(), n);
        assert_eq!(
            h.store.get_status(assignment.id.into()).await.unwrap(),
            AssignmentState::Created
        );
    }
    let created = h
        .store
        .query_by_status(EntityKind::Unit, AssignmentState::Created)
        .await
        .unwrap();
    assert_eq!(created.len(), out.units.len());
}

#[tokio::test]
async fn test_repeated_materialize_appends() {
    let h = Harness::new(0);
    h.launcher.materialize(&[record(2)]).await.unwrap();
    h.launcher.materialize(&[record(1)]).await.unwrap();

    let status = h.launcher.status().await;
    assert_eq!(status.units.created, 3);
    assert_eq!(status.assignments.created, 2);
    assert_eq!(status.pending, 3);
}

// =============================================================================
// Launch
// =============================================================================

#[tokio::test]
async fn test_capacity_one_then_expire_all() {
    let h = Harness::new(1);
    let out = h.launcher.materialize(&[record(3)]).await.unwrap();

    let launch = h.spawn_launch();
    let launched = h.wait_for_launched(1).await;
    assert_eq!(launched, vec![out.units[0].id]);
    assert_eq!(h.launcher.in_flight_len().await, 1);
    assert_eq!(h.unit_status(out.units[1].id).await, AssignmentState::Created);

    let report = h.launcher.expire_all().await.unwrap();
    assert_eq!(report.expired, 3);

    let summary = tokio::time::timeout(STEP, launch)
        .await
        .expect("launch should stop once expired")
        .unwrap()
        .unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.launched, 1);

    for unit in &out.units {
        assert_eq!(h.unit_status(unit.id).await, AssignmentState::Expired);
    }
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Expired
    );
    assert_eq!(h.provider.launched().len(), 1);
    assert_eq!(h.launcher.in_flight_len().await, 0);
}

#[tokio::test]
async fn test_completions_admit_units_in_order() {
    let mut h = Harness::new(1);
    let listener = h.listen();
    let out = h.launcher.materialize(&[record(3)]).await.unwrap();

    let launch = h.spawn_launch();
    for k in 1..=3 {
        let launched = h.wait_for_launched(k).await;
        assert!(h.launcher.in_flight_len().await <= 1);
        assert!(h.provider.complete(launched[k - 1]));
    }

    let summary = tokio::time::timeout(STEP, launch).await.unwrap().unwrap().unwrap();
    assert_eq!(summary.launched, 3);
    assert!(!summary.cancelled);

    let expected: Vec<UnitId> = out.units.iter().map(|u| u.id).collect();
    assert_eq!(h.provider.launched(), expected);

    tokio::time::timeout(STEP, h.launcher.wait_idle()).await.unwrap();
    for unit in &out.units {
        assert_eq!(h.unit_status(unit.id).await, AssignmentState::Completed);
    }
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Completed
    );
    assert_eq!(h.launcher.status().await.peak_in_flight, 1);

    h.launcher.shutdown().await.unwrap();
    tokio::time::timeout(STEP, listener).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_delivery_error_defers_unit() {
    let mut h = Harness::new(1);
    let _listener = h.listen();
    let out = h.launcher.materialize(&[record(2)]).await.unwrap();
    let (first, second) = (out.units[0].id, out.units[1].id);
    h.provider.reject_next(1);

    let summary = tokio::time::timeout(STEP, h.launcher.launch("dummy-url:3000"))
        .await
        .unwrap()
        .unwrap();

    // the rejection did not hold the only slot
    assert_eq!(summary.launched, 1);
    assert_eq!(summary.deferred, vec![first]);
    assert_eq!(h.provider.rejected(), vec![first]);
    assert_eq!(h.unit_status(first).await, AssignmentState::Created);
    assert_eq!(h.unit_status(second).await, AssignmentState::Launched);
    assert!(h.launcher.unit(first).await.unwrap().launch_handle.is_none());

    let status = h.launcher.status().await;
    assert_eq!(status.in_flight, 1);
    assert_eq!(status.pending, 1);

    // next pass picks the deferred unit up once the slot frees
    let launch = h.spawn_launch();
    assert!(h.provider.complete(second));
    let summary = tokio::time::timeout(STEP, launch).await.unwrap().unwrap().unwrap();
    assert_eq!(summary.launched, 1);
    assert_eq!(h.provider.launched(), vec![second, first]);
    h.wait_for_status(first, AssignmentState::Launched).await;
}

#[tokio::test]
async fn test_disconnect_expires_unit_and_frees_slot() {
    let mut h = Harness::new(1);
    let _listener = h.listen();
    let out = h.launcher.materialize(&[record(2)]).await.unwrap();

    let launch = h.spawn_launch();
    h.wait_for_launched(1).await;
    assert!(h.provider.disconnect(out.units[0].id));

    h.wait_for_launched(2).await;
    tokio::time::timeout(STEP, launch).await.unwrap().unwrap().unwrap();

    assert_eq!(h.unit_status(out.units[0].id).await, AssignmentState::Expired);
    assert_eq!(h.unit_status(out.units[1].id).await, AssignmentState::Launched);
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Launched
    );
}

#[tokio::test]
async fn test_peak_in_flight_never_exceeds_capacity() {
    const CAPACITY: usize = 3;

    let mut h = Harness::new(CAPACITY);
    let _listener = h.listen();
    let records: Vec<InitializationData> = (0..4).map(|_| record(5)).collect();
    h.launcher.materialize(&records).await.unwrap();

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let provider = h.provider.clone();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    provider.complete_next();
                }
            })
        })
        .collect();

    let watcher = {
        let launcher = h.launcher.clone();
        tokio::spawn(async move {
            let mut worst = 0;
            for _ in 0..200 {
                worst = worst.max(launcher.in_flight_len().await);
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            worst
        })
    };

    let summary = tokio::time::timeout(STEP, h.launcher.launch("dummy-url:3000"))
        .await
        .unwrap()
        .unwrap();
    tokio::time::timeout(STEP, h.launcher.wait_idle()).await.unwrap();
    for worker in workers {
        worker.abort();
    }

    assert_eq!(summary.launched, 20);
    assert!(watcher.await.unwrap() <= CAPACITY);

    let status = h.launcher.status().await;
    assert!(status.peak_in_flight <= CAPACITY);
    assert_eq!(status.units.completed, 20);
    assert_eq!(status.assignments.completed, 4);
}

#[tokio::test]
async fn test_unbounded_capacity_admits_everything() {
    let h = Harness::new(0);
    h.launcher.materialize(&[record(4), record(6)]).await.unwrap();

    let summary = tokio::time::timeout(STEP, h.launcher.launch("dummy-url:3000"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(summary.launched, 10);
    assert_eq!(h.launcher.in_flight_len().await, 10);
    assert_eq!(h.launcher.status().await.capacity, None);
}

#[tokio::test]
async fn test_storage_error_surfaces_and_unit_stays_created() {
    let store = Arc::new(FlakyStore::new());
    let h = Harness::with_store(store.clone(), 1);
    let out = h.launcher.materialize(&[record(1)]).await.unwrap();

    store.fail_writes(true);
    let err = h.launcher.launch("dummy-url:3000").await.unwrap_err();
    assert!(matches!(err, LauncherError::Store(StoreError::Storage(_))));

    assert_eq!(h.unit_status(out.units[0].id).await, AssignmentState::Created);
    let status = h.launcher.status().await;
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.pending, 1);
    assert_eq!(status.units.created, 1);

    store.fail_writes(false);
    let summary = h.launcher.launch("dummy-url:3000").await.unwrap();
    assert_eq!(summary.launched, 1);
}

#[tokio::test]
async fn test_failed_assignment_write_rolls_back_unit() {
    let store = Arc::new(FlakyStore::new());
    let mut h = Harness::with_store(store.clone(), 1);
    let _listener = h.listen();
    let out = h.launcher.materialize(&[record(2)]).await.unwrap();
    let (first, second) = (out.units[0].id, out.units[1].id);
    let assignment_id = out.assignments[0].id;

    store.fail_when(|id, _| matches!(id, EntityId::Assignment(_)));
    let err = h.launcher.launch("dummy-url:3000").await.unwrap_err();
    assert!(matches!(err, LauncherError::Store(StoreError::Storage(_))));

    assert_eq!(h.unit_status(first).await, AssignmentState::Created);
    assert_eq!(
        h.launcher.unit(first).await.unwrap().status,
        AssignmentState::Created
    );
    assert_eq!(
        h.launcher.assignment(assignment_id).await.unwrap().status,
        AssignmentState::Created
    );
    let status = h.launcher.status().await;
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.pending, 2);
    assert!(h.provider.launched().is_empty());

    store.fail_writes(false);
    let launch = h.spawn_launch();
    assert_eq!(h.wait_for_launched(1).await, vec![first]);
    assert_eq!(h.launcher.status().await.units.launched, 1);

    assert!(h.provider.complete(first));
    assert_eq!(h.wait_for_launched(2).await, vec![first, second]);
    let summary = tokio::time::timeout(STEP, launch)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(summary.launched, 2);
    assert!(h.launcher.status().await.peak_in_flight <= 1);
}

#[tokio::test]
async fn test_failed_revert_keeps_slot_until_next_pass() {
    let store = Arc::new(FlakyStore::new());
    let h = Harness::with_store(store.clone(), 1);
    let out = h.launcher.materialize(&[record(1)]).await.unwrap();
    let unit_id = out.units[0].id;

    h.provider.reject_next(1);
    store.fail_when(|id, status| {
        matches!(id, EntityId::Assignment(_)) && status == AssignmentState::Created
    });
    let err = h.launcher.launch("dummy-url:3000").await.unwrap_err();
    assert!(matches!(err, LauncherError::Store(StoreError::Storage(_))));

    // never delivered, still recorded as launched, and still counted
    assert_eq!(h.provider.rejected(), vec![unit_id]);
    assert_eq!(h.unit_status(unit_id).await, AssignmentState::Launched);
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Launched
    );
    assert_eq!(h.launcher.in_flight_len().await, 1);

    store.fail_writes(false);
    let summary = tokio::time::timeout(STEP, h.launcher.launch("dummy-url:3000"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(summary.launched, 1);
    assert_eq!(h.provider.launched(), vec![unit_id]);
    assert_eq!(h.unit_status(unit_id).await, AssignmentState::Launched);
    assert!(h.launcher.unit(unit_id).await.unwrap().launch_handle.is_some());
    assert_eq!(h.launcher.in_flight_len().await, 1);
}

#[tokio::test]
async fn test_failed_revert_is_expired_by_expire_all() {
    let store = Arc::new(FlakyStore::new());
    let h = Harness::with_store(store.clone(), 1);
    let out = h.launcher.materialize(&[record(1)]).await.unwrap();

    h.provider.reject_next(1);
    store.fail_when(|id, status| {
        matches!(id, EntityId::Assignment(_)) && status == AssignmentState::Created
    });
    h.launcher.launch("dummy-url:3000").await.unwrap_err();
    store.fail_writes(false);

    let report = h.launcher.expire_all().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(h.unit_status(out.units[0].id).await, AssignmentState::Expired);
    assert_eq!(h.launcher.in_flight_len().await, 0);
}

// =============================================================================
// Expiration
// =============================================================================

#[tokio::test]
async fn test_expire_all_is_idempotent() {
    let mut h = Harness::new(0);
    let _listener = h.listen();
    let out = h.launcher.materialize(&[record(3)]).await.unwrap();
    h.launcher.launch("dummy-url:3000").await.unwrap();

    let done = out.units[0].id;
    assert!(h.provider.complete(done));
    h.wait_for_status(done, AssignmentState::Completed).await;

    let first = h.launcher.expire_all().await.unwrap();
    assert_eq!(first.expired, 2);
    let second = h.launcher.expire_all().await.unwrap();
    assert_eq!(second.expired, 0);

    assert_eq!(h.unit_status(done).await, AssignmentState::Completed);
    for unit in &out.units[1..] {
        assert_eq!(h.unit_status(unit.id).await, AssignmentState::Expired);
    }
    // one success among terminal units is enough
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Completed
    );
    assert!(h.launcher.status().await.closed);
}

#[tokio::test]
async fn test_expire_before_launch() {
    let h = Harness::new(1);
    let out = h.launcher.materialize(&[record(3)]).await.unwrap();
    assert_eq!(out.assignments.len(), 1);
    assert_eq!(out.units.len(), 3);

    let report = h.launcher.expire_all().await.unwrap();
    assert_eq!(report.expired, 3);
    assert_eq!(report.max_delay, Duration::ZERO);

    let summary = h.launcher.launch("dummy-url:3000").await.unwrap();
    assert_eq!(summary.launched, 0);
    assert!(h.provider.launched().is_empty());
    assert!(h.provider.expired().is_empty());
    for unit in &out.units {
        assert_eq!(h.unit_status(unit.id).await, AssignmentState::Expired);
    }
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Expired
    );
}

#[tokio::test]
async fn test_expire_during_launch_reclaims_in_flight_units() {
    let h = Harness::new(2);
    h.launcher.materialize(&[record(5)]).await.unwrap();

    let launch = h.spawn_launch();
    let launched = h.wait_for_launched(2).await;

    let report = h.launcher.expire_all().await.unwrap();
    assert_eq!(report.expired, 5);

    let summary = tokio::time::timeout(STEP, launch).await.unwrap().unwrap().unwrap();
    assert!(summary.cancelled);
    assert_eq!(h.provider.launched().len(), 2);

    // a unit expired mid-launch is withdrawn a second time
    let mut reclaimed = h.provider.expired();
    reclaimed.sort();
    reclaimed.dedup();
    let mut expected = launched.clone();
    expected.sort();
    assert_eq!(reclaimed, expected);
    assert!(h.provider.live().is_empty());

    let status = h.launcher.status().await;
    assert_eq!(status.units.expired, 5);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.peak_in_flight, 2);
}

#[tokio::test]
async fn test_expire_reports_longest_grace_period() {
    let (provider, events) = MockProvider::new();
    let provider = provider.with_assignment_duration(Duration::from_secs(60));
    let mut h = Harness::with_provider(Arc::new(InMemoryEntityStore::new()), provider, events, 0);
    let _listener = h.listen();
    let out = h.launcher.materialize(&[record(2)]).await.unwrap();
    h.launcher.launch("dummy-url:3000").await.unwrap();

    let held = out.units[0].id;
    assert!(h.provider.assign(held));
    h.wait_for_status(held, AssignmentState::Assigned).await;
    assert_eq!(
        h.store.get_status(out.assignments[0].id.into()).await.unwrap(),
        AssignmentState::Assigned
    );

    let report = h.launcher.expire_all().await.unwrap();
    assert_eq!(report.expired, 2);
    assert_eq!(report.max_delay, Duration::from_secs(60));
}
