//! MockProvider - delivery provider for tests and local runs.
//!
//! Nothing leaves the process. Launches are recorded, and the test (or the
//! demo CLI's simulated workers) decides when a unit is assigned, completed
//! or disconnected by calling the helpers below, which emit `DeliveryEvent`s
//! exactly like a real provider would.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{LaunchHandle, ProviderType, Unit, UnitId};
use crate::options::{DescribeOptions, OptionGroup, OptionKind, OptionSpec};
use crate::ports::{
    DeliveryError, DeliveryEvent, DeliveryEvents, DeliveryNotifier, DeliveryOutcome,
    DeliveryProvider, delivery_channel,
};

pub const MOCK_PROVIDER_TYPE: &str = "mock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveState {
    Launched,
    Assigned,
}

#[derive(Default)]
struct MockState {
    /// Every successful launch, in order.
    launched: Vec<(UnitId, String)>,

    /// Units currently on the channel.
    live: HashMap<UnitId, LiveState>,

    /// Launch order of the live units, oldest first.
    live_order: VecDeque<UnitId>,

    expired: Vec<UnitId>,

    /// Fail this many upcoming launch attempts.
    reject_next: usize,

    /// Always fail launches of these units.
    reject_units: HashSet<UnitId>,

    rejected: Vec<UnitId>,

    next_hit: u64,
}

impl MockState {
    fn take_live(&mut self, unit_id: UnitId) -> Option<LiveState> {
        let state = self.live.remove(&unit_id)?;
        self.live_order.retain(|id| *id != unit_id);
        Some(state)
    }
}

pub struct MockProvider {
    state: Mutex<MockState>,
    notifier: DeliveryNotifier,
    assignment_duration: Duration,
}

impl MockProvider {
    /// Create a provider and the event stream the launcher should listen to.
    pub fn new() -> (Self, DeliveryEvents) {
        let (notifier, events) = delivery_channel();
        let provider = Self {
            state: Mutex::new(MockState::default()),
            notifier,
            assignment_duration: Duration::ZERO,
        };
        (provider, events)
    }

    /// Grace period reported by `expire` for assigned units.
    pub fn with_assignment_duration(mut self, duration: Duration) -> Self {
        self.assignment_duration = duration;
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // a panicked test thread must not wedge the others
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reject the next `n` launch attempts, whatever the unit.
    pub fn reject_next(&self, n: usize) {
        self.lock().reject_next = n;
    }

    /// Reject every launch attempt for `unit_id`.
    pub fn reject_unit(&self, unit_id: UnitId) {
        self.lock().reject_units.insert(unit_id);
    }

    /// Units launched successfully, in launch order.
    pub fn launched(&self) -> Vec<UnitId> {
        self.lock().launched.iter().map(|(id, _)| *id).collect()
    }

    /// Endpoints passed to `launch`, in launch order.
    pub fn endpoints(&self) -> Vec<String> {
        self.lock().launched.iter().map(|(_, e)| e.clone()).collect()
    }

    /// Units still on the channel, oldest launch first.
    pub fn live(&self) -> Vec<UnitId> {
        self.lock().live_order.iter().copied().collect()
    }

    pub fn rejected(&self) -> Vec<UnitId> {
        self.lock().rejected.clone()
    }

    pub fn expired(&self) -> Vec<UnitId> {
        self.lock().expired.clone()
    }

    /// Simulate a worker accepting `unit_id`.
    pub fn assign(&self, unit_id: UnitId) -> bool {
        {
            let mut state = self.lock();
            match state.live.get_mut(&unit_id) {
                Some(live @ LiveState::Launched) => *live = LiveState::Assigned,
                _ => return false,
            }
        }
        self.emit(unit_id, DeliveryOutcome::Assigned)
    }

    /// Simulate a worker finishing `unit_id`.
    pub fn complete(&self, unit_id: UnitId) -> bool {
        self.finish(unit_id, DeliveryOutcome::Completed)
    }

    /// Simulate a worker dropping `unit_id`.
    pub fn disconnect(&self, unit_id: UnitId) -> bool {
        self.finish(unit_id, DeliveryOutcome::Disconnected)
    }

    /// Complete the oldest live unit, if any.
    pub fn complete_next(&self) -> Option<UnitId> {
        let unit_id = self.lock().live_order.front().copied()?;
        self.complete(unit_id).then_some(unit_id)
    }

    fn finish(&self, unit_id: UnitId, outcome: DeliveryOutcome) -> bool {
        if self.lock().take_live(unit_id).is_none() {
            return false;
        }
        self.emit(unit_id, outcome)
    }

    fn emit(&self, unit_id: UnitId, outcome: DeliveryOutcome) -> bool {
        match self.notifier.send(DeliveryEvent::new(unit_id, outcome)) {
            Ok(()) => true,
            Err(_) => {
                debug!(%unit_id, ?outcome, "MockProvider: no listener, event dropped");
                false
            }
        }
    }
}

#[async_trait]
impl DeliveryProvider for MockProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::new(MOCK_PROVIDER_TYPE)
    }

    async fn launch(&self, unit: &Unit, endpoint: &str) -> Result<LaunchHandle, DeliveryError> {
        let mut state = self.lock();

        if state.reject_units.contains(&unit.id) || state.reject_next > 0 {
            state.reject_next = state.reject_next.saturating_sub(1);
            state.rejected.push(unit.id);
            return Err(DeliveryError::Rejected {
                unit_id: unit.id,
                reason: "mock channel rejected the launch".to_string(),
            });
        }

        state.next_hit += 1;
        let external_id = format!("mock-hit-{}", state.next_hit);
        state.launched.push((unit.id, endpoint.to_string()));
        state.live.insert(unit.id, LiveState::Launched);
        state.live_order.push_back(unit.id);

        Ok(LaunchHandle {
            provider_type: self.provider_type(),
            external_id,
            url: Some(format!("{endpoint}/?unit_id={}", unit.id)),
        })
    }

    async fn expire(&self, unit: &Unit) -> Result<Duration, DeliveryError> {
        let mut state = self.lock();
        let delay = match state.take_live(unit.id) {
            Some(LiveState::Assigned) => self.assignment_duration,
            Some(LiveState::Launched) | None => Duration::ZERO,
        };
        state.expired.push(unit.id);
        Ok(delay)
    }
}

impl DescribeOptions for MockProvider {
    fn describe_options() -> OptionGroup {
        OptionGroup::new("MockProvider")
            .description("In-process provider; workers are simulated.")
            .option(
                OptionSpec::new("reject", OptionKind::Int)
                    .help("reject this many launch attempts before accepting")
                    .default_value(0),
            )
            .option(
                OptionSpec::new("work_millis", OptionKind::Int)
                    .help("how long a simulated worker holds a unit")
                    .default_value(50),
            )
    }
}
