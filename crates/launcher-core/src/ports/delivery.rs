//! DeliveryProvider port - hands launched units to a worker-facing channel.
//!
//! A provider does two things:
//! 1. `launch` makes a unit available at an endpoint (posts a HIT, opens a
//!    slot on a local server, ...) and returns a `LaunchHandle`.
//! 2. Later, reports what happened to the unit as `DeliveryEvent`s on an
//!    mpsc channel the launcher listens to.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{LaunchHandle, ProviderType, Unit, UnitId};

/// What a provider observed for a launched unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryOutcome {
    /// A worker accepted the unit. The unit keeps its slot.
    Assigned,

    /// The worker finished. Frees the slot.
    Completed,

    /// The worker left or the unit timed out. Frees the slot.
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryEvent {
    pub unit_id: UnitId,
    pub outcome: DeliveryOutcome,
}

impl DeliveryEvent {
    pub fn new(unit_id: UnitId, outcome: DeliveryOutcome) -> Self {
        Self { unit_id, outcome }
    }
}

/// Sending half, owned by the provider.
pub type DeliveryNotifier = mpsc::UnboundedSender<DeliveryEvent>;

/// Receiving half, drained by `TaskLauncher::listen`.
pub type DeliveryEvents = mpsc::UnboundedReceiver<DeliveryEvent>;

pub fn delivery_channel() -> (DeliveryNotifier, DeliveryEvents) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliveryError {
    #[error("channel rejected {unit_id}: {reason}")]
    Rejected { unit_id: UnitId, reason: String },

    #[error("delivery channel unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DeliveryProvider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    /// Make `unit` available to workers at `endpoint`.
    ///
    /// Retrying is up to the provider; the launcher reverts the unit to
    /// Created on error and moves on.
    async fn launch(&self, unit: &Unit, endpoint: &str) -> Result<LaunchHandle, DeliveryError>;

    /// Withdraw `unit` from the channel.
    ///
    /// Returns how long a worker may still legitimately hold it (zero when
    /// nobody had picked it up).
    async fn expire(&self, unit: &Unit) -> Result<Duration, DeliveryError>;
}
