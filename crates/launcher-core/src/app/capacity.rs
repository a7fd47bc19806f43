//! InFlightSet - the bounded set of units currently handed to a provider.
//!
//! # Contract
//! - `try_insert` rejects once capacity is reached; it never lets one more in
//! - `remove` is the only thing that unblocks a waiting `admit`
//! - `len` / `contains` read under the same lock as insert/remove, so the
//!   launch loop (inserting) and outcome handling (removing) always agree
//! - `close` is permanent: waiters wake up with `Closed` and nothing is
//!   admitted afterwards

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::domain::UnitId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("in-flight set is full ({capacity} units)")]
    Full { capacity: usize },

    #[error("{0} is already in flight")]
    Duplicate(UnitId),

    #[error("in-flight set is closed")]
    Closed,
}

struct InFlightInner {
    /// Unit -> when it was admitted.
    units: HashMap<UnitId, Instant>,
    closed: bool,
    peak: usize,
}

pub struct InFlightSet {
    /// `None` = unbounded.
    capacity: Option<usize>,
    inner: Mutex<InFlightInner>,
    /// Fired on every remove and on close.
    changed: Notify,
}

impl InFlightSet {
    /// `Some(0)` is treated as unbounded, like `max_num_concurrent_units = 0`.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity: capacity.filter(|&c| c > 0),
            inner: Mutex::new(InFlightInner {
                units: HashMap::new(),
                closed: false,
                peak: 0,
            }),
            changed: Notify::new(),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn insert_locked(&self, inner: &mut InFlightInner, unit_id: UnitId) -> Result<(), CapacityError> {
        if inner.closed {
            return Err(CapacityError::Closed);
        }
        if inner.units.contains_key(&unit_id) {
            return Err(CapacityError::Duplicate(unit_id));
        }
        if let Some(capacity) = self.capacity
            && inner.units.len() >= capacity
        {
            return Err(CapacityError::Full { capacity });
        }
        inner.units.insert(unit_id, Instant::now());
        inner.peak = inner.peak.max(inner.units.len());
        Ok(())
    }

    /// Insert without waiting.
    pub async fn try_insert(&self, unit_id: UnitId) -> Result<(), CapacityError> {
        let mut inner = self.inner.lock().await;
        self.insert_locked(&mut inner, unit_id)
    }

    /// Wait for a free slot, then insert `unit_id`.
    ///
    /// The room check and the insert happen under one lock, so an admission
    /// can never overshoot. Fails only with `Closed` or `Duplicate`.
    pub async fn admit(&self, unit_id: UnitId) -> Result<(), CapacityError> {
        loop {
            // register before checking, or a remove between check and await is lost
            let notified = self.changed.notified();
            {
                let mut inner = self.inner.lock().await;
                match self.insert_locked(&mut inner, unit_id) {
                    Err(CapacityError::Full { capacity }) => {
                        debug!(%unit_id, capacity, "InFlightSet::admit: full, waiting");
                    }
                    other => return other,
                }
            }
            notified.await;
        }
    }

    /// Remove `unit_id`, freeing its slot. Returns how long it was in flight.
    pub async fn remove(&self, unit_id: UnitId) -> Option<std::time::Duration> {
        let admitted_at = {
            let mut inner = self.inner.lock().await;
            inner.units.remove(&unit_id)?
        };
        self.changed.notify_waiters();
        Some(admitted_at.elapsed())
    }

    pub async fn contains(&self, unit_id: UnitId) -> bool {
        self.inner.lock().await.units.contains_key(&unit_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.units.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Highest occupancy ever observed.
    pub async fn peak(&self) -> usize {
        self.inner.lock().await.peak
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.lock().await.closed
    }

    /// Stop admitting. Members stay until removed.
    pub async fn close(&self) {
        self.inner.lock().await.closed = true;
        self.changed.notify_waiters();
    }

    /// Current members, oldest admission first.
    pub async fn members(&self) -> Vec<UnitId> {
        let inner = self.inner.lock().await;
        let mut members: Vec<(UnitId, Instant)> =
            inner.units.iter().map(|(id, at)| (*id, *at)).collect();
        members.sort_by_key(|(_, at)| *at);
        members.into_iter().map(|(id, _)| id).collect()
    }

    /// Resolve once nothing is in flight.
    pub async fn wait_empty(&self) {
        loop {
            let notified = self.changed.notified();
            if self.inner.lock().await.units.is_empty() {
                return;
            }
            notified.await;
        }
    }
}
