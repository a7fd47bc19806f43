use thiserror::Error;

use crate::domain::{AssignmentState, ProviderType, UnitId};
use crate::ports::{DeliveryError, EntityId, StoreError};

#[derive(Debug, Error)]
pub enum LauncherError {
    /// Malformed InitializationData.
    #[error("invalid initialization data: {0}")]
    Validation(String),

    #[error("provider mismatch: expected {expected}, got {actual}")]
    ProviderMismatch {
        expected: ProviderType,
        actual: ProviderType,
    },

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// An admission got past the in-flight set. Always a concurrency bug.
    #[error("in-flight capacity of {capacity} exceeded")]
    CapacityExceeded { capacity: usize },

    #[error("{entity}: invalid transition {from} -> {to}")]
    InvalidTransition {
        entity: EntityId,
        from: AssignmentState,
        to: AssignmentState,
    },

    #[error("unknown unit {0}")]
    UnknownUnit(UnitId),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
