//! Ports - trait seams to everything outside the launcher.
//!
//! - EntityStore: where statuses live
//! - DeliveryProvider: who hands units to workers
//! - Clock / IdGenerator: time and identity, swappable in tests

pub mod clock;
pub mod delivery;
pub mod entity_store;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::delivery::{
    DeliveryError, DeliveryEvent, DeliveryEvents, DeliveryNotifier, DeliveryOutcome,
    DeliveryProvider, delivery_channel,
};
pub use self::entity_store::{Entity, EntityId, EntityKind, EntityStore, StoreError};
pub use self::id_generator::{IdGenerator, UlidGenerator};
