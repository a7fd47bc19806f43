//! EntityStore port - durable status of assignments and units.
//!
//! The store is the source of truth for status. The launcher keeps an
//! in-memory mirror but re-reads the stored status before every transition.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Assignment, AssignmentId, AssignmentState, Unit, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Assignment,
    Unit,
}

/// Key of a stored entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum EntityId {
    Assignment(AssignmentId),
    Unit(UnitId),
}

impl EntityId {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityId::Assignment(_) => EntityKind::Assignment,
            EntityId::Unit(_) => EntityKind::Unit,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Assignment(id) => id.fmt(f),
            EntityId::Unit(id) => id.fmt(f),
        }
    }
}

impl From<AssignmentId> for EntityId {
    fn from(id: AssignmentId) -> Self {
        EntityId::Assignment(id)
    }
}

impl From<UnitId> for EntityId {
    fn from(id: UnitId) -> Self {
        EntityId::Unit(id)
    }
}

/// A full record handed to `create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Entity {
    Assignment(Assignment),
    Unit(Unit),
}

impl Entity {
    pub fn id(&self) -> EntityId {
        match self {
            Entity::Assignment(a) => EntityId::Assignment(a.id),
            Entity::Unit(u) => EntityId::Unit(u.id),
        }
    }

    pub fn status(&self) -> AssignmentState {
        match self {
            Entity::Assignment(a) => a.status,
            Entity::Unit(u) => u.status,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(EntityId),

    #[error("{0} already exists")]
    AlreadyExists(EntityId),

    #[error("storage backend failure: {0}")]
    Storage(String),
}

/// Persistence contract consumed by the launcher.
///
/// # Design
/// - Every call is atomic on its own; the launcher never needs a transaction.
/// - `set_status` does not validate transitions. That is the launcher's job.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn create(&self, entity: Entity) -> Result<(), StoreError>;

    async fn get_status(&self, id: EntityId) -> Result<AssignmentState, StoreError>;

    async fn set_status(&self, id: EntityId, status: AssignmentState) -> Result<(), StoreError>;

    /// Ids of `kind` currently in `status`, in creation order.
    async fn query_by_status(
        &self,
        kind: EntityKind,
        status: AssignmentState,
    ) -> Result<Vec<EntityId>, StoreError>;
}
