//! InMemoryEntityStore - development/test store.
//!
//! # Implementation
//! - `HashMap<EntityId, Entity>` holds the records
//! - a separate `Vec<EntityId>` remembers creation order for queries
//! - one tokio `Mutex` makes every call atomic

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::AssignmentState;
use crate::ports::{Entity, EntityId, EntityKind, EntityStore, StoreError};

#[derive(Default)]
struct StoreState {
    entities: HashMap<EntityId, Entity>,
    order: Vec<EntityId>,
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    state: Mutex<StoreState>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full record, for inspection.
    pub async fn get(&self, id: EntityId) -> Option<Entity> {
        let state = self.state.lock().await;
        state.entities.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.order.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn create(&self, entity: Entity) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let id = entity.id();
        if state.entities.contains_key(&id) {
            return Err(StoreError::AlreadyExists(id));
        }
        state.entities.insert(id, entity);
        state.order.push(id);
        Ok(())
    }

    async fn get_status(&self, id: EntityId) -> Result<AssignmentState, StoreError> {
        let state = self.state.lock().await;
        state
            .entities
            .get(&id)
            .map(Entity::status)
            .ok_or(StoreError::NotFound(id))
    }

    async fn set_status(&self, id: EntityId, status: AssignmentState) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        match state.entities.get_mut(&id) {
            Some(Entity::Assignment(a)) => a.status = status,
            Some(Entity::Unit(u)) => u.status = status,
            None => return Err(StoreError::NotFound(id)),
        }
        Ok(())
    }

    async fn query_by_status(
        &self,
        kind: EntityKind,
        status: AssignmentState,
    ) -> Result<Vec<EntityId>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .order
            .iter()
            .filter(|id| id.kind() == kind)
            .filter(|id| state.entities.get(*id).map(Entity::status) == Some(status))
            .copied()
            .collect())
    }
}
