//! Persistence contract for entities and its in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::AggregateId;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::entity::Entity;

/// Failures reported by a repository backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    /// An entity with the same id is already stored.
    #[error("{kind} already exists: {id}")]
    Conflict { kind: &'static str, id: AggregateId },

    /// An update targeted an entity that is not stored.
    #[error("{kind} does not exist: {id}")]
    Missing { kind: &'static str, id: AggregateId },

    /// The storage backend failed.
    #[error("Storage failure: {0}")]
    Storage(String),
}

/// Persistence operations every entity store offers.
///
/// Lookups return `Ok(None)` for unknown ids; callers decide whether that
/// is an error.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    async fn get_by_id(&self, id: AggregateId) -> Result<Option<T>, RepositoryError>;

    async fn add(&self, entity: T) -> Result<T, RepositoryError>;

    async fn update(&self, entity: T) -> Result<T, RepositoryError>;

    /// Removes the entity. Returns whether anything was removed.
    async fn delete(&self, id: AggregateId) -> Result<bool, RepositoryError>;

    /// Every stored entity, in no particular order.
    async fn list(&self) -> Result<Vec<T>, RepositoryError>;
}

#[derive(Default)]
struct Fault {
    read: Option<String>,
    write: Option<String>,
}

/// In-memory repository for tests and local wiring.
#[derive(Clone)]
pub struct InMemoryRepository<T> {
    entities: Arc<RwLock<HashMap<AggregateId, T>>>,
    fault: Arc<RwLock<Fault>>,
}

impl<T: Entity> InMemoryRepository<T> {
    pub fn new() -> Self {
        Self {
            entities: Arc::new(RwLock::new(HashMap::new())),
            fault: Arc::new(RwLock::new(Fault::default())),
        }
    }

    /// Makes every lookup fail with a storage error. `None` clears it.
    pub async fn set_fail_on_read(&self, message: Option<&str>) {
        self.fault.write().await.read = message.map(str::to_string);
    }

    /// Makes every add, update and delete fail with a storage error.
    pub async fn set_fail_on_write(&self, message: Option<&str>) {
        self.fault.write().await.write = message.map(str::to_string);
    }

    pub async fn len(&self) -> usize {
        self.entities.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entities.read().await.is_empty()
    }

    async fn check_read(&self) -> Result<(), RepositoryError> {
        match &self.fault.read().await.read {
            Some(message) => Err(RepositoryError::Storage(message.clone())),
            None => Ok(()),
        }
    }

    async fn check_write(&self) -> Result<(), RepositoryError> {
        match &self.fault.read().await.write {
            Some(message) => Err(RepositoryError::Storage(message.clone())),
            None => Ok(()),
        }
    }
}

impl<T: Entity> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for InMemoryRepository<T> {
    async fn get_by_id(&self, id: AggregateId) -> Result<Option<T>, RepositoryError> {
        self.check_read().await?;
        Ok(self.entities.read().await.get(&id).cloned())
    }

    async fn add(&self, entity: T) -> Result<T, RepositoryError> {
        self.check_write().await?;
        let mut entities = self.entities.write().await;
        let id = entity.id();
        if entities.contains_key(&id) {
            return Err(RepositoryError::Conflict { kind: T::KIND, id });
        }
        entities.insert(id, entity.clone());
        tracing::debug!(kind = T::KIND, %id, "Entity added");
        Ok(entity)
    }

    async fn update(&self, entity: T) -> Result<T, RepositoryError> {
        self.check_write().await?;
        let mut entities = self.entities.write().await;
        let id = entity.id();
        match entities.get_mut(&id) {
            Some(slot) => {
                *slot = entity.clone();
                Ok(entity)
            }
            None => Err(RepositoryError::Missing { kind: T::KIND, id }),
        }
    }

    async fn delete(&self, id: AggregateId) -> Result<bool, RepositoryError> {
        self.check_write().await?;
        let removed = self.entities.write().await.remove(&id).is_some();
        if removed {
            tracing::debug!(kind = T::KIND, %id, "Entity deleted");
        }
        Ok(removed)
    }

    async fn list(&self) -> Result<Vec<T>, RepositoryError> {
        self.check_read().await?;
        Ok(self.entities.read().await.values().cloned().collect())
    }
}
