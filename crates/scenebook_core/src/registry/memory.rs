//! In-process registry used by the CLI and tests.

use super::{EntityRegistry, RegistryError, RegistryResult};
use crate::model::entity::{EntityDraft, EntityId, EntityRecord};
use async_trait::async_trait;
use log::debug;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
struct State {
    records: Vec<EntityRecord>,
    unavailable: bool,
}

/// Registry backed by an ordered in-memory list.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<EntityRecord>) -> Self {
        Self {
            state: Mutex::new(State {
                records,
                unavailable: false,
            }),
        }
    }

    /// Appends or replaces a record with the same id.
    pub async fn insert(&self, record: EntityRecord) {
        let mut state = self.state.lock().await;
        match state.records.iter_mut().find(|existing| existing.id == record.id) {
            Some(existing) => *existing = record,
            None => state.records.push(record),
        }
    }

    /// Deletes a record; documents referencing it are not touched.
    pub async fn remove(&self, id: &str) -> Option<EntityRecord> {
        let mut state = self.state.lock().await;
        let index = state.records.iter().position(|record| record.id == id)?;
        Some(state.records.remove(index))
    }

    /// Toggles simulated transport failure for every call.
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.unavailable = !available;
    }

    pub async fn get(&self, id: &str) -> Option<EntityRecord> {
        let state = self.state.lock().await;
        state.records.iter().find(|record| record.id == id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.records.len()
    }
}

#[async_trait]
impl EntityRegistry for InMemoryRegistry {
    async fn lookup(&self, query: &str) -> RegistryResult<Vec<EntityRecord>> {
        let state = self.state.lock().await;
        if state.unavailable {
            return Err(RegistryError::Transport("registry offline".to_string()));
        }
        let hits: Vec<EntityRecord> = state
            .records
            .iter()
            .filter(|record| record.matches_query(query))
            .cloned()
            .collect();
        debug!(
            "event=registry_lookup module=registry status=ok hits={}",
            hits.len()
        );
        Ok(hits)
    }

    async fn create(&self, draft: EntityDraft) -> RegistryResult<EntityRecord> {
        let mut state = self.state.lock().await;
        if state.unavailable {
            return Err(RegistryError::Transport("registry offline".to_string()));
        }
        if let Err(err) = draft.validate() {
            return Err(RegistryError::Rejected(err.to_string()));
        }
        let id: EntityId = Uuid::new_v4().to_string();
        let record = EntityRecord {
            id,
            name: draft.name.trim().to_string(),
            description: draft.description,
            kind: draft.kind,
        };
        state.records.push(record.clone());
        debug!(
            "event=registry_create module=registry status=ok entity_id={}",
            record.id
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::InMemoryRegistry;
    use crate::model::entity::{EntityDraft, EntityKind, EntityRecord};
    use crate::registry::{EntityRegistry, RegistryError};

    #[tokio::test]
    async fn lookup_filters_in_registry_order() {
        let registry = InMemoryRegistry::with_records(vec![
            EntityRecord::new("c2", "Bob", "", EntityKind::Character),
            EntityRecord::new("c1", "Anna", "knows bob", EntityKind::Character),
        ]);
        let hits = registry.lookup("bob").await.expect("lookup should succeed");
        let ids: Vec<&str> = hits.iter().map(|record| record.id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
    }

    #[tokio::test]
    async fn create_assigns_ids_and_offline_mode_fails() {
        let registry = InMemoryRegistry::new();
        let record = registry
            .create(EntityDraft::new("Harbor", EntityKind::Location))
            .await
            .expect("create should succeed");
        assert!(!record.id.is_empty());
        assert_eq!(registry.len().await, 1);

        registry.set_available(false).await;
        let err = registry
            .lookup("")
            .await
            .expect_err("offline registry must fail");
        assert!(matches!(err, RegistryError::Transport(_)));
    }
}
