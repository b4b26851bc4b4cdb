//! In-memory workflow store for tests and single-process deployments.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use super::error::StoreResult;
use super::WorkflowStore;
use crate::state::WorkflowState;

/// Keyed map behind an async RwLock. Cloning the store shares the map.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    states: Arc<RwLock<HashMap<String, WorkflowState>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of persisted workflows.
    pub async fn len(&self) -> usize {
        self.states.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.states.read().await.is_empty()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn save(&self, state: &WorkflowState) -> StoreResult<()> {
        debug!(workflow = state.id(), "saving workflow state");
        self.states
            .write()
            .await
            .insert(state.id().to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> StoreResult<Option<WorkflowState>> {
        Ok(self.states.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        self.states.write().await.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::WorkflowStatus;

    #[tokio::test]
    async fn save_is_an_upsert() {
        let store = InMemoryWorkflowStore::new();
        let mut state = WorkflowState::at_place("wf-1", "start");

        store.save(&state).await.unwrap();
        state.set_status(WorkflowStatus::Running);
        store.save(&state).await.unwrap();

        assert_eq!(store.len().await, 1);
        let loaded = store.load("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.status(), WorkflowStatus::Running);
    }

    #[tokio::test]
    async fn load_missing_id_returns_none() {
        let store = InMemoryWorkflowStore::new();
        assert!(store.load("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remove_deletes_and_tolerates_missing_ids() {
        let store = InMemoryWorkflowStore::new();
        store
            .save(&WorkflowState::at_place("wf-1", "start"))
            .await
            .unwrap();

        store.remove("wf-1").await.unwrap();
        store.remove("wf-1").await.unwrap();

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn distinct_ids_never_contend() {
        let store = InMemoryWorkflowStore::new();
        store
            .save(&WorkflowState::at_place("wf-1", "a"))
            .await
            .unwrap();
        store
            .save(&WorkflowState::at_place("wf-2", "b"))
            .await
            .unwrap();

        assert_eq!(
            store
                .load("wf-1")
                .await
                .unwrap()
                .unwrap()
                .current_place()
                .as_deref(),
            Some("a")
        );
        assert_eq!(
            store
                .load("wf-2")
                .await
                .unwrap()
                .unwrap()
                .current_place()
                .as_deref(),
            Some("b")
        );
    }
}
