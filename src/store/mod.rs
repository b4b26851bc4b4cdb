//! Durable keyed persistence for workflow state.
//!
//! The executor persists through the [`WorkflowStore`] contract after every
//! step; which backend sits behind it is an injected strategy chosen per
//! deployment. Backends: [`InMemoryWorkflowStore`] for tests and
//! single-process runs, [`FilesystemWorkflowStore`] for local durability, and
//! [`RedisWorkflowStore`] (behind the `redis` feature) for networked
//! deployments with per-key locking and TTL expiry.

use async_trait::async_trait;

use crate::state::WorkflowState;

mod error;
mod file;
mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use error::{StoreError, StoreResult};
pub use file::FilesystemWorkflowStore;
pub use memory::InMemoryWorkflowStore;
#[cfg(feature = "redis")]
pub use redis::RedisWorkflowStore;

/// Durable keyed persistence contract.
///
/// `save` is an upsert keyed by the state's id. Networked implementations
/// must hold a time-bounded per-key exclusive lock for the duration of a
/// `save` and release it on every exit path; lock-acquisition failure is
/// fatal and never retried.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Durably upsert the state, keyed by its id.
    async fn save(&self, state: &WorkflowState) -> StoreResult<()>;

    /// Load a state by id, or `None` when no entry exists.
    async fn load(&self, id: &str) -> StoreResult<Option<WorkflowState>>;

    /// Delete the entry for `id`. Removing a missing id is a no-op.
    async fn remove(&self, id: &str) -> StoreResult<()>;
}
