//! Filesystem-backed workflow store: one pretty-printed JSON file per id.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::error::{StoreError, StoreResult};
use super::WorkflowStore;
use crate::state::WorkflowState;

/// Stores each workflow as `<base_dir>/<id>.json`.
pub struct FilesystemWorkflowStore {
    base_dir: PathBuf,
}

impl FilesystemWorkflowStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed.
    pub async fn new(base_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, id: &str) -> StoreResult<PathBuf> {
        // Ids become file names; path separators would escape the base dir.
        if id.is_empty() || id.contains(['/', '\\']) || id == "." || id == ".." {
            return Err(StoreError::backend(format!(
                "invalid workflow id for filesystem store: '{id}'"
            )));
        }
        Ok(self.base_dir.join(format!("{id}.json")))
    }
}

#[async_trait]
impl WorkflowStore for FilesystemWorkflowStore {
    async fn save(&self, state: &WorkflowState) -> StoreResult<()> {
        let path = self.path_for(state.id())?;
        debug!(workflow = state.id(), path = %path.display(), "saving workflow state");

        let payload = serde_json::to_string_pretty(state)?;
        fs::write(&path, payload).await?;
        Ok(())
    }

    async fn load(&self, id: &str) -> StoreResult<Option<WorkflowState>> {
        let path = self.path_for(id)?;

        let payload = match fs::read_to_string(&path).await {
            Ok(payload) => payload,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let state = serde_json::from_str(&payload)?;
        Ok(Some(state))
    }

    async fn remove(&self, id: &str) -> StoreResult<()> {
        let path = self.path_for(id)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
