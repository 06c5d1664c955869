use async_trait::async_trait;
use xrun_core::store::RunFilter;
use xrun_model::{Run, RunId, RunTarget, SubmitRequest, ValueMap};

use crate::error::ApiError;

/// Backend of the HTTP layer.
///
/// [`crate::OrchestratorAdapter`] delegates straight to the orchestrator; wrap it to add
/// authentication or auditing.
#[async_trait]
pub trait RunHandler: Send + Sync + 'static {
    async fn submit(&self, target: RunTarget, req: SubmitRequest) -> Result<Run, ApiError>;

    async fn update(&self, id: &RunId, patch: ValueMap) -> Result<Run, ApiError>;

    async fn get(&self, id: &RunId) -> Result<Run, ApiError>;

    async fn list(&self, filter: RunFilter) -> Result<Vec<Run>, ApiError>;

    async fn remove(&self, id: &RunId) -> Result<(), ApiError>;
}
