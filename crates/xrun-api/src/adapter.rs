use async_trait::async_trait;
use xrun_core::Orchestrator;
use xrun_core::store::RunFilter;
use xrun_model::{Run, RunId, RunTarget, SubmitRequest, ValueMap};

use crate::error::ApiError;
use crate::handler::RunHandler;

/// [`RunHandler`] backed directly by an [`Orchestrator`].
#[derive(Clone)]
pub struct OrchestratorAdapter {
    orchestrator: Orchestrator,
}

impl OrchestratorAdapter {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl RunHandler for OrchestratorAdapter {
    async fn submit(&self, target: RunTarget, req: SubmitRequest) -> Result<Run, ApiError> {
        Ok(self.orchestrator.submit(target, req).await?)
    }

    async fn update(&self, id: &RunId, patch: ValueMap) -> Result<Run, ApiError> {
        Ok(self.orchestrator.update(id, &patch).await?)
    }

    async fn get(&self, id: &RunId) -> Result<Run, ApiError> {
        Ok(self.orchestrator.get(id).await?)
    }

    async fn list(&self, filter: RunFilter) -> Result<Vec<Run>, ApiError> {
        Ok(self.orchestrator.list(&filter).await?)
    }

    async fn remove(&self, id: &RunId) -> Result<(), ApiError> {
        Ok(self.orchestrator.remove(id).await?)
    }
}
