//! Run lifecycle: `prepare → running → {finished, error}`.
//!
//! [`Orchestrator::submit`] and [`Orchestrator::update`] validate synchronously and return the
//! stored record immediately; a run reaching `running` is driven by a pipeline spawned on the
//! tokio runtime, which persists the terminal state when done.
mod config;
pub use config::OrchestratorConfig;

mod pipeline;
pub use pipeline::PipelineError;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};
use xrun_model::{ApiSpec, Run, RunId, RunStatus, RunTarget, SubmitRequest, ValueMap, now_rfc3339};

use crate::access::AccessFactory;
use crate::error::CoreError;
use crate::metrics::{MetricsHandle, noop_metrics};
use crate::prepared::PreparedCache;
use crate::registry::InvokerRegistry;
use crate::store::{RunFilter, RunStore};

/// Fields a patch may not touch: the target and everything the pipeline owns.
const IMMUTABLE_FIELDS: [&str; 7] = [
    "executable_name",
    "invoker_name",
    "results",
    "error",
    "created",
    "finished",
    "failed",
];

struct Inner {
    spec: ApiSpec,
    registry: InvokerRegistry,
    store: Arc<dyn RunStore>,
    access: Arc<dyn AccessFactory>,
    prepared: PreparedCache,
    config: OrchestratorConfig,
    metrics: MetricsHandle,
    http: reqwest::Client,
}

/// Owner of the run state machine. Cheap to clone.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    spec: ApiSpec,
    registry: InvokerRegistry,
    store: Arc<dyn RunStore>,
    access: Arc<dyn AccessFactory>,
    config: OrchestratorConfig,
    metrics: MetricsHandle,
    prepared: PreparedCache,
    http: Option<reqwest::Client>,
}

impl OrchestratorBuilder {
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Share a prepared cache, e.g. between orchestrators of one process.
    pub fn with_prepared(mut self, prepared: PreparedCache) -> Self {
        self.prepared = prepared;
        self
    }

    /// HTTP client used to fetch `url` files of embedded executables.
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = Some(http);
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inner: Arc::new(Inner {
                spec: self.spec,
                registry: self.registry,
                store: self.store,
                access: self.access,
                prepared: self.prepared,
                config: self.config,
                metrics: self.metrics,
                http: self.http.unwrap_or_default(),
            }),
        }
    }
}

impl Orchestrator {
    pub fn builder(
        spec: ApiSpec,
        registry: InvokerRegistry,
        store: Arc<dyn RunStore>,
        access: Arc<dyn AccessFactory>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            spec,
            registry,
            store,
            access,
            config: OrchestratorConfig::default(),
            metrics: noop_metrics(),
            prepared: PreparedCache::new(),
            http: None,
        }
    }

    pub fn spec(&self) -> &ApiSpec {
        &self.inner.spec
    }

    pub fn prepared(&self) -> &PreparedCache {
        &self.inner.prepared
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    fn check_target(&self, target: &RunTarget) -> Result<(), CoreError> {
        match target {
            RunTarget::Executable(name) => {
                if self.inner.spec.executable(name).is_none() {
                    return Err(CoreError::NotFound(format!("executable '{name}'")));
                }
            }
            RunTarget::Invoker(name) => {
                let Some(spec) = self.inner.spec.invoker(name) else {
                    return Err(CoreError::NotFound(format!("invoker '{name}'")));
                };
                if spec.expose.is_disabled() {
                    return Err(CoreError::Validation(format!(
                        "invoker '{name}' is not exposed"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Validate and store a new run; spawn its pipeline when it starts `running`.
    #[instrument(level = "debug", skip(self, req), fields(target = %target))]
    pub async fn submit(&self, target: RunTarget, req: SubmitRequest) -> Result<Run, CoreError> {
        self.check_target(&target)?;

        let mut run = Run::from_request(target, req)?;
        run.created = Some(now_rfc3339());

        self.inner.store.insert(run.clone()).await?;
        info!(run = %run.id, status = %run.status, "run submitted");

        if run.status == RunStatus::Running {
            self.spawn_pipeline(run.clone());
        }
        Ok(run)
    }

    /// Patch a `prepare` run; setting `running` starts it.
    #[instrument(level = "debug", skip(self, patch), fields(run = %id))]
    pub async fn update(&self, id: &RunId, patch: &ValueMap) -> Result<Run, CoreError> {
        let current = self.get(id).await?;

        if current.status != RunStatus::Prepare {
            return Err(CoreError::Precondition(format!(
                "run '{id}' is {} and can no longer be updated",
                current.status
            )));
        }
        if let Some(field) = IMMUTABLE_FIELDS.iter().find(|f| patch.contains_key(**f)) {
            return Err(CoreError::Validation(format!("field '{field}' cannot be updated")));
        }

        let run = current.patched(patch)?;
        if !matches!(run.status, RunStatus::Prepare | RunStatus::Running) {
            return Err(CoreError::Validation(format!(
                "status can only be set to '{}' or '{}'",
                RunStatus::Prepare,
                RunStatus::Running
            )));
        }

        if run.invoker_name.is_some() && run.executable.as_ref().is_none_or(|e| e.is_empty()) {
            return Err(CoreError::Validation("executable must be specified".into()));
        }

        // a concurrent update may have started the run since it was read
        self.inner.store.update_if(run.clone(), RunStatus::Prepare).await?;
        debug!(status = %run.status, "run updated");

        if run.status == RunStatus::Running {
            self.spawn_pipeline(run.clone());
        }
        Ok(run)
    }

    pub async fn get(&self, id: &RunId) -> Result<Run, CoreError> {
        self.inner
            .store
            .find_one(id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("run '{id}'")))
    }

    pub async fn list(&self, filter: &RunFilter) -> Result<Vec<Run>, CoreError> {
        Ok(self.inner.store.find(filter).await?)
    }

    pub async fn remove(&self, id: &RunId) -> Result<(), CoreError> {
        if self.inner.store.remove(id).await? {
            info!(run = %id, "run removed");
            Ok(())
        } else {
            Err(CoreError::NotFound(format!("run '{id}'")))
        }
    }

    /// Run the pipeline in the background.
    pub fn spawn_pipeline(&self, run: Run) -> JoinHandle<Run> {
        let this = self.clone();
        tokio::spawn(async move { this.run_pipeline(run).await })
    }
}
