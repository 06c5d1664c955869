use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use xrun_model::{
    Executable, InvokerConfig, ModelError, Run, RunTarget, ValueMap, now_rfc3339,
};

use super::Orchestrator;
use crate::invoker::{InvokeContext, InvokerError, PrepareContext};
use crate::lock::{HostLockManager, LockError};
use crate::mapping::{MappingError, map_results};
use crate::materialize::{MaterializeError, materialize};
use crate::metrics::RunOutcome;

/// Failure of a pipeline step after the run reached `running`.
///
/// Recorded as the run's terminal error message.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("run has neither executable nor invoker")]
    NoTarget,

    #[error("executable '{0}' not found")]
    UnknownExecutable(String),

    #[error("executable '{0}' names no invoker")]
    NoInvoker(String),

    #[error("invoker '{0}' not found")]
    UnknownInvoker(String),

    #[error("staging failed: {0}")]
    Materialize(#[from] MaterializeError),

    #[error(transparent)]
    Config(#[from] ModelError),

    #[error("preparation failed: {0}")]
    Prepare(InvokerError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Invoke(InvokerError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("io {path}: {reason}")]
    Io { path: String, reason: String },
}

/// Executable resolved for one run.
struct Resolved {
    executable: Executable,
    invoker_name: String,
    /// Registered executables are prepared once per process; run-supplied ones every run.
    registered: bool,
}

impl Orchestrator {
    /// Invoker name a run will be executed with, for logs and metrics.
    pub(crate) fn invoker_label(&self, run: &Run) -> String {
        match run.target() {
            Some(RunTarget::Invoker(name)) => name,
            Some(RunTarget::Executable(name)) => self
                .inner
                .spec
                .executable(&name)
                .and_then(|e| e.invoker_name.clone())
                .unwrap_or(name),
            None => "unknown".to_string(),
        }
    }

    /// Drive a `running` run to its terminal state and persist it.
    ///
    /// Never fails: every error of the pipeline becomes the run's `error` state.
    #[instrument(level = "info", skip_all, fields(run = %run.id))]
    pub async fn run_pipeline(&self, mut run: Run) -> Run {
        let invoker = self.invoker_label(&run);
        let metrics = self.inner.metrics.clone();
        metrics.record_run_started(&invoker);
        let started = Instant::now();

        let staging = self.inner.config.staging_dir.join(run.id.as_str());
        let run_dir = self.inner.config.runs_dir.join(run.id.as_str());

        let mut partial = ValueMap::new();
        let outcome = match self.execute(&run, &staging, &run_dir, &mut partial).await {
            Ok(results) => {
                info!(invoker = %invoker, results = results.len(), "run finished");
                run.finish(results, now_rfc3339());
                RunOutcome::Finished
            }
            Err(e) => {
                warn!(invoker = %invoker, error = %e, "run failed");
                run.fail(e.to_string(), partial, now_rfc3339());
                RunOutcome::Error
            }
        };

        let (_, stored) = tokio::join!(
            cleanup(vec![staging, run_dir]),
            self.inner.store.update(run.clone())
        );
        if let Err(e) = stored {
            error!(error = %e, "failed to persist terminal run state");
        }

        metrics.record_run_completed(&invoker, outcome, started.elapsed().as_millis() as u64);
        run
    }

    fn resolve(&self, run: &Run) -> Result<Resolved, PipelineError> {
        // deep copy: the pipeline never shares spec state with other runs
        let spec = self.inner.spec.clone();

        match run.target().ok_or(PipelineError::NoTarget)? {
            RunTarget::Executable(name) => {
                let executable = spec
                    .executables
                    .get(&name)
                    .cloned()
                    .ok_or_else(|| PipelineError::UnknownExecutable(name.clone()))?;
                let invoker_name = executable
                    .invoker_name
                    .clone()
                    .ok_or_else(|| PipelineError::NoInvoker(name.clone()))?;
                Ok(Resolved {
                    executable,
                    invoker_name,
                    registered: true,
                })
            }
            RunTarget::Invoker(name) => {
                let mut executable = run.executable.clone().unwrap_or_default();
                if executable.name.is_empty() {
                    executable.name = run.id.to_string();
                }
                executable.invoker_name = Some(name.clone());
                if let Some(p) = executable.path.as_mut() {
                    if p.is_relative() {
                        *p = spec.base_dir.join(&*p);
                    }
                }
                Ok(Resolved {
                    executable,
                    invoker_name: name,
                    registered: false,
                })
            }
        }
    }

    async fn execute(
        &self,
        run: &Run,
        staging: &Path,
        run_dir: &Path,
        partial: &mut ValueMap,
    ) -> Result<ValueMap, PipelineError> {
        let Resolved {
            mut executable,
            invoker_name,
            registered,
        } = self.resolve(run)?;

        let invoker = self
            .inner
            .registry
            .get(&invoker_name)
            .cloned()
            .ok_or_else(|| PipelineError::UnknownInvoker(invoker_name.clone()))?;
        let invoker_spec = self
            .inner
            .spec
            .invoker(&invoker_name)
            .cloned()
            .unwrap_or_default();

        if executable.is_embedded() {
            materialize(&self.inner.http, &executable.files, staging).await?;
            executable.path = Some(staging.to_path_buf());
        }

        let schemas = invoker_spec.schemas.extended_by(&executable.schemas);
        let mut params = run.parameters.clone();
        let defaulted = schemas.apply_defaults(&mut params);
        if !defaulted.is_empty() {
            debug!(?defaulted, "required parameters defaulted");
        }

        let pctx = PrepareContext::new(executable.clone(), params.clone(), self.inner.access.clone());
        let prepare = {
            let invoker = &invoker;
            let pctx = &pctx;
            move || async move {
                invoker.prepare_buildtime(pctx).await?;
                invoker.prepare_executable(pctx).await
            }
        };
        let prepared = if registered {
            self.inner
                .prepared
                .run_once(&executable.name, prepare)
                .await
        } else {
            prepare().await.map(|_| true)
        };
        prepared.map_err(|e| {
            self.inner
                .metrics
                .record_invoker_error(&invoker_name, e.as_label());
            PipelineError::Prepare(e)
        })?;

        tokio::fs::create_dir_all(run_dir)
            .await
            .map_err(|e| PipelineError::Io {
                path: run_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let ctx = InvokeContext::new(
            run.id.clone(),
            executable,
            schemas.clone(),
            params,
            run_dir.to_path_buf(),
            self.inner.access.clone(),
        );

        let lease = if invoker.exclusive() {
            let config = InvokerConfig::from_params(ctx.parameters())?;
            let manager = HostLockManager::new(self.inner.config.lock_dir.join(&invoker_name))
                .with_wait(self.inner.config.lock_wait);
            Some(manager.acquire(config.host()).await?)
        } else {
            None
        };

        let outcome = invoker.invoke(&ctx).await;

        if let Some(lease) = lease {
            if let Err(e) = lease.release().await {
                error!(error = %e, "failed to release host lease");
            }
        }

        *partial = outcome.collected.stream_results();
        if let Err(e) = outcome.result {
            self.inner
                .metrics
                .record_invoker_error(&invoker_name, e.as_label());
            return Err(PipelineError::Invoke(e));
        }

        Ok(map_results(&schemas.results_schema, outcome.collected)?)
    }
}

/// Remove run-scoped directories concurrently; failures are logged only.
async fn cleanup(dirs: Vec<PathBuf>) {
    let removals = dirs.into_iter().map(|dir| async move {
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => debug!(dir = %dir.display(), "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(dir = %dir.display(), error = %e, "cleanup failed"),
        }
    });
    join_all(removals).await;
}
