use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use xrun_model::{Executable, InvokerConfig, RunId, SchemaSet, ValueMap};

use crate::access::{Access, AccessError, AccessFactory};
use crate::invoker::InvokerError;

/// Inputs of the preparation hooks.
#[derive(Clone)]
pub struct PrepareContext {
    executable: Executable,
    parameters: ValueMap,
    access: Arc<dyn AccessFactory>,
}

impl PrepareContext {
    pub fn new(executable: Executable, parameters: ValueMap, access: Arc<dyn AccessFactory>) -> Self {
        Self {
            executable,
            parameters,
            access,
        }
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    pub fn parameters(&self) -> &ValueMap {
        &self.parameters
    }

    pub fn access_factory(&self) -> &Arc<dyn AccessFactory> {
        &self.access
    }
}

impl fmt::Debug for PrepareContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrepareContext")
            .field("executable", &self.executable.name)
            .field("params_len", &self.parameters.len())
            .finish()
    }
}

/// Everything one invocation needs: resolved program, merged declarations, enriched
/// parameters and a run-scoped local working directory.
#[derive(Clone)]
pub struct InvokeContext {
    run_id: RunId,
    executable: Executable,
    schemas: SchemaSet,
    parameters: ValueMap,
    run_dir: PathBuf,
    access: Arc<dyn AccessFactory>,
}

impl InvokeContext {
    pub fn new(
        run_id: RunId,
        executable: Executable,
        schemas: SchemaSet,
        parameters: ValueMap,
        run_dir: PathBuf,
        access: Arc<dyn AccessFactory>,
    ) -> Self {
        Self {
            run_id,
            executable,
            schemas,
            parameters,
            run_dir,
            access,
        }
    }

    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn executable(&self) -> &Executable {
        &self.executable
    }

    /// Local directory holding the program sources.
    pub fn source_dir(&self) -> Result<&Path, InvokerError> {
        self.executable
            .path
            .as_deref()
            .ok_or(InvokerError::NoSources)
    }

    pub fn schemas(&self) -> &SchemaSet {
        &self.schemas
    }

    pub fn parameters(&self) -> &ValueMap {
        &self.parameters
    }

    /// String parameter, failing when absent or empty.
    pub fn required_str(&self, name: &'static str) -> Result<String, InvokerError> {
        match self.parameters.get(name) {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(v) if !v.is_null() && !v.is_string() => Ok(crate::mapping::value_text(v)),
            _ => Err(InvokerError::MissingParameter(name)),
        }
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn invoker_config(&self) -> Result<InvokerConfig, InvokerError> {
        Ok(InvokerConfig::from_params(&self.parameters)?)
    }

    /// Open an access session for the given configuration.
    pub async fn open_access(&self, config: &InvokerConfig) -> Result<Box<dyn Access>, AccessError> {
        self.access.open(config).await
    }
}

impl fmt::Debug for InvokeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeContext")
            .field("run_id", &self.run_id)
            .field("executable", &self.executable.name)
            .field("params_len", &self.parameters.len())
            .field("run_dir", &self.run_dir)
            .finish()
    }
}

impl fmt::Display for InvokeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "InvokeContext(run={}, executable={})",
            self.run_id, self.executable.name
        )
    }
}
