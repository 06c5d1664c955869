//! Invoker registry keyed by invoker name.
//!
//! The set of invokers is closed and fixed at startup: the daemon registers every adapter
//! it ships, and the orchestrator resolves the invoker named by the executable or the route.
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::CoreError;
use crate::invoker::Invoker;

#[derive(Clone, Default)]
pub struct InvokerRegistry {
    invokers: BTreeMap<String, Arc<dyn Invoker>>,
}

impl InvokerRegistry {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invoker under its own name, replacing any previous entry.
    pub fn register(&mut self, invoker: Arc<dyn Invoker>) {
        let name = invoker.name().to_string();
        self.register_as(name, invoker);
    }

    /// Register an invoker under an explicit name (e.g. an API spec alias).
    pub fn register_as(&mut self, name: impl Into<String>, invoker: Arc<dyn Invoker>) {
        let name = name.into();
        debug!(invoker = %name, adapter = invoker.name(), "invoker registered");
        self.invokers.insert(name, invoker);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Invoker>> {
        self.invokers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.invokers.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.invokers.keys().map(String::as_str)
    }

    /// Resolve an invoker by name.
    #[instrument(level = "debug", skip(self))]
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Invoker>, CoreError> {
        self.get(name)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("invoker '{name}'")))
    }
}
