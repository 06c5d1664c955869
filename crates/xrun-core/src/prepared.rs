use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::debug;

/// Process-owned record of executables whose preparation has completed.
///
/// Concurrent callers for the same key are serialized; only a successful preparation marks the
/// key, so a failed one is attempted again by the next run.
#[derive(Debug, Clone, Default)]
pub struct PreparedCache {
    slots: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<bool>>>>>,
}

impl PreparedCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &str) -> Arc<tokio::sync::Mutex<bool>> {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.entry(key.to_string()).or_default().clone()
    }

    pub async fn is_prepared(&self, key: &str) -> bool {
        *self.slot(key).lock().await
    }

    /// Run `prepare` unless `key` is already prepared.
    ///
    /// Returns `Ok(true)` when `prepare` ran and succeeded, `Ok(false)` when it was skipped.
    pub async fn run_once<F, Fut, E>(&self, key: &str, prepare: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let slot = self.slot(key);
        let mut done = slot.lock().await;
        if *done {
            debug!(executable = key, "already prepared");
            return Ok(false);
        }
        prepare().await?;
        *done = true;
        debug!(executable = key, "prepared");
        Ok(true)
    }
}
