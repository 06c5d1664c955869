use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::lock::DEFAULT_LOCK_WAIT;

/// Filesystem layout and limits of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Parent of the run-scoped local working directories.
    pub runs_dir: PathBuf,
    /// Parent of the run-scoped directories embedded executables are materialized into.
    pub staging_dir: PathBuf,
    /// Parent of the per-invoker exclusivity status/lock file pairs.
    pub lock_dir: PathBuf,
    /// Bound on waiting for an exclusivity lock file.
    pub lock_wait: Duration,
}

impl OrchestratorConfig {
    /// Layout with every directory below `root`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            runs_dir: root.join("runs"),
            staging_dir: root.join("staging"),
            lock_dir: root.join("locks"),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::under(std::env::temp_dir().join("xrun"))
    }
}
