//! Invoker abstraction: one adapter per toolchain ecosystem.
//!
//! Concrete invokers implement [`Invoker`] and are registered in the
//! [`InvokerRegistry`](crate::registry::InvokerRegistry) under their name.
mod error;
pub use error::InvokerError;

mod context;
pub use context::{InvokeContext, PrepareContext};

mod retry;
pub use retry::run_with_retry;

use async_trait::async_trait;

use crate::mapping::Collected;

/// Result of one invocation.
///
/// Output is always returned, including when the invocation failed.
#[derive(Debug)]
pub struct InvokeOutcome {
    pub result: Result<(), InvokerError>,
    pub collected: Collected,
}

impl InvokeOutcome {
    pub fn ok(collected: Collected) -> Self {
        Self {
            result: Ok(()),
            collected,
        }
    }

    pub fn failed(err: InvokerError, collected: Collected) -> Self {
        Self {
            result: Err(err),
            collected,
        }
    }
}

/// Toolchain adapter.
///
/// An invoker is responsible for:
/// - validating its required parameters and `invoker_config`;
/// - staging the program on the target through an [`Access`](crate::access::Access) session;
/// - running it and collecting stdout/stderr and result files;
/// - cleaning up the session on every exit path.
#[async_trait]
pub trait Invoker: Send + Sync {
    /// Invoker name used for registration, logs and metrics.
    fn name(&self) -> &'static str;

    /// Whether invocations must hold the per-host exclusivity lease.
    fn exclusive(&self) -> bool {
        false
    }

    /// One-time toolchain preparation per executable and process.
    async fn prepare_buildtime(&self, _ctx: &PrepareContext) -> Result<(), InvokerError> {
        Ok(())
    }

    /// One-time executable preparation (dependency resolution) per executable and process.
    async fn prepare_executable(&self, _ctx: &PrepareContext) -> Result<(), InvokerError> {
        Ok(())
    }

    /// Run the program once for the given context.
    async fn invoke(&self, ctx: &InvokeContext) -> InvokeOutcome;
}
