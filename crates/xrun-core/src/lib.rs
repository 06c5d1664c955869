pub mod access;
pub mod error;
pub mod invoker;
pub mod lock;
pub mod mapping;
pub mod materialize;
pub mod metrics;
pub mod orchestrator;
pub mod prepared;
pub mod registry;
pub mod store;

mod fs_atomic;

pub use metrics::RunOutcome;
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorConfig};

pub mod prelude {
    pub use crate::access::{Access, AccessError, AccessFactory, ExecOutput, ExecRequest};
    pub use crate::error::CoreError;
    pub use crate::invoker::{InvokeContext, InvokeOutcome, Invoker, InvokerError, PrepareContext};
    pub use crate::mapping::Collected;
    pub use crate::metrics::{MetricsBackend, MetricsHandle, RunOutcome};
    pub use crate::orchestrator::{Orchestrator, OrchestratorConfig};
    pub use crate::registry::InvokerRegistry;
    pub use crate::store::{FileRunStore, InMemoryRunStore, RunFilter, RunStore};
}
