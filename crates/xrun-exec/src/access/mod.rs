//! Access backends: the local machine and remote hosts over SSH.
mod local;
pub use local::LocalAccess;

mod process;
pub use process::OutputLog;

mod quote;
pub use quote::{quote, quote_path};

mod ssh;
pub use ssh::SshAccess;

use async_trait::async_trait;
use tracing::debug;
use xrun_core::access::{Access, AccessError, AccessFactory};
use xrun_model::{AccessKind, InvokerConfig, ModelError};

/// Factory for the built-in backends, selected by `invoker_config.access`.
#[derive(Debug, Clone, Default)]
pub struct DefaultAccessFactory {
    log: OutputLog,
}

impl DefaultAccessFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_log(mut self, log: OutputLog) -> Self {
        self.log = log;
        self
    }
}

fn config_error(err: ModelError) -> AccessError {
    match err {
        ModelError::UnsupportedAccess(kind) => AccessError::Unsupported(kind),
        other => AccessError::Config(other.to_string()),
    }
}

#[async_trait]
impl AccessFactory for DefaultAccessFactory {
    async fn open(&self, config: &InvokerConfig) -> Result<Box<dyn Access>, AccessError> {
        let kind = config.access_kind().map_err(config_error)?;
        debug!(access = %kind, host = config.host(), "opening access session");

        match kind {
            AccessKind::Local => Ok(Box::new(LocalAccess::new().with_output_log(self.log))),
            AccessKind::Ssh => {
                let target = config.ssh_target().map_err(config_error)?;
                let session = SshAccess::connect(target).await?;
                Ok(Box::new(session.with_output_log(self.log)))
            }
        }
    }
}
