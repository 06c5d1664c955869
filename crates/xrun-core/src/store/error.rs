use thiserror::Error;
use xrun_model::RunStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("run '{0}' already exists")]
    Duplicate(String),

    #[error("run '{0}' not found")]
    NotFound(String),

    #[error("run '{id}' is {actual}")]
    StatusChanged { id: String, actual: RunStatus },

    #[error("store io {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("store document {path} is invalid: {reason}")]
    Corrupt { path: String, reason: String },
}
