use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("host '{0}' is already running")]
    Conflict(String),

    #[error("timed out after {waited_ms}ms waiting for lock {path}")]
    Timeout { path: String, waited_ms: u64 },

    #[error("lock io {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("corrupt status file {path}: {reason}")]
    Corrupt { path: String, reason: String },

    #[error("lock task failed: {0}")]
    Join(String),
}
