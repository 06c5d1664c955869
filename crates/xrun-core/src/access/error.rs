use thiserror::Error;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("access '{0}' not supported")]
    Unsupported(String),

    #[error("{op} {path}: {reason}")]
    Io {
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("no such file: {0}")]
    NotFound(String),

    #[error("failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid access configuration: {0}")]
    Config(String),
}

impl AccessError {
    pub fn io(op: &'static str, path: impl std::fmt::Display, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound && op == "read" {
            return AccessError::NotFound(path.to_string());
        }
        AccessError::Io {
            op,
            path: path.to_string(),
            reason: err.to_string(),
        }
    }

    /// Error category used for metrics labels.
    pub fn as_label(&self) -> &'static str {
        match self {
            AccessError::Unsupported(_) => "unsupported",
            AccessError::Io { .. } => "io",
            AccessError::NotFound(_) => "not_found",
            AccessError::Spawn { .. } => "spawn",
            AccessError::Transport(_) => "transport",
            AccessError::Config(_) => "config",
        }
    }
}
