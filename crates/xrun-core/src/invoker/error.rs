use thiserror::Error;
use xrun_model::ModelError;

use crate::access::AccessError;
use crate::mapping::MappingError;

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("parameter '{0}' must be specified")]
    MissingParameter(&'static str),

    #[error(transparent)]
    Config(#[from] ModelError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("{step} failed (exit {exit}): {stderr}", exit = display_code(.code))]
    Toolchain {
        step: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("executable has no sources")]
    NoSources,

    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    #[error("internal error: {0}")]
    Internal(String),
}

fn display_code(code: &Option<i32>) -> String {
    code.map(|c| c.to_string()).unwrap_or_else(|| "signal".into())
}

impl InvokerError {
    /// Error category used for metrics labels.
    pub fn as_label(&self) -> &'static str {
        match self {
            InvokerError::MissingParameter(_) => "missing_parameter",
            InvokerError::Config(_) => "config",
            InvokerError::Access(e) => e.as_label(),
            InvokerError::Mapping(_) => "mapping",
            InvokerError::Toolchain { .. } => "toolchain",
            InvokerError::NoSources => "no_sources",
            InvokerError::Download { .. } => "download",
            InvokerError::Internal(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toolchain_error_mentions_step_and_code() {
        let err = InvokerError::Toolchain {
            step: "run",
            code: Some(2),
            stderr: "boom".into(),
        };
        assert_eq!(err.to_string(), "run failed (exit 2): boom");

        let err = InvokerError::Toolchain {
            step: "install",
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("exit signal"));
        assert_eq!(err.as_label(), "toolchain");
    }
}
