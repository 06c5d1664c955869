use thiserror::Error;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("invalid status = '{0}'")]
    InvalidStatus(String),

    #[error("access '{0}' not supported")]
    UnsupportedAccess(String),

    #[error("unknown mapping: {0}")]
    UnknownMapping(String),

    #[error("invalid invoker_config: {0}")]
    InvalidInvokerConfig(String),

    #[error("failed to read api spec {path}: {reason}")]
    SpecIo { path: String, reason: String },

    #[error("failed to parse api spec: {0}")]
    SpecParse(String),

    #[error("invalid model: {0}")]
    Invalid(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
