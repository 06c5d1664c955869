use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format '{0}' (expected text, json or journald)")]
    InvalidFormat(String),
    #[error("invalid log filter '{0}': {1}")]
    InvalidLevel(String, String),
    #[error("unknown log timezone '{0}' (expected utc or local)")]
    InvalidTimeZone(String),
    #[error("invalid boolean '{value}' for {key}")]
    InvalidFlag { key: &'static str, value: String },
    #[error("journald is not reachable: {0}")]
    Journald(#[from] std::io::Error),
    #[error("journald output is only available on linux")]
    JournaldUnsupported,
    #[error("a global subscriber is already installed")]
    AlreadyInstalled,
}
