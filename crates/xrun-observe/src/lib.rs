//! Logging setup for xrun services.
//!
//! A [`LoggerConfig`] is usually built from the process environment
//! ([`LoggerConfig::from_env`]) and handed to [`init_logger`] once at startup.
mod config;
mod error;
mod format;
mod init;
mod level;
mod timestamp;

pub use config::{ENV_LOG_COLOR, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_LOG_TARGETS, ENV_LOG_TZ, LoggerConfig};
pub use error::LoggerError;
pub use format::LoggerFormat;
pub use init::init_logger;
pub use level::LoggerLevel;
pub use timestamp::{LoggerTimeZone, Rfc3339Timer, init_local_offset};
