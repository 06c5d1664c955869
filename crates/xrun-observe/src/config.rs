use std::io::IsTerminal;

use serde::{Deserialize, Serialize};

use crate::{error::LoggerError, format::LoggerFormat, level::LoggerLevel, timestamp::LoggerTimeZone};

pub const ENV_LOG_FORMAT: &str = "XRUN_LOG_FORMAT";
pub const ENV_LOG_LEVEL: &str = "XRUN_LOG_LEVEL";
pub const ENV_LOG_TZ: &str = "XRUN_LOG_TZ";
pub const ENV_LOG_COLOR: &str = "XRUN_LOG_COLOR";
pub const ENV_LOG_TARGETS: &str = "XRUN_LOG_TARGETS";

/// Logger settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive.
    pub level: LoggerLevel,
    pub tz: LoggerTimeZone,
    pub with_targets: bool,
    /// Requested colors; only honoured on a terminal.
    pub use_color: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            level: LoggerLevel::default(),
            tz: LoggerTimeZone::Utc,
            with_targets: true,
            use_color: true,
        }
    }
}

impl LoggerConfig {
    /// Read `XRUN_LOG_*` variables from the process environment.
    ///
    /// `RUST_LOG` is used as the filter when `XRUN_LOG_LEVEL` is unset.
    pub fn from_env() -> Result<Self, LoggerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(v) = lookup(ENV_LOG_FORMAT) {
            cfg.format = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LOG_LEVEL).or_else(|| lookup("RUST_LOG")) {
            cfg.level = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LOG_TZ) {
            cfg.tz = v.parse()?;
        }
        if let Some(v) = lookup(ENV_LOG_COLOR) {
            cfg.use_color = parse_flag(ENV_LOG_COLOR, &v)?;
        }
        if let Some(v) = lookup(ENV_LOG_TARGETS) {
            cfg.with_targets = parse_flag(ENV_LOG_TARGETS, &v)?;
        }
        Ok(cfg)
    }

    pub fn should_use_color(&self) -> bool {
        self.use_color && std::io::stdout().is_terminal()
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, LoggerError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(LoggerError::InvalidFlag {
            key,
            value: value.to_string(),
        }),
    }
}
