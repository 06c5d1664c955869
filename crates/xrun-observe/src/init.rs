use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::LoggerConfig, error::LoggerError, format::LoggerFormat, timestamp::Rfc3339Timer};

/// Install the global subscriber described by `cfg`.
///
/// Fails when a subscriber is already set or the journal socket is unavailable.
pub fn init_logger(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let filter = cfg.level.to_env_filter();
    let timer = Rfc3339Timer::new(cfg.tz);

    match cfg.format {
        LoggerFormat::Text => {
            let layer = fmt::layer()
                .with_ansi(cfg.should_use_color())
                .with_target(cfg.with_targets)
                .with_timer(timer);
            install(tracing_subscriber::registry().with(filter).with(layer))
        }
        LoggerFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_target(cfg.with_targets)
                .with_timer(timer);
            install(tracing_subscriber::registry().with(filter).with(layer))
        }
        LoggerFormat::Journald => journald(cfg),
    }
}

#[cfg(target_os = "linux")]
fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let layer = tracing_journald::layer()?.with_syslog_identifier("xrun".to_string());
    install(tracing_subscriber::registry().with(cfg.level.to_env_filter()).with(layer))
}

#[cfg(not(target_os = "linux"))]
fn journald(_cfg: &LoggerConfig) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldUnsupported)
}

fn install<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(|_| LoggerError::AlreadyInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_rejected() {
        let cfg = LoggerConfig {
            format: LoggerFormat::Json,
            ..LoggerConfig::default()
        };
        let _ = init_logger(&cfg);
        assert!(matches!(init_logger(&cfg), Err(LoggerError::AlreadyInstalled)));
    }
}
