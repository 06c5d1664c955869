use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use xrun_core::OrchestratorConfig;
use xrun_observe::LoggerConfig;

/// Daemon settings, read from `XRUN_*` environment variables.
///
/// | variable              | default            |
/// |-----------------------|--------------------|
/// | `XRUN_LISTEN`         | `0.0.0.0:8080`     |
/// | `XRUN_API_SPEC`       | `apispec.json`     |
/// | `XRUN_STORE_FILE`     | `<work>/runs.json` |
/// | `XRUN_WORK_DIR`       | `/var/lib/xrun`    |
/// | `XRUN_LOCK_DIR`       | `<work>/locks`     |
/// | `XRUN_LOCK_WAIT_MS`   | `5000`             |
///
/// Logging is configured by the `XRUN_LOG_*` variables of [`LoggerConfig`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub listen: SocketAddr,
    pub api_spec: PathBuf,
    pub store_file: PathBuf,
    pub orchestrator: OrchestratorConfig,
    pub logger: LoggerConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen = lookup("XRUN_LISTEN")
            .unwrap_or_else(|| "0.0.0.0:8080".into())
            .parse::<SocketAddr>()
            .context("XRUN_LISTEN must be a socket address")?;

        let work_dir = PathBuf::from(lookup("XRUN_WORK_DIR").unwrap_or_else(|| "/var/lib/xrun".into()));
        let api_spec = PathBuf::from(lookup("XRUN_API_SPEC").unwrap_or_else(|| "apispec.json".into()));
        let store_file = lookup("XRUN_STORE_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|| work_dir.join("runs.json"));

        let mut orchestrator = OrchestratorConfig::under(&work_dir);
        if let Some(dir) = lookup("XRUN_LOCK_DIR") {
            orchestrator.lock_dir = PathBuf::from(dir);
        }
        if let Some(ms) = lookup("XRUN_LOCK_WAIT_MS") {
            let ms: u64 = ms.parse().context("XRUN_LOCK_WAIT_MS must be milliseconds")?;
            orchestrator.lock_wait = Duration::from_millis(ms);
        }

        let logger = LoggerConfig::from_lookup(&lookup)?;

        Ok(Self {
            listen,
            api_spec,
            store_file,
            orchestrator,
            logger,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use xrun_observe::LoggerFormat;

    use super::*;

    fn cfg(pairs: &[(&str, &str)]) -> Result<AgentConfig> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AgentConfig::from_lookup(|key| map.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn defaults_live_under_work_dir() {
        let c = cfg(&[]).unwrap();
        assert_eq!(c.listen, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(c.api_spec, PathBuf::from("apispec.json"));
        assert_eq!(c.store_file, PathBuf::from("/var/lib/xrun/runs.json"));
        assert_eq!(c.orchestrator, OrchestratorConfig::under("/var/lib/xrun"));
    }

    #[test]
    fn overrides_are_applied() {
        let c = cfg(&[
            ("XRUN_LISTEN", "127.0.0.1:9000"),
            ("XRUN_WORK_DIR", "/srv/xrun"),
            ("XRUN_LOCK_DIR", "/run/xrun"),
            ("XRUN_LOCK_WAIT_MS", "250"),
            ("XRUN_LOG_FORMAT", "json"),
        ])
        .unwrap();
        assert_eq!(c.listen.port(), 9000);
        assert_eq!(c.store_file, PathBuf::from("/srv/xrun/runs.json"));
        assert_eq!(c.orchestrator.runs_dir, PathBuf::from("/srv/xrun/runs"));
        assert_eq!(c.orchestrator.lock_dir, PathBuf::from("/run/xrun"));
        assert_eq!(c.orchestrator.lock_wait, Duration::from_millis(250));
        assert_eq!(c.logger.format, LoggerFormat::Json);
    }

    #[test]
    fn malformed_values_are_errors() {
        assert!(cfg(&[("XRUN_LISTEN", "nowhere")]).is_err());
        assert!(cfg(&[("XRUN_LOCK_WAIT_MS", "soon")]).is_err());
        assert!(cfg(&[("XRUN_LOG_LEVEL", "xrun=loud")]).is_err());
    }
}
