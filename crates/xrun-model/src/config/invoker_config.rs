use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AccessKind, SshTarget};
use crate::domain::{
    DEFAULT_MAX_RUNS, DEFAULT_MIN_RUNS, DEFAULT_SSH_PORT, INVOKER_CONFIG_PARAM, LOCAL_HOST,
    ValueMap,
};
use crate::error::{ModelError, ModelResult};
use crate::strategy::RetryPolicy;
use crate::Env;

/// Per-run invoker settings carried in the `invoker_config` parameter.
///
/// Every field is optional on the wire; absent values take the defaults below. Toolchain
/// specific defaults (versions, root directories) are applied by the invoker itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Access backend name; parsed lazily so unsupported values fail at selection time.
    pub access: String,
    pub version: Option<String>,
    pub stdin: Option<String>,
    pub env: Env,

    pub min_runs: u32,
    pub max_runs: u32,

    pub ssh_host: Option<String>,
    pub ssh_port: u16,
    pub ssh_user: Option<String>,
    pub ssh_private_key: Option<String>,
    pub ssh_private_key_path: Option<String>,

    /// Python: contents of `requirements.txt`.
    pub requirements: Option<String>,
    /// Ruby: contents of `Gemfile`.
    pub gemfile: Option<String>,
    /// Ruby: contents of `Gemfile.lock`.
    pub gemfile_lock: Option<String>,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            access: AccessKind::Local.to_string(),
            version: None,
            stdin: None,
            env: Env::new(),
            min_runs: DEFAULT_MIN_RUNS,
            max_runs: DEFAULT_MAX_RUNS,
            ssh_host: None,
            ssh_port: DEFAULT_SSH_PORT,
            ssh_user: None,
            ssh_private_key: None,
            ssh_private_key_path: None,
            requirements: None,
            gemfile: None,
            gemfile_lock: None,
        }
    }
}

impl InvokerConfig {
    /// Extract the configuration from a run's parameters.
    ///
    /// Accepts the block as a JSON object or as a string holding a JSON object.
    pub fn from_params(params: &ValueMap) -> ModelResult<Self> {
        match params.get(INVOKER_CONFIG_PARAM) {
            None | Some(Value::Null) => Ok(Self::default()),
            Some(Value::String(raw)) => serde_json::from_str(raw)
                .map_err(|e| ModelError::InvalidInvokerConfig(e.to_string())),
            Some(v @ Value::Object(_)) => serde_json::from_value(v.clone())
                .map_err(|e| ModelError::InvalidInvokerConfig(e.to_string())),
            Some(other) => Err(ModelError::InvalidInvokerConfig(format!(
                "expected object, got {other}"
            ))),
        }
    }

    pub fn access_kind(&self) -> ModelResult<AccessKind> {
        self.access.parse()
    }

    /// Host identity used for exclusivity bookkeeping.
    pub fn host(&self) -> &str {
        self.ssh_host.as_deref().unwrap_or(LOCAL_HOST)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.min_runs, self.max_runs)
    }

    /// SSH coordinates; `ssh_host` is mandatory.
    pub fn ssh_target(&self) -> ModelResult<SshTarget> {
        let host = self
            .ssh_host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| ModelError::InvalidInvokerConfig("ssh_host is required".into()))?;
        Ok(SshTarget {
            host,
            port: self.ssh_port,
            user: self.ssh_user.clone(),
            private_key: self.ssh_private_key.clone(),
            private_key_path: self.ssh_private_key_path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn params(v: Value) -> ValueMap {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn missing_block_yields_defaults() {
        let cfg = InvokerConfig::from_params(&params(json!({"cmd": "ls"}))).unwrap();
        assert_eq!(cfg.access_kind().unwrap(), AccessKind::Local);
        assert_eq!(cfg.min_runs, 1);
        assert_eq!(cfg.max_runs, 3);
        assert_eq!(cfg.host(), "localhost");
        assert!(cfg.env.is_empty());
    }

    #[test]
    fn object_block_overrides_defaults() {
        let cfg = InvokerConfig::from_params(&params(json!({
            "invoker_config": {
                "access": "ssh",
                "ssh_host": "10.0.0.5",
                "ssh_user": "ops",
                "max_runs": 5,
                "env": {"A": "1"},
                "stdin": "hello"
            }
        })))
        .unwrap();

        assert_eq!(cfg.access_kind().unwrap(), AccessKind::Ssh);
        assert_eq!(cfg.host(), "10.0.0.5");
        assert_eq!(cfg.max_runs, 5);
        assert_eq!(cfg.min_runs, 1);
        assert_eq!(cfg.env.get("A"), Some("1"));
        assert_eq!(cfg.stdin.as_deref(), Some("hello"));

        let target = cfg.ssh_target().unwrap();
        assert_eq!(target.destination(), "ops@10.0.0.5");
        assert_eq!(target.port, 22);
    }

    #[test]
    fn string_block_is_parsed_as_json() {
        let cfg = InvokerConfig::from_params(&params(json!({
            "invoker_config": "{\"access\":\"local\",\"min_runs\":2}"
        })))
        .unwrap();
        assert_eq!(cfg.min_runs, 2);
    }

    #[test]
    fn unsupported_access_and_bad_block_fail() {
        let cfg = InvokerConfig::from_params(&params(json!({
            "invoker_config": {"access": "telnet"}
        })))
        .unwrap();
        assert!(matches!(cfg.access_kind(), Err(ModelError::UnsupportedAccess(_))));

        assert!(InvokerConfig::from_params(&params(json!({"invoker_config": 7}))).is_err());
        assert!(InvokerConfig::default().ssh_target().is_err());
    }
}
