use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Execution backend selector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessKind {
    #[default]
    Local,
    Ssh,
}

impl FromStr for AccessKind {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "" => Ok(AccessKind::Local),
            "ssh" => Ok(AccessKind::Ssh),
            _ => Err(ModelError::UnsupportedAccess(s.to_string())),
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Local => f.write_str("local"),
            AccessKind::Ssh => f.write_str("ssh"),
        }
    }
}

/// Remote host coordinates for the SSH backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    /// Inline private key material.
    pub private_key: Option<String>,
    /// Private key on the local filesystem.
    pub private_key_path: Option<String>,
}

impl SshTarget {
    /// `user@host` or `host`.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_access_kinds() {
        assert_eq!("local".parse::<AccessKind>().unwrap(), AccessKind::Local);
        assert_eq!("SSH".parse::<AccessKind>().unwrap(), AccessKind::Ssh);

        let err = "docker".parse::<AccessKind>().unwrap_err();
        assert_eq!(err.to_string(), "access 'docker' not supported");
    }
}
