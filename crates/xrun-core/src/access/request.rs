use std::fmt;
use std::path::PathBuf;

use xrun_model::Env;

/// Command line to execute on an [`Access`](super::Access) target.
#[derive(Debug, Clone, Default)]
pub struct ExecRequest {
    pub command: String,
    pub env: Env,
    pub stdin: Option<String>,
    pub cwd: Option<PathBuf>,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn with_env(mut self, env: Env) -> Self {
        self.env = env;
        self
    }

    pub fn with_stdin(mut self, stdin: Option<String>) -> Self {
        self.stdin = stdin.filter(|s| !s.is_empty());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}

impl fmt::Display for ExecRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cwd {
            Some(cwd) => write!(f, "[{}] {}", cwd.display(), self.command),
            None => f.write_str(&self.command),
        }
    }
}

/// Captured result of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    /// Exit code; `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}
