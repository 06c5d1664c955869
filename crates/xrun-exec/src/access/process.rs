use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, trace, warn};
use xrun_core::access::{AccessError, ExecOutput};

/// Logging of captured command output.
#[derive(Debug, Clone, Copy)]
pub struct OutputLog {
    /// Max line length before truncation.
    pub max_line_length: usize,
    /// Log stdout at INFO level (false = DEBUG).
    pub stdout_info: bool,
    /// Log stderr at WARN level (false = DEBUG).
    pub stderr_warn: bool,
}

impl Default for OutputLog {
    fn default() -> Self {
        Self {
            max_line_length: 4096,
            stdout_info: false,
            stderr_warn: true,
        }
    }
}

impl OutputLog {
    fn truncate<'a>(&self, line: &'a str) -> &'a str {
        if line.len() <= self.max_line_length {
            return line;
        }
        let mut end = self.max_line_length;
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        &line[..end]
    }

    pub fn emit(&self, host: &str, out: &ExecOutput) {
        for line in out.stdout.lines() {
            let line = self.truncate(line);
            if self.stdout_info {
                info!(host, stream = "stdout", "{line}");
            } else {
                debug!(host, stream = "stdout", "{line}");
            }
        }
        for line in out.stderr.lines() {
            let line = self.truncate(line);
            if self.stderr_warn && !out.success() {
                warn!(host, stream = "stderr", "{line}");
            } else {
                debug!(host, stream = "stderr", "{line}");
            }
        }
    }
}

/// Spawn `cmd`, feed `stdin` and capture both streams.
pub(crate) async fn run_captured(
    mut cmd: Command,
    label: &str,
    stdin: Option<Vec<u8>>,
) -> Result<ExecOutput, AccessError> {
    cmd.stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|e| AccessError::Spawn {
        command: label.to_string(),
        reason: e.to_string(),
    })?;

    if let (Some(bytes), Some(mut pipe)) = (stdin, child.stdin.take()) {
        tokio::spawn(async move {
            if let Err(e) = pipe.write_all(&bytes).await {
                trace!(error = %e, "stdin closed early");
            }
        });
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| AccessError::Spawn {
            command: label.to_string(),
            reason: e.to_string(),
        })?;

    Ok(ExecOutput {
        code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}
