use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tempfile::{NamedTempFile, TempDir};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use xrun_core::access::{Access, AccessError, ExecOutput, ExecRequest};
use xrun_model::SshTarget;

use super::process::{OutputLog, run_captured};
use super::quote::{quote, quote_path};

/// Exit code of the read probe when the file does not exist.
const MISSING_FILE_CODE: i32 = 44;

/// Session on a remote host through the system `ssh` client.
///
/// Every command is multiplexed over one control connection whose socket lives in a private
/// temporary directory; [`Access::terminate`] closes it.
pub struct SshAccess {
    target: SshTarget,
    control_dir: TempDir,
    // inline key material, kept on disk for the session lifetime
    key_file: Option<NamedTempFile>,
    log: OutputLog,
}

impl SshAccess {
    /// Open the control connection to `target`.
    #[instrument(level = "debug", skip_all, fields(host = %target.host, port = target.port))]
    pub async fn connect(target: SshTarget) -> Result<Self, AccessError> {
        let control_dir = tempfile::Builder::new()
            .prefix("xrun-ssh-")
            .tempdir()
            .map_err(|e| AccessError::io("mkdir", "ssh control dir", e))?;

        let key_file = match &target.private_key {
            Some(key) => Some(write_key(key)?),
            None => None,
        };

        let access = Self {
            target,
            control_dir,
            key_file,
            log: OutputLog::default(),
        };

        let out = access.ssh("true", None).await?;
        if !out.success() {
            return Err(AccessError::Transport(format!(
                "cannot connect to {}: {}",
                access.target.destination(),
                out.stderr.trim()
            )));
        }
        info!(destination = %access.target.destination(), "ssh session opened");
        Ok(access)
    }

    pub fn with_output_log(mut self, log: OutputLog) -> Self {
        self.log = log;
        self
    }

    fn control_path(&self) -> PathBuf {
        self.control_dir.path().join("ctl")
    }

    fn key_path(&self) -> Option<PathBuf> {
        self.key_file
            .as_ref()
            .map(|f| f.path().to_path_buf())
            .or_else(|| self.target.private_key_path.as_ref().map(PathBuf::from))
    }

    fn options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".into(),
            "-o".into(),
            "StrictHostKeyChecking=no".into(),
            "-o".into(),
            "UserKnownHostsFile=/dev/null".into(),
            "-o".into(),
            "LogLevel=ERROR".into(),
            "-o".into(),
            "ControlMaster=auto".into(),
            "-o".into(),
            format!("ControlPath={}", self.control_path().display()),
            "-o".into(),
            "ControlPersist=120".into(),
            "-p".into(),
            self.target.port.to_string(),
        ];
        if let Some(key) = self.key_path() {
            args.push("-i".into());
            args.push(key.display().to_string());
        }
        args
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("ssh");
        cmd.args(self.options()).arg(self.target.destination());
        cmd
    }

    /// Run a remote shell line.
    async fn ssh(&self, line: &str, stdin: Option<Vec<u8>>) -> Result<ExecOutput, AccessError> {
        let mut cmd = self.command();
        cmd.arg(line);
        run_captured(cmd, line, stdin).await
    }

    /// Run a remote shell line that must succeed.
    async fn ssh_ok(&self, op: &'static str, path: &Path, line: &str) -> Result<ExecOutput, AccessError> {
        let out = self.ssh(line, None).await?;
        if out.success() {
            Ok(out)
        } else {
            Err(AccessError::Io {
                op,
                path: path.display().to_string(),
                reason: out.stderr.trim().to_string(),
            })
        }
    }
}

fn write_key(key: &str) -> Result<NamedTempFile, AccessError> {
    // created with mode 0600 on unix
    let mut file = tempfile::Builder::new()
        .prefix("xrun-key-")
        .tempfile()
        .map_err(|e| AccessError::io("write", "ssh key", e))?;
    fill_key(&mut file, key).map_err(|e| AccessError::io("write", file.path().display(), e))?;
    Ok(file)
}

fn fill_key(file: &mut NamedTempFile, key: &str) -> std::io::Result<()> {
    file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    file.flush()
}

/// Remote shell line for an [`ExecRequest`].
pub(crate) fn remote_line(req: &ExecRequest) -> String {
    let mut line = String::new();
    if let Some(cwd) = &req.cwd {
        line.push_str(&format!("cd {} && ", quote_path(cwd)));
    }
    if !req.env.is_empty() {
        line.push_str("env ");
        for kv in req.env.iter() {
            line.push_str(&quote(&kv.to_assignment()));
            line.push(' ');
        }
    }
    line.push_str("sh -c ");
    line.push_str(&quote(&req.command));
    line
}

fn parent_of(path: &Path) -> &Path {
    path.parent().unwrap_or(Path::new("/"))
}

#[async_trait]
impl Access for SshAccess {
    fn host(&self) -> &str {
        &self.target.host
    }

    async fn exec(&self, req: ExecRequest) -> Result<ExecOutput, AccessError> {
        debug!(host = %self.target.host, command = %req, "exec");
        let line = remote_line(&req);
        let out = self.ssh(&line, req.stdin.map(String::into_bytes)).await?;
        self.log.emit(&self.target.host, &out);
        Ok(out)
    }

    async fn exists(&self, path: &Path) -> Result<bool, AccessError> {
        let out = self.ssh(&format!("test -e {}", quote_path(path)), None).await?;
        match out.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(AccessError::Transport(out.stderr.trim().to_string())),
        }
    }

    async fn mkdir(&self, path: &Path) -> Result<(), AccessError> {
        self.ssh_ok("mkdir", path, &format!("mkdir -p {}", quote_path(path)))
            .await
            .map(drop)
    }

    async fn remove(&self, path: &Path) -> Result<(), AccessError> {
        self.ssh_ok("remove", path, &format!("rm -rf {}", quote_path(path)))
            .await
            .map(drop)
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), AccessError> {
        let line = format!(
            "mkdir -p {} && base64 -d > {}",
            quote_path(parent_of(path)),
            quote_path(path)
        );
        let out = self
            .ssh(&line, Some(STANDARD.encode(content).into_bytes()))
            .await?;
        if out.success() {
            Ok(())
        } else {
            Err(AccessError::Io {
                op: "write",
                path: path.display().to_string(),
                reason: out.stderr.trim().to_string(),
            })
        }
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, AccessError> {
        let p = quote_path(path);
        let line = format!("test -f {p} || exit {MISSING_FILE_CODE}; base64 < {p}");
        let out = self.ssh(&line, None).await?;
        match out.code {
            Some(0) => {
                let encoded: String = out.stdout.split_whitespace().collect();
                STANDARD.decode(encoded).map_err(|e| AccessError::Io {
                    op: "read",
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
            Some(MISSING_FILE_CODE) => Err(AccessError::NotFound(path.display().to_string())),
            _ => Err(AccessError::Io {
                op: "read",
                path: path.display().to_string(),
                reason: out.stderr.trim().to_string(),
            }),
        }
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), AccessError> {
        let (f, t) = (quote_path(from), quote_path(to));
        let line = format!(
            "if [ -d {f} ]; then mkdir -p {t} && cp -R {f}/. {t}; else mkdir -p {} && cp {f} {t}; fi",
            quote_path(parent_of(to))
        );
        self.ssh_ok("copy", from, &line).await.map(drop)
    }

    async fn move_path(&self, from: &Path, to: &Path) -> Result<(), AccessError> {
        let line = format!(
            "mkdir -p {} && mv {} {}",
            quote_path(parent_of(to)),
            quote_path(from),
            quote_path(to)
        );
        self.ssh_ok("move", from, &line).await.map(drop)
    }

    /// Streams a tar archive of `local` into `remote`.
    async fn copy_dir_to_remote(&self, local: &Path, remote: &Path) -> Result<(), AccessError> {
        let spawn_err = |command: &str, e: std::io::Error| AccessError::Spawn {
            command: command.to_string(),
            reason: e.to_string(),
        };

        let mut tar = Command::new("tar")
            .arg("-C")
            .arg(local)
            .args(["-cf", "-", "."])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_err("tar", e))?;
        let archive: Stdio = tar
            .stdout
            .take()
            .ok_or_else(|| AccessError::Transport("tar stdout unavailable".into()))?
            .try_into()
            .map_err(|e| spawn_err("tar", e))?;

        let r = quote_path(remote);
        let mut unpack = self.command();
        unpack
            .arg(format!("mkdir -p {r} && tar -C {r} -xf -"))
            .stdin(archive)
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        let unpack = unpack.spawn().map_err(|e| spawn_err("ssh", e))?;

        let (packed, unpacked) = tokio::join!(tar.wait_with_output(), unpack.wait_with_output());
        let packed = packed.map_err(|e| spawn_err("tar", e))?;
        let unpacked = unpacked.map_err(|e| spawn_err("ssh", e))?;

        for (output, side) in [(&packed, "pack"), (&unpacked, "unpack")] {
            if !output.status.success() {
                return Err(AccessError::Io {
                    op: "copy",
                    path: format!("{} ({side})", local.display()),
                    reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }
        debug!(from = %local.display(), to = %remote.display(), "tree copied to host");
        Ok(())
    }

    async fn terminate(&self) -> Result<(), AccessError> {
        let mut cmd = Command::new("ssh");
        cmd.arg("-o")
            .arg(format!("ControlPath={}", self.control_path().display()))
            .args(["-O", "exit"])
            .arg(self.target.destination());
        let out = run_captured(cmd, "ssh -O exit", None).await?;
        if out.success() {
            debug!(host = %self.target.host, "ssh session closed");
        } else {
            warn!(host = %self.target.host, stderr = %out.stderr.trim(), "control connection already gone");
        }
        Ok(())
    }
}
