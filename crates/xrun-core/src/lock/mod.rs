//! Per-host exclusivity for invokers that mutate host toolchain state.
//!
//! A host→status map is persisted to `invoker-status.json` and only read or written while
//! holding the advisory lock file `invoker-status.lock` (created exclusively, bounded wait).
//! The same pair of files coordinates every process sharing the directory. The lock file holds
//! its owner's pid; one left behind by a process that is no longer alive is reclaimed.
mod error;
pub use error::LockError;

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::fs_atomic::atomic_write_file;

const STATUS_FILE: &str = "invoker-status.json";
const LOCK_FILE: &str = "invoker-status.lock";
const RUNNING: &str = "running";
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Default bound on waiting for the lock file.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

/// Persisted lock record: `{ "hosts": { <host>: "running" } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostStatus {
    #[serde(default)]
    pub hosts: BTreeMap<String, String>,
}

impl HostStatus {
    pub fn is_running(&self, host: &str) -> bool {
        self.hosts.get(host).is_some_and(|s| s == RUNNING)
    }
}

/// Removes the lock file when dropped.
struct LockFileGuard {
    path: PathBuf,
}

impl Drop for LockFileGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

fn io_err(path: &Path, e: std::io::Error) -> LockError {
    LockError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

fn is_process_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        std::process::Command::new("kill")
            .arg("-0")
            .arg(pid.to_string())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(true)
    }

    #[cfg(not(unix))]
    {
        true
    }
}

/// Exclusivity registry backed by a status file and a lock file in one directory.
#[derive(Debug, Clone)]
pub struct HostLockManager {
    status_path: PathBuf,
    lock_path: PathBuf,
    wait: Duration,
}

impl HostLockManager {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            status_path: dir.join(STATUS_FILE),
            lock_path: dir.join(LOCK_FILE),
            wait: DEFAULT_LOCK_WAIT,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    pub fn status_path(&self) -> &Path {
        &self.status_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Mark `host` running. An already-running host is a conflict; nothing is queued.
    #[instrument(level = "debug", skip(self), fields(status = %self.status_path.display()))]
    pub async fn acquire(&self, host: &str) -> Result<HostLease, LockError> {
        let this = self.clone();
        let h = host.to_string();
        tokio::task::spawn_blocking(move || this.acquire_blocking(&h))
            .await
            .map_err(|e| LockError::Join(e.to_string()))??;

        debug!(host, "host lease acquired");
        Ok(HostLease {
            manager: self.clone(),
            host: host.to_string(),
            released: false,
        })
    }

    /// Current persisted status, read under the lock.
    pub async fn snapshot(&self) -> Result<HostStatus, LockError> {
        let this = self.clone();
        tokio::task::spawn_blocking(move || this.locked(|status| Ok(status.clone())))
            .await
            .map_err(|e| LockError::Join(e.to_string()))?
    }

    async fn release(&self, host: &str) -> Result<(), LockError> {
        let this = self.clone();
        let h = host.to_string();
        tokio::task::spawn_blocking(move || this.release_blocking(&h))
            .await
            .map_err(|e| LockError::Join(e.to_string()))?
    }

    fn acquire_blocking(&self, host: &str) -> Result<(), LockError> {
        self.locked(|status| {
            if status.is_running(host) {
                return Err(LockError::Conflict(host.to_string()));
            }
            status.hosts.insert(host.to_string(), RUNNING.to_string());
            self.persist(status)
        })
    }

    fn release_blocking(&self, host: &str) -> Result<(), LockError> {
        self.locked(|status| {
            status.hosts.remove(host);
            self.persist(status)
        })
    }

    /// Run `f` over the freshly loaded status while holding the lock file.
    fn locked<T>(
        &self,
        f: impl FnOnce(&mut HostStatus) -> Result<T, LockError>,
    ) -> Result<T, LockError> {
        let _guard = self.take_lock()?;
        let mut status = self.load()?;
        f(&mut status)
    }

    fn take_lock(&self) -> Result<LockFileGuard, LockError> {
        if let Some(parent) = self.lock_path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
        }

        let started = Instant::now();
        loop {
            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&self.lock_path)
            {
                Ok(mut file) => {
                    let guard = LockFileGuard {
                        path: self.lock_path.clone(),
                    };
                    file.write_all(std::process::id().to_string().as_bytes())
                        .map_err(|e| io_err(&self.lock_path, e))?;
                    return Ok(guard);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if let Some(pid) = self.read_lock_pid()? {
                        if !is_process_alive(pid) {
                            warn!(pid, path = %self.lock_path.display(), "reclaiming stale lock file");
                            match fs::remove_file(&self.lock_path) {
                                Ok(()) => continue,
                                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                                Err(e) => return Err(io_err(&self.lock_path, e)),
                            }
                        }
                    }
                    if started.elapsed() >= self.wait {
                        return Err(LockError::Timeout {
                            path: self.lock_path.display().to_string(),
                            waited_ms: self.wait.as_millis() as u64,
                        });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(e) => return Err(io_err(&self.lock_path, e)),
            }
        }
    }

    /// Owner pid recorded in the lock file; `None` while it is missing or not yet written.
    fn read_lock_pid(&self) -> Result<Option<u32>, LockError> {
        match fs::read_to_string(&self.lock_path) {
            Ok(raw) => Ok(raw.trim().parse::<u32>().ok()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(&self.lock_path, e)),
        }
    }

    fn load(&self) -> Result<HostStatus, LockError> {
        let raw = match fs::read_to_string(&self.status_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(HostStatus::default()),
            Err(e) => return Err(io_err(&self.status_path, e)),
        };
        if raw.trim().is_empty() {
            return Ok(HostStatus::default());
        }
        serde_json::from_str(&raw).map_err(|e| LockError::Corrupt {
            path: self.status_path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn persist(&self, status: &HostStatus) -> Result<(), LockError> {
        let body = serde_json::to_vec_pretty(status).map_err(|e| LockError::Corrupt {
            path: self.status_path.display().to_string(),
            reason: e.to_string(),
        })?;
        atomic_write_file(&self.status_path, &body).map_err(|e| io_err(&self.status_path, e))
    }
}

/// Held exclusivity for one host.
///
/// Release explicitly with [`HostLease::release`]; a lease dropped unreleased is released in
/// the background.
#[derive(Debug)]
pub struct HostLease {
    manager: HostLockManager,
    host: String,
    released: bool,
}

impl HostLease {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn release(mut self) -> Result<(), LockError> {
        self.released = true;
        let res = self.manager.release(&self.host).await;
        debug!(host = %self.host, ok = res.is_ok(), "host lease released");
        res
    }
}

impl Drop for HostLease {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let manager = self.manager.clone();
        let host = std::mem::take(&mut self.host);
        let release = move || {
            if let Err(e) = manager.release_blocking(&host) {
                warn!(host = %host, error = %e, "failed to release dropped host lease");
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(release);
            }
            Err(_) => release(),
        }
    }
}
