use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};
use xrun_core::access::{Access, AccessError, ExecOutput, ExecRequest};
use xrun_model::LOCAL_HOST;

use super::process::{OutputLog, run_captured};

/// Access to the machine the daemon runs on.
#[derive(Debug, Clone, Default)]
pub struct LocalAccess {
    log: OutputLog,
}

impl LocalAccess {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_log(mut self, log: OutputLog) -> Self {
        self.log = log;
        self
    }
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    if from.is_dir() {
        std::fs::create_dir_all(to)?;
        for entry in std::fs::read_dir(from)? {
            let entry = entry?;
            copy_tree(&entry.path(), &to.join(entry.file_name()))?;
        }
    } else {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(from, to)?;
    }
    Ok(())
}

async fn copy_blocking(from: &Path, to: &Path) -> Result<(), AccessError> {
    let (src, dst) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
        .await
        .map_err(|e| AccessError::Transport(format!("copy task failed: {e}")))?
        .map_err(|e| AccessError::io("copy", from.display(), e))
}

#[async_trait]
impl Access for LocalAccess {
    fn host(&self) -> &str {
        LOCAL_HOST
    }

    async fn exec(&self, req: ExecRequest) -> Result<ExecOutput, AccessError> {
        debug!(command = %req, env_len = req.env.len(), "exec");

        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(&req.command);
        if let Some(cwd) = &req.cwd {
            cmd.current_dir(cwd);
        }
        for kv in req.env.iter() {
            cmd.env(kv.key(), kv.value());
        }

        let out = run_captured(cmd, &req.command, req.stdin.map(String::into_bytes)).await?;
        self.log.emit(LOCAL_HOST, &out);
        trace!(code = ?out.code, "exec done");
        Ok(out)
    }

    async fn exists(&self, path: &Path) -> Result<bool, AccessError> {
        tokio::fs::try_exists(path)
            .await
            .map_err(|e| AccessError::io("stat", path.display(), e))
    }

    async fn mkdir(&self, path: &Path) -> Result<(), AccessError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| AccessError::io("mkdir", path.display(), e))
    }

    async fn remove(&self, path: &Path) -> Result<(), AccessError> {
        let meta = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(AccessError::io("remove", path.display(), e)),
        };
        let res = if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        };
        res.map_err(|e| AccessError::io("remove", path.display(), e))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), AccessError> {
        if let Some(parent) = path.parent() {
            self.mkdir(parent).await?;
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| AccessError::io("write", path.display(), e))
    }

    async fn read_file(&self, path: &Path) -> Result<Vec<u8>, AccessError> {
        tokio::fs::read(path)
            .await
            .map_err(|e| AccessError::io("read", path.display(), e))
    }

    async fn copy(&self, from: &Path, to: &Path) -> Result<(), AccessError> {
        copy_blocking(from, to).await
    }

    async fn move_path(&self, from: &Path, to: &Path) -> Result<(), AccessError> {
        if let Some(parent) = to.parent() {
            self.mkdir(parent).await?;
        }
        tokio::fs::rename(from, to)
            .await
            .map_err(|e| AccessError::io("move", from.display(), e))
    }

    async fn copy_dir_to_remote(&self, local: &Path, remote: &Path) -> Result<(), AccessError> {
        copy_blocking(local, remote).await
    }

    async fn terminate(&self) -> Result<(), AccessError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use xrun_model::Env;

    use super::*;

    fn list_files(root: &Path) -> Vec<PathBuf> {
        fn walk(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) {
            for entry in std::fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    walk(root, &path, out);
                } else {
                    out.push(path.strip_prefix(root).unwrap().to_path_buf());
                }
            }
        }
        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[tokio::test]
    async fn exec_applies_env_cwd_and_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let access = LocalAccess::new();

        let mut env = Env::new();
        env.push("GREETING", "hi");
        let req = ExecRequest::new(r#"printf '%s %s ' "$GREETING" "$(basename "$PWD")"; cat"#)
            .with_env(env)
            .with_cwd(dir.path())
            .with_stdin(Some("there".into()));

        let out = access.exec(req).await.unwrap();
        assert!(out.success());
        let name = dir.path().file_name().unwrap().to_string_lossy();
        assert_eq!(out.stdout, format!("hi {name} there"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_reported_not_raised() {
        let out = LocalAccess::new()
            .exec(ExecRequest::new("echo nope >&2; exit 7"))
            .await
            .unwrap();
        assert_eq!(out.code, Some(7));
        assert_eq!(out.stderr, "nope\n");
    }

    #[tokio::test]
    async fn file_operations_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let access = LocalAccess::new();
        let file = dir.path().join("a/b/c.txt");

        access.write_file(&file, b"data").await.unwrap();
        assert!(access.exists(&file).await.unwrap());
        assert_eq!(access.read_file(&file).await.unwrap(), b"data");

        let moved = dir.path().join("moved/c.txt");
        access.move_path(&file, &moved).await.unwrap();
        assert!(!access.exists(&file).await.unwrap());

        access.remove(&dir.path().join("moved")).await.unwrap();
        assert!(!access.exists(&moved).await.unwrap());
        access.remove(&dir.path().join("never")).await.unwrap();

        assert!(matches!(
            access.read_file(&moved).await,
            Err(AccessError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn copy_dir_to_remote_copies_tree() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(src.path().join("lib")).unwrap();
        std::fs::write(src.path().join("main.sh"), "echo").unwrap();
        std::fs::write(src.path().join("lib/util.sh"), "true").unwrap();

        let target = dst.path().join("exec");
        let access = LocalAccess::new();
        access.copy_dir_to_remote(src.path(), &target).await.unwrap();

        assert_eq!(
            list_files(&target),
            vec![PathBuf::from("lib/util.sh"), PathBuf::from("main.sh")]
        );
    }

    #[tokio::test]
    async fn unreadable_result_file_is_not_reported_missing() {
        use xrun_core::mapping::{Collected, MappingError, collect_result_files, map_results};

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("report.txt")).unwrap();
        let schema: xrun_model::Schema = serde_json::from_value(serde_json::json!({
            "report": {"mapping": "file", "file_path": "report.txt"},
            "absent": {"mapping": "file", "file_path": "absent.txt"}
        }))
        .unwrap();

        let mut collected = Collected::default();
        collect_result_files(&LocalAccess::new(), &schema, dir.path(), &mut collected).await;

        assert!(collected.file_errors.contains_key("report"));
        assert!(!collected.file_errors.contains_key("absent"));
        let err = map_results(&schema, collected).unwrap_err();
        assert!(matches!(err, MappingError::UnreadableFile { ref name, .. } if name == "report"));
    }

}
