//! Chef-solo invoker.
//!
//! Layout on the target, per executable:
//!
//! ```text
//! <work_root>/<executable>/
//!   executable/             staged cookbook sources, result files are read here
//!   chef_data/cookbooks/    the cookbook plus its downloaded dependencies
//!   chef_data/roles/
//!   chef.rb                 solo configuration
//!   run_list.json           unflattened run parameters
//!   .environment_installed  marker: layout above is complete
//! ```
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};
use xrun_core::access::{Access, AccessError, ExecRequest};
use xrun_core::invoker::{
    InvokeContext, InvokeOutcome, Invoker, InvokerError, PrepareContext, run_with_retry,
};
use xrun_core::mapping::{Collected, unflatten};
use xrun_model::{Executable, InvokerConfig, ModelError, PATH_DELIMITER};

use super::session::{outcome, program_env, run_step, wind_down};
use crate::access::quote_path;

pub const CHEF_WORK_ROOT: &str = "/tmp/xrun-chef";
pub const CHEF_INSTALL_MARKER: &str = "/opt/chef_installed";
pub const SUPERMARKET_URL: &str = "https://supermarket.getchef.com/cookbooks";
const DEFAULT_DEPENDENCIES_SUBDIR: &str = "cookbook_dependencies";
const INSTALL_SCRIPT: &str = "if type apt-get > /dev/null 2>&1; then sudo apt-get -y update && sudo apt-get -y install curl; fi \
    && if type yum > /dev/null 2>&1; then sudo yum -y install curl; fi \
    && curl -L https://www.opscode.com/chef/install.sh | sudo bash";

struct Layout {
    base: PathBuf,
    exec_dir: PathBuf,
    chef_dir: PathBuf,
    cookbooks_dir: PathBuf,
    roles_dir: PathBuf,
    env_marker: PathBuf,
    config_file: PathBuf,
    run_list_file: PathBuf,
}

impl Layout {
    fn new(base: PathBuf) -> Self {
        let chef_dir = base.join("chef_data");
        Self {
            exec_dir: base.join("executable"),
            cookbooks_dir: chef_dir.join("cookbooks"),
            roles_dir: chef_dir.join("roles"),
            env_marker: base.join(".environment_installed"),
            config_file: base.join("chef.rb"),
            run_list_file: base.join("run_list.json"),
            chef_dir,
            base,
        }
    }

    fn solo_config(&self) -> String {
        format!(
            "file_cache_path \"{}\"\ncookbook_path [ \"{}\" ]\nrole_path \"{}\"\n",
            self.chef_dir.display(),
            self.cookbooks_dir.display(),
            self.roles_dir.display()
        )
    }
}

fn dependencies_subdir(executable: &Executable) -> &str {
    executable
        .dependencies_subdir
        .as_deref()
        .unwrap_or(DEFAULT_DEPENDENCIES_SUBDIR)
}

/// Parsed `metadata.json`, or `None` when the file does not exist.
async fn read_metadata(path: &Path) -> Result<Option<Value>, InvokerError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(AccessError::io("read", path.display(), e).into()),
    };
    serde_json::from_slice(&raw)
        .map(Some)
        .map_err(|e| ModelError::Invalid(format!("{}: {e}", path.display())).into())
}

/// Names of the cookbooks a metadata document depends on.
fn metadata_dependencies(metadata: &Value) -> Vec<String> {
    metadata
        .get("dependencies")
        .and_then(Value::as_object)
        .map(|deps| deps.keys().cloned().collect())
        .unwrap_or_default()
}

fn checked_cookbook_name(name: &str) -> Result<&str, InvokerError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(name)
    } else {
        Err(ModelError::Invalid(format!("invalid cookbook name '{name}'")).into())
    }
}

/// Converges a cookbook with `chef-solo`.
///
/// Exclusive per host: chef mutates machine-wide state.
#[derive(Debug, Clone)]
pub struct ChefInvoker {
    work_root: PathBuf,
    install_marker: PathBuf,
    install_script: String,
    solo_command: String,
    supermarket: String,
    http: reqwest::Client,
}

impl Default for ChefInvoker {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from(CHEF_WORK_ROOT),
            install_marker: PathBuf::from(CHEF_INSTALL_MARKER),
            install_script: INSTALL_SCRIPT.to_string(),
            solo_command: "sudo chef-solo".to_string(),
            supermarket: SUPERMARKET_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }
}

impl ChefInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// File whose presence on the target means chef is installed.
    pub fn with_install_marker(mut self, marker: impl Into<PathBuf>) -> Self {
        self.install_marker = marker.into();
        self
    }

    pub fn with_install_script(mut self, script: impl Into<String>) -> Self {
        self.install_script = script.into();
        self
    }

    /// Command prefix invoked as `<solo> -c <chef.rb> -j <run_list.json>`.
    pub fn with_solo_command(mut self, command: impl Into<String>) -> Self {
        self.solo_command = command.into();
        self
    }

    /// Base URL of the cookbook site dependencies are downloaded from.
    pub fn with_supermarket(mut self, url: impl Into<String>) -> Self {
        self.supermarket = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    async fn cookbook_name(&self, executable: &Executable, source: &Path) -> Result<String, InvokerError> {
        if let Some(name) = executable.cookbook_name.as_deref() {
            return Ok(checked_cookbook_name(name)?.to_string());
        }
        let metadata = read_metadata(&source.join("metadata.json")).await?;
        match metadata.as_ref().and_then(|m| m.get("name")).and_then(Value::as_str) {
            Some(name) => Ok(checked_cookbook_name(name)?.to_string()),
            None => Err(ModelError::Invalid("cookbook name cannot be determined".into()).into()),
        }
    }

    /// Lay out the chef data directory and install chef when needed.
    async fn install(
        &self,
        access: &dyn Access,
        ctx: &InvokeContext,
        source: &Path,
        layout: &Layout,
    ) -> Result<(), InvokerError> {
        let executable = ctx.executable();
        let cookbook = self.cookbook_name(executable, source).await?;
        info!(host = access.host(), cookbook = %cookbook, "preparing chef environment");

        access.remove(&layout.base).await?;
        for dir in [&layout.base, &layout.chef_dir, &layout.roles_dir] {
            access.mkdir(dir).await?;
        }
        access.copy_dir_to_remote(source, &layout.exec_dir).await?;
        access
            .write_file(&layout.config_file, layout.solo_config().as_bytes())
            .await?;

        let deps = layout.exec_dir.join(dependencies_subdir(executable));
        if access.exists(&deps).await? {
            access.move_path(&deps, &layout.cookbooks_dir).await?;
        } else {
            access.mkdir(&layout.cookbooks_dir).await?;
        }

        let cookbook_dir = layout.cookbooks_dir.join(&cookbook);
        access.mkdir(&cookbook_dir).await?;
        access.copy(&layout.exec_dir, &cookbook_dir).await?;

        if access.exists(&self.install_marker).await? {
            debug!(marker = %self.install_marker.display(), "chef already installed");
        } else {
            info!(host = access.host(), "installing chef");
            run_step(access, "install", ExecRequest::new(&self.install_script), None).await?;
            access.write_file(&self.install_marker, b"installed").await?;
        }

        access.write_file(&layout.env_marker, b"installed").await?;
        Ok(())
    }

    /// Run chef-solo under the retry policy of `cfg`.
    async fn converge(
        &self,
        access: &dyn Access,
        ctx: &InvokeContext,
        cfg: &InvokerConfig,
        layout: &Layout,
        collected: &mut Collected,
    ) -> Result<Value, InvokerError> {
        let attributes = unflatten(ctx.parameters(), PATH_DELIMITER);
        let doc = serde_json::to_vec(&attributes)
            .map_err(|e| InvokerError::Internal(format!("run list: {e}")))?;
        access.write_file(&layout.run_list_file, &doc).await?;

        let req = ExecRequest::new(format!(
            "{} -c {} -j {}",
            self.solo_command,
            quote_path(&layout.config_file),
            quote_path(&layout.run_list_file)
        ))
        .with_env(program_env(ctx, cfg));

        let sink = Mutex::new(std::mem::take(collected));
        let (attempts, res) = run_with_retry(cfg.retry_policy(), |attempt| {
            let req = req.clone();
            let sink = &sink;
            async move {
                debug!(attempt, "chef-solo run");
                let out = access.exec(req).await?;
                sink.lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .append_streams(&out.stdout, &out.stderr);
                if out.success() {
                    Ok(())
                } else {
                    Err(InvokerError::Toolchain {
                        step: "chef-solo",
                        code: out.code,
                        stderr: out.stderr,
                    })
                }
            }
        })
        .await;
        *collected = sink.into_inner().unwrap_or_else(|e| e.into_inner());

        info!(attempts, ok = res.is_ok(), "chef-solo finished");
        res.map(|_| attributes)
    }

    /// Local diagnostics below `<run_dir>/out`; failures are logged only.
    async fn write_diagnostics(&self, access: &dyn Access, ctx: &InvokeContext, attributes: &Value) {
        let out_dir = ctx.run_dir().join("out");
        let ps = match access.exec(ExecRequest::new("ps aux")).await {
            Ok(out) if out.success() => Some(out.stdout),
            Ok(out) => {
                warn!(stderr = %out.stderr.trim(), "ps aux failed");
                None
            }
            Err(e) => {
                warn!(error = %e, "ps aux failed");
                None
            }
        };

        let res = async {
            tokio::fs::create_dir_all(&out_dir).await?;
            let doc = serde_json::to_vec_pretty(attributes).unwrap_or_default();
            tokio::fs::write(out_dir.join("run_list.json"), doc).await?;
            if let Some(ps) = ps {
                tokio::fs::write(out_dir.join("ps_aux.txt"), ps).await?;
            }
            Ok::<_, std::io::Error>(())
        }
        .await;
        if let Err(e) = res {
            warn!(dir = %out_dir.display(), error = %e, "failed to write diagnostics");
        }
    }

    async fn execute(&self, ctx: &InvokeContext, collected: &mut Collected) -> Result<(), InvokerError> {
        ctx.required_str("run_list")?;
        let cfg = ctx.invoker_config()?;
        let source = ctx.source_dir()?.to_path_buf();
        let layout = Layout::new(self.work_root.join(&ctx.executable().name));

        let access = ctx.open_access(&cfg).await?;

        let res = async {
            if !access.exists(&layout.env_marker).await? {
                self.install(&*access, ctx, &source, &layout).await?;
            }
            let attributes = self
                .converge(&*access, ctx, &cfg, &layout, &mut *collected)
                .await?;
            self.write_diagnostics(&*access, ctx, &attributes).await;
            Ok::<_, InvokerError>(())
        }
        .await;

        wind_down(&*access, ctx, &layout.exec_dir, false, collected).await;
        res
    }

    /// Fetch one cookbook archive and unpack it into `dir`.
    async fn download(&self, name: &str, dir: &Path) -> Result<(), InvokerError> {
        let url = format!("{}/{name}/download", self.supermarket);
        let download_err = |reason: String| InvokerError::Download {
            url: url.clone(),
            reason,
        };

        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| download_err(e.to_string()))?
            .bytes()
            .await
            .map_err(|e| download_err(e.to_string()))?;

        let archive = tempfile::Builder::new()
            .prefix("xrun-cookbook-")
            .suffix(".tar.gz")
            .tempfile()
            .map_err(|e| download_err(e.to_string()))?;
        tokio::fs::write(archive.path(), &bytes)
            .await
            .map_err(|e| download_err(e.to_string()))?;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| AccessError::io("mkdir", dir.display(), e))?;

        let out = Command::new("tar")
            .arg("-xzf")
            .arg(archive.path())
            .arg("-C")
            .arg(dir)
            .arg("--strip-components=1")
            .output()
            .await
            .map_err(|e| download_err(format!("tar: {e}")))?;
        if !out.status.success() {
            return Err(download_err(format!(
                "tar: {}",
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }
        debug!(cookbook = name, bytes = bytes.len(), "cookbook downloaded");
        Ok(())
    }
}

#[async_trait]
impl Invoker for ChefInvoker {
    fn name(&self) -> &'static str {
        "chef"
    }

    fn exclusive(&self) -> bool {
        true
    }

    /// Resolve `metadata.json` dependencies transitively, downloading missing cookbooks into
    /// the executable's dependencies subdirectory.
    #[instrument(level = "info", skip_all, fields(executable = %ctx.executable().name))]
    async fn prepare_executable(&self, ctx: &PrepareContext) -> Result<(), InvokerError> {
        let executable = ctx.executable();
        let Some(source) = executable.path.as_deref() else {
            return Ok(());
        };
        let Some(metadata) = read_metadata(&source.join("metadata.json")).await? else {
            debug!("no metadata.json, nothing to resolve");
            return Ok(());
        };

        let mut queue: VecDeque<String> = metadata_dependencies(&metadata).into();
        if queue.is_empty() {
            return Ok(());
        }
        let deps_dir = source.join(dependencies_subdir(executable));
        tokio::fs::create_dir_all(&deps_dir)
            .await
            .map_err(|e| AccessError::io("mkdir", deps_dir.display(), e))?;

        let mut seen = BTreeSet::new();
        while let Some(dep) = queue.pop_front() {
            if !seen.insert(dep.clone()) {
                continue;
            }
            let dir = deps_dir.join(checked_cookbook_name(&dep)?);
            if tokio::fs::try_exists(&dir).await.unwrap_or(false) {
                debug!(cookbook = %dep, "dependency present");
                continue;
            }

            info!(cookbook = %dep, "downloading dependency");
            if let Err(e) = self.download(&dep, &dir).await {
                let _ = tokio::fs::remove_dir_all(&dir).await;
                return Err(e);
            }
            if let Some(meta) = read_metadata(&dir.join("metadata.json")).await? {
                queue.extend(metadata_dependencies(&meta));
            }
        }
        Ok(())
    }

    #[instrument(level = "info", skip_all, fields(run = %ctx.run_id(), invoker = "chef"))]
    async fn invoke(&self, ctx: &InvokeContext) -> InvokeOutcome {
        let mut collected = Collected::default();
        let res = self.execute(ctx, &mut collected).await;
        outcome(res, collected)
    }
}
