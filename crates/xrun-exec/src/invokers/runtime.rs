use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, info, instrument};
use xrun_core::access::{Access, ExecRequest};
use xrun_core::invoker::{InvokeContext, InvokeOutcome, Invoker, InvokerError};
use xrun_core::mapping::Collected;
use xrun_model::{Env, InvokerConfig};

use super::session::{outcome, program_env, program_stdin, run_step, stage, wind_down};
use crate::access::{quote, quote_path};

/// Language runtime managed by a version manager on the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toolchain {
    /// pyenv + virtualenv + pip.
    Python,
    /// rbenv + bundler.
    Ruby,
}

impl Toolchain {
    pub fn name(self) -> &'static str {
        match self {
            Toolchain::Python => "python",
            Toolchain::Ruby => "ruby",
        }
    }

    pub fn default_version(self) -> &'static str {
        match self {
            Toolchain::Python => "2.7.8",
            Toolchain::Ruby => "1.9.3-p551",
        }
    }

    /// Variable naming the version manager's install root.
    pub fn root_var(self) -> &'static str {
        match self {
            Toolchain::Python => "PYENV_ROOT",
            Toolchain::Ruby => "RBENV_ROOT",
        }
    }

    pub fn default_root(self) -> &'static str {
        match self {
            Toolchain::Python => "/opt/pyenv",
            Toolchain::Ruby => "/opt/rbenv",
        }
    }

    fn installer_url(self) -> &'static str {
        match self {
            Toolchain::Python => {
                "https://raw.githubusercontent.com/yyuu/pyenv-installer/master/bin/pyenv-installer"
            }
            Toolchain::Ruby => {
                "https://raw.githubusercontent.com/fesplugas/rbenv-installer/master/bin/rbenv-installer"
            }
        }
    }

    /// Dependency manifests: `(file name, configured content, write empty when unconfigured)`.
    fn manifests(self, cfg: &InvokerConfig) -> Vec<(&'static str, Option<String>, bool)> {
        match self {
            Toolchain::Python => vec![("requirements.txt", cfg.requirements.clone(), true)],
            Toolchain::Ruby => vec![
                ("Gemfile", cfg.gemfile.clone(), true),
                ("Gemfile.lock", cfg.gemfile_lock.clone(), false),
            ],
        }
    }

    pub(crate) fn install_script(self) -> String {
        [
            "if type apt-get > /dev/null 2>&1; then sudo apt-get -y update && sudo apt-get -y install curl git; fi",
            "if type yum > /dev/null 2>&1; then sudo yum -y install curl git; fi",
            &format!("curl -L {} | bash", self.installer_url()),
        ]
        .join(" && ")
    }

    /// Provision the runtime and dependencies, then run `cmd` in a subshell.
    pub(crate) fn run_script(self, version: &str, run_id: &str, dir: &Path, cmd: &str) -> String {
        let v = quote(version);
        let mut steps: Vec<String> = match self {
            Toolchain::Python => {
                let venv = quote(run_id);
                vec![
                    r#"export PATH="$PYENV_ROOT/bin:$PATH""#.into(),
                    r#"eval "$(pyenv init -)""#.into(),
                    r#"eval "$(pyenv virtualenv-init -)""#.into(),
                    format!("pyenv install -s {v}"),
                    "pyenv rehash".into(),
                    format!("pyenv virtualenv -f {v} {venv}"),
                    format!("pyenv activate {venv}"),
                    "pip install -r requirements.txt < /dev/null".into(),
                ]
            }
            Toolchain::Ruby => vec![
                r#"export PATH="$RBENV_ROOT/bin:$PATH""#.into(),
                r#"eval "$(rbenv init -)""#.into(),
                format!("rbenv install -s {v}"),
                "rbenv rehash".into(),
                format!("rbenv local {v}"),
                "gem install bundler < /dev/null".into(),
                format!(
                    "bundle install --binstubs --path {} < /dev/null",
                    quote_path(&dir.join("bundle"))
                ),
            ],
        };
        steps.push(format!("( {cmd}\n)"));
        steps.join(" && ")
    }
}

impl fmt::Display for Toolchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs the `cmd` parameter under a version-managed language runtime.
///
/// The version manager is installed on first use, detected through its root directory.
#[derive(Debug, Clone)]
pub struct RuntimeInvoker {
    toolchain: Toolchain,
    work_root: PathBuf,
    install_script: Option<String>,
}

impl RuntimeInvoker {
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            work_root: PathBuf::from(format!("/tmp/xrun-{}", toolchain.name())),
            install_script: None,
        }
    }

    pub fn python() -> Self {
        Self::new(Toolchain::Python)
    }

    pub fn ruby() -> Self {
        Self::new(Toolchain::Ruby)
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    /// Replace the default online installer, e.g. with a mirror.
    pub fn with_install_script(mut self, script: impl Into<String>) -> Self {
        self.install_script = Some(script.into());
        self
    }

    pub fn toolchain(&self) -> Toolchain {
        self.toolchain
    }

    /// Configured env with the version manager root defaulted.
    fn base_env(&self, cfg: &InvokerConfig) -> Env {
        let mut env = cfg.env.clone();
        env.push_if_absent(self.toolchain.root_var(), self.toolchain.default_root());
        env
    }

    async fn ensure_installed(&self, access: &dyn Access, env: &Env) -> Result<(), InvokerError> {
        let root = env
            .get(self.toolchain.root_var())
            .unwrap_or(self.toolchain.default_root());
        if access.exists(Path::new(root)).await? {
            debug!(root, "runtime already installed");
            return Ok(());
        }

        info!(toolchain = %self.toolchain, host = access.host(), root, "installing runtime");
        let script = self
            .install_script
            .clone()
            .unwrap_or_else(|| self.toolchain.install_script());
        let req = ExecRequest::new(script).with_env(env.clone());
        run_step(access, "install", req, None).await?;
        Ok(())
    }

    async fn write_manifests(&self, access: &dyn Access, cfg: &InvokerConfig, dir: &Path) -> Result<(), InvokerError> {
        for (file, configured, write_empty) in self.toolchain.manifests(cfg) {
            let path = dir.join(file);
            if access.exists(&path).await? {
                continue;
            }
            match configured {
                Some(content) => access.write_file(&path, content.as_bytes()).await?,
                None if write_empty => access.write_file(&path, b"").await?,
                None => {}
            }
        }
        Ok(())
    }

    async fn execute(&self, ctx: &InvokeContext, collected: &mut Collected) -> Result<(), InvokerError> {
        let cmd = ctx.required_str("cmd")?;
        let mut cfg = ctx.invoker_config()?;
        let source = ctx.source_dir()?.to_path_buf();

        cfg.env = self.base_env(&cfg);
        let version = cfg
            .version
            .clone()
            .unwrap_or_else(|| self.toolchain.default_version().to_string());

        let access = ctx.open_access(&cfg).await?;
        let dir = self.work_root.join(ctx.run_id().as_str());

        let res = async {
            self.ensure_installed(&*access, &cfg.env).await?;
            stage(&*access, ctx, &source, &dir).await?;
            self.write_manifests(&*access, &cfg, &dir).await?;

            let script = self
                .toolchain
                .run_script(&version, ctx.run_id().as_str(), &dir, &cmd);
            let req = ExecRequest::new(script)
                .with_env(program_env(ctx, &cfg))
                .with_stdin(program_stdin(ctx, &cfg))
                .with_cwd(&dir);
            run_step(&*access, "run", req, Some(&mut *collected)).await?;
            Ok::<_, InvokerError>(())
        }
        .await;

        wind_down(&*access, ctx, &dir, true, collected).await;
        res
    }
}

#[async_trait]
impl Invoker for RuntimeInvoker {
    fn name(&self) -> &'static str {
        self.toolchain.name()
    }

    #[instrument(level = "info", skip_all, fields(run = %ctx.run_id(), invoker = self.toolchain.name()))]
    async fn invoke(&self, ctx: &InvokeContext) -> InvokeOutcome {
        let mut collected = Collected::default();
        let res = self.execute(ctx, &mut collected).await;
        outcome(res, collected)
    }
}
