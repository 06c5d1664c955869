use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, instrument};
use xrun_core::access::ExecRequest;
use xrun_core::invoker::{InvokeContext, InvokeOutcome, Invoker, InvokerError};
use xrun_core::mapping::Collected;

use super::session::{outcome, program_env, program_stdin, run_step, stage, wind_down};

/// Default parent of staged programs on the target.
pub const SHELL_WORK_ROOT: &str = "/tmp/xrun-shell";

/// Runs the `cmd` parameter inside the staged program directory.
#[derive(Debug, Clone)]
pub struct ShellInvoker {
    work_root: PathBuf,
}

impl Default for ShellInvoker {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from(SHELL_WORK_ROOT),
        }
    }
}

impl ShellInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = root.into();
        self
    }

    async fn execute(&self, ctx: &InvokeContext, collected: &mut Collected) -> Result<(), InvokerError> {
        let cmd = ctx.required_str("cmd")?;
        let cfg = ctx.invoker_config()?;
        let source = ctx.source_dir()?.to_path_buf();

        let access = ctx.open_access(&cfg).await?;
        let dir = self.work_root.join(ctx.run_id().as_str());

        let res = async {
            stage(&*access, ctx, &source, &dir).await?;
            let req = ExecRequest::new(cmd)
                .with_env(program_env(ctx, &cfg))
                .with_stdin(program_stdin(ctx, &cfg))
                .with_cwd(&dir);
            run_step(&*access, "command", req, Some(&mut *collected)).await?;
            Ok::<_, InvokerError>(())
        }
        .await;

        wind_down(&*access, ctx, &dir, true, collected).await;
        res
    }
}

#[async_trait]
impl Invoker for ShellInvoker {
    fn name(&self) -> &'static str {
        "shell"
    }

    #[instrument(level = "info", skip_all, fields(run = %ctx.run_id(), invoker = "shell"))]
    async fn invoke(&self, ctx: &InvokeContext) -> InvokeOutcome {
        let mut collected = Collected::default();
        let res = self.execute(ctx, &mut collected).await;
        debug!(ok = res.is_ok(), "shell invocation done");
        outcome(res, collected)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::invokers::testing::{context, schemas, source_with};

    #[tokio::test]
    async fn runs_command_with_mapped_parameters() {
        let work = tempfile::tempdir().unwrap();
        let source = source_with(&[("greet.sh", "printf '%s, %s' \"$GREETING\" \"$(cat name.txt)\"")]);
        let schemas = schemas(json!({
            "parameters_schema": {
                "greeting": {"mapping": "env"},
                "name": {"mapping": "file", "file_path": "name.txt"}
            },
            "results_schema": {
                "message": {"mapping": "stdout"}
            }
        }));
        let ctx = context(
            source.path(),
            schemas,
            json!({"cmd": "sh greet.sh", "greeting": "hello", "name": "world"}),
        );

        let out = ShellInvoker::new()
            .with_work_root(work.path())
            .invoke(&ctx)
            .await;
        assert!(out.result.is_ok(), "{:?}", out.result);
        assert_eq!(out.collected.stdout, "hello, world");
        // staged directory is dropped afterwards
        assert!(!work.path().join("r1").exists());
    }

    #[tokio::test]
    async fn stdin_parameter_replaces_configured_stdin() {
        let work = tempfile::tempdir().unwrap();
        let source = source_with(&[]);
        let schemas = schemas(json!({
            "parameters_schema": {"input": {"mapping": "stdin"}}
        }));
        let ctx = context(
            source.path(),
            schemas,
            json!({
                "cmd": "cat",
                "input": "from-param",
                "invoker_config": {"stdin": "from-config"}
            }),
        );

        let out = ShellInvoker::new().with_work_root(work.path()).invoke(&ctx).await;
        assert!(out.result.is_ok());
        assert_eq!(out.collected.stdout, "from-param");
    }

    #[tokio::test]
    async fn failing_command_keeps_output_and_result_files() {
        let work = tempfile::tempdir().unwrap();
        let source = source_with(&[]);
        let schemas = schemas(json!({
            "results_schema": {"report": {"mapping": "file", "file_path": "report.txt"}}
        }));
        let ctx = context(
            source.path(),
            schemas,
            json!({"cmd": "echo partial > report.txt; echo out; echo bad >&2; exit 4"}),
        );

        let out = ShellInvoker::new().with_work_root(work.path()).invoke(&ctx).await;
        match out.result {
            Err(InvokerError::Toolchain { step, code, stderr }) => {
                assert_eq!(step, "command");
                assert_eq!(code, Some(4));
                assert_eq!(stderr, "bad\n");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(out.collected.stdout, "out\n");
        assert_eq!(
            out.collected.files.get("report").cloned().flatten(),
            Some(b"partial\n".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_cmd_fails_before_touching_the_target() {
        let source = source_with(&[]);
        let ctx = context(source.path(), Default::default(), json!({}));

        let out = ShellInvoker::new().invoke(&ctx).await;
        assert!(matches!(out.result, Err(InvokerError::MissingParameter("cmd"))));
        assert_eq!(out.collected, Collected::default());
    }

    #[tokio::test]
    async fn unsupported_access_is_reported() {
        let source = source_with(&[]);
        let ctx = context(
            source.path(),
            Default::default(),
            json!({"cmd": "true", "invoker_config": {"access": "telnet"}}),
        );

        let out = ShellInvoker::new().invoke(&ctx).await;
        let err = out.result.unwrap_err();
        assert_eq!(err.to_string(), "access 'telnet' not supported");
    }
}
