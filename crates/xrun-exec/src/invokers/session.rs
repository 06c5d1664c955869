use std::path::Path;

use tracing::{debug, warn};
use xrun_core::access::{Access, ExecOutput, ExecRequest};
use xrun_core::invoker::{InvokeContext, InvokeOutcome, InvokerError};
use xrun_core::mapping::{Collected, collect_result_files, env_overlay, stdin_content, write_parameters};
use xrun_model::{Env, InvokerConfig};

/// Environment of the program: configured env extended by env-mapped parameters.
pub(crate) fn program_env(ctx: &InvokeContext, cfg: &InvokerConfig) -> Env {
    env_overlay(&ctx.schemas().parameters_schema, ctx.parameters(), &cfg.env)
}

pub(crate) fn program_stdin(ctx: &InvokeContext, cfg: &InvokerConfig) -> Option<String> {
    stdin_content(
        &ctx.schemas().parameters_schema,
        ctx.parameters(),
        cfg.stdin.as_deref(),
    )
}

/// Replace `dir` on the target with a fresh copy of the local sources plus file-mapped parameters.
pub(crate) async fn stage(
    access: &dyn Access,
    ctx: &InvokeContext,
    source: &Path,
    dir: &Path,
) -> Result<(), InvokerError> {
    access.remove(dir).await?;
    if let Some(parent) = dir.parent() {
        access.mkdir(parent).await?;
    }
    access.copy_dir_to_remote(source, dir).await?;
    write_parameters(access, &ctx.schemas().parameters_schema, ctx.parameters(), dir).await?;
    debug!(host = access.host(), dir = %dir.display(), "program staged");
    Ok(())
}

/// Run one toolchain step; a non-zero exit fails with the step name.
///
/// Output is appended to `sink` when given, whatever the exit status.
pub(crate) async fn run_step(
    access: &dyn Access,
    step: &'static str,
    req: ExecRequest,
    sink: Option<&mut Collected>,
) -> Result<ExecOutput, InvokerError> {
    let out = access.exec(req).await?;
    if let Some(collected) = sink {
        collected.append_streams(&out.stdout, &out.stderr);
    }
    if out.success() {
        Ok(out)
    } else {
        Err(InvokerError::Toolchain {
            step,
            code: out.code,
            stderr: out.stderr,
        })
    }
}

/// Collect declared result files from `dir`, optionally drop it, and close the session.
pub(crate) async fn wind_down(
    access: &dyn Access,
    ctx: &InvokeContext,
    dir: &Path,
    remove_dir: bool,
    collected: &mut Collected,
) {
    collect_result_files(access, &ctx.schemas().results_schema, dir, collected).await;

    if remove_dir {
        if let Err(e) = access.remove(dir).await {
            warn!(dir = %dir.display(), error = %e, "failed to remove staged program");
        }
    }
    if let Err(e) = access.terminate().await {
        warn!(host = access.host(), error = %e, "failed to close access session");
    }
}

pub(crate) fn outcome(result: Result<(), InvokerError>, collected: Collected) -> InvokeOutcome {
    match result {
        Ok(()) => InvokeOutcome::ok(collected),
        Err(e) => InvokeOutcome::failed(e, collected),
    }
}
