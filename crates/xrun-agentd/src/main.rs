mod app;
mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use xrun_core::Orchestrator;
use xrun_core::registry::InvokerRegistry;
use xrun_core::store::{FileRunStore, RunFilter};
use xrun_exec::access::DefaultAccessFactory;
use xrun_exec::invokers::register_builtin_invokers;
use xrun_model::{ApiSpec, RunStatus};
use xrun_observe::{init_local_offset, init_logger};
use xrun_prometheus::PrometheusMetrics;

use crate::config::AgentConfig;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    // before any thread exists
    init_local_offset();

    let cfg = AgentConfig::from_env()?;
    init_logger(&cfg.logger)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?
        .block_on(serve(cfg))
}

async fn serve(cfg: AgentConfig) -> Result<()> {
    let spec = ApiSpec::load(&cfg.api_spec)
        .with_context(|| format!("loading api spec {}", cfg.api_spec.display()))?;
    info!(
        executables = spec.executables.len(),
        invokers = spec.invokers.len(),
        "api spec loaded"
    );

    let mut registry = InvokerRegistry::new();
    register_builtin_invokers(&mut registry);

    let store = FileRunStore::open(&cfg.store_file)
        .await
        .with_context(|| format!("opening run store {}", cfg.store_file.display()))?;
    let metrics = Arc::new(PrometheusMetrics::new()?);

    let orchestrator = Orchestrator::builder(
        spec,
        registry,
        Arc::new(store),
        Arc::new(DefaultAccessFactory::new()),
    )
    .with_config(cfg.orchestrator.clone())
    .with_metrics(metrics.clone())
    .build();

    let interrupted = orchestrator
        .list(&RunFilter {
            status: Some(RunStatus::Running),
            ..RunFilter::default()
        })
        .await?;
    if !interrupted.is_empty() {
        warn!(count = interrupted.len(), "runs left running by a previous process");
    }

    let app = app::router(orchestrator, metrics);
    let listener = tokio::net::TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("binding {}", cfg.listen))?;
    info!(addr = %cfg.listen, "xrun agent listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("xrun agent stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
