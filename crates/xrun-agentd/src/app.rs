use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;
use xrun_api::{HttpApi, OrchestratorAdapter};
use xrun_core::Orchestrator;
use xrun_prometheus::PrometheusMetrics;

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

/// Run API plus `/metrics`.
pub fn router(orchestrator: Orchestrator, metrics: Arc<PrometheusMetrics>) -> Router {
    let api = HttpApi::new(Arc::new(OrchestratorAdapter::new(orchestrator))).router();

    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
        .merge(api)
}

async fn render_metrics(State(metrics): State<Arc<PrometheusMetrics>>) -> Response {
    match metrics.render() {
        Ok(body) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;
    use xrun_core::OrchestratorConfig;
    use xrun_core::metrics::MetricsBackend;
    use xrun_core::registry::InvokerRegistry;
    use xrun_core::store::InMemoryRunStore;
    use xrun_exec::access::DefaultAccessFactory;
    use xrun_model::ApiSpec;

    use super::*;

    #[tokio::test]
    async fn metrics_endpoint_serves_text_exposition() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        metrics.record_run_started("shell");

        let orchestrator = Orchestrator::builder(
            ApiSpec::default(),
            InvokerRegistry::new(),
            Arc::new(InMemoryRunStore::new()),
            Arc::new(DefaultAccessFactory::new()),
        )
        .with_config(OrchestratorConfig::under(dir.path()))
        .with_metrics(metrics.clone())
        .build();

        let app = router(orchestrator, metrics);
        let resp = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains(r#"xrun_runs_started_total{invoker="shell"} 1"#));

        let resp = app
            .oneshot(
                Request::get("/api/v1/executables/none/runs")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
