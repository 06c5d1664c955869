//! Drives the run collections through the axum router against a local shell invoker.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;
use xrun_api::{HttpApi, OrchestratorAdapter};
use xrun_core::registry::InvokerRegistry;
use xrun_core::store::InMemoryRunStore;
use xrun_core::{Orchestrator, OrchestratorConfig};
use xrun_exec::access::DefaultAccessFactory;
use xrun_exec::invokers::ShellInvoker;
use xrun_model::ApiSpec;

const SPEC: &str = r#"{
    "executables": {
        "hello": {
            "invoker_name": "shell",
            "path": "hello",
            "parameters_schema": {
                "cmd": {"default": "sh greet.sh"},
                "name": {"mapping": "env", "default": "world"}
            },
            "parameters_required": ["cmd", "name"],
            "results_schema": {"greeting": {"mapping": "stdout"}}
        },
        "broken": {
            "invoker_name": "shell",
            "path": "hello",
            "parameters_schema": {"cmd": {"default": "true"}},
            "parameters_required": ["cmd"],
            "results_schema": {"report": {"mapping": "file", "file_path": "missing.txt"}}
        }
    },
    "invokers": {
        "shell": {"expose": true}
    }
}"#;

struct App {
    router: Router,
    _root: TempDir,
}

fn app() -> App {
    let root = tempfile::tempdir().unwrap();
    let program = root.path().join("hello");
    std::fs::create_dir_all(&program).unwrap();
    std::fs::write(program.join("greet.sh"), "printf 'hello %s' \"$name\"").unwrap();

    let mut registry = InvokerRegistry::new();
    registry.register(Arc::new(
        ShellInvoker::new().with_work_root(root.path().join("work")),
    ));

    let orchestrator = Orchestrator::builder(
        ApiSpec::from_json_str(SPEC, root.path()).unwrap(),
        registry,
        Arc::new(InMemoryRunStore::new()),
        Arc::new(DefaultAccessFactory::new()),
    )
    .with_config(OrchestratorConfig::under(root.path().join("state")))
    .build();

    let router = HttpApi::new(Arc::new(OrchestratorAdapter::new(orchestrator))).router();
    App {
        router,
        _root: root,
    }
}

async fn send(app: &App, method: Method, uri: &str, body: Option<Value>) -> Response<Body> {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header(header::CONTENT_TYPE, "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    app.router.clone().oneshot(req.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn wait_terminal(app: &App, location: &str) -> Value {
    for _ in 0..500 {
        let run = json_body(send(app, Method::GET, location, None).await).await;
        if run["status"] == "finished" || run["status"] == "error" {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{location} did not reach a terminal state");
}

#[tokio::test]
async fn submitted_run_finishes_with_results() {
    let app = app();

    let resp = send(
        &app,
        Method::POST,
        "/api/v1/executables/hello/runs",
        Some(json!({"parameters": {}})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();

    let created = json_body(resp).await;
    assert_eq!(created["status"], "running");
    assert_eq!(created["_links"]["self"]["href"], location.as_str());
    assert_eq!(created["_links"]["parent"]["href"], "/api/v1/executables/hello/runs");

    let done = wait_terminal(&app, &location).await;
    assert_eq!(done["status"], "finished", "{done}");
    assert_eq!(done["results"]["greeting"], "hello world");
    assert!(done["finished"].is_string());
}

#[tokio::test]
async fn missing_result_file_ends_in_error() {
    let app = app();

    let resp = send(&app, Method::POST, "/api/v1/executables/broken/runs", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();

    let done = wait_terminal(&app, &location).await;
    assert_eq!(done["status"], "error");
    assert!(done["error"].as_str().unwrap().contains("missing.txt"), "{done}");
    assert!(done["failed"].is_string());
}

#[tokio::test]
async fn prepare_run_starts_on_update() {
    let app = app();

    let resp = send(
        &app,
        Method::POST,
        "/api/v1/executables/hello/runs",
        Some(json!({"id": "p1", "status": "prepare"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created = json_body(resp).await;
    assert_eq!(created["status"], "prepare");

    let resp = send(
        &app,
        Method::PUT,
        "/api/v1/executables/hello/runs/p1",
        Some(json!({
            "status": "running",
            "parameters": {"name": "bob"},
            "_links": {"self": {"href": "ignored"}}
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let done = wait_terminal(&app, "/api/v1/executables/hello/runs/p1").await;
    assert_eq!(done["results"]["greeting"], "hello bob");

    let resp = send(
        &app,
        Method::PUT,
        "/api/v1/executables/hello/runs/p1",
        Some(json!({"status": "running"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["code"], "PRECONDITION_FAILED");
}

#[tokio::test]
async fn validation_and_conflict_errors() {
    let app = app();

    let resp = send(
        &app,
        Method::POST,
        "/api/v1/executables/hello/runs",
        Some(json!({"status": "paused"})),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"], "invalid status = 'paused'");

    let first = send(
        &app,
        Method::POST,
        "/api/v1/executables/hello/runs",
        Some(json!({"id": "dup", "status": "prepare"})),
    )
    .await;
    assert_eq!(first.status(), StatusCode::CREATED);
    let second = send(
        &app,
        Method::POST,
        "/api/v1/executables/hello/runs",
        Some(json!({"id": "dup", "status": "prepare"})),
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);

    let list = json_body(send(&app, Method::GET, "/api/v1/executables/hello/runs", None).await).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let resp = send(&app, Method::POST, "/api/v1/executables/nope/runs", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::POST, "/api/v1/invokers/shell/runs", Some(json!({}))).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_filters_and_delete() {
    let app = app();

    for id in ["a", "b"] {
        let resp = send(
            &app,
            Method::POST,
            "/api/v1/executables/hello/runs",
            Some(json!({"id": id, "status": "prepare"})),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let prepared = json_body(
        send(&app, Method::GET, "/api/v1/executables/hello/runs?status=prepare", None).await,
    )
    .await;
    assert_eq!(prepared.as_array().unwrap().len(), 2);

    let finished = json_body(
        send(&app, Method::GET, "/api/v1/executables/hello/runs?status=finished", None).await,
    )
    .await;
    assert!(finished.as_array().unwrap().is_empty());

    let resp = send(&app, Method::GET, "/api/v1/executables/hello/runs?status=bogus", None).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // a run is only reachable through its own collection
    let resp = send(&app, Method::GET, "/api/v1/executables/broken/runs/a", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, Method::DELETE, "/api/v1/executables/hello/runs/a", None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&app, Method::GET, "/api/v1/executables/hello/runs/a", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invoker_run_with_embedded_files() {
    let app = app();

    let resp = send(
        &app,
        Method::POST,
        "/api/v1/invokers/shell/runs",
        Some(json!({
            "parameters": {"cmd": "cat data.txt"},
            "executable": {
                "files": [{"path": "data.txt", "text": "embedded"}],
                "results_schema": {"out": {"mapping": "stdout"}}
            }
        })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with("/api/v1/invokers/shell/runs/"));

    let done = wait_terminal(&app, &location).await;
    assert_eq!(done["status"], "finished", "{done}");
    assert_eq!(done["results"]["out"], "embedded");
}
