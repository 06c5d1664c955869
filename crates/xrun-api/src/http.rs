use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use xrun_core::store::RunFilter;
use xrun_model::{Run, RunId, RunStatus, RunTarget, SubmitRequest, ValueMap};

use crate::{error::ApiError, handler::RunHandler};

pub const API_BASE: &str = "/api/v1";

/// Key of the hypermedia block; stripped from patches.
const LINKS_KEY: &str = "_links";

/// Collection path of `target`, or the item path when `id` is given.
pub fn run_path(target: &RunTarget, id: Option<&RunId>) -> String {
    let collection = format!("{API_BASE}/{}/{}/runs", target.collection(), target.name());
    match id {
        Some(id) => format!("{collection}/{id}"),
        None => collection,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub this: Href,
    pub parent: Href,
}

/// Run record as served over HTTP.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    #[serde(flatten)]
    pub run: Run,
    #[serde(rename = "_links")]
    pub links: Links,
}

impl From<Run> for RunView {
    fn from(run: Run) -> Self {
        let (this, parent) = match run.target() {
            Some(target) => (run_path(&target, Some(&run.id)), run_path(&target, None)),
            None => (format!("{API_BASE}/runs/{}", run.id), API_BASE.to_string()),
        };
        Self {
            run,
            links: Links {
                this: Href { href: this },
                parent: Href { href: parent },
            },
        }
    }
}

/// Router factory over a [`RunHandler`].
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: RunHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    pub fn router(self) -> Router {
        Router::new()
            .route(
                "/api/v1/{collection}/{name}/runs",
                get(list_runs::<H>).post(submit_run::<H>),
            )
            .route(
                "/api/v1/{collection}/{name}/runs/{id}",
                get(get_run::<H>).put(update_run::<H>).delete(remove_run::<H>),
            )
            .with_state(self.handler)
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListQuery {
    status: Option<String>,
}

fn target(collection: &str, name: String) -> Result<RunTarget, ApiError> {
    match collection {
        "executables" => Ok(RunTarget::Executable(name)),
        "invokers" => Ok(RunTarget::Invoker(name)),
        other => Err(ApiError::NotFound(format!("collection '{other}'"))),
    }
}

/// Fetch a run and check it belongs to the addressed collection.
async fn owned<H: RunHandler>(handler: &H, target: &RunTarget, id: &RunId) -> Result<Run, ApiError> {
    let run = handler.get(id).await?;
    if run.target().as_ref() != Some(target) {
        return Err(ApiError::NotFound(format!("run '{id}'")));
    }
    Ok(run)
}

async fn list_runs<H: RunHandler>(
    State(handler): State<Arc<H>>,
    Path((collection, name)): Path<(String, String)>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let target = target(&collection, name)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let status = query
        .status
        .as_deref()
        .map(str::parse::<RunStatus>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut filter = RunFilter {
        status,
        ..RunFilter::default()
    };
    match target {
        RunTarget::Executable(name) => filter.executable_name = Some(name),
        RunTarget::Invoker(name) => filter.invoker_name = Some(name),
    }

    let runs = handler.list(filter).await?;
    Ok(Json(runs.into_iter().map(RunView::from).collect::<Vec<_>>()))
}

async fn submit_run<H: RunHandler>(
    State(handler): State<Arc<H>>,
    Path((collection, name)): Path<(String, String)>,
    body: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let target = target(&collection, name)?;
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let run = handler.submit(target.clone(), req).await?;
    let location = run_path(&target, Some(&run.id));
    debug!(run = %run.id, %location, "run created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(RunView::from(run)),
    ))
}

async fn get_run<H: RunHandler>(
    State(handler): State<Arc<H>>,
    Path((collection, name, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let target = target(&collection, name)?;
    let run = owned(&*handler, &target, &RunId::from(id)).await?;
    Ok(Json(RunView::from(run)))
}

async fn update_run<H: RunHandler>(
    State(handler): State<Arc<H>>,
    Path((collection, name, id)): Path<(String, String, String)>,
    body: Result<Json<ValueMap>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let target = target(&collection, name)?;
    let Json(mut patch) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    patch.remove(LINKS_KEY);

    let id = RunId::from(id);
    owned(&*handler, &target, &id).await?;
    let run = handler.update(&id, patch).await?;
    Ok(Json(RunView::from(run)))
}

async fn remove_run<H: RunHandler>(
    State(handler): State<Arc<H>>,
    Path((collection, name, id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let target = target(&collection, name)?;
    let id = RunId::from(id);
    owned(&*handler, &target, &id).await?;
    handler.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
