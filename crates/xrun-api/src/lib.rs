//! HTTP surface of the run orchestrator.
//!
//! Runs live under two collections, one per [`xrun_model::RunTarget`] kind:
//!
//! ```text
//! GET    /api/v1/{executables|invokers}/{name}/runs          list (?status=)
//! POST   /api/v1/{executables|invokers}/{name}/runs          submit, 201 + Location
//! GET    /api/v1/{executables|invokers}/{name}/runs/{id}     fetch
//! PUT    /api/v1/{executables|invokers}/{name}/runs/{id}     patch a `prepare` run
//! DELETE /api/v1/{executables|invokers}/{name}/runs/{id}     remove
//! ```
mod adapter;
pub use adapter::OrchestratorAdapter;

mod error;
pub use error::ApiError;

mod handler;
pub use handler::RunHandler;

mod http;
pub use http::{API_BASE, Href, HttpApi, Links, RunView, run_path};
