use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tempfile::TempDir;
use xrun_core::invoker::InvokeContext;
use xrun_model::{Executable, RunId, SchemaSet};

use crate::access::DefaultAccessFactory;

pub(crate) fn schemas(doc: Value) -> SchemaSet {
    serde_json::from_value(doc).unwrap()
}

/// Program directory holding the given `(relative path, content)` files.
pub(crate) fn source_with(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (rel, content) in files {
        let path = dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    dir
}

pub(crate) fn context_at(source: &Path, run_dir: &Path, schemas: SchemaSet, params: Value) -> InvokeContext {
    let executable = Executable {
        name: "demo".into(),
        path: Some(source.to_path_buf()),
        ..Executable::default()
    };
    InvokeContext::new(
        RunId::from("r1"),
        executable,
        schemas,
        params.as_object().cloned().unwrap(),
        run_dir.to_path_buf(),
        Arc::new(DefaultAccessFactory::new()),
    )
}

pub(crate) fn context(source: &Path, schemas: SchemaSet, params: Value) -> InvokeContext {
    context_at(source, &std::env::temp_dir().join("xrun-exec-tests"), schemas, params)
}
