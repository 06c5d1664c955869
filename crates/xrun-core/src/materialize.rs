//! Writes embedded executable files into a run-scoped staging directory.
use std::path::{Component, Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use thiserror::Error;
use tracing::{debug, instrument};
use xrun_model::{ExecutableFile, FileContent};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("invalid embedded file path: {0}")]
    InvalidPath(String),

    #[error("write {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("invalid base64 content for {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("fetch {url} for {path}: {reason}")]
    Fetch {
        url: String,
        path: String,
        reason: String,
    },
}

fn target_path(dir: &Path, raw: &str) -> Result<PathBuf, MaterializeError> {
    let rel = Path::new(raw);
    let ok = !raw.is_empty()
        && rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if !ok {
        return Err(MaterializeError::InvalidPath(raw.to_string()));
    }
    Ok(dir.join(rel))
}

async fn content_bytes(
    http: &reqwest::Client,
    file: &ExecutableFile,
) -> Result<Vec<u8>, MaterializeError> {
    match &file.content {
        FileContent::Text(text) => Ok(text.clone().into_bytes()),
        FileContent::Object(value) => Ok(value.to_string().into_bytes()),
        FileContent::Base64(encoded) => {
            STANDARD
                .decode(encoded.trim())
                .map_err(|e| MaterializeError::Decode {
                    path: file.path.clone(),
                    reason: e.to_string(),
                })
        }
        FileContent::Url(url) => {
            let fetch_err = |reason: String| MaterializeError::Fetch {
                url: url.clone(),
                path: file.path.clone(),
                reason,
            };
            let resp = http
                .get(url)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| fetch_err(e.to_string()))?;
            let body = resp.bytes().await.map_err(|e| fetch_err(e.to_string()))?;
            Ok(body.to_vec())
        }
    }
}

/// Materialize `files` below `dir`, in order, stopping at the first failure.
#[instrument(level = "debug", skip(http, files), fields(files = files.len(), dir = %dir.display()))]
pub async fn materialize(
    http: &reqwest::Client,
    files: &[ExecutableFile],
    dir: &Path,
) -> Result<(), MaterializeError> {
    let io = |path: &Path, e: std::io::Error| MaterializeError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    };

    tokio::fs::create_dir_all(dir).await.map_err(|e| io(dir, e))?;

    for file in files {
        let path = target_path(dir, &file.path)?;
        let bytes = content_bytes(http, file).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io(parent, e))?;
        }
        tokio::fs::write(&path, &bytes).await.map_err(|e| io(&path, e))?;
        debug!(path = %file.path, bytes = bytes.len(), "embedded file written");
    }
    Ok(())
}
