use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use xrun_model::{Run, RunId, RunStatus};

use super::{InMemoryRunStore, RunFilter, RunStore, StoreError};
use crate::fs_atomic::atomic_write_file;

/// Run store persisted as one JSON document (`{ "<id>": <run>, ... }`).
///
/// Reads are served from memory; every mutation rewrites the document atomically.
pub struct FileRunStore {
    path: PathBuf,
    inner: InMemoryRunStore,
    write: Mutex<()>,
}

impl FileRunStore {
    /// Open the store, loading the document when it exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let runs = load(&path).await?;
        info!(path = %path.display(), runs = runs.len(), "run store opened");
        Ok(Self {
            path,
            inner: InMemoryRunStore::from_map(runs),
            write: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self) -> Result<(), StoreError> {
        let snapshot = self.inner.snapshot().await;
        let body = serde_json::to_vec_pretty(&snapshot).map_err(|e| StoreError::Corrupt {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write_file(&path, &body))
            .await
            .map_err(|e| StoreError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?
            .map_err(|e| StoreError::Io {
                path: self.path.display().to_string(),
                reason: e.to_string(),
            })?;
        debug!(path = %self.path.display(), runs = snapshot.len(), "run store persisted");
        Ok(())
    }
}

async fn load(path: &Path) -> Result<BTreeMap<RunId, Run>, StoreError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok(BTreeMap::new());
    }
    serde_json::from_slice(&raw).map_err(|e| StoreError::Corrupt {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl RunStore for FileRunStore {
    async fn find_one(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        self.inner.find_one(id).await
    }

    async fn find(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError> {
        self.inner.find(filter).await
    }

    async fn insert(&self, run: Run) -> Result<(), StoreError> {
        let _w = self.write.lock().await;
        self.inner.insert(run).await?;
        self.persist().await
    }

    async fn update(&self, run: Run) -> Result<(), StoreError> {
        let _w = self.write.lock().await;
        self.inner.update(run).await?;
        self.persist().await
    }

    async fn update_if(&self, run: Run, expected: RunStatus) -> Result<(), StoreError> {
        let _w = self.write.lock().await;
        self.inner.update_if(run, expected).await?;
        self.persist().await
    }

    async fn remove(&self, id: &RunId) -> Result<bool, StoreError> {
        let _w = self.write.lock().await;
        let existed = self.inner.remove(id).await?;
        if existed {
            self.persist().await?;
        }
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(id: &str) -> Run {
        serde_json::from_value(json!({"id": id, "invoker_name": "shell", "status": "prepare"}))
            .unwrap()
    }

    #[tokio::test]
    async fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");

        {
            let store = FileRunStore::open(&path).await.unwrap();
            store.insert(run("a")).await.unwrap();
            store.insert(run("b")).await.unwrap();
            let mut a = run("a");
            a.status = RunStatus::Running;
            store.update(a).await.unwrap();
            assert!(store.remove(&RunId::from("b")).await.unwrap());
        }

        let store = FileRunStore::open(&path).await.unwrap();
        let all = store.find(&RunFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, RunStatus::Running);
    }

    #[tokio::test]
    async fn corrupt_document_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.json");
        std::fs::write(&path, b"[1,2").unwrap();

        assert!(matches!(
            FileRunStore::open(&path).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
