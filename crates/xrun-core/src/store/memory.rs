use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use xrun_model::{Run, RunId, RunStatus};

use super::{RunFilter, RunStore, StoreError, sort_runs};

/// Run store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRunStore {
    runs: RwLock<BTreeMap<RunId, Run>>,
}

impl InMemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_map(runs: BTreeMap<RunId, Run>) -> Self {
        Self {
            runs: RwLock::new(runs),
        }
    }

    pub(crate) async fn snapshot(&self) -> BTreeMap<RunId, Run> {
        self.runs.read().await.clone()
    }
}

#[async_trait]
impl RunStore for InMemoryRunStore {
    async fn find_one(&self, id: &RunId) -> Result<Option<Run>, StoreError> {
        Ok(self.runs.read().await.get(id).cloned())
    }

    async fn find(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError> {
        let mut out: Vec<Run> = self
            .runs
            .read()
            .await
            .values()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        sort_runs(&mut out);
        Ok(out)
    }

    async fn insert(&self, run: Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        if runs.contains_key(&run.id) {
            return Err(StoreError::Duplicate(run.id.to_string()));
        }
        runs.insert(run.id.clone(), run);
        Ok(())
    }

    async fn update(&self, run: Run) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(slot) => {
                *slot = run;
                Ok(())
            }
            None => Err(StoreError::NotFound(run.id.to_string())),
        }
    }

    async fn update_if(&self, run: Run, expected: RunStatus) -> Result<(), StoreError> {
        let mut runs = self.runs.write().await;
        match runs.get_mut(&run.id) {
            Some(slot) if slot.status == expected => {
                *slot = run;
                Ok(())
            }
            Some(slot) => Err(StoreError::StatusChanged {
                id: run.id.to_string(),
                actual: slot.status,
            }),
            None => Err(StoreError::NotFound(run.id.to_string())),
        }
    }

    async fn remove(&self, id: &RunId) -> Result<bool, StoreError> {
        Ok(self.runs.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(id: &str, created: &str) -> Run {
        serde_json::from_value(json!({
            "id": id,
            "executable_name": "hello",
            "status": "running",
            "created": created
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_insert_keeps_one_record() {
        let store = InMemoryRunStore::new();
        store.insert(run("a", "t1")).await.unwrap();

        let err = store.insert(run("a", "t2")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "a"));

        let all = store.find(&RunFilter::default()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].created.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn update_requires_existing_record() {
        let store = InMemoryRunStore::new();
        assert!(matches!(
            store.update(run("x", "t")).await,
            Err(StoreError::NotFound(_))
        ));

        store.insert(run("x", "t")).await.unwrap();
        let mut changed = run("x", "t");
        changed.status = RunStatus::Finished;
        store.update(changed).await.unwrap();

        let got = store.find_one(&RunId::from("x")).await.unwrap().unwrap();
        assert_eq!(got.status, RunStatus::Finished);
    }

    #[tokio::test]
    async fn conditional_update_checks_stored_status() {
        let store = InMemoryRunStore::new();
        store.insert(run("c", "t")).await.unwrap();

        let mut next = run("c", "t");
        next.status = RunStatus::Finished;
        let err = store.update_if(next.clone(), RunStatus::Prepare).await.unwrap_err();
        assert!(matches!(err, StoreError::StatusChanged { actual: RunStatus::Running, .. }));

        store.update_if(next, RunStatus::Running).await.unwrap();
        let got = store.find_one(&RunId::from("c")).await.unwrap().unwrap();
        assert_eq!(got.status, RunStatus::Finished);

        assert!(matches!(
            store.update_if(run("zz", "t"), RunStatus::Running).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_orders_by_creation_and_remove_reports_presence() {
        let store = InMemoryRunStore::new();
        store.insert(run("b", "2024-01-02T00:00:00Z")).await.unwrap();
        store.insert(run("a", "2024-01-03T00:00:00Z")).await.unwrap();
        store.insert(run("c", "2024-01-01T00:00:00Z")).await.unwrap();

        let ids: Vec<String> = store
            .find(&RunFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id.to_string())
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);

        assert!(store.remove(&RunId::from("b")).await.unwrap());
        assert!(!store.remove(&RunId::from("b")).await.unwrap());
    }
}
