//! Durable run records.
//!
//! The orchestrator only needs find/insert/update/remove by identifier and field predicates;
//! [`InMemoryRunStore`] serves tests and ephemeral daemons, [`FileRunStore`] persists a JSON
//! document with atomic replacement.
mod error;
pub use error::StoreError;

mod memory;
pub use memory::InMemoryRunStore;

mod file;
pub use file::FileRunStore;

use async_trait::async_trait;
use xrun_model::{Run, RunId, RunStatus};

/// Field predicates for [`RunStore::find`]. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunFilter {
    pub executable_name: Option<String>,
    pub invoker_name: Option<String>,
    pub status: Option<RunStatus>,
}

impl RunFilter {
    pub fn matches(&self, run: &Run) -> bool {
        let field = |want: &Option<String>, have: &Option<String>| match want {
            Some(w) => have.as_deref() == Some(w.as_str()),
            None => true,
        };
        field(&self.executable_name, &run.executable_name)
            && field(&self.invoker_name, &run.invoker_name)
            && self.status.is_none_or(|s| s == run.status)
    }
}

#[async_trait]
pub trait RunStore: Send + Sync {
    async fn find_one(&self, id: &RunId) -> Result<Option<Run>, StoreError>;

    /// Matching runs ordered by creation time, then identifier.
    async fn find(&self, filter: &RunFilter) -> Result<Vec<Run>, StoreError>;

    /// Insert a new record; an existing identifier is [`StoreError::Duplicate`].
    async fn insert(&self, run: Run) -> Result<(), StoreError>;

    /// Replace an existing record; a missing identifier is [`StoreError::NotFound`].
    async fn update(&self, run: Run) -> Result<(), StoreError>;

    /// Replace a record only while its stored status is still `expected`.
    ///
    /// A record in any other status is left as is and reported as [`StoreError::StatusChanged`].
    async fn update_if(&self, run: Run, expected: RunStatus) -> Result<(), StoreError>;

    /// Remove a record, returning whether it existed.
    async fn remove(&self, id: &RunId) -> Result<bool, StoreError>;
}

pub(crate) fn sort_runs(runs: &mut [Run]) {
    runs.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn run(v: serde_json::Value) -> Run {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn filter_matches_on_all_set_fields() {
        let r = run(json!({"id": "1", "executable_name": "hello", "status": "finished"}));

        assert!(RunFilter::default().matches(&r));
        assert!(
            RunFilter {
                executable_name: Some("hello".into()),
                status: Some(RunStatus::Finished),
                ..RunFilter::default()
            }
            .matches(&r)
        );
        assert!(
            !RunFilter {
                invoker_name: Some("shell".into()),
                ..RunFilter::default()
            }
            .matches(&r)
        );
        assert!(
            !RunFilter {
                status: Some(RunStatus::Running),
                ..RunFilter::default()
            }
            .matches(&r)
        );
    }
}
