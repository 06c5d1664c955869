use thiserror::Error;
use xrun_model::ModelError;

use crate::store::StoreError;

/// Synchronous errors of orchestrator operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0}")]
    Precondition(String),

    #[error("store error: {0}")]
    Store(StoreError),
}

impl CoreError {
    /// HTTP-style status code of the error class.
    pub fn status_code(&self) -> u16 {
        match self {
            CoreError::Validation(_) | CoreError::Precondition(_) => 400,
            CoreError::NotFound(_) => 404,
            CoreError::Conflict(_) => 409,
            CoreError::Store(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation(_) => "VALIDATION_ERROR",
            CoreError::Precondition(_) => "PRECONDITION_FAILED",
            CoreError::NotFound(_) => "NOT_FOUND",
            CoreError::Conflict(_) => "CONFLICT",
            CoreError::Store(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        CoreError::Validation(e.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Duplicate(id) => CoreError::Conflict(format!("run '{id}' already exists")),
            StoreError::NotFound(id) => CoreError::NotFound(format!("run '{id}'")),
            StoreError::StatusChanged { id, actual } => CoreError::Precondition(format!(
                "run '{id}' is {actual} and can no longer be updated"
            )),
            other => CoreError::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_error_class() {
        assert_eq!(CoreError::Validation("x".into()).status_code(), 400);
        assert_eq!(CoreError::Precondition("x".into()).status_code(), 400);
        assert_eq!(CoreError::NotFound("x".into()).status_code(), 404);
        assert_eq!(CoreError::Conflict("x".into()).status_code(), 409);
    }

    #[test]
    fn store_duplicate_is_conflict() {
        let e: CoreError = StoreError::Duplicate("r1".into()).into();
        assert_eq!(e.status_code(), 409);
        assert_eq!(e.to_string(), "run 'r1' already exists");

        let e: CoreError = StoreError::StatusChanged {
            id: "r1".into(),
            actual: xrun_model::RunStatus::Running,
        }
        .into();
        assert!(matches!(e, CoreError::Precondition(_)));
        assert_eq!(e.to_string(), "run 'r1' is running and can no longer be updated");

        let e: CoreError = ModelError::InvalidStatus("paused".into()).into();
        assert_eq!(e.to_string(), "invalid status = 'paused'");
    }
}
