use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use xrun_core::error::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Core(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Core(e) => e.code(),
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::NotFound(_) => "NOT_FOUND",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            "an internal error occurred".to_string()
        } else {
            self.to_string()
        };

        let body = json!({
            "error": message,
            "code": self.code(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_keep_their_class() {
        let e = ApiError::from(CoreError::Conflict("run 'a' already exists".into()));
        assert_eq!(e.status(), StatusCode::CONFLICT);
        assert_eq!(e.code(), "CONFLICT");
        assert_eq!(e.to_string(), "run 'a' already exists");

        let e = ApiError::from(CoreError::Precondition("no".into()));
        assert_eq!(e.status(), StatusCode::BAD_REQUEST);
        assert_eq!(e.code(), "PRECONDITION_FAILED");
    }

    #[test]
    fn response_carries_status() {
        let resp = ApiError::NotFound("collection 'jobs'".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
