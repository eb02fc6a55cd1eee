//! Error taxonomy for notebook operations.
//!
//! Every error is handled at the operation boundary: the HTTP layer turns it
//! into a JSON error body and the affected line goes back to idle.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotebookError {
    /// No credential for the reasoning service.
    #[error("Reasoning service is not configured: {0}")]
    Configuration(String),

    /// Malformed caller input; nothing was sent upstream.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// The reasoning service failed or replied with an unusable shape.
    #[error("Reasoning service failed: {0}")]
    Upstream(String),

    /// A notebook file failed schema validation on import.
    #[error("Invalid notebook file: {0}")]
    ImportFormat(String),

    #[error("Snapshot storage failed: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, NotebookError>;

impl NotebookError {
    pub fn kind(&self) -> &'static str {
        match self {
            NotebookError::Configuration(_) => "configuration",
            NotebookError::Validation(_) => "validation",
            NotebookError::Upstream(_) => "upstream",
            NotebookError::ImportFormat(_) => "import_format",
            NotebookError::Storage(_) => "storage",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            NotebookError::Configuration(_) | NotebookError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            NotebookError::Validation(_) => StatusCode::BAD_REQUEST,
            NotebookError::Upstream(_) => StatusCode::BAD_GATEWAY,
            NotebookError::ImportFormat(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

impl From<sled::Error> for NotebookError {
    fn from(e: sled::Error) -> Self {
        NotebookError::Storage(e.to_string())
    }
}

impl IntoResponse for NotebookError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        } else {
            tracing::info!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = serde_json::json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            NotebookError::Validation("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            NotebookError::Upstream("timeout".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            NotebookError::ImportFormat("no lines".into()).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            NotebookError::Configuration("no key".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
