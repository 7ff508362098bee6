use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use kanjo_export::ExportError;
use kanjo_ocr::{ExtractError, InferenceError, NormalizeError, PipelineError};
use kanjo_storage::StorageError;

/// Request-level error, converted into a JSON error response. Internals
/// are logged here; the body carries only the public message.
pub enum AppError {
    Storage(StorageError),
    Pipeline(PipelineError),
    Export(ExportError),
    Internal(anyhow::Error),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Export(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Storage(err) => {
                error!("Storage error: {err:?}");
                match err {
                    StorageError::InvalidState => (StatusCode::BAD_REQUEST, err.to_string()),
                    _ => (StatusCode::BAD_GATEWAY, err.to_string()),
                }
            }
            AppError::Pipeline(err) => {
                error!("Pipeline error: {err:?}");
                match err {
                    PipelineError::Normalize(NormalizeError::Decode(_)) => {
                        (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
                    }
                    PipelineError::Extract(ExtractError::Inference(
                        InferenceError::Api { .. } | InferenceError::Http(_),
                    )) => (StatusCode::BAD_GATEWAY, err.to_string()),
                    _ => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
                }
            }
            AppError::Export(err) => {
                error!("Export error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            AppError::Internal(err) => {
                error!("Internal server error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_maps_to_400() {
        let response = AppError::Storage(StorageError::InvalidState).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn upstream_storage_failures_map_to_502() {
        let err = StorageError::Api { status: 500, body: "boom".to_string() };
        let response = AppError::Storage(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn internal_errors_do_not_leak_details() {
        let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
