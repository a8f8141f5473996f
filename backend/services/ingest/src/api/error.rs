use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use jobfeed_common::error::JobfeedError;

pub struct ApiError(pub JobfeedError);

impl From<JobfeedError> for ApiError {
    fn from(err: JobfeedError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            JobfeedError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            JobfeedError::Config(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            other => {
                tracing::error!(error = %other, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, Json(body)).into_response()
    }
}
