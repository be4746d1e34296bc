use nag_core::{NotifyError, QueueError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("notify error: {0}")]
    Notify(#[from] NotifyError),

    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::UnknownCommand(_) => StatusCode::NOT_FOUND,
            ApiError::Notify(NotifyError::InvalidRecurrence(_)) => StatusCode::BAD_REQUEST,
            ApiError::Notify(NotifyError::Delivery(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Queue(QueueError::NotSuspended | QueueError::SuspendAborted)
            | ApiError::Notify(NotifyError::Queue(QueueError::NotSuspended | QueueError::SuspendAborted)) => {
                StatusCode::CONFLICT
            }
            ApiError::Queue(_) | ApiError::Notify(NotifyError::Queue(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
