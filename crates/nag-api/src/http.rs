use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};

use crate::{command::Command, error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API with the given handler.
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/v1/do/{command} - Run a control command, raw body
    /// - GET /api/v1/messages - Full state snapshot
    /// - GET /api/v1/status - Compact status
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/do/{command}", post(run_command::<H>))
            .route("/api/v1/messages", get(get_messages::<H>))
            .route("/api/v1/status", get(get_status::<H>))
            .with_state(self.handler)
    }
}

/// POST /api/v1/do/{command}
async fn run_command<H>(
    State(handler): State<Arc<H>>,
    Path(command): Path<String>,
    body: String,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let command = Command::parse(&command, &body)?;
    let reply = handler.execute(command).await?;
    Ok(Json(reply))
}

/// GET /api/v1/messages
async fn get_messages<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.messages().await?))
}

/// GET /api/v1/status
async fn get_status<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.status().await?))
}
