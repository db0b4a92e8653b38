use super::super::dto::{ErrorResponse, RunRequest, RunResponse, StopResponse};
use super::super::error::{ApiError, run_error};
use super::super::state::ServerState;
use axum::Json;
use axum::extract::{Path, State};
use std::sync::Arc;
use tracing::{info, warn};

#[utoipa::path(
    post,
    path = "/run",
    tag = "runs",
    request_body = RunRequest,
    responses(
        (status = 200, description = "Run started", body = RunResponse),
        (status = 400, description = "Command is empty or too long", body = ErrorResponse),
        (status = 409, description = "Another run is in progress", body = ErrorResponse)
    )
)]
pub async fn start_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<RunRequest>,
) -> Result<Json<RunResponse>, ApiError> {
    match state.runs().start(&payload.command).await {
        Ok(run_id) => {
            info!(run_id = %run_id, "Accepted /run request");
            Ok(Json(RunResponse { run_id }))
        }
        Err(err) => {
            warn!(error = %err, "Rejected /run request");
            Err(run_error(err))
        }
    }
}

#[utoipa::path(
    post,
    path = "/stop/{run_id}",
    tag = "runs",
    params(("run_id" = String, Path, description = "Identifier returned by /run")),
    responses(
        (status = 200, description = "Stop requested", body = StopResponse),
        (status = 404, description = "Unknown run", body = ErrorResponse)
    )
)]
pub async fn stop_handler(
    State(state): State<Arc<ServerState>>,
    Path(run_id): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    state.runs().stop(&run_id).await.map_err(run_error)?;
    info!(run_id = %run_id, "Stop requested");
    Ok(Json(StopResponse {
        status: "stopping".to_string(),
    }))
}
