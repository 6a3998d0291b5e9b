use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{ApiError, AppState};
use engine::WorkflowRun;

/// Runs of one workflow, newest first.
pub async fn list(
    Path(workflow_id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkflowRun>>, ApiError> {
    state.manager.get(workflow_id).await?;
    Ok(Json(state.engine.list_runs(workflow_id).await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowRun>, ApiError> {
    Ok(Json(state.engine.get_run(id).await?))
}

pub async fn cancel(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let run = state.engine.get_run(id).await?;
    if state.engine.cancel(id).await {
        Ok(StatusCode::ACCEPTED)
    } else {
        Err(ApiError::Conflict(format!("run {id} is not in flight (status: {})", run.status)))
    }
}
