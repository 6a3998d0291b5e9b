use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiError, AppState};
use engine::{Graph, WorkflowDefinition};

#[derive(Deserialize)]
pub struct CreateWorkflowDto {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub graph: Graph,
}

#[derive(Deserialize)]
pub struct SaveWorkflowDto {
    /// Version the edit was made against.
    pub version: i32,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub graph: Graph,
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<WorkflowDefinition>>, ApiError> {
    Ok(Json(state.manager.list().await?))
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    Ok(Json(state.manager.get(id).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkflowDto>,
) -> Result<(StatusCode, Json<WorkflowDefinition>), ApiError> {
    let def = state
        .manager
        .create_draft(&payload.name, &payload.description, payload.graph)
        .await?;
    Ok((StatusCode::CREATED, Json(def)))
}

pub async fn save(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<SaveWorkflowDto>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    let def = state
        .manager
        .save(id, payload.version, &payload.name, &payload.description, payload.graph)
        .await?;
    Ok(Json(def))
}

pub async fn delete(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    state.manager.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn activate(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    Ok(Json(state.manager.activate(id).await?))
}

pub async fn pause(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    Ok(Json(state.manager.pause(id).await?))
}

pub async fn archive(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<WorkflowDefinition>, ApiError> {
    Ok(Json(state.manager.archive(id).await?))
}

pub async fn export(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let json = state.manager.export(id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], json))
}

/// Body is the export format `{ name, nodes, edges }`; the result is always a draft.
pub async fn import(
    State(state): State<AppState>,
    body: String,
) -> Result<(StatusCode, Json<WorkflowDefinition>), ApiError> {
    let def = state.manager.import(&body).await?;
    Ok((StatusCode::CREATED, Json(def)))
}
