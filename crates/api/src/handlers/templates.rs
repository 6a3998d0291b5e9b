use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::{ApiError, AppState};
use engine::{CategoryFilter, Template, WorkflowDefinition};

#[derive(Deserialize)]
pub struct TemplateQuery {
    /// Omit (or pass "All") to list every template.
    pub category: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<TemplateQuery>,
) -> Json<Vec<Template>> {
    let filter = CategoryFilter::from(query.category);
    Json(state.templates.list_by_category(&filter).into_iter().cloned().collect())
}

pub async fn categories(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.templates.categories().into_iter().map(str::to_owned).collect())
}

/// Clone a template into a new draft workflow.
pub async fn instantiate(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<WorkflowDefinition>), ApiError> {
    let template = state
        .templates
        .get_by_id(&id)
        .ok_or_else(|| ApiError::NotFound(format!("template '{id}' not found")))?;

    let def = state.manager.insert(state.templates.instantiate(template)).await?;
    Ok((StatusCode::CREATED, Json(def)))
}
