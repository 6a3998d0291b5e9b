use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::{ApiError, AppState};
use engine::TriggerEvent;

/// Accept `{ triggerType, payload }` for asynchronous dispatch.
pub async fn publish(
    State(state): State<AppState>,
    Json(event): Json<TriggerEvent>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let trigger_type = event.trigger_type.clone();
    state.events.try_publish(event)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "accepted": trigger_type }))))
}
