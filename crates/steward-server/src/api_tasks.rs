//! API handlers for background tasks.

use std::sync::Arc;

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::api::ApiError;
use crate::tasks::{parse_rows, ImportUsers, TaskRecord};
use crate::AppState;

/// Handler for `POST /api/tasks/import-users`.
///
/// Validates the payload shape, then runs the import in the background and
/// answers `202` with the task id.
pub async fn import_users_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    parse_rows(payload.clone()).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let (task_id, _handle) = state.tasks.spawn(Arc::new(ImportUsers), payload);
    state.ledger.submitted(task_id, ImportUsers::NAME);

    tracing::info!(%task_id, "queued user import");
    Ok((StatusCode::ACCEPTED, Json(json!({ "taskId": task_id }))))
}

/// Handler for `GET /api/tasks/{taskId}`.
pub async fn get_task_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(task_id): Path<Uuid>,
) -> Result<Json<TaskRecord>, ApiError> {
    state
        .ledger
        .get(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}
