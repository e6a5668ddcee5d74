use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::game::{TaskListResponse, VerifyTaskRequest, VerifyTaskResponse},
    error::{AppError, ServiceError},
    routes::auth::require_session,
    services::player_service,
    state::SharedState,
};

/// Task endpoints for logged-in players.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/game/tasks", get(list_tasks))
        .route("/game/tasks/verify", post(verify_task))
}

/// List the caller's tasks. Ghosts only get main tasks.
#[utoipa::path(
    get,
    path = "/game/tasks",
    tag = "game",
    params(("X-Session-Token" = String, Header, description = "Token returned by /auth/login")),
    responses(
        (status = 200, description = "Tasks of the caller", body = TaskListResponse),
        (status = 401, description = "Missing or invalid session")
    )
)]
pub async fn list_tasks(
    State(state): State<SharedState>,
    headers: HeaderMap,
) -> Result<Json<TaskListResponse>, AppError> {
    let player_id = require_session(&state, &headers)?;
    let tasks = player_service::tasks(&state, &player_id)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(tasks))
}

/// Submit the PIN read at a station.
#[utoipa::path(
    post,
    path = "/game/tasks/verify",
    tag = "game",
    params(("X-Session-Token" = String, Header, description = "Token returned by /auth/login")),
    request_body = VerifyTaskRequest,
    responses(
        (status = 200, description = "Task completed", body = VerifyTaskResponse),
        (status = 400, description = "Malformed PIN"),
        (status = 403, description = "Wrong PIN"),
        (status = 404, description = "Task not found"),
        (status = 409, description = "Not allowed now or already completed")
    )
)]
pub async fn verify_task(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(payload): Json<VerifyTaskRequest>,
) -> Result<Json<VerifyTaskResponse>, AppError> {
    let player_id = require_session(&state, &headers)?;
    payload.validate()?;
    let response = player_service::verify_task(&state, &player_id, &payload.task_id, &payload.pin)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(response))
}
