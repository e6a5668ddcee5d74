use axum::{
    Json, Router,
    body::Body,
    extract::{Path, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
};

use crate::{
    dto::admin::{ActionResponse, AdminSnapshot, EjectResponse},
    error::AppError,
    services::admin_service,
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints driving the round.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/game/start", post(start_game))
        .route("/admin/game/meeting", post(trigger_meeting))
        .route("/admin/game/voting", post(start_voting))
        .route("/admin/game/resume", post(resume_game))
        .route("/admin/game/end", post(end_round))
        .route("/admin/game/reset", post(reset_all))
        .route("/admin/players/{id}/eject", post(eject_player))
        .route("/admin/snapshot", get(snapshot))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Deal roles and tasks to the lobby and start the match clock.
#[utoipa::path(
    post,
    path = "/admin/game/start",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses(
        (status = 200, description = "Round started", body = ActionResponse),
        (status = 409, description = "Not in the lobby, or nobody joined")
    )
)]
pub async fn start_game(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::start_game(&state).await?))
}

/// Call an emergency meeting, freezing the match clock.
#[utoipa::path(
    post,
    path = "/admin/game/meeting",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Meeting started", body = ActionResponse))
)]
pub async fn trigger_meeting(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::trigger_meeting(&state).await?))
}

/// Open the ballot.
#[utoipa::path(
    post,
    path = "/admin/game/voting",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Voting opened", body = ActionResponse))
)]
pub async fn start_voting(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::start_voting(&state).await?))
}

/// Go back to the active phase and restart the match clock.
#[utoipa::path(
    post,
    path = "/admin/game/resume",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Round resumed", body = ActionResponse))
)]
pub async fn resume_game(
    State(state): State<SharedState>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::resume_game(&state).await?))
}

#[utoipa::path(
    post,
    path = "/admin/game/end",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Round ended", body = ActionResponse))
)]
/// End the round early.
pub async fn end_round(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::end_round(&state).await?))
}

/// Wipe the round and log every player out.
#[utoipa::path(
    post,
    path = "/admin/game/reset",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Session reset", body = ActionResponse))
)]
pub async fn reset_all(State(state): State<SharedState>) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(admin_service::reset_all(&state).await?))
}

/// Mark a player as ejected after a vote.
#[utoipa::path(
    post,
    path = "/admin/players/{id}/eject",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        ("id" = String, Path, description = "Identifier of the player to eject")
    ),
    responses(
        (status = 200, description = "Player ejected", body = EjectResponse),
        (status = 404, description = "Unknown player"),
        (status = 409, description = "No round running or player not alive")
    )
)]
pub async fn eject_player(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<EjectResponse>, AppError> {
    Ok(Json(admin_service::eject_player(&state, &id).await?))
}

/// Full dashboard state, including roles and live PINs.
#[utoipa::path(
    get,
    path = "/admin/snapshot",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Current game state", body = AdminSnapshot))
)]
pub async fn snapshot(State(state): State<SharedState>) -> Json<AdminSnapshot> {
    Json(admin_service::snapshot(&state).await)
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    let expected = {
        let guard = state.admin_token().lock().await;
        guard.clone()
    };

    match expected {
        Some(token) if token == provided => Ok(next.run(req).await),
        Some(_) => Err(AppError::Unauthorized("invalid admin token".into())),
        None => Err(AppError::Unauthorized(
            "admin SSE stream not initialised yet".into(),
        )),
    }
}
