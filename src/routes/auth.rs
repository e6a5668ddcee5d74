use axum::{
    Json, Router,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};

use crate::{
    dto::auth::{LoginRequest, LoginResponse, SessionResponse, TakenPlayersResponse},
    error::AppError,
    services::auth_service,
    state::SharedState,
};

pub(crate) const SESSION_TOKEN_HEADER: &str = "x-session-token";

/// Player login and session checks.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/session", get(session))
        .route("/auth/taken-players", get(taken_players))
}

/// Exchange a roster identity and passcode for a session token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Malformed credentials"),
        (status = 401, description = "Unknown identity or wrong passcode")
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    Ok(Json(auth_service::login(&state, payload).await?))
}

/// Tell a device whether its token still holds, and who it belongs to.
#[utoipa::path(
    get,
    path = "/auth/session",
    tag = "auth",
    params(("X-Session-Token" = String, Header, description = "Token returned by /auth/login")),
    responses((status = 200, description = "Session validity", body = SessionResponse))
)]
pub async fn session(State(state): State<SharedState>, headers: HeaderMap) -> Json<SessionResponse> {
    Json(auth_service::session(&state, session_token(&headers)).await)
}

/// Identities that already joined.
#[utoipa::path(
    get,
    path = "/auth/taken-players",
    tag = "auth",
    responses((status = 200, description = "Identities no longer offline", body = TakenPlayersResponse))
)]
pub async fn taken_players(State(state): State<SharedState>) -> Json<TakenPlayersResponse> {
    Json(auth_service::taken_players(&state).await)
}

/// Read the session token header, if present.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(SESSION_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}

/// Resolve the session header into the caller's identity.
pub(crate) fn require_session(state: &SharedState, headers: &HeaderMap) -> Result<String, AppError> {
    let token = session_token(headers).ok_or_else(|| {
        AppError::Unauthorized("missing session token header `X-Session-Token`".into())
    })?;
    Ok(auth_service::resolve(state, token)?)
}
