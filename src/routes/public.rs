use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::{common::GameStateSummary, public::LivingPlayersResponse},
    services::public_service,
    state::SharedState,
};

/// Public read-only endpoints that expose the current game state.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/phase", get(get_game_phase))
        .route("/public/players/alive", get(get_living_players))
}

#[utoipa::path(
    get,
    path = "/public/phase",
    tag = "public",
    responses((status = 200, description = "Current phase, clock and progress", body = GameStateSummary))
)]
/// Return the current phase with the match clock and crew progress.
pub async fn get_game_phase(State(state): State<SharedState>) -> Json<GameStateSummary> {
    Json(public_service::game_state(&state).await)
}

#[utoipa::path(
    get,
    path = "/public/players/alive",
    tag = "public",
    responses((status = 200, description = "Living players", body = LivingPlayersResponse))
)]
/// Return every living player.
pub async fn get_living_players(State(state): State<SharedState>) -> Json<LivingPlayersResponse> {
    Json(public_service::living_players(&state).await)
}
