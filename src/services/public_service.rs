use crate::{
    dto::{common::GameStateSummary, public::LivingPlayersResponse},
    state::{SharedState, transitions::read},
};

/// Phase, round, clock and crew progress as anyone may see them.
pub async fn game_state(state: &SharedState) -> GameStateSummary {
    read(state, |coordinator| coordinator.state_summary()).await
}

/// Every living player, in roster order.
pub async fn living_players(state: &SharedState) -> LivingPlayersResponse {
    let players = read(state, |coordinator| coordinator.living_players()).await;
    LivingPlayersResponse { players }
}
