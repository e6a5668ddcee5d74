//! Business logic powering the admin REST routes. Every helper goes through the coordinator
//! lock, so admin actions never interleave with player commands or timer ticks.

use tracing::info;

use crate::{
    dto::admin::{ActionResponse, AdminSnapshot, EjectResponse},
    error::{GameError, ServiceError},
    state::{
        SharedState,
        coordinator::{Effects, GameCoordinator},
        transitions::{read, run_command},
    },
};

/// Run an admin action and describe the phase it left the game in.
async fn run_action<F>(state: &SharedState, action: &str, command: F) -> Result<ActionResponse, ServiceError>
where
    F: FnOnce(&mut GameCoordinator, &mut Effects) -> Result<(), GameError>,
{
    let response = run_command(state, |coordinator, fx| {
        command(coordinator, fx)?;
        Ok(action_response(coordinator))
    })
    .await?;
    info!(action, phase = ?response.phase, round = response.round, "admin action applied");
    Ok(response)
}

fn action_response(coordinator: &GameCoordinator) -> ActionResponse {
    let summary = coordinator.state_summary();
    ActionResponse {
        phase: summary.phase,
        end_reason: summary.end_reason,
        round: summary.round,
    }
}

/// Assign roles and tasks to everyone in the lobby and start the match clock.
pub async fn start_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "start_game", GameCoordinator::start_game).await
}

/// Freeze the match for an emergency meeting.
pub async fn trigger_meeting(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "trigger_meeting", GameCoordinator::trigger_meeting).await
}

/// Open the ballot.
pub async fn start_voting(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "start_voting", GameCoordinator::start_voting).await
}

/// Return to the active phase after a meeting or a vote.
pub async fn resume_game(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "resume_game", GameCoordinator::resume_game).await
}

/// End the running round without a winner.
pub async fn end_round(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "end_round", GameCoordinator::end_round).await
}

/// Wipe the round, rotate the PINs and log every device out.
pub async fn reset_all(state: &SharedState) -> Result<ActionResponse, ServiceError> {
    run_action(state, "reset_all", GameCoordinator::reset_all).await
}

/// Mark a player as ejected by the group, then evaluate win conditions.
pub async fn eject_player(state: &SharedState, player_id: &str) -> Result<EjectResponse, ServiceError> {
    let response = run_command(state, |coordinator, fx| {
        coordinator.eject_player(player_id, fx)?;
        let summary = coordinator.state_summary();
        Ok(EjectResponse {
            player_id: player_id.to_string(),
            phase: summary.phase,
            end_reason: summary.end_reason,
        })
    })
    .await?;
    info!(player = %player_id, phase = ?response.phase, "player ejected by admin");
    Ok(response)
}

/// Full dashboard state: players with roles, tally, live PINs.
pub async fn snapshot(state: &SharedState) -> AdminSnapshot {
    read(state, GameCoordinator::admin_snapshot).await
}
