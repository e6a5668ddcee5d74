//! Player commands and queries, shared by the WebSocket handler and the task REST routes.
//! The acting identity always comes from the caller's session, never from the payload.

use tracing::debug;

use crate::{
    dto::{
        common::{TaskSummary, summarize_tasks},
        game::{TaskListResponse, VerifyTaskResponse},
        ws::ServerMessage,
    },
    error::GameError,
    state::{
        SharedState,
        coordinator::{CompletedTask, GameCoordinator, player_state_message},
        elimination::Elimination,
        game::{Player, PlayerStatus},
        tasks::TaskCategory,
        transitions::{read, run_command},
    },
};

/// Frames sent right after a socket joins: phase, clocks, progress and the player's own state.
pub async fn join_frames(state: &SharedState, player_id: &str) -> Result<Vec<ServerMessage>, GameError> {
    read(state, |coordinator| {
        let player = coordinator.player(player_id)?;
        let summary = coordinator.state_summary();
        let mut frames = vec![
            ServerMessage::Joined {
                player_id: player_id.to_string(),
            },
            ServerMessage::PhaseChanged {
                phase: summary.phase,
                end_reason: summary.end_reason,
                round: summary.round,
            },
            ServerMessage::MatchClock {
                seconds: summary.clock_seconds,
            },
            ServerMessage::Progress {
                percent: summary.progress,
            },
            player_state_message(player),
        ];
        if player.is_saboteur() {
            frames.push(ServerMessage::Cooldown {
                seconds: coordinator.session().cooldowns.remaining(player_id),
            });
        }
        Ok(frames)
    })
    .await
}

/// Current phase as a frame.
pub async fn phase_frame(state: &SharedState) -> ServerMessage {
    let summary = read(state, |coordinator| coordinator.state_summary()).await;
    ServerMessage::PhaseChanged {
        phase: summary.phase,
        end_reason: summary.end_reason,
        round: summary.round,
    }
}

/// Role and status of the calling player.
pub async fn player_state(state: &SharedState, player_id: &str) -> Result<ServerMessage, GameError> {
    read(state, |coordinator| coordinator.player(player_id).map(player_state_message)).await
}

/// Tasks the caller can still see: all of them while alive, main tasks only as a ghost.
pub async fn tasks(state: &SharedState, player_id: &str) -> Result<TaskListResponse, GameError> {
    read(state, |coordinator| {
        let player = coordinator.player(player_id)?;
        let ghost = player.status == PlayerStatus::Dead;
        Ok(TaskListResponse {
            ghost,
            tasks: visible_tasks(player),
        })
    })
    .await
}

/// Main-category tasks of the caller, completable after death.
pub async fn ghost_tasks(state: &SharedState, player_id: &str) -> Result<Vec<TaskSummary>, GameError> {
    read(state, |coordinator| {
        let player = coordinator.player(player_id)?;
        Ok(summarize_tasks(player.ghost_tasks()))
    })
    .await
}

/// Other living saboteurs, for a saboteur caller.
pub async fn teammates(state: &SharedState, player_id: &str) -> Result<Vec<String>, GameError> {
    read(state, |coordinator| coordinator.teammates(player_id)).await
}

/// Every living player, in roster order.
pub async fn living_players(state: &SharedState) -> Vec<String> {
    read(state, |coordinator| coordinator.living_players()).await
}

/// Complete a crew task; raises global progress.
pub async fn complete_task(
    state: &SharedState,
    player_id: &str,
    task_id: &str,
    pin: &str,
) -> Result<VerifyTaskResponse, GameError> {
    run_command(state, |coordinator, fx| {
        let completed = coordinator.complete_task(player_id, task_id, pin, fx)?;
        verify_response(coordinator, player_id, task_id, completed)
    })
    .await
}

/// Fake a task as a saboteur; progress is left untouched.
pub async fn complete_cover_task(
    state: &SharedState,
    player_id: &str,
    task_id: &str,
    pin: &str,
) -> Result<VerifyTaskResponse, GameError> {
    run_command(state, |coordinator, fx| {
        let completed = coordinator.complete_cover_task(player_id, task_id, pin, fx)?;
        verify_response(coordinator, player_id, task_id, completed)
    })
    .await
}

/// Verify a task PIN for whichever role the caller holds.
///
/// Saboteurs get the cover-task path, so the REST surface does not reveal roles through
/// different endpoints.
pub async fn verify_task(
    state: &SharedState,
    player_id: &str,
    task_id: &str,
    pin: &str,
) -> Result<VerifyTaskResponse, GameError> {
    run_command(state, |coordinator, fx| {
        let completed = if coordinator.player(player_id)?.is_saboteur() {
            coordinator.complete_cover_task(player_id, task_id, pin, fx)?
        } else {
            coordinator.complete_task(player_id, task_id, pin, fx)?
        };
        verify_response(coordinator, player_id, task_id, completed)
    })
    .await
}

/// Eliminate `victim_id` as `killer_id`.
pub async fn attempt_elimination(
    state: &SharedState,
    killer_id: &str,
    victim_id: &str,
) -> Result<Elimination, GameError> {
    run_command(state, |coordinator, fx| {
        coordinator.attempt_elimination(killer_id, victim_id, fx)
    })
    .await
}

/// Cast or replace the caller's ballot. Returns the recorded target.
pub async fn cast_vote(state: &SharedState, voter_id: &str, target: &str) -> Result<String, GameError> {
    let target = run_command(state, |coordinator, fx| coordinator.cast_vote(voter_id, target, fx)).await?;
    Ok(target.to_string())
}

fn verify_response(
    coordinator: &GameCoordinator,
    player_id: &str,
    task_id: &str,
    completed: CompletedTask,
) -> Result<VerifyTaskResponse, GameError> {
    let ghost = coordinator.player(player_id)?.status == PlayerStatus::Dead;
    debug!(player = %player_id, task = %task_id, progress = completed.progress, "task verified");

    let tasks = completed
        .tasks
        .iter()
        .filter(|task| !ghost || task.definition.category == TaskCategory::Main);
    Ok(VerifyTaskResponse {
        task_id: task_id.to_string(),
        progress: completed.progress,
        tasks: summarize_tasks(tasks),
    })
}

fn visible_tasks(player: &Player) -> Vec<TaskSummary> {
    if player.status == PlayerStatus::Dead {
        summarize_tasks(player.ghost_tasks())
    } else {
        summarize_tasks(&player.tasks)
    }
}
