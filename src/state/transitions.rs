//! Glue between the coordinator and the runtime: locking, effect application and timer ticks.

use std::ops::ControlFlow;

use tracing::info;

use crate::{
    dto::ws::ServerMessage,
    error::GameError,
    state::{
        SharedState,
        coordinator::{Dispatch, Effects, GameCoordinator, Tick, TimerCommand},
        timers::TimerSlot,
    },
};

/// Run a command against the coordinator and apply its effects before releasing the lock.
///
/// Effects are applied even when the command fails, so a rejection that already scheduled
/// nothing stays side-effect free.
pub async fn run_command<T, F>(state: &SharedState, command: F) -> Result<T, GameError>
where
    F: FnOnce(&mut GameCoordinator, &mut Effects) -> Result<T, GameError>,
{
    let mut coordinator = state.coordinator().lock().await;
    let mut effects = Effects::default();
    let result = command(&mut coordinator, &mut effects);
    apply_effects(state, effects);
    result
}

/// Read from the coordinator under its lock.
pub async fn read<T, F>(state: &SharedState, query: F) -> T
where
    F: FnOnce(&GameCoordinator) -> T,
{
    let coordinator = state.coordinator().lock().await;
    query(&coordinator)
}

/// Start or stop timers, then deliver messages in order.
pub fn apply_effects(state: &SharedState, effects: Effects) {
    for command in effects.timers {
        apply_timer(state, command);
    }

    let gateway = state.gateway();
    for dispatch in effects.dispatches {
        match dispatch {
            Dispatch::All(ServerMessage::ForceDisconnect) => {
                gateway.deliver_all(ServerMessage::ForceDisconnect);
                gateway.disconnect_all();
                let sessions = state.sessions().len();
                state.sessions().clear();
                info!(sessions, "all player sessions revoked");
            }
            Dispatch::All(message) => gateway.deliver_all(message),
            Dispatch::Admin(message) => gateway.deliver_admin(message),
            Dispatch::Player(player_id, message) => gateway.deliver(&player_id, message),
        }
    }
}

fn apply_timer(state: &SharedState, command: TimerCommand) {
    let timers = state.timers();
    match command {
        TimerCommand::StartMatchClock(token) => {
            let shared = state.clone();
            timers.schedule_repeating(TimerSlot::MatchClock, move || {
                run_tick(shared.clone(), move |coordinator, fx| {
                    coordinator.tick_match_clock(token, fx)
                })
            });
        }
        TimerCommand::StopMatchClock => timers.cancel(&TimerSlot::MatchClock),
        TimerCommand::StartVotingClock(token) => {
            let shared = state.clone();
            timers.schedule_repeating(TimerSlot::VotingClock, move || {
                run_tick(shared.clone(), move |coordinator, fx| {
                    coordinator.tick_voting_clock(token, fx)
                })
            });
        }
        TimerCommand::StopVotingClock => timers.cancel(&TimerSlot::VotingClock),
        TimerCommand::StartCooldown { player_id, token } => {
            let shared = state.clone();
            let slot = TimerSlot::Cooldown(player_id.clone());
            timers.schedule_repeating(slot, move || {
                let player_id = player_id.clone();
                run_tick(shared.clone(), move |coordinator, fx| {
                    coordinator.tick_cooldown(&player_id, token, fx)
                })
            });
        }
        TimerCommand::CancelAll => timers.cancel_all(),
    }
}

async fn run_tick<F>(state: SharedState, tick: F) -> ControlFlow<()>
where
    F: FnOnce(&mut GameCoordinator, &mut Effects) -> Tick,
{
    let mut coordinator = state.coordinator().lock().await;
    let mut effects = Effects::default();
    let outcome = tick(&mut coordinator, &mut effects);
    apply_effects(&state, effects);
    match outcome {
        Tick::Continue => ControlFlow::Continue(()),
        Tick::Finished | Tick::Stale => ControlFlow::Break(()),
    }
}
