use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{ErrorPayload, PlayerInboundMessage, ServerMessage},
    error::GameError,
    services::{auth_service, player_service},
    state::{SharedState, send_message_to_websocket},
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of a player WebSocket connection.
///
/// The first frame must be a `join` carrying a valid session token for the claimed identity.
/// Afterwards every command acts as that identity.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket join timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let player_id = match authenticate(&state, &initial_message) {
        Ok(player_id) => player_id,
        Err(reason) => {
            warn!(%reason, "rejecting websocket join");
            let _ = send_message_to_websocket(
                &outbound_tx,
                &ServerMessage::Error(ErrorPayload {
                    code: "unauthorized".into(),
                    message: reason,
                    remaining: None,
                }),
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    // Subscribe before reading the join snapshot so no broadcast falls in between.
    let broadcasts = state.gateway().subscribe_players();
    let connection_id = state.gateway().register(&player_id, outbound_tx.clone());
    let forwarder = spawn_forwarder(broadcasts, outbound_tx.clone());
    info!(player = %player_id, "player connected");

    match player_service::join_frames(&state, &player_id).await {
        Ok(frames) => {
            for frame in frames {
                if send_message_to_websocket(&outbound_tx, &frame).is_err() {
                    break;
                }
            }
        }
        Err(err) => {
            let _ = send_message_to_websocket(&outbound_tx, &ServerMessage::rejected(&err));
        }
    }

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let reply = match serde_json::from_str::<PlayerInboundMessage>(&text) {
                    Ok(inbound) => handle_command(&state, &player_id, inbound).await,
                    Err(err) => {
                        debug!(player = %player_id, error = %err, "malformed player message");
                        Some(ServerMessage::rejected(&GameError::InvalidCommand(
                            "malformed message".into(),
                        )))
                    }
                };
                let Some(reply) = reply else {
                    continue;
                };
                if send_message_to_websocket(&outbound_tx, &reply).is_err() {
                    info!(player = %player_id, "connection closed while replying, terminating");
                    break;
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player = %player_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forwarder.abort();
    state.gateway().unregister(&player_id, connection_id);
    info!(player = %player_id, "player disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Parse the join frame and check its token. Returns the bound identity or a reason.
fn authenticate(state: &SharedState, text: &str) -> Result<String, String> {
    let inbound = serde_json::from_str::<PlayerInboundMessage>(text)
        .map_err(|err| format!("malformed join frame: {err}"))?;
    let PlayerInboundMessage::Join { player_id, token } = inbound else {
        return Err("first message must be a join".into());
    };
    let owner = auth_service::resolve(state, &token).map_err(|err| err.to_string())?;
    if owner != player_id {
        return Err("session token belongs to another player".into());
    }
    Ok(player_id)
}

/// Run one inbound command as `player_id` and build the reply frame, if any.
async fn handle_command(
    state: &SharedState,
    player_id: &str,
    inbound: PlayerInboundMessage,
) -> Option<ServerMessage> {
    let reply = match inbound {
        PlayerInboundMessage::Join { .. } => {
            warn!(player = %player_id, "ignoring duplicate join message");
            return None;
        }
        PlayerInboundMessage::RequestPhase => player_service::phase_frame(state).await,
        PlayerInboundMessage::RequestPlayer => {
            or_rejected(player_service::player_state(state, player_id).await)
        }
        PlayerInboundMessage::RequestTasks => or_rejected(
            player_service::tasks(state, player_id)
                .await
                .map(|list| ServerMessage::Tasks { tasks: list.tasks }),
        ),
        PlayerInboundMessage::RequestGhostTasks => or_rejected(
            player_service::ghost_tasks(state, player_id)
                .await
                .map(|tasks| ServerMessage::GhostTasks { tasks }),
        ),
        PlayerInboundMessage::RequestTeammates => or_rejected(
            player_service::teammates(state, player_id)
                .await
                .map(|players| ServerMessage::Teammates { players }),
        ),
        PlayerInboundMessage::CompleteTask { task_id, pin } => {
            let result = player_service::complete_task(state, player_id, &task_id, &pin).await;
            task_result(player_id, task_id, result.map(|_| ()))
        }
        PlayerInboundMessage::CompleteCoverTask { task_id, pin } => {
            let result =
                player_service::complete_cover_task(state, player_id, &task_id, &pin).await;
            task_result(player_id, task_id, result.map(|_| ()))
        }
        PlayerInboundMessage::AttemptElimination { victim_id } => {
            match player_service::attempt_elimination(state, player_id, &victim_id).await {
                Ok(_) => ServerMessage::EliminationResult {
                    victim_id,
                    success: true,
                    error: None,
                },
                Err(err) => {
                    debug!(player = %player_id, victim = %victim_id, error = %err, "elimination rejected");
                    ServerMessage::EliminationResult {
                        victim_id,
                        success: false,
                        error: Some(ErrorPayload::from(&err)),
                    }
                }
            }
        }
        PlayerInboundMessage::RequestLivingPlayers => ServerMessage::LivingPlayers {
            players: player_service::living_players(state).await,
        },
        PlayerInboundMessage::CastVote { target } => or_rejected(
            player_service::cast_vote(state, player_id, &target)
                .await
                .map(|target| ServerMessage::VoteConfirmed { target }),
        ),
        PlayerInboundMessage::Unknown => ServerMessage::rejected(&GameError::InvalidCommand(
            "unknown message type".into(),
        )),
    };
    Some(reply)
}

fn or_rejected(result: Result<ServerMessage, GameError>) -> ServerMessage {
    result.unwrap_or_else(|err| ServerMessage::rejected(&err))
}

fn task_result(player_id: &str, task_id: String, result: Result<(), GameError>) -> ServerMessage {
    match result {
        Ok(()) => ServerMessage::TaskResult {
            task_id,
            success: true,
            error: None,
        },
        Err(err) => {
            debug!(player = %player_id, task = %task_id, error = %err, "task rejected");
            ServerMessage::TaskResult {
                task_id,
                success: false,
                error: Some(ErrorPayload::from(&err)),
            }
        }
    }
}

/// Forward messages addressed to every player onto this socket.
///
/// `force_disconnect` is written by the reset path itself, together with the close frame.
fn spawn_forwarder(
    mut broadcasts: tokio::sync::broadcast::Receiver<ServerMessage>,
    outbound_tx: mpsc::UnboundedSender<Message>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match broadcasts.recv().await {
                Ok(ServerMessage::ForceDisconnect) => break,
                Ok(message) => {
                    if send_message_to_websocket(&outbound_tx, &message).is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "player socket lagging, broadcasts dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Release the writer channel and wait for the writer task to flush.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};
    use serde_json::json;

    use super::*;
    use crate::{
        config::{AppConfig, GameRules, RosterEntry},
        dto::{auth::LoginRequest, phase::VisiblePhase},
        services::admin_service,
        state::{
            AppState, TICK_PERIOD,
            game::Role,
            tasks::{TaskCategory, TaskSpec},
            transitions::read,
        },
    };

    fn test_state() -> SharedState {
        let rules = GameRules {
            saboteur_count: 1,
            match_duration_secs: 600,
            kill_cooldown_secs: 0,
            voting_duration_secs: 0,
            main_tasks_per_player: 2,
            filler_tasks_per_player: 0,
        };
        let roster = ["P01", "P02", "P03", "P04"]
            .into_iter()
            .map(|id| RosterEntry {
                id: id.to_string(),
                passcode: format!("{id}-pass"),
            })
            .collect();
        let tasks = (1..=4)
            .map(|n| TaskSpec {
                name: format!("Station {n}"),
                category: TaskCategory::Main,
                weight: 1,
                location: None,
            })
            .collect();
        AppState::with_rng(
            AppConfig::new(rules, roster, tasks),
            StdRng::seed_from_u64(5),
            TICK_PERIOD,
        )
    }

    async fn login(state: &SharedState, id: &str) -> String {
        let request = LoginRequest {
            player_id: id.to_string(),
            passcode: format!("{id}-pass"),
        };
        auth_service::login(state, request).await.unwrap().token
    }

    fn join(player_id: &str, token: &str) -> String {
        json!({ "type": "join", "player_id": player_id, "token": token }).to_string()
    }

    fn texts(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(message) = rx.try_recv() {
            if let Message::Text(text) = message {
                frames.push(text.as_str().to_owned());
            }
        }
        frames
    }

    #[tokio::test]
    async fn join_frame_must_carry_the_callers_token() {
        let state = test_state();
        let token = login(&state, "P01").await;

        assert_eq!(authenticate(&state, &join("P01", &token)), Ok("P01".to_string()));
        assert!(authenticate(&state, &join("P02", &token)).is_err());
        assert!(authenticate(&state, &join("P01", "forged")).is_err());
        assert!(authenticate(&state, r#"{"type":"request_phase"}"#).is_err());
        assert!(authenticate(&state, "not json").is_err());
    }

    #[tokio::test]
    async fn commands_are_answered_with_matching_frames() {
        let state = test_state();
        for id in ["P01", "P02", "P03", "P04"] {
            login(&state, id).await;
        }
        admin_service::start_game(&state).await.unwrap();

        let (crew, task_id, live) = read(&state, |coordinator| {
            let player = coordinator
                .session()
                .players
                .values()
                .find(|player| player.role == Some(Role::Crew))
                .unwrap();
            let task_id = player.tasks[0].id().to_string();
            let pin = coordinator.session().pins.get(&task_id).unwrap().to_string();
            (player.id.clone(), task_id, pin)
        })
        .await;
        let wrong = if live == "1000" { "1001" } else { "1000" };
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.gateway().register(&crew, tx);

        let duplicate = PlayerInboundMessage::Join {
            player_id: crew.clone(),
            token: "ignored".into(),
        };
        assert_eq!(handle_command(&state, &crew, duplicate).await, None);
        assert!(matches!(
            handle_command(&state, &crew, PlayerInboundMessage::RequestPhase).await,
            Some(ServerMessage::PhaseChanged {
                phase: VisiblePhase::Active,
                ..
            })
        ));

        let attempt = PlayerInboundMessage::CompleteTask {
            task_id: task_id.clone(),
            pin: wrong.to_string(),
        };
        let Some(ServerMessage::TaskResult { success, error, .. }) =
            handle_command(&state, &crew, attempt).await
        else {
            panic!("expected a task result");
        };
        assert!(!success);
        assert_eq!(error.map(|payload| payload.code), Some("invalid_pin".to_string()));

        let attempt = PlayerInboundMessage::CompleteTask {
            task_id: task_id.clone(),
            pin: live,
        };
        assert_eq!(
            handle_command(&state, &crew, attempt).await,
            Some(ServerMessage::TaskResult {
                task_id,
                success: true,
                error: None,
            })
        );
        let delivered = texts(&mut rx);
        assert!(
            delivered
                .iter()
                .any(|frame| frame.starts_with(r#"{"type":"tasks""#))
        );

        let vote = PlayerInboundMessage::CastVote {
            target: "skip".into(),
        };
        assert!(matches!(
            handle_command(&state, &crew, vote).await,
            Some(ServerMessage::Error(payload)) if payload.code == "invalid_command"
        ));
        assert!(matches!(
            handle_command(&state, &crew, PlayerInboundMessage::RequestTeammates).await,
            Some(ServerMessage::Error(_))
        ));
        assert!(matches!(
            handle_command(&state, &crew, PlayerInboundMessage::Unknown).await,
            Some(ServerMessage::Error(_))
        ));
    }

    #[tokio::test]
    async fn reset_forces_every_socket_out() {
        let state = test_state();
        let token = login(&state, "P01").await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.gateway().register("P01", tx);

        admin_service::reset_all(&state).await.unwrap();

        assert_eq!(
            rx.try_recv().ok().map(|message| match message {
                Message::Text(text) => text.as_str().to_owned(),
                other => format!("{other:?}"),
            }),
            Some(r#"{"type":"force_disconnect"}"#.to_string())
        );
        assert!(matches!(rx.try_recv(), Ok(Message::Close(None))));
        assert_eq!(state.gateway().connected_players(), 0);
        assert!(state.sessions().is_empty());
        assert!(authenticate(&state, &join("P01", &token)).is_err());
    }
}
