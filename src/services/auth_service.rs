//! Credential checks and session tokens. Tokens live next to the coordinator rather than
//! inside it; the credential check never takes the coordinator lock.

use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        auth::{LoginRequest, LoginResponse, PlayerIdentity, SessionResponse, TakenPlayersResponse},
        common::PlayerDetails,
    },
    error::ServiceError,
    state::{
        SharedState,
        game::PlayerStatus,
        transitions::{read, run_command},
    },
};

/// Check a roster credential, move the player into the lobby and issue a session token.
///
/// A new login for an identity revokes the tokens it previously held.
pub async fn login(state: &SharedState, request: LoginRequest) -> Result<LoginResponse, ServiceError> {
    request
        .validate()
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    let player_id = request.player_id.trim();
    if !state.config().passcode_matches(player_id, &request.passcode) {
        warn!(player = %player_id, "rejected login attempt");
        return Err(ServiceError::Unauthorized("invalid credentials".into()));
    }

    let token = Uuid::new_v4().simple().to_string();
    // Issued under the coordinator lock so a concurrent reset cannot miss it.
    let (player, phase) = run_command(state, |coordinator, fx| {
        coordinator.join_lobby(player_id, fx)?;
        let player = coordinator.player(player_id)?;
        let identity = PlayerIdentity {
            id: player.id.clone(),
            role: player.role.map(Into::into),
            status: player.status.into(),
        };
        state.sessions().retain(|_, owner| owner.as_str() != player_id);
        state.sessions().insert(token.clone(), player_id.to_string());
        Ok((identity, coordinator.state_summary()))
    })
    .await?;
    info!(player = %player_id, "player logged in");

    Ok(LoginResponse {
        token,
        player,
        phase,
    })
}

/// Identity bound to a session token.
pub fn resolve(state: &SharedState, token: &str) -> Result<String, ServiceError> {
    state
        .sessions()
        .get(token)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ServiceError::Unauthorized("invalid or expired session".into()))
}

/// Answer whether a token is still valid, with the player's full view when it is.
pub async fn session(state: &SharedState, token: Option<&str>) -> SessionResponse {
    let player_id = token.and_then(|token| resolve(state, token).ok());
    if player_id.is_none() {
        debug!("session check with an unknown token");
    }

    read(state, |coordinator| {
        let player = player_id
            .as_deref()
            .and_then(|id| coordinator.player(id).ok())
            .map(PlayerDetails::from);
        SessionResponse {
            valid: player.is_some(),
            player,
            phase: coordinator.state_summary(),
        }
    })
    .await
}

/// Identities no longer offline, so login screens can grey them out.
pub async fn taken_players(state: &SharedState) -> TakenPlayersResponse {
    let players = read(state, |coordinator| {
        coordinator
            .session()
            .players
            .values()
            .filter(|player| player.status != PlayerStatus::Offline)
            .map(|player| player.id.clone())
            .collect()
    })
    .await;
    TakenPlayersResponse { players }
}
