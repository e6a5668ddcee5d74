use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::common::{GameStateSummary, PlayerDetails, RoleDto, StatusDto};

/// Credentials submitted by a player's device.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub player_id: String,
    #[validate(length(min = 1, max = 64))]
    pub passcode: String,
}

/// Identity, role and status of the player that just logged in.
#[derive(Debug, Serialize, ToSchema)]
pub struct PlayerIdentity {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleDto>,
    pub status: StatusDto,
}

/// Session issued on a successful login.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Present it in the `x-session-token` header and in the WebSocket `join` frame.
    pub token: String,
    pub player: PlayerIdentity,
    pub phase: GameStateSummary,
}

/// Result of a session check. `player` is absent when the token is not valid.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerDetails>,
    pub phase: GameStateSummary,
}

/// Identities that are no longer offline.
#[derive(Debug, Serialize, ToSchema)]
pub struct TakenPlayersResponse {
    pub players: Vec<String>,
}
