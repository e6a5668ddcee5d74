use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::state::state_machine::InvalidTransition;

/// Rejections produced by the session coordinator.
///
/// Every variant is local to the caller that issued the command: no state is mutated when one
/// of these is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Command not permitted in the current phase (or for the caller's role).
    #[error("invalid command: {0}")]
    InvalidCommand(String),
    /// Identity is not part of the roster.
    #[error("unknown player `{0}`")]
    UnknownPlayer(String),
    /// PIN does not match the live PIN of the task.
    #[error("invalid PIN for task `{0}`")]
    InvalidPin(String),
    /// Task does not exist or is not assigned to the caller.
    #[error("task `{0}` not found")]
    TaskNotFound(String),
    /// Task instance has already been completed.
    #[error("task `{0}` already completed")]
    AlreadyCompleted(String),
    /// Saboteurs cannot eliminate one another.
    #[error("friendly fire: cannot eliminate an ally")]
    FriendlyFire,
    /// Killer must wait before the next elimination.
    #[error("elimination on cooldown ({remaining}s remaining)")]
    OnCooldown {
        /// Seconds left before the killer is eligible again.
        remaining: u32,
    },
    /// Killer has been eliminated or ejected.
    #[error("dead players cannot eliminate")]
    KillerNotAlive,
    /// Victim is not a living participant of the round.
    #[error("player `{0}` is not alive")]
    VictimNotAlive(String),
    /// Dead or absent players cannot vote.
    #[error("only living players can vote")]
    VoterNotAlive,
}

impl GameError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            GameError::InvalidCommand(_) => "invalid_command",
            GameError::UnknownPlayer(_) => "unknown_player",
            GameError::InvalidPin(_) => "invalid_pin",
            GameError::TaskNotFound(_) => "task_not_found",
            GameError::AlreadyCompleted(_) => "already_completed",
            GameError::FriendlyFire => "friendly_fire",
            GameError::OnCooldown { .. } => "on_cooldown",
            GameError::KillerNotAlive => "killer_not_alive",
            GameError::VictimNotAlive(_) => "victim_not_alive",
            GameError::VoterNotAlive => "voter_not_alive",
        }
    }
}

impl From<InvalidTransition> for GameError {
    fn from(err: InvalidTransition) -> Self {
        GameError::InvalidCommand(err.to_string())
    }
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The coordinator rejected the command.
    #[error(transparent)]
    Game(#[from] GameError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Command rejected by the game rules.
    #[error("{0}")]
    Rejected(GameError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Game(GameError::UnknownPlayer(id)) => {
                AppError::NotFound(format!("player `{id}` not found"))
            }
            ServiceError::Game(game) => AppError::Rejected(game),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = match &self {
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, None),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, None),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            AppError::Rejected(err) => {
                let status = match err {
                    GameError::InvalidPin(_) => StatusCode::FORBIDDEN,
                    GameError::TaskNotFound(_) | GameError::UnknownPlayer(_) => {
                        StatusCode::NOT_FOUND
                    }
                    _ => StatusCode::CONFLICT,
                };
                (status, Some(err.code()))
            }
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
            code,
        });

        (status, payload).into_response()
    }
}
