use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::{
        common::{PlayerSummary, RoleDto, StatusDto, TallyEntry, TaskPinSummary, TaskSummary},
        phase::{EndReasonDto, VisiblePhase},
    },
    error::GameError,
};

#[derive(Debug, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
/// Messages accepted from player WebSocket clients.
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlayerInboundMessage {
    /// First frame of every connection, binds it to a logged-in identity.
    Join { player_id: String, token: String },
    RequestPhase,
    RequestPlayer,
    RequestTasks,
    RequestGhostTasks,
    RequestTeammates,
    CompleteTask { task_id: String, pin: String },
    CompleteCoverTask { task_id: String, pin: String },
    AttemptElimination { victim_id: String },
    RequestLivingPlayers,
    CastVote { target: String },
    #[serde(other)]
    Unknown,
}

/// Rejection carried inside results and error frames.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    /// Seconds left on the elimination cooldown, for `on_cooldown` only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

impl From<&GameError> for ErrorPayload {
    fn from(err: &GameError) -> Self {
        let remaining = match err {
            GameError::OnCooldown { remaining } => Some(*remaining),
            _ => None,
        };
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
            remaining,
        }
    }
}

/// Every frame the server pushes, over WebSocket or the admin SSE stream.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Acknowledges a successful join.
    Joined { player_id: String },
    PhaseChanged {
        phase: VisiblePhase,
        #[serde(skip_serializing_if = "Option::is_none")]
        end_reason: Option<EndReasonDto>,
        round: u32,
    },
    MatchClock { seconds: u32 },
    Progress { percent: u8 },
    VotingClock { seconds: u32 },
    /// Number of ballots cast so far; targets stay hidden from players.
    VoteCount { total_votes: usize },
    /// Admin only.
    Players { players: Vec<PlayerSummary> },
    /// Admin only.
    Tally { entries: Vec<TallyEntry> },
    /// Admin only.
    TaskPins { pins: Vec<TaskPinSummary> },
    PlayerState {
        player_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        role: Option<RoleDto>,
        status: StatusDto,
    },
    Tasks { tasks: Vec<TaskSummary> },
    GhostTasks { tasks: Vec<TaskSummary> },
    Teammates { players: Vec<String> },
    LivingPlayers { players: Vec<String> },
    Cooldown { seconds: u32 },
    TaskResult {
        task_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    EliminationResult {
        victim_id: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<ErrorPayload>,
    },
    VoteConfirmed { target: String },
    Error(ErrorPayload),
    /// Server reset: clients must log in again.
    ForceDisconnect,
}

impl ServerMessage {
    /// Event name used on the SSE stream.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Joined { .. } => "joined",
            ServerMessage::PhaseChanged { .. } => "phase_changed",
            ServerMessage::MatchClock { .. } => "match_clock",
            ServerMessage::Progress { .. } => "progress",
            ServerMessage::VotingClock { .. } => "voting_clock",
            ServerMessage::VoteCount { .. } => "vote_count",
            ServerMessage::Players { .. } => "players",
            ServerMessage::Tally { .. } => "tally",
            ServerMessage::TaskPins { .. } => "task_pins",
            ServerMessage::PlayerState { .. } => "player_state",
            ServerMessage::Tasks { .. } => "tasks",
            ServerMessage::GhostTasks { .. } => "ghost_tasks",
            ServerMessage::Teammates { .. } => "teammates",
            ServerMessage::LivingPlayers { .. } => "living_players",
            ServerMessage::Cooldown { .. } => "cooldown",
            ServerMessage::TaskResult { .. } => "task_result",
            ServerMessage::EliminationResult { .. } => "elimination_result",
            ServerMessage::VoteConfirmed { .. } => "vote_confirmed",
            ServerMessage::Error(_) => "error",
            ServerMessage::ForceDisconnect => "force_disconnect",
        }
    }

    /// Error frame for a rejected command.
    pub fn rejected(err: &GameError) -> Self {
        ServerMessage::Error(err.into())
    }
}
