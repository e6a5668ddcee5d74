use serde::Serialize;
use utoipa::ToSchema;

use crate::state::state_machine::{EndReason, GamePhase};

/// Publicly visible game phase exposed to clients (REST/SSE/WebSocket).
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VisiblePhase {
    /// Lobby, no round running.
    Waiting,
    /// Round in progress.
    Active,
    /// Discussion, the match clock is frozen.
    Meeting,
    /// Ballot open.
    Voting,
    /// Round over.
    Ended,
}

/// Why the round ended.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReasonDto {
    TimeExpired,
    TasksCompleted,
    SaboteursWin,
    CrewWin,
    AdminEnded,
}

impl From<EndReason> for EndReasonDto {
    fn from(value: EndReason) -> Self {
        match value {
            EndReason::TimeExpired => EndReasonDto::TimeExpired,
            EndReason::TasksCompleted => EndReasonDto::TasksCompleted,
            EndReason::SaboteursWin => EndReasonDto::SaboteursWin,
            EndReason::CrewWin => EndReasonDto::CrewWin,
            EndReason::AdminEnded => EndReasonDto::AdminEnded,
        }
    }
}

impl From<GamePhase> for VisiblePhase {
    fn from(value: GamePhase) -> Self {
        match value {
            GamePhase::Waiting => VisiblePhase::Waiting,
            GamePhase::Active => VisiblePhase::Active,
            GamePhase::Meeting => VisiblePhase::Meeting,
            GamePhase::Voting => VisiblePhase::Voting,
            GamePhase::Ended(_) => VisiblePhase::Ended,
        }
    }
}

/// Split a phase into its visible name and optional end reason.
pub fn describe_phase(phase: GamePhase) -> (VisiblePhase, Option<EndReasonDto>) {
    let reason = match phase {
        GamePhase::Ended(reason) => Some(reason.into()),
        _ => None,
    };
    (phase.into(), reason)
}
