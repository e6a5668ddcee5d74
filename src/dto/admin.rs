//! DTO definitions used by the admin REST API and documentation layer.

use std::time::SystemTime;

use serde::Serialize;
use utoipa::ToSchema;

use crate::dto::{
    common::{GameStateSummary, PlayerSummary, TallyEntry, TaskPinSummary},
    format_system_time,
    phase::{EndReasonDto, VisiblePhase},
};

/// Phase reached after an admin action.
#[derive(Debug, Serialize, ToSchema)]
pub struct ActionResponse {
    pub phase: VisiblePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReasonDto>,
    pub round: u32,
}

/// Result of an admin ejection.
#[derive(Debug, Serialize, ToSchema)]
pub struct EjectResponse {
    pub player_id: String,
    /// Phase after the ejection; a win condition may have ended the round.
    pub phase: VisiblePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReasonDto>,
}

/// Everything the dashboard needs after a reconnect.
#[derive(Debug, Serialize, ToSchema)]
pub struct AdminSnapshot {
    pub state: GameStateSummary,
    /// RFC 3339 timestamp of the current round start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub round_started_at: Option<String>,
    pub players: Vec<PlayerSummary>,
    pub tally: Vec<TallyEntry>,
    pub total_votes: usize,
    pub pins: Vec<TaskPinSummary>,
}

impl AdminSnapshot {
    /// Assemble the snapshot, formatting the round start time.
    pub fn new(
        state: GameStateSummary,
        round_started_at: Option<SystemTime>,
        players: Vec<PlayerSummary>,
        tally: Vec<TallyEntry>,
        pins: Vec<TaskPinSummary>,
    ) -> Self {
        let total_votes = tally.iter().map(|entry| entry.count).sum();
        Self {
            state,
            round_started_at: round_started_at.map(format_system_time),
            players,
            tally,
            total_votes,
            pins,
        }
    }
}
