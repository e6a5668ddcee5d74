use thiserror::Error;

/// High-level phases a round moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GamePhase {
    /// Players gather in the lobby; roles and tasks are not assigned yet.
    Waiting,
    /// The match clock runs; crew complete tasks and saboteurs hunt.
    Active,
    /// Everybody gathers to discuss; the match clock is frozen.
    Meeting,
    /// Living players cast votes while the informational voting clock runs.
    Voting,
    /// The round is over.
    Ended(EndReason),
}

/// Why a round reached [`GamePhase::Ended`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The match clock ran out.
    TimeExpired,
    /// Crew progress reached 100%.
    TasksCompleted,
    /// Living saboteurs equal or outnumber living crew.
    SaboteursWin,
    /// Every saboteur has been ejected.
    CrewWin,
    /// The admin closed the round manually.
    AdminEnded,
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Admin starts the round from the lobby.
    StartGame,
    /// Admin calls everybody to a meeting.
    TriggerMeeting,
    /// Admin opens the ballot.
    StartVoting,
    /// Admin sends everybody back to work after voting.
    ResumeGame,
    /// The round ends, either automatically or by admin decision.
    EndRound(EndReason),
    /// Wipe everything and return to the lobby.
    ResetAll,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: GamePhase,
    /// The event that cannot be applied from this phase.
    pub event: GameEvent,
}

/// State machine implementing the round flow.
#[derive(Debug, Clone)]
pub struct GameStateMachine {
    phase: GamePhase,
}

impl Default for GameStateMachine {
    fn default() -> Self {
        Self {
            phase: GamePhase::Waiting,
        }
    }
}

impl GameStateMachine {
    /// Create a new state machine initialised in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    /// Whether a round is in progress (roles assigned, not ended yet).
    pub fn round_in_progress(&self) -> bool {
        matches!(
            self.phase,
            GamePhase::Active | GamePhase::Meeting | GamePhase::Voting
        )
    }

    /// Validate that `event` can be applied from the current phase without mutating anything.
    pub fn check(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        self.compute_transition(event)
    }

    /// Apply `event`, moving the state machine to the next phase.
    pub fn apply(&mut self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = self.compute_transition(event)?;
        self.phase = next;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(&self, event: GameEvent) -> Result<GamePhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (GamePhase::Waiting, GameEvent::StartGame) => GamePhase::Active,
            (GamePhase::Active, GameEvent::TriggerMeeting) => GamePhase::Meeting,
            (GamePhase::Meeting, GameEvent::StartVoting) => GamePhase::Voting,
            (GamePhase::Voting, GameEvent::ResumeGame) => GamePhase::Active,
            (
                GamePhase::Active | GamePhase::Meeting | GamePhase::Voting,
                GameEvent::EndRound(reason),
            ) => GamePhase::Ended(reason),
            (_, GameEvent::ResetAll) => GamePhase::Waiting,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}
