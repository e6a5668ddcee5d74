//! Single writer of the game session.
//!
//! Every mutation of phase, players, tasks, votes and cooldowns goes through
//! [`GameCoordinator`]. Methods are synchronous: they validate, mutate, and describe what must
//! happen next (messages to deliver, timers to start or stop) in an [`Effects`] buffer. The caller
//! holds the coordinator lock while applying those effects, so every client observes the same
//! order of events.

use std::time::SystemTime;

use rand::{rngs::StdRng, seq::SliceRandom};
use tracing::{debug, info, warn};

use crate::{
    config::{AppConfig, GameRules},
    dto::{
        admin::AdminSnapshot,
        common::{
            GameStateSummary, PlayerSummary, StatusDto, TallyEntry, TaskPinSummary, summarize_tasks,
        },
        phase::describe_phase,
        ws::ServerMessage,
    },
    error::GameError,
    state::{
        elimination::{CooldownTick, Elimination, attempt_kill},
        game::{GameSession, Player, PlayerStatus, Role},
        state_machine::{EndReason, GameEvent, GamePhase, GameStateMachine},
        tasks::{TaskCatalogue, TaskInstance, TaskPins, assign_tasks},
        timers::{TimerToken, TokenIssuer},
        votes::VoteTarget,
    },
};

/// Message routing decided by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Every connected player and the admin dashboard.
    All(ServerMessage),
    /// Admin dashboard only.
    Admin(ServerMessage),
    /// A single player.
    Player(String, ServerMessage),
}

/// Timer operations requested by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    StartMatchClock(TimerToken),
    StopMatchClock,
    StartVotingClock(TimerToken),
    StopVotingClock,
    StartCooldown {
        player_id: String,
        token: TimerToken,
    },
    CancelAll,
}

/// Side effects collected while a command runs.
#[derive(Debug, Default)]
pub struct Effects {
    /// Messages, in delivery order.
    pub dispatches: Vec<Dispatch>,
    /// Timer operations, in order.
    pub timers: Vec<TimerCommand>,
}

impl Effects {
    fn all(&mut self, message: ServerMessage) {
        self.dispatches.push(Dispatch::All(message));
    }

    fn admin(&mut self, message: ServerMessage) {
        self.dispatches.push(Dispatch::Admin(message));
    }

    fn player(&mut self, player_id: &str, message: ServerMessage) {
        self.dispatches
            .push(Dispatch::Player(player_id.to_string(), message));
    }

    fn timer(&mut self, command: TimerCommand) {
        self.timers.push(command);
    }

    /// Whether nothing needs to happen.
    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty() && self.timers.is_empty()
    }
}

/// What a timer task should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Keep ticking.
    Continue,
    /// The countdown reached its end.
    Finished,
    /// The timer was cancelled or replaced; stop without side effects.
    Stale,
}

#[derive(Debug, Clone, Copy)]
struct VotingClock {
    remaining: u32,
    token: TimerToken,
}

/// Result of a successful task verification.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    /// Crew progress after the completion.
    pub progress: u8,
    /// The caller's task list after the completion.
    pub tasks: Vec<TaskInstance>,
}

/// Owner of the state machine and the entity store.
pub struct GameCoordinator {
    rules: GameRules,
    catalogue: TaskCatalogue,
    machine: GameStateMachine,
    session: GameSession,
    tokens: TokenIssuer,
    match_clock: Option<TimerToken>,
    voting_clock: Option<VotingClock>,
    rng: StdRng,
}

impl GameCoordinator {
    /// Build a coordinator in the lobby with every roster entry offline and fresh PINs.
    pub fn new(config: &AppConfig, mut rng: StdRng) -> Self {
        let catalogue = config.catalogue();
        let pins = TaskPins::generate(&catalogue, 1, &mut rng);
        let session = GameSession::new(
            config.roster_ids(),
            config.rules().match_duration_secs,
            pins,
        );
        Self {
            rules: config.rules().clone(),
            catalogue,
            machine: GameStateMachine::new(),
            session,
            tokens: TokenIssuer::default(),
            match_clock: None,
            voting_clock: None,
            rng,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> GamePhase {
        self.machine.phase()
    }

    /// Read access to the entity store.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Borrow a registered player.
    pub fn player(&self, player_id: &str) -> Result<&Player, GameError> {
        self.session.player(player_id)
    }

    /// Phase, round, clock and progress.
    pub fn state_summary(&self) -> GameStateSummary {
        let (phase, end_reason) = describe_phase(self.machine.phase());
        GameStateSummary {
            phase,
            end_reason,
            round: self.session.round,
            clock_seconds: self.session.clock_seconds,
            progress: self.session.global_progress,
        }
    }

    /// Everything the admin dashboard shows.
    pub fn admin_snapshot(&self) -> AdminSnapshot {
        AdminSnapshot::new(
            self.state_summary(),
            self.session.round_started_at,
            self.player_summaries(),
            self.tally_entries(),
            self.pin_summaries(),
        )
    }

    /// Identifiers of every living player.
    pub fn living_players(&self) -> Vec<String> {
        self.session.living_players()
    }

    /// Other living saboteurs, for a saboteur caller.
    pub fn teammates(&self, player_id: &str) -> Result<Vec<String>, GameError> {
        let player = self.session.player(player_id)?;
        if !player.is_saboteur() {
            return Err(GameError::InvalidCommand(
                "only saboteurs have teammates".into(),
            ));
        }
        Ok(self.saboteur_allies(player_id))
    }

    /// Mark a logged-in player as present in the lobby.
    ///
    /// Players already taking part in the round keep their status.
    pub fn join_lobby(&mut self, player_id: &str, fx: &mut Effects) -> Result<(), GameError> {
        let player = self.session.player_mut(player_id)?;
        if player.status == PlayerStatus::Offline {
            player.status = PlayerStatus::Lobby;
            debug!(player = %player_id, "player joined the lobby");
            fx.admin(self.players_message());
        }
        Ok(())
    }

    /// Deal roles and tasks to every lobby player and start the match clock.
    pub fn start_game(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.check(GameEvent::StartGame)?;

        let mut participants: Vec<String> = self
            .session
            .players
            .values()
            .filter(|player| player.status != PlayerStatus::Offline)
            .map(|player| player.id.clone())
            .collect();
        if participants.is_empty() {
            return Err(GameError::InvalidCommand(
                "no player has joined the lobby".into(),
            ));
        }

        participants.shuffle(&mut self.rng);
        let saboteurs = self.rules.saboteur_count.min(participants.len());
        let counts = self.rules.assignment();
        for (index, player_id) in participants.iter().enumerate() {
            let tasks = assign_tasks(&self.catalogue, counts, &mut self.rng);
            if let Some(player) = self.session.players.get_mut(player_id) {
                player.role = Some(if index < saboteurs {
                    Role::Saboteur
                } else {
                    Role::Crew
                });
                player.status = PlayerStatus::Alive;
                player.tasks = tasks;
                player.tasks_completed = 0;
                player.kill_count = 0;
            }
        }

        let round = self.session.round;
        self.session
            .pins
            .ensure_round(&self.catalogue, round, &mut self.rng);
        self.session.votes.clear();
        self.session.cooldowns.clear();
        self.session.clock_seconds = self.rules.match_duration_secs;
        self.session.round_started_at = Some(SystemTime::now());
        let progress = self.session.recompute_progress();
        self.machine.apply(GameEvent::StartGame)?;
        self.start_match_clock(fx);

        info!(
            round,
            participants = participants.len(),
            saboteurs,
            "round started"
        );

        fx.all(self.phase_message());
        fx.all(ServerMessage::MatchClock {
            seconds: self.session.clock_seconds,
        });
        fx.all(ServerMessage::Progress { percent: progress });
        for player_id in &participants {
            let Some(player) = self.session.players.get(player_id) else {
                continue;
            };
            fx.player(player_id, player_state_message(player));
            fx.player(
                player_id,
                ServerMessage::Tasks {
                    tasks: summarize_tasks(&player.tasks),
                },
            );
            if player.is_saboteur() {
                fx.player(
                    player_id,
                    ServerMessage::Teammates {
                        players: self.saboteur_allies(player_id),
                    },
                );
            }
        }
        fx.admin(self.players_message());
        fx.admin(self.pins_message());
        Ok(())
    }

    /// Freeze the match clock and gather everybody.
    pub fn trigger_meeting(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.apply(GameEvent::TriggerMeeting)?;
        self.stop_match_clock(fx);
        info!(clock = self.session.clock_seconds, "meeting called");
        fx.all(self.phase_message());
        Ok(())
    }

    /// Open the ballot with an empty tally.
    pub fn start_voting(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.apply(GameEvent::StartVoting)?;
        self.session.votes.clear();

        let seconds = self.rules.voting_duration_secs;
        if seconds > 0 {
            let token = self.tokens.issue();
            self.voting_clock = Some(VotingClock {
                remaining: seconds,
                token,
            });
            fx.timer(TimerCommand::StartVotingClock(token));
        }

        info!(seconds, "voting opened");
        fx.all(self.phase_message());
        fx.all(ServerMessage::VotingClock { seconds });
        fx.all(ServerMessage::VoteCount { total_votes: 0 });
        fx.admin(self.tally_message());
        Ok(())
    }

    /// Close the ballot and restart the match clock where it stopped.
    pub fn resume_game(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.apply(GameEvent::ResumeGame)?;
        self.stop_voting_clock(fx);
        self.start_match_clock(fx);

        info!(clock = self.session.clock_seconds, "round resumed");
        fx.all(self.phase_message());
        fx.all(ServerMessage::MatchClock {
            seconds: self.session.clock_seconds,
        });
        Ok(())
    }

    /// End the round on admin request.
    pub fn end_round(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.finish(EndReason::AdminEnded, fx)
    }

    /// Wipe players, PINs, votes and timers and return to the lobby, from any phase.
    pub fn reset_all(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.apply(GameEvent::ResetAll)?;

        for player in self.session.players.values_mut() {
            player.wipe();
        }
        self.session.round += 1;
        let round = self.session.round;
        self.session
            .pins
            .regenerate(&self.catalogue, round, &mut self.rng);
        self.session.votes.clear();
        self.session.cooldowns.clear();
        self.session.clock_seconds = self.rules.match_duration_secs;
        self.session.round_started_at = None;
        let progress = self.session.recompute_progress();
        self.match_clock = None;
        self.voting_clock = None;
        fx.timer(TimerCommand::CancelAll);

        info!(round, "session reset");
        fx.all(self.phase_message());
        fx.all(ServerMessage::MatchClock {
            seconds: self.session.clock_seconds,
        });
        fx.all(ServerMessage::Progress { percent: progress });
        fx.admin(self.players_message());
        fx.admin(self.pins_message());
        fx.all(ServerMessage::ForceDisconnect);
        Ok(())
    }

    /// Mark a living player as dead by admin decision, then evaluate win conditions.
    pub fn eject_player(&mut self, player_id: &str, fx: &mut Effects) -> Result<(), GameError> {
        if !self.machine.round_in_progress() {
            return Err(GameError::InvalidCommand("no round in progress".into()));
        }
        let player = self.session.player_mut(player_id)?;
        if !player.is_alive() {
            return Err(GameError::VictimNotAlive(player_id.to_string()));
        }
        player.status = PlayerStatus::Dead;
        let message = player_state_message(player);

        info!(player = %player_id, "player ejected");
        fx.player(player_id, message);
        fx.all(ServerMessage::LivingPlayers {
            players: self.session.living_players(),
        });
        fx.admin(self.players_message());
        self.evaluate_win(fx)
    }

    /// Complete a crew task after checking its PIN. Reaching full progress ends the round.
    pub fn complete_task(
        &mut self,
        player_id: &str,
        task_id: &str,
        pin: &str,
        fx: &mut Effects,
    ) -> Result<CompletedTask, GameError> {
        self.require_phase(GamePhase::Active)?;
        match self.session.player(player_id)?.role {
            Some(Role::Crew) => {}
            Some(Role::Saboteur) => {
                return Err(GameError::InvalidCommand(
                    "saboteurs can only fake cover tasks".into(),
                ));
            }
            None => {
                return Err(GameError::InvalidCommand(
                    "not taking part in this round".into(),
                ));
            }
        }
        self.check_pin(task_id, pin)?;

        let player = self.session.player_mut(player_id)?;
        player.complete_task(task_id)?;
        let tasks = player.tasks.clone();
        let refreshed = task_list_message(player);
        let progress = self.session.recompute_progress();

        info!(player = %player_id, task = %task_id, progress, "task completed");
        fx.player(player_id, refreshed);
        fx.all(ServerMessage::Progress { percent: progress });
        fx.admin(self.players_message());
        if progress >= 100 {
            self.finish(EndReason::TasksCompleted, fx)?;
        }
        Ok(CompletedTask { progress, tasks })
    }

    /// Fake a task as a saboteur: same checks, no effect on progress.
    pub fn complete_cover_task(
        &mut self,
        player_id: &str,
        task_id: &str,
        pin: &str,
        fx: &mut Effects,
    ) -> Result<CompletedTask, GameError> {
        self.require_phase(GamePhase::Active)?;
        if !self.session.player(player_id)?.is_saboteur() {
            return Err(GameError::InvalidCommand(
                "only saboteurs complete cover tasks".into(),
            ));
        }
        self.check_pin(task_id, pin)?;

        let player = self.session.player_mut(player_id)?;
        player.complete_task(task_id)?;
        let tasks = player.tasks.clone();
        let refreshed = task_list_message(player);

        debug!(player = %player_id, task = %task_id, "cover task completed");
        fx.player(player_id, refreshed);
        fx.admin(self.players_message());
        Ok(CompletedTask {
            progress: self.session.global_progress,
            tasks,
        })
    }

    /// Let a saboteur eliminate a crew member, then evaluate win conditions.
    pub fn attempt_elimination(
        &mut self,
        killer_id: &str,
        victim_id: &str,
        fx: &mut Effects,
    ) -> Result<Elimination, GameError> {
        self.require_phase(GamePhase::Active)?;
        let seconds = self.rules.kill_cooldown_secs;
        let token = self.tokens.issue();
        let outcome = attempt_kill(&mut self.session, killer_id, victim_id, seconds, token)?;

        info!(
            killer = %killer_id,
            victim = %victim_id,
            kills = outcome.kill_count,
            "player eliminated"
        );
        if seconds > 0 {
            fx.timer(TimerCommand::StartCooldown {
                player_id: killer_id.to_string(),
                token,
            });
        }
        fx.player(killer_id, ServerMessage::Cooldown { seconds });
        if let Ok(victim) = self.session.player(victim_id) {
            fx.player(victim_id, player_state_message(victim));
        }
        fx.all(ServerMessage::LivingPlayers {
            players: self.session.living_players(),
        });
        fx.admin(self.players_message());
        self.evaluate_win(fx)?;
        Ok(outcome)
    }

    /// Record a ballot. Only living players vote; the latest ballot replaces earlier ones.
    pub fn cast_vote(
        &mut self,
        voter_id: &str,
        target: &str,
        fx: &mut Effects,
    ) -> Result<VoteTarget, GameError> {
        self.require_phase(GamePhase::Voting)?;
        if !self.session.player(voter_id)?.is_alive() {
            return Err(GameError::VoterNotAlive);
        }
        let target = VoteTarget::parse(target);
        if let VoteTarget::Player(target_id) = &target {
            self.session.player(target_id)?;
        }

        self.session.votes.cast(voter_id, target.clone());
        debug!(voter = %voter_id, target = %target, "vote cast");
        fx.all(ServerMessage::VoteCount {
            total_votes: self.session.votes.len(),
        });
        fx.admin(self.tally_message());
        Ok(target)
    }

    /// One second of match clock.
    pub fn tick_match_clock(&mut self, token: TimerToken, fx: &mut Effects) -> Tick {
        if self.match_clock != Some(token) || self.machine.phase() != GamePhase::Active {
            return Tick::Stale;
        }

        self.session.clock_seconds = self.session.clock_seconds.saturating_sub(1);
        fx.all(ServerMessage::MatchClock {
            seconds: self.session.clock_seconds,
        });
        if self.session.clock_seconds > 0 {
            return Tick::Continue;
        }

        self.match_clock = None;
        if let Err(err) = self.finish(EndReason::TimeExpired, fx) {
            warn!(error = %err, "failed to end round on clock expiry");
        }
        Tick::Finished
    }

    /// One second of voting clock.
    pub fn tick_voting_clock(&mut self, token: TimerToken, fx: &mut Effects) -> Tick {
        let Some(clock) = self.voting_clock.as_mut() else {
            return Tick::Stale;
        };
        if clock.token != token {
            return Tick::Stale;
        }

        clock.remaining = clock.remaining.saturating_sub(1);
        let seconds = clock.remaining;
        fx.all(ServerMessage::VotingClock { seconds });
        if seconds > 0 {
            return Tick::Continue;
        }
        self.voting_clock = None;
        debug!("voting clock elapsed");
        Tick::Finished
    }

    /// One second of a saboteur's kill cooldown.
    pub fn tick_cooldown(&mut self, player_id: &str, token: TimerToken, fx: &mut Effects) -> Tick {
        match self.session.cooldowns.tick(player_id, token) {
            CooldownTick::Stale => Tick::Stale,
            CooldownTick::Running(seconds) => {
                fx.player(player_id, ServerMessage::Cooldown { seconds });
                Tick::Continue
            }
            CooldownTick::Cleared => {
                fx.player(player_id, ServerMessage::Cooldown { seconds: 0 });
                fx.admin(self.players_message());
                Tick::Finished
            }
        }
    }

    fn finish(&mut self, reason: EndReason, fx: &mut Effects) -> Result<(), GameError> {
        self.machine.apply(GameEvent::EndRound(reason))?;
        self.match_clock = None;
        self.voting_clock = None;
        self.session.cooldowns.clear();
        fx.timer(TimerCommand::CancelAll);

        info!(?reason, round = self.session.round, "round ended");
        fx.all(self.phase_message());
        fx.admin(self.players_message());
        Ok(())
    }

    fn evaluate_win(&mut self, fx: &mut Effects) -> Result<(), GameError> {
        if !self.machine.round_in_progress() {
            return Ok(());
        }
        let (crew, saboteurs) = self.session.alive_counts();
        let dealt = self
            .session
            .players
            .values()
            .filter(|player| player.is_saboteur())
            .count();

        if saboteurs > 0 && saboteurs >= crew {
            self.finish(EndReason::SaboteursWin, fx)
        } else if dealt > 0 && saboteurs == 0 {
            self.finish(EndReason::CrewWin, fx)
        } else {
            Ok(())
        }
    }

    fn require_phase(&self, expected: GamePhase) -> Result<(), GameError> {
        let phase = self.machine.phase();
        if phase == expected {
            Ok(())
        } else {
            Err(GameError::InvalidCommand(format!(
                "not allowed while {phase:?}"
            )))
        }
    }

    fn check_pin(&self, task_id: &str, pin: &str) -> Result<(), GameError> {
        if self.catalogue.get(task_id).is_none() {
            return Err(GameError::TaskNotFound(task_id.to_string()));
        }
        if !self.session.pins.matches(task_id, pin) {
            return Err(GameError::InvalidPin(task_id.to_string()));
        }
        Ok(())
    }

    fn start_match_clock(&mut self, fx: &mut Effects) {
        let token = self.tokens.issue();
        self.match_clock = Some(token);
        fx.timer(TimerCommand::StartMatchClock(token));
    }

    fn stop_match_clock(&mut self, fx: &mut Effects) {
        if self.match_clock.take().is_some() {
            fx.timer(TimerCommand::StopMatchClock);
        }
    }

    fn stop_voting_clock(&mut self, fx: &mut Effects) {
        if self.voting_clock.take().is_some() {
            fx.timer(TimerCommand::StopVotingClock);
        }
    }

    fn saboteur_allies(&self, player_id: &str) -> Vec<String> {
        self.session
            .players
            .values()
            .filter(|other| other.id != player_id && other.is_saboteur() && other.is_alive())
            .map(|other| other.id.clone())
            .collect()
    }

    fn player_summaries(&self) -> Vec<PlayerSummary> {
        self.session
            .players
            .values()
            .map(|player| {
                PlayerSummary::from_player(player, self.session.cooldowns.remaining(&player.id))
            })
            .collect()
    }

    fn tally_entries(&self) -> Vec<TallyEntry> {
        self.session
            .votes
            .tally()
            .into_iter()
            .map(TallyEntry::from)
            .collect()
    }

    fn pin_summaries(&self) -> Vec<TaskPinSummary> {
        self.catalogue
            .iter()
            .filter_map(|task| {
                self.session
                    .pins
                    .get(&task.id)
                    .map(|pin| TaskPinSummary::new(task, pin))
            })
            .collect()
    }

    fn phase_message(&self) -> ServerMessage {
        let (phase, end_reason) = describe_phase(self.machine.phase());
        ServerMessage::PhaseChanged {
            phase,
            end_reason,
            round: self.session.round,
        }
    }

    fn players_message(&self) -> ServerMessage {
        ServerMessage::Players {
            players: self.player_summaries(),
        }
    }

    fn tally_message(&self) -> ServerMessage {
        ServerMessage::Tally {
            entries: self.tally_entries(),
        }
    }

    fn pins_message(&self) -> ServerMessage {
        ServerMessage::TaskPins {
            pins: self.pin_summaries(),
        }
    }
}

/// Targeted role and status notification.
pub fn player_state_message(player: &Player) -> ServerMessage {
    ServerMessage::PlayerState {
        player_id: player.id.clone(),
        role: player.role.map(Into::into),
        status: StatusDto::from(player.status),
    }
}

/// Targeted task list: main tasks only once the player is a ghost.
pub fn task_list_message(player: &Player) -> ServerMessage {
    if player.status == PlayerStatus::Dead {
        ServerMessage::GhostTasks {
            tasks: summarize_tasks(player.ghost_tasks()),
        }
    } else {
        ServerMessage::Tasks {
            tasks: summarize_tasks(&player.tasks),
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::{
        config::RosterEntry,
        dto::phase::{EndReasonDto, VisiblePhase},
        state::tasks::{TaskCategory, TaskSpec},
    };

    fn rules(saboteur_count: usize) -> GameRules {
        GameRules {
            saboteur_count,
            match_duration_secs: 600,
            kill_cooldown_secs: 180,
            voting_duration_secs: 30,
            main_tasks_per_player: 3,
            filler_tasks_per_player: 1,
        }
    }

    fn config(players: usize, rules: GameRules) -> AppConfig {
        let roster = (1..=players)
            .map(|n| RosterEntry {
                id: format!("P{n:02}"),
                passcode: "secret".into(),
            })
            .collect();
        let tasks = (0..6)
            .map(|n| TaskSpec {
                name: format!("Main {n}"),
                category: TaskCategory::Main,
                weight: 1,
                location: None,
            })
            .chain((0..2).map(|n| TaskSpec {
                name: format!("Filler {n}"),
                category: TaskCategory::Filler,
                weight: 1,
                location: None,
            }))
            .collect();
        AppConfig::new(rules, roster, tasks)
    }

    fn lobby(players: usize, rules: GameRules) -> GameCoordinator {
        let mut coordinator =
            GameCoordinator::new(&config(players, rules), StdRng::seed_from_u64(7));
        let mut fx = Effects::default();
        for n in 1..=players {
            coordinator
                .join_lobby(&format!("P{n:02}"), &mut fx)
                .unwrap();
        }
        coordinator
    }

    fn started(players: usize, rules: GameRules) -> GameCoordinator {
        let mut coordinator = lobby(players, rules);
        coordinator.start_game(&mut Effects::default()).unwrap();
        coordinator
    }

    fn with_role(coordinator: &GameCoordinator, role: Role) -> Vec<String> {
        coordinator
            .session()
            .players
            .values()
            .filter(|player| player.role == Some(role))
            .map(|player| player.id.clone())
            .collect()
    }

    fn pin(coordinator: &GameCoordinator, task_id: &str) -> String {
        coordinator
            .session()
            .pins
            .get(task_id)
            .unwrap()
            .to_string()
    }

    fn task_of(coordinator: &GameCoordinator, player_id: &str, category: TaskCategory) -> String {
        coordinator
            .player(player_id)
            .unwrap()
            .tasks
            .iter()
            .find(|task| task.definition.category == category)
            .unwrap()
            .id()
            .to_string()
    }

    fn broadcasts(fx: &Effects) -> Vec<&ServerMessage> {
        fx.dispatches
            .iter()
            .filter_map(|dispatch| match dispatch {
                Dispatch::All(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    fn ended_with(coordinator: &GameCoordinator, reason: EndReason) -> bool {
        coordinator.phase() == GamePhase::Ended(reason)
    }

    #[test]
    fn start_requires_someone_in_the_lobby() {
        let mut coordinator =
            GameCoordinator::new(&config(4, rules(1)), StdRng::seed_from_u64(1));
        let mut fx = Effects::default();

        let err = coordinator.start_game(&mut fx).unwrap_err();
        assert!(matches!(err, GameError::InvalidCommand(_)));
        assert_eq!(coordinator.phase(), GamePhase::Waiting);
        assert!(fx.is_empty());
    }

    #[test]
    fn start_deals_roles_tasks_and_clock() {
        let mut coordinator =
            GameCoordinator::new(&config(6, rules(2)), StdRng::seed_from_u64(3));
        let mut fx = Effects::default();
        for id in ["P01", "P02", "P03", "P04", "P05"] {
            coordinator.join_lobby(id, &mut fx).unwrap();
        }

        let mut fx = Effects::default();
        coordinator.start_game(&mut fx).unwrap();

        assert_eq!(coordinator.phase(), GamePhase::Active);
        assert_eq!(with_role(&coordinator, Role::Saboteur).len(), 2);
        assert_eq!(with_role(&coordinator, Role::Crew).len(), 3);

        let absent = coordinator.player("P06").unwrap();
        assert_eq!(absent.status, PlayerStatus::Offline);
        assert!(absent.role.is_none());
        assert!(absent.tasks.is_empty());

        for id in ["P01", "P02", "P03", "P04", "P05"] {
            let player = coordinator.player(id).unwrap();
            assert_eq!(player.status, PlayerStatus::Alive);
            assert_eq!(player.tasks.len(), 4);
        }

        assert_eq!(coordinator.session().clock_seconds, 600);
        assert!(matches!(
            fx.timers.as_slice(),
            [TimerCommand::StartMatchClock(_)]
        ));
        assert!(broadcasts(&fx).contains(&&ServerMessage::PhaseChanged {
            phase: VisiblePhase::Active,
            end_reason: None,
            round: 1,
        }));
        let targeted = fx
            .dispatches
            .iter()
            .filter(|dispatch| {
                matches!(dispatch, Dispatch::Player(_, ServerMessage::PlayerState { .. }))
            })
            .count();
        assert_eq!(targeted, 5);
    }

    #[test]
    fn second_start_is_rejected_without_effects() {
        let mut coordinator = started(4, rules(1));
        let mut fx = Effects::default();
        assert!(coordinator.start_game(&mut fx).is_err());
        assert!(fx.is_empty());
    }

    #[test]
    fn kill_at_parity_ends_with_saboteur_win() {
        let mut coordinator = started(4, rules(2));
        let saboteurs = with_role(&coordinator, Role::Saboteur);
        let crew = with_role(&coordinator, Role::Crew);
        let mut fx = Effects::default();

        coordinator
            .attempt_elimination(&saboteurs[0], &crew[0], &mut fx)
            .unwrap();

        assert!(ended_with(&coordinator, EndReason::SaboteursWin));
        assert!(fx.timers.contains(&TimerCommand::CancelAll));
        assert!(broadcasts(&fx).contains(&&ServerMessage::PhaseChanged {
            phase: VisiblePhase::Ended,
            end_reason: Some(EndReasonDto::SaboteursWin),
            round: 1,
        }));
    }

    #[test]
    fn friendly_fire_changes_nothing() {
        let mut coordinator = started(6, rules(2));
        let saboteurs = with_role(&coordinator, Role::Saboteur);
        let mut fx = Effects::default();

        let err = coordinator
            .attempt_elimination(&saboteurs[0], &saboteurs[1], &mut fx)
            .unwrap_err();
        assert_eq!(err, GameError::FriendlyFire);
        assert!(fx.is_empty());
        assert!(coordinator.player(&saboteurs[1]).unwrap().is_alive());
        assert_eq!(coordinator.session().cooldowns.remaining(&saboteurs[0]), 0);
    }

    #[test]
    fn cooldown_blocks_until_it_ticks_out() {
        let mut coordinator = started(6, rules(1));
        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        let crew = with_role(&coordinator, Role::Crew);
        let mut fx = Effects::default();

        coordinator
            .attempt_elimination(&saboteur, &crew[0], &mut fx)
            .unwrap();
        let token = fx
            .timers
            .iter()
            .find_map(|command| match command {
                TimerCommand::StartCooldown { token, .. } => Some(*token),
                _ => None,
            })
            .unwrap();
        assert!(fx.dispatches.contains(&Dispatch::Player(
            saboteur.clone(),
            ServerMessage::Cooldown { seconds: 180 }
        )));

        let err = coordinator
            .attempt_elimination(&saboteur, &crew[1], &mut Effects::default())
            .unwrap_err();
        assert_eq!(err, GameError::OnCooldown { remaining: 180 });

        let mut fx = Effects::default();
        for _ in 0..179 {
            assert_eq!(
                coordinator.tick_cooldown(&saboteur, token, &mut fx),
                Tick::Continue
            );
        }
        assert_eq!(
            coordinator.tick_cooldown(&saboteur, token, &mut fx),
            Tick::Finished
        );
        assert_eq!(
            coordinator.tick_cooldown(&saboteur, token, &mut fx),
            Tick::Stale
        );

        coordinator
            .attempt_elimination(&saboteur, &crew[1], &mut Effects::default())
            .unwrap();
        assert_eq!(coordinator.player(&saboteur).unwrap().kill_count, 2);
        assert_eq!(coordinator.phase(), GamePhase::Active);
    }

    #[test]
    fn dead_killer_and_dead_victim_are_rejected() {
        let mut coordinator = started(6, rules(2));
        let saboteurs = with_role(&coordinator, Role::Saboteur);
        let crew = with_role(&coordinator, Role::Crew);

        coordinator
            .eject_player(&saboteurs[1], &mut Effects::default())
            .unwrap();
        assert_eq!(
            coordinator
                .attempt_elimination(&saboteurs[1], &crew[0], &mut Effects::default())
                .unwrap_err(),
            GameError::KillerNotAlive
        );

        coordinator
            .eject_player(&crew[0], &mut Effects::default())
            .unwrap();
        assert_eq!(
            coordinator
                .attempt_elimination(&saboteurs[0], &crew[0], &mut Effects::default())
                .unwrap_err(),
            GameError::VictimNotAlive(crew[0].clone())
        );
    }

    #[test]
    fn elimination_outside_active_is_invalid() {
        let mut coordinator = started(6, rules(1));
        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        let crew = with_role(&coordinator, Role::Crew);
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();

        let err = coordinator
            .attempt_elimination(&saboteur, &crew[0], &mut Effects::default())
            .unwrap_err();
        assert!(matches!(err, GameError::InvalidCommand(_)));
    }

    #[test]
    fn task_completion_checks_pin_assignment_and_repeat() {
        let mut coordinator = started(4, rules(1));
        let crew = with_role(&coordinator, Role::Crew).remove(0);
        let task = task_of(&coordinator, &crew, TaskCategory::Main);
        let live = pin(&coordinator, &task);
        let wrong = if live == "1000" { "1001" } else { "1000" };

        assert_eq!(
            coordinator
                .complete_task(&crew, &task, wrong, &mut Effects::default())
                .unwrap_err(),
            GameError::InvalidPin(task.clone())
        );
        assert_eq!(
            coordinator
                .complete_task(&crew, "main-99", &live, &mut Effects::default())
                .unwrap_err(),
            GameError::TaskNotFound("main-99".into())
        );
        let unassigned = coordinator
            .session()
            .pins
            .iter()
            .map(|(id, _)| id.to_string())
            .find(|id| {
                !coordinator
                    .player(&crew)
                    .unwrap()
                    .tasks
                    .iter()
                    .any(|assigned| assigned.id() == id.as_str())
            })
            .unwrap();
        let unassigned_pin = pin(&coordinator, &unassigned);
        assert_eq!(
            coordinator
                .complete_task(&crew, &unassigned, &unassigned_pin, &mut Effects::default())
                .unwrap_err(),
            GameError::TaskNotFound(unassigned.clone())
        );

        let mut fx = Effects::default();
        let done = coordinator
            .complete_task(&crew, &task, &live, &mut fx)
            .unwrap();
        assert!(done.progress > 0);
        assert_eq!(coordinator.session().global_progress, done.progress);
        assert!(broadcasts(&fx).contains(&&ServerMessage::Progress {
            percent: done.progress
        }));
        assert_eq!(coordinator.player(&crew).unwrap().tasks_completed, 1);

        assert_eq!(
            coordinator
                .complete_task(&crew, &task, &live, &mut Effects::default())
                .unwrap_err(),
            GameError::AlreadyCompleted(task)
        );
    }

    #[test]
    fn cover_tasks_never_move_progress() {
        let mut coordinator = started(4, rules(1));
        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        let task = task_of(&coordinator, &saboteur, TaskCategory::Main);
        let live = pin(&coordinator, &task);

        assert!(matches!(
            coordinator.complete_task(&saboteur, &task, &live, &mut Effects::default()),
            Err(GameError::InvalidCommand(_))
        ));
        let done = coordinator
            .complete_cover_task(&saboteur, &task, &live, &mut Effects::default())
            .unwrap();
        assert_eq!(done.progress, 0);
        assert_eq!(coordinator.session().global_progress, 0);
        assert!(done.tasks.iter().any(|t| t.id() == task && t.completed));

        let crew = with_role(&coordinator, Role::Crew).remove(0);
        let crew_task = task_of(&coordinator, &crew, TaskCategory::Main);
        let crew_pin = pin(&coordinator, &crew_task);
        assert!(matches!(
            coordinator.complete_cover_task(&crew, &crew_task, &crew_pin, &mut Effects::default()),
            Err(GameError::InvalidCommand(_))
        ));
    }

    #[test]
    fn ghosts_finish_main_tasks_only() {
        let mut coordinator = started(6, rules(1));
        let ghost = with_role(&coordinator, Role::Crew).remove(0);
        coordinator
            .eject_player(&ghost, &mut Effects::default())
            .unwrap();
        assert_eq!(coordinator.phase(), GamePhase::Active);

        let filler = task_of(&coordinator, &ghost, TaskCategory::Filler);
        let filler_pin = pin(&coordinator, &filler);
        assert!(matches!(
            coordinator.complete_task(&ghost, &filler, &filler_pin, &mut Effects::default()),
            Err(GameError::InvalidCommand(_))
        ));

        let main = task_of(&coordinator, &ghost, TaskCategory::Main);
        let main_pin = pin(&coordinator, &main);
        let done = coordinator
            .complete_task(&ghost, &main, &main_pin, &mut Effects::default())
            .unwrap();
        assert!(done.progress > 0);
    }

    fn targeted(fx: &Effects, player_id: &str) -> Vec<ServerMessage> {
        fx.dispatches
            .iter()
            .filter_map(|dispatch| match dispatch {
                Dispatch::Player(id, message) if id == player_id => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn completing_a_task_sends_the_refreshed_list_to_its_owner() {
        let mut coordinator = started(6, rules(1));
        let crew = with_role(&coordinator, Role::Crew);
        let task = task_of(&coordinator, &crew[0], TaskCategory::Main);
        let live = pin(&coordinator, &task);

        let mut fx = Effects::default();
        coordinator
            .complete_task(&crew[0], &task, &live, &mut fx)
            .unwrap();
        let delivered = targeted(&fx, &crew[0]);
        let [ServerMessage::Tasks { tasks }] = delivered.as_slice() else {
            panic!("expected a single task list for the caller");
        };
        assert_eq!(tasks.len(), 4);
        assert!(tasks.iter().any(|summary| summary.id == task && summary.completed));
        assert!(targeted(&fx, &crew[1]).is_empty());

        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        let cover = task_of(&coordinator, &saboteur, TaskCategory::Main);
        let cover_pin = pin(&coordinator, &cover);
        let mut fx = Effects::default();
        coordinator
            .complete_cover_task(&saboteur, &cover, &cover_pin, &mut fx)
            .unwrap();
        assert!(matches!(
            targeted(&fx, &saboteur).as_slice(),
            [ServerMessage::Tasks { .. }]
        ));

        let ghost = crew[1].clone();
        coordinator
            .eject_player(&ghost, &mut Effects::default())
            .unwrap();
        let main = task_of(&coordinator, &ghost, TaskCategory::Main);
        let main_pin = pin(&coordinator, &main);
        let mut fx = Effects::default();
        coordinator
            .complete_task(&ghost, &main, &main_pin, &mut fx)
            .unwrap();
        let delivered = targeted(&fx, &ghost);
        let [ServerMessage::GhostTasks { tasks }] = delivered.as_slice() else {
            panic!("expected the ghost task list");
        };
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|summary| summary.id.starts_with("main-")));
    }

    #[test]
    fn finishing_every_crew_task_ends_the_round() {
        let mut coordinator = started(4, rules(1));
        let crew = with_role(&coordinator, Role::Crew);
        let assignments: Vec<(String, String)> = crew
            .iter()
            .flat_map(|id| {
                coordinator
                    .player(id)
                    .unwrap()
                    .tasks
                    .iter()
                    .map(|task| (id.clone(), task.id().to_string()))
                    .collect::<Vec<_>>()
            })
            .collect();

        let (last, rest) = assignments.split_last().unwrap();
        for (player_id, task_id) in rest {
            let live = pin(&coordinator, task_id);
            let done = coordinator
                .complete_task(player_id, task_id, &live, &mut Effects::default())
                .unwrap();
            assert!(done.progress < 100);
        }
        assert_eq!(coordinator.phase(), GamePhase::Active);

        let live = pin(&coordinator, &last.1);
        let done = coordinator
            .complete_task(&last.0, &last.1, &live, &mut Effects::default())
            .unwrap();
        assert_eq!(done.progress, 100);
        assert!(ended_with(&coordinator, EndReason::TasksCompleted));
    }

    #[test]
    fn votes_follow_phase_and_voter_rules() {
        let mut coordinator = started(6, rules(1));
        let crew = with_role(&coordinator, Role::Crew);
        assert!(matches!(
            coordinator.cast_vote(&crew[0], "skip", &mut Effects::default()),
            Err(GameError::InvalidCommand(_))
        ));

        coordinator
            .eject_player(&crew[0], &mut Effects::default())
            .unwrap();
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();
        coordinator.start_voting(&mut Effects::default()).unwrap();

        assert_eq!(
            coordinator
                .cast_vote(&crew[0], "skip", &mut Effects::default())
                .unwrap_err(),
            GameError::VoterNotAlive
        );
        assert_eq!(
            coordinator
                .cast_vote(&crew[1], "P99", &mut Effects::default())
                .unwrap_err(),
            GameError::UnknownPlayer("P99".into())
        );

        coordinator
            .cast_vote(&crew[1], &crew[2], &mut Effects::default())
            .unwrap();
        let mut fx = Effects::default();
        let target = coordinator.cast_vote(&crew[1], "skip", &mut fx).unwrap();
        assert_eq!(target, VoteTarget::Skip);
        assert!(broadcasts(&fx).contains(&&ServerMessage::VoteCount { total_votes: 1 }));
        assert!(fx.dispatches.contains(&Dispatch::Admin(ServerMessage::Tally {
            entries: vec![TallyEntry {
                target: "skip".into(),
                count: 1
            }]
        })));

        coordinator
            .cast_vote(&crew[2], &crew[0], &mut Effects::default())
            .unwrap();
        assert_eq!(coordinator.admin_snapshot().total_votes, 2);
    }

    #[test]
    fn ejecting_last_saboteur_gives_crew_the_win() {
        let mut coordinator = started(6, rules(1));
        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();
        coordinator.start_voting(&mut Effects::default()).unwrap();

        let mut fx = Effects::default();
        coordinator.eject_player(&saboteur, &mut fx).unwrap();
        assert!(ended_with(&coordinator, EndReason::CrewWin));
        assert!(fx.dispatches.contains(&Dispatch::Player(
            saboteur.clone(),
            ServerMessage::PlayerState {
                player_id: saboteur.clone(),
                role: Some(crate::dto::common::RoleDto::Saboteur),
                status: StatusDto::Dead,
            }
        )));

        assert!(matches!(
            coordinator.eject_player(&saboteur, &mut Effects::default()),
            Err(GameError::InvalidCommand(_))
        ));
    }

    #[test]
    fn match_clock_expiry_ends_the_round() {
        let mut coordinator = started(
            4,
            GameRules {
                match_duration_secs: 3,
                ..rules(1)
            },
        );
        let token = coordinator.match_clock.unwrap();
        let mut fx = Effects::default();
        assert_eq!(coordinator.tick_match_clock(token, &mut fx), Tick::Continue);
        assert_eq!(coordinator.tick_match_clock(token, &mut fx), Tick::Continue);
        assert_eq!(coordinator.tick_match_clock(token, &mut fx), Tick::Finished);
        assert_eq!(coordinator.session().clock_seconds, 0);
        assert!(ended_with(&coordinator, EndReason::TimeExpired));
        assert_eq!(
            coordinator.tick_match_clock(token, &mut Effects::default()),
            Tick::Stale
        );
    }

    #[test]
    fn meeting_freezes_the_match_clock() {
        let mut coordinator = started(4, rules(1));
        let token = coordinator.match_clock.unwrap();
        coordinator.tick_match_clock(token, &mut Effects::default());

        let mut fx = Effects::default();
        coordinator.trigger_meeting(&mut fx).unwrap();
        assert_eq!(fx.timers, vec![TimerCommand::StopMatchClock]);
        assert_eq!(
            coordinator.tick_match_clock(token, &mut Effects::default()),
            Tick::Stale
        );
        assert_eq!(coordinator.session().clock_seconds, 599);

        coordinator.start_voting(&mut Effects::default()).unwrap();
        let mut fx = Effects::default();
        coordinator.resume_game(&mut fx).unwrap();
        assert!(matches!(
            fx.timers.as_slice(),
            [
                TimerCommand::StopVotingClock,
                TimerCommand::StartMatchClock(_)
            ]
        ));
        assert!(broadcasts(&fx).contains(&&ServerMessage::MatchClock { seconds: 599 }));
    }

    #[test]
    fn voting_clock_counts_down_and_goes_stale_on_resume() {
        let mut coordinator = started(
            4,
            GameRules {
                voting_duration_secs: 2,
                ..rules(1)
            },
        );
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();
        let mut fx = Effects::default();
        coordinator.start_voting(&mut fx).unwrap();
        let token = fx
            .timers
            .iter()
            .find_map(|command| match command {
                TimerCommand::StartVotingClock(token) => Some(*token),
                _ => None,
            })
            .unwrap();

        let mut fx = Effects::default();
        assert_eq!(coordinator.tick_voting_clock(token, &mut fx), Tick::Continue);
        assert_eq!(broadcasts(&fx), [&ServerMessage::VotingClock { seconds: 1 }]);
        assert_eq!(coordinator.tick_voting_clock(token, &mut fx), Tick::Finished);
        assert_eq!(coordinator.phase(), GamePhase::Voting);

        coordinator.resume_game(&mut Effects::default()).unwrap();
        assert_eq!(
            coordinator.tick_voting_clock(token, &mut Effects::default()),
            Tick::Stale
        );
    }

    #[test]
    fn reset_wipes_players_and_rotates_pins() {
        let mut coordinator = started(4, rules(1));
        let before: Vec<(String, String)> = coordinator
            .session()
            .pins
            .iter()
            .map(|(id, pin)| (id.to_string(), pin.to_string()))
            .collect();
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();

        let mut fx = Effects::default();
        coordinator.reset_all(&mut fx).unwrap();

        assert_eq!(coordinator.phase(), GamePhase::Waiting);
        assert_eq!(coordinator.session().round, 2);
        assert_eq!(coordinator.session().global_progress, 0);
        assert!(coordinator.session().players.values().all(|player| {
            player.status == PlayerStatus::Offline && player.role.is_none() && player.tasks.is_empty()
        }));
        for (task_id, old) in before {
            assert_ne!(coordinator.session().pins.get(&task_id).unwrap(), old);
        }
        assert_eq!(fx.timers, vec![TimerCommand::CancelAll]);
        assert_eq!(
            broadcasts(&fx).last(),
            Some(&&ServerMessage::ForceDisconnect)
        );

        let mut fx = Effects::default();
        coordinator.join_lobby("P01", &mut fx).unwrap();
        coordinator.start_game(&mut fx).unwrap();
        assert_eq!(coordinator.session().pins.round(), 2);
    }

    #[test]
    fn restart_after_reset_has_no_votes_or_cooldowns() {
        let mut coordinator = started(6, rules(1));
        let saboteur = with_role(&coordinator, Role::Saboteur).remove(0);
        let crew = with_role(&coordinator, Role::Crew);
        coordinator
            .attempt_elimination(&saboteur, &crew[0], &mut Effects::default())
            .unwrap();
        coordinator.trigger_meeting(&mut Effects::default()).unwrap();
        coordinator.start_voting(&mut Effects::default()).unwrap();
        coordinator
            .cast_vote(&crew[1], &saboteur, &mut Effects::default())
            .unwrap();
        coordinator
            .cast_vote(&saboteur, "skip", &mut Effects::default())
            .unwrap();
        assert_eq!(coordinator.session().votes.len(), 2);
        assert_eq!(coordinator.session().cooldowns.remaining(&saboteur), 180);

        coordinator.reset_all(&mut Effects::default()).unwrap();
        let mut fx = Effects::default();
        for n in 1..=6 {
            coordinator.join_lobby(&format!("P{n:02}"), &mut fx).unwrap();
        }
        coordinator.start_game(&mut fx).unwrap();

        assert_eq!(coordinator.phase(), GamePhase::Active);
        assert!(coordinator.session().votes.is_empty());
        assert!(coordinator.session().players.values().all(|player| {
            player.is_alive() && coordinator.session().cooldowns.remaining(&player.id) == 0
        }));
    }

    #[test]
    fn teammates_lists_other_living_saboteurs() {
        let coordinator = started(6, rules(2));
        let saboteurs = with_role(&coordinator, Role::Saboteur);
        let crew = with_role(&coordinator, Role::Crew);

        assert_eq!(
            coordinator.teammates(&saboteurs[0]).unwrap(),
            vec![saboteurs[1].clone()]
        );
        assert!(matches!(
            coordinator.teammates(&crew[0]),
            Err(GameError::InvalidCommand(_))
        ));
    }
}
