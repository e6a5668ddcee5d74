use std::time::SystemTime;

use indexmap::IndexMap;

use crate::{
    error::GameError,
    state::{
        elimination::KillCooldowns,
        tasks::{TaskCategory, TaskInstance, TaskPins, compute_progress, pending_task_mut},
        votes::VoteTally,
    },
};

/// Hidden role dealt at round start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Completes tasks and tries to identify the saboteurs.
    Crew,
    /// Eliminates crew while faking tasks.
    Saboteur,
}

/// Lifecycle of a roster entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    /// Not logged in (or wiped by a reset).
    Offline,
    /// Logged in, waiting for the next round.
    Lobby,
    /// Participating and alive.
    Alive,
    /// Eliminated or ejected; ghosts may still finish main tasks.
    Dead,
}

/// Player record tracked for the whole server lifetime.
#[derive(Debug, Clone)]
pub struct Player {
    /// Roster identifier (e.g. `P07`).
    pub id: String,
    /// Dealt at round start, cleared by a reset.
    pub role: Option<Role>,
    /// Current lifecycle status.
    pub status: PlayerStatus,
    /// Tasks assigned for the current round.
    pub tasks: Vec<TaskInstance>,
    /// Number of completed entries in `tasks`.
    pub tasks_completed: usize,
    /// Successful eliminations this round.
    pub kill_count: u32,
}

impl Player {
    /// Fresh offline player without role or tasks.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: None,
            status: PlayerStatus::Offline,
            tasks: Vec::new(),
            tasks_completed: 0,
            kill_count: 0,
        }
    }

    /// Whether the player is alive in the current round.
    pub fn is_alive(&self) -> bool {
        self.status == PlayerStatus::Alive
    }

    /// Whether the player was dealt the saboteur role.
    pub fn is_saboteur(&self) -> bool {
        self.role == Some(Role::Saboteur)
    }

    /// Main tasks only, which is what a ghost can still work on.
    pub fn ghost_tasks(&self) -> impl Iterator<Item = &TaskInstance> {
        self.tasks
            .iter()
            .filter(|task| task.definition.category == TaskCategory::Main)
    }

    /// Flip a pending task to completed.
    ///
    /// Ghosts are restricted to main tasks. The completion counter stays in sync with the list.
    pub fn complete_task(&mut self, task_id: &str) -> Result<(), GameError> {
        if self.status == PlayerStatus::Dead {
            let category = self
                .tasks
                .iter()
                .find(|task| task.id() == task_id)
                .map(|task| task.definition.category);
            if category.is_some_and(|category| category != TaskCategory::Main) {
                return Err(GameError::InvalidCommand(
                    "ghosts can only complete main tasks".into(),
                ));
            }
        }
        let task = pending_task_mut(self, task_id)?;
        task.completed = true;
        self.tasks_completed += 1;
        Ok(())
    }

    /// Reset everything but the identifier, sending the player back offline.
    pub fn wipe(&mut self) {
        *self = Player::new(std::mem::take(&mut self.id));
    }
}

/// Mutable store for everything that belongs to the running session.
#[derive(Debug)]
pub struct GameSession {
    /// Incremented by every reset; PINs are bound to it.
    pub round: u32,
    /// Remaining match seconds.
    pub clock_seconds: u32,
    /// Cached crew progress percentage; always re-derivable from `players`.
    pub global_progress: u8,
    /// Roster in configuration order.
    pub players: IndexMap<String, Player>,
    /// Live task PINs.
    pub pins: TaskPins,
    /// Ballots of the current voting phase.
    pub votes: VoteTally,
    /// Running elimination cooldowns.
    pub cooldowns: KillCooldowns,
    /// When the current round started, if one did.
    pub round_started_at: Option<SystemTime>,
}

impl GameSession {
    /// Build the store from roster identifiers, all offline.
    pub fn new(roster: impl IntoIterator<Item = String>, clock_seconds: u32, pins: TaskPins) -> Self {
        let players = roster
            .into_iter()
            .map(|id| (id.clone(), Player::new(id)))
            .collect();
        Self {
            round: pins.round(),
            clock_seconds,
            global_progress: 0,
            players,
            pins,
            votes: VoteTally::default(),
            cooldowns: KillCooldowns::default(),
            round_started_at: None,
        }
    }

    /// Borrow a registered player.
    pub fn player(&self, id: &str) -> Result<&Player, GameError> {
        self.players
            .get(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.to_string()))
    }

    /// Mutably borrow a registered player.
    pub fn player_mut(&mut self, id: &str) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(id)
            .ok_or_else(|| GameError::UnknownPlayer(id.to_string()))
    }

    /// Refresh the cached progress from the player list.
    pub fn recompute_progress(&mut self) -> u8 {
        self.global_progress = compute_progress(self.players.values());
        self.global_progress
    }

    /// Living crew and living saboteurs.
    pub fn alive_counts(&self) -> (usize, usize) {
        self.players
            .values()
            .filter(|player| player.is_alive())
            .fold((0, 0), |(crew, saboteurs), player| match player.role {
                Some(Role::Saboteur) => (crew, saboteurs + 1),
                Some(Role::Crew) => (crew + 1, saboteurs),
                None => (crew, saboteurs),
            })
    }

    /// Identifiers of every living player, in roster order.
    pub fn living_players(&self) -> Vec<String> {
        self.players
            .values()
            .filter(|player| player.is_alive())
            .map(|player| player.id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::tasks::TaskDefinition;

    fn instance(id: &str, category: TaskCategory) -> TaskInstance {
        TaskInstance {
            definition: Arc::new(TaskDefinition {
                id: id.into(),
                name: id.into(),
                category,
                weight: 1,
                location: None,
            }),
            completed: false,
        }
    }

    #[test]
    fn completing_keeps_counter_in_sync() {
        let mut player = Player::new("P01");
        player.status = PlayerStatus::Alive;
        player.tasks = vec![
            instance("main-0", TaskCategory::Main),
            instance("filler-0", TaskCategory::Filler),
        ];

        player.complete_task("filler-0").unwrap();
        assert_eq!(player.tasks_completed, 1);
        assert_eq!(
            player.complete_task("filler-0").unwrap_err(),
            GameError::AlreadyCompleted("filler-0".into())
        );
        assert_eq!(player.tasks_completed, 1);
    }

    #[test]
    fn ghosts_cannot_complete_filler_tasks() {
        let mut player = Player::new("P01");
        player.status = PlayerStatus::Dead;
        player.tasks = vec![
            instance("main-0", TaskCategory::Main),
            instance("filler-0", TaskCategory::Filler),
        ];

        assert!(matches!(
            player.complete_task("filler-0"),
            Err(GameError::InvalidCommand(_))
        ));
        assert!(!player.tasks[1].completed);
        player.complete_task("main-0").unwrap();
        assert_eq!(player.ghost_tasks().count(), 1);
    }

    #[test]
    fn ghost_filler_is_refused_even_when_already_done() {
        let mut player = Player::new("P01");
        player.status = PlayerStatus::Alive;
        player.tasks = vec![instance("filler-0", TaskCategory::Filler)];
        player.complete_task("filler-0").unwrap();

        player.status = PlayerStatus::Dead;
        assert!(matches!(
            player.complete_task("filler-0"),
            Err(GameError::InvalidCommand(_))
        ));
        assert_eq!(player.tasks_completed, 1);
    }

    #[test]
    fn wipe_keeps_identifier_only() {
        let mut player = Player::new("P03");
        player.role = Some(Role::Saboteur);
        player.status = PlayerStatus::Dead;
        player.kill_count = 2;
        player.tasks = vec![instance("main-0", TaskCategory::Main)];

        player.wipe();
        assert_eq!(player.id, "P03");
        assert_eq!(player.role, None);
        assert_eq!(player.status, PlayerStatus::Offline);
        assert!(player.tasks.is_empty());
        assert_eq!(player.kill_count, 0);
    }

    #[test]
    fn alive_counts_split_by_role() {
        let mut session = GameSession::new(
            ["P01", "P02", "P03"].map(String::from),
            60,
            TaskPins::default(),
        );
        for (id, role, status) in [
            ("P01", Role::Crew, PlayerStatus::Alive),
            ("P02", Role::Saboteur, PlayerStatus::Alive),
            ("P03", Role::Crew, PlayerStatus::Dead),
        ] {
            let player = session.player_mut(id).unwrap();
            player.role = Some(role);
            player.status = status;
        }

        assert_eq!(session.alive_counts(), (1, 1));
        assert_eq!(session.living_players(), ["P01", "P02"]);
        assert_eq!(
            session.player("P09").unwrap_err(),
            GameError::UnknownPlayer("P09".into())
        );
    }
}
