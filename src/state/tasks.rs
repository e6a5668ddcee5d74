//! Task catalogue, per-player task assignment, PIN bookkeeping and the weighted progress meter.

use std::sync::Arc;

use indexmap::IndexMap;
use rand::{Rng, seq::index::sample};

use crate::{
    error::GameError,
    state::game::{Player, PlayerStatus, Role},
};

/// Kind of station task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskCategory {
    /// Stays completable after death and carries most of the progress weight.
    Main,
    /// Only completable while alive.
    Filler,
}

impl TaskCategory {
    fn prefix(self) -> &'static str {
        match self {
            TaskCategory::Main => "main",
            TaskCategory::Filler => "filler",
        }
    }
}

/// Task description as written in the configuration, before identifiers are assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Display name.
    pub name: String,
    /// Main or filler.
    pub category: TaskCategory,
    /// Contribution to the progress meter once completed.
    pub weight: u32,
    /// Optional station label.
    pub location: Option<String>,
}

/// Entry of the static task catalogue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    /// Stable identifier (`main-<n>` or `filler-<n>`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Main or filler.
    pub category: TaskCategory,
    /// Contribution to the progress meter once completed.
    pub weight: u32,
    /// Optional station label.
    pub location: Option<String>,
}

/// Static set of tasks loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct TaskCatalogue {
    tasks: Vec<Arc<TaskDefinition>>,
}

impl TaskCatalogue {
    /// Build the catalogue, numbering tasks within their category in declaration order.
    pub fn new(specs: impl IntoIterator<Item = TaskSpec>) -> Self {
        let mut main = 0usize;
        let mut filler = 0usize;
        let tasks = specs
            .into_iter()
            .map(|spec| {
                let counter = match spec.category {
                    TaskCategory::Main => &mut main,
                    TaskCategory::Filler => &mut filler,
                };
                let id = format!("{}-{}", spec.category.prefix(), counter);
                *counter += 1;
                Arc::new(TaskDefinition {
                    id,
                    name: spec.name,
                    category: spec.category,
                    weight: spec.weight,
                    location: spec.location,
                })
            })
            .collect();
        Self { tasks }
    }

    /// Look a task up by identifier.
    pub fn get(&self, id: &str) -> Option<&Arc<TaskDefinition>> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Every task in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.tasks.iter()
    }

    /// Tasks of a single category, in declaration order.
    pub fn of_category(&self, category: TaskCategory) -> Vec<&Arc<TaskDefinition>> {
        self.tasks
            .iter()
            .filter(|task| task.category == category)
            .collect()
    }

    /// Number of tasks in the catalogue.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// Task assigned to a player for the current round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInstance {
    /// Catalogue entry this instance refers to.
    pub definition: Arc<TaskDefinition>,
    /// One-way flag: never goes back to `false` within a round.
    pub completed: bool,
}

impl TaskInstance {
    fn new(definition: Arc<TaskDefinition>) -> Self {
        Self {
            definition,
            completed: false,
        }
    }

    /// Identifier of the underlying task definition.
    pub fn id(&self) -> &str {
        &self.definition.id
    }
}

/// How many tasks of each category a player receives at round start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignmentCounts {
    /// Requested main tasks per player.
    pub main: usize,
    /// Requested filler tasks per player.
    pub filler: usize,
}

/// Draw a task list for one player: a uniform sample without replacement per category, main
/// tasks first. The list length only depends on the catalogue and the configured counts.
pub fn assign_tasks<R: Rng + ?Sized>(
    catalogue: &TaskCatalogue,
    counts: AssignmentCounts,
    rng: &mut R,
) -> Vec<TaskInstance> {
    let mut assigned = Vec::with_capacity(counts.main + counts.filler);
    for (category, wanted) in [
        (TaskCategory::Main, counts.main),
        (TaskCategory::Filler, counts.filler),
    ] {
        let pool = catalogue.of_category(category);
        let amount = wanted.min(pool.len());
        for index in sample(rng, pool.len(), amount) {
            assigned.push(TaskInstance::new(Arc::clone(pool[index])));
        }
    }
    assigned
}

/// Weighted crew progress, in percent, rounded half up.
///
/// Only players that are neither saboteurs nor offline count. Dead crew keep every task in the
/// denominator so a death never inflates the meter.
pub fn compute_progress<'a>(players: impl IntoIterator<Item = &'a Player>) -> u8 {
    let (completed, total) = players
        .into_iter()
        .filter(|player| {
            player.role != Some(Role::Saboteur) && player.status != PlayerStatus::Offline
        })
        .flat_map(|player| player.tasks.iter())
        .fold((0u64, 0u64), |(completed, total), task| {
            let weight = u64::from(task.definition.weight);
            let done = if task.completed { weight } else { 0 };
            (completed + done, total + weight)
        });

    if total == 0 {
        return 0;
    }

    let percent = (200 * completed + total) / (2 * total);
    percent.min(100) as u8
}

/// Live PINs gating task completion, keyed by task identifier.
#[derive(Debug, Clone, Default)]
pub struct TaskPins {
    pins: IndexMap<String, String>,
    round: u32,
}

impl TaskPins {
    /// Generate a PIN for every catalogue task, bound to `round`.
    pub fn generate<R: Rng + ?Sized>(catalogue: &TaskCatalogue, round: u32, rng: &mut R) -> Self {
        let mut pins = Self::default();
        pins.regenerate(catalogue, round, rng);
        pins
    }

    /// Replace every PIN. A task never keeps the PIN it had before.
    pub fn regenerate<R: Rng + ?Sized>(&mut self, catalogue: &TaskCatalogue, round: u32, rng: &mut R) {
        let fresh = catalogue
            .iter()
            .map(|task| {
                let previous = self.pins.get(&task.id);
                let pin = loop {
                    let candidate = rng.random_range(1000..=9999u16).to_string();
                    if previous != Some(&candidate) {
                        break candidate;
                    }
                };
                (task.id.clone(), pin)
            })
            .collect();
        self.pins = fresh;
        self.round = round;
    }

    /// Regenerate only when the current PINs were issued for another round.
    pub fn ensure_round<R: Rng + ?Sized>(&mut self, catalogue: &TaskCatalogue, round: u32, rng: &mut R) {
        if self.round != round {
            self.regenerate(catalogue, round, rng);
        }
    }

    /// Check `pin` against the live PIN of `task_id`.
    pub fn matches(&self, task_id: &str, pin: &str) -> bool {
        self.pins.get(task_id).is_some_and(|live| live == pin)
    }

    /// Live PIN of a task.
    pub fn get(&self, task_id: &str) -> Option<&str> {
        self.pins.get(task_id).map(String::as_str)
    }

    /// Round these PINs were issued for.
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Iterate `(task_id, pin)` pairs in catalogue order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pins.iter().map(|(id, pin)| (id.as_str(), pin.as_str()))
    }
}

/// Find the assigned instance of `task_id` on `player`, rejecting missing or finished ones.
pub(crate) fn pending_task_mut<'a>(
    player: &'a mut Player,
    task_id: &str,
) -> Result<&'a mut TaskInstance, GameError> {
    let task = player
        .tasks
        .iter_mut()
        .find(|task| task.id() == task_id)
        .ok_or_else(|| GameError::TaskNotFound(task_id.to_string()))?;
    if task.completed {
        return Err(GameError::AlreadyCompleted(task_id.to_string()));
    }
    Ok(task)
}
