use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    dto::phase::{EndReasonDto, VisiblePhase},
    state::{
        game::{Player, PlayerStatus, Role},
        tasks::{TaskCategory, TaskDefinition, TaskInstance},
        votes::TallyLine,
    },
};

/// Role as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoleDto {
    Crew,
    Saboteur,
}

impl From<Role> for RoleDto {
    fn from(value: Role) -> Self {
        match value {
            Role::Crew => RoleDto::Crew,
            Role::Saboteur => RoleDto::Saboteur,
        }
    }
}

/// Player lifecycle status as exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusDto {
    Offline,
    Lobby,
    Alive,
    Dead,
}

impl From<PlayerStatus> for StatusDto {
    fn from(value: PlayerStatus) -> Self {
        match value {
            PlayerStatus::Offline => StatusDto::Offline,
            PlayerStatus::Lobby => StatusDto::Lobby,
            PlayerStatus::Alive => StatusDto::Alive,
            PlayerStatus::Dead => StatusDto::Dead,
        }
    }
}

#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategoryDto {
    Main,
    Filler,
}

impl From<TaskCategory> for TaskCategoryDto {
    fn from(value: TaskCategory) -> Self {
        match value {
            TaskCategory::Main => TaskCategoryDto::Main,
            TaskCategory::Filler => TaskCategoryDto::Filler,
        }
    }
}

/// Task as listed to the player it is assigned to.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: String,
    pub name: String,
    pub category: TaskCategoryDto,
    pub weight: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub completed: bool,
}

impl From<&TaskInstance> for TaskSummary {
    fn from(task: &TaskInstance) -> Self {
        Self {
            id: task.definition.id.clone(),
            name: task.definition.name.clone(),
            category: task.definition.category.into(),
            weight: task.definition.weight,
            location: task.definition.location.clone(),
            completed: task.completed,
        }
    }
}

/// Summarise a task list in assignment order.
pub fn summarize_tasks<'a>(tasks: impl IntoIterator<Item = &'a TaskInstance>) -> Vec<TaskSummary> {
    tasks.into_iter().map(TaskSummary::from).collect()
}

/// Per-player row of the admin dashboard.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PlayerSummary {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleDto>,
    pub status: StatusDto,
    pub tasks_completed: usize,
    pub total_tasks: usize,
    pub kill_count: u32,
    /// Remaining elimination cooldown, zero when the player can kill.
    pub cooldown_seconds: u32,
}

impl PlayerSummary {
    /// Build the row from a player and its cooldown.
    pub fn from_player(player: &Player, cooldown_seconds: u32) -> Self {
        Self {
            id: player.id.clone(),
            role: player.role.map(RoleDto::from),
            status: player.status.into(),
            tasks_completed: player.tasks_completed,
            total_tasks: player.tasks.len(),
            kill_count: player.kill_count,
            cooldown_seconds,
        }
    }
}

/// Full view of a player, only ever sent to that player.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct PlayerDetails {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<RoleDto>,
    pub status: StatusDto,
    pub tasks: Vec<TaskSummary>,
    pub tasks_completed: usize,
    pub total_tasks: usize,
    pub kill_count: u32,
}

impl From<&Player> for PlayerDetails {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id.clone(),
            role: player.role.map(RoleDto::from),
            status: player.status.into(),
            tasks: summarize_tasks(&player.tasks),
            tasks_completed: player.tasks_completed,
            total_tasks: player.tasks.len(),
            kill_count: player.kill_count,
        }
    }
}

/// Vote count for one target; `skip` stands for abstentions.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TallyEntry {
    pub target: String,
    pub count: usize,
}

impl From<TallyLine> for TallyEntry {
    fn from(line: TallyLine) -> Self {
        Self {
            target: line.target.to_string(),
            count: line.count,
        }
    }
}

/// Live PIN of a station, for the admin to hand out.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct TaskPinSummary {
    pub task_id: String,
    pub name: String,
    pub category: TaskCategoryDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub pin: String,
}

impl TaskPinSummary {
    /// Pair a catalogue entry with its live PIN.
    pub fn new(task: &TaskDefinition, pin: &str) -> Self {
        Self {
            task_id: task.id.clone(),
            name: task.name.clone(),
            category: task.category.into(),
            location: task.location.clone(),
            pin: pin.to_string(),
        }
    }
}

/// Global session state visible to everybody.
#[derive(Debug, Serialize, ToSchema, Clone, PartialEq, Eq)]
pub struct GameStateSummary {
    pub phase: VisiblePhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReasonDto>,
    pub round: u32,
    pub clock_seconds: u32,
    pub progress: u8,
}
