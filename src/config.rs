//! Application-level configuration loading: game rules, player roster and task catalogue.

use std::{collections::HashSet, env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::state::{
    tasks::{AssignmentCounts, TaskCatalogue, TaskCategory, TaskSpec},
    votes::SKIP,
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SABOTAGE_BACK_CONFIG_PATH";
/// Roster size used when the configuration does not provide one.
const DEFAULT_ROSTER_SIZE: usize = 12;

/// Tunable numbers of a round.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GameRules {
    /// Saboteurs dealt at round start (capped by the number of participants).
    pub saboteur_count: usize,
    /// Match clock value at round start.
    pub match_duration_secs: u32,
    /// Wait imposed on a saboteur after each kill.
    pub kill_cooldown_secs: u32,
    /// Informational voting countdown.
    pub voting_duration_secs: u32,
    /// Main tasks assigned to each participant.
    pub main_tasks_per_player: usize,
    /// Filler tasks assigned to each participant.
    pub filler_tasks_per_player: usize,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            saboteur_count: 2,
            match_duration_secs: 30 * 60,
            kill_cooldown_secs: 3 * 60,
            voting_duration_secs: 60,
            main_tasks_per_player: 10,
            filler_tasks_per_player: 2,
        }
    }
}

impl GameRules {
    /// Per-category task counts used by the assignment draw.
    pub fn assignment(&self) -> AssignmentCounts {
        AssignmentCounts {
            main: self.main_tasks_per_player,
            filler: self.filler_tasks_per_player,
        }
    }
}

/// Credentials of a roster entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Player identifier.
    pub id: String,
    /// Secret typed at login.
    pub passcode: String,
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    rules: GameRules,
    roster: Vec<RosterEntry>,
    tasks: Vec<TaskSpec>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        players = app_config.roster.len(),
                        tasks = app_config.tasks.len(),
                        "loaded game configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document. Missing sections take their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Build a configuration from already validated parts.
    pub fn new(rules: GameRules, roster: Vec<RosterEntry>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            rules,
            roster: sanitize_roster(roster),
            tasks: sanitize_tasks(tasks),
        }
    }

    /// Round rules.
    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    /// Roster entries in declaration order.
    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    /// Roster identifiers in declaration order.
    pub fn roster_ids(&self) -> Vec<String> {
        self.roster.iter().map(|entry| entry.id.clone()).collect()
    }

    /// Check a login attempt against the roster.
    pub fn passcode_matches(&self, player_id: &str, passcode: &str) -> bool {
        self.roster
            .iter()
            .any(|entry| entry.id == player_id && entry.passcode == passcode)
    }

    /// Build the task catalogue, numbering tasks per category.
    pub fn catalogue(&self) -> TaskCatalogue {
        TaskCatalogue::new(self.tasks.iter().cloned())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rules: GameRules::default(),
            roster: default_roster(),
            tasks: default_tasks(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default)]
    rules: GameRules,
    #[serde(default)]
    roster: Option<Vec<RawPlayer>>,
    #[serde(default)]
    tasks: Option<Vec<RawTask>>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let roster = value
            .roster
            .map(|players| players.into_iter().map(Into::into).collect())
            .unwrap_or_else(default_roster);
        let tasks = value
            .tasks
            .map(|tasks| tasks.into_iter().map(Into::into).collect())
            .unwrap_or_else(default_tasks);
        Self::new(value.rules, roster, tasks)
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of a roster entry.
struct RawPlayer {
    id: String,
    passcode: String,
}

impl From<RawPlayer> for RosterEntry {
    fn from(value: RawPlayer) -> Self {
        Self {
            id: value.id.trim().to_string(),
            passcode: value.passcode,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawCategory {
    #[default]
    Main,
    Filler,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a catalogue entry.
struct RawTask {
    name: String,
    #[serde(default)]
    category: RawCategory,
    #[serde(default = "default_weight")]
    weight: u32,
    #[serde(default)]
    location: Option<String>,
}

fn default_weight() -> u32 {
    1
}

impl From<RawTask> for TaskSpec {
    fn from(value: RawTask) -> Self {
        Self {
            name: value.name,
            category: match value.category {
                RawCategory::Main => TaskCategory::Main,
                RawCategory::Filler => TaskCategory::Filler,
            },
            weight: value.weight,
            location: value.location,
        }
    }
}

/// Drop unusable roster entries, falling back to the default roster when nothing is left.
fn sanitize_roster(roster: Vec<RosterEntry>) -> Vec<RosterEntry> {
    let mut seen = HashSet::new();
    let kept: Vec<RosterEntry> = roster
        .into_iter()
        .filter(|entry| {
            if entry.id.is_empty() || entry.id == SKIP {
                warn!(id = %entry.id, "ignoring roster entry with reserved or empty id");
                return false;
            }
            if !seen.insert(entry.id.clone()) {
                warn!(id = %entry.id, "ignoring duplicated roster entry");
                return false;
            }
            true
        })
        .collect();

    if kept.is_empty() {
        warn!("roster is empty; using built-in roster");
        return default_roster();
    }
    kept
}

/// Clamp zero weights and fall back to the default catalogue when nothing is left.
fn sanitize_tasks(tasks: Vec<TaskSpec>) -> Vec<TaskSpec> {
    if tasks.is_empty() {
        warn!("task catalogue is empty; using built-in catalogue");
        return default_tasks();
    }
    tasks
        .into_iter()
        .map(|mut task| {
            if task.weight == 0 {
                warn!(task = %task.name, "task weight must be positive; using 1");
                task.weight = 1;
            }
            task
        })
        .collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Built-in roster `P01`..`P12`, passcode `<id>-X`.
fn default_roster() -> Vec<RosterEntry> {
    (1..=DEFAULT_ROSTER_SIZE)
        .map(|n| {
            let id = format!("P{n:02}");
            RosterEntry {
                passcode: format!("{id}-X"),
                id,
            }
        })
        .collect()
}

/// Built-in station list shipped with the binary.
fn default_tasks() -> Vec<TaskSpec> {
    [
        "Correct Python code",
        "Binary Hangman",
        "QR scan & Follow Tech Club",
        "Circuit Puzzle",
        "Strong Password (Website)",
        "Circuit Wiring",
        "Dobot Teach & Playback",
        "Wire Fix",
        "Keyboard Speed Test",
        "Water Cup Transfer",
        "Paper Airplane Landing",
        "Cloud Storage vs Local Storage",
        "Error Finding in App Screen",
        "Sentence Decode via Emojis",
        "Fix the Keyboard",
        "Sort Balls According to their color from Ball Pit",
    ]
    .into_iter()
    .map(|name| TaskSpec {
        name: name.to_string(),
        category: TaskCategory::Main,
        weight: 1,
        location: None,
    })
    .collect()
}
