use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::dto::{common::TaskSummary, validation::validate_pin};

/// PIN read at a station, submitted to complete a task.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct VerifyTaskRequest {
    #[validate(length(min = 1, max = 32))]
    pub task_id: String,
    #[validate(custom(function = "validate_pin"))]
    pub pin: String,
}

/// Tasks of the calling player. Ghosts only see main tasks.
#[derive(Debug, Serialize, ToSchema)]
pub struct TaskListResponse {
    pub ghost: bool,
    pub tasks: Vec<TaskSummary>,
}

/// Outcome of a successful task verification.
#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyTaskResponse {
    pub task_id: String,
    /// Crew progress after the completion; unchanged for cover tasks.
    pub progress: u8,
    pub tasks: Vec<TaskSummary>,
}
