use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::error::AppError;

/// Represents the lifecycle state of a task.
/// Persisted as text (`'open'` | `'done'`) in the `tasks.status` column.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Task is still pending.
    Open,
    /// Task is completed.
    Done,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Open => "open",
            TaskStatus::Done => "done",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TaskStatus::Open),
            "done" => Ok(TaskStatus::Done),
            other => Err(AppError::DatabaseError(format!(
                "unknown task status in row: {}",
                other
            ))),
        }
    }
}

/// Input structure for creating a task.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct TaskInput {
    /// The title of the task.
    /// Must be between 1 and 200 characters.
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// Represents a task entity as returned by the API and cached per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier for the task.
    pub id: i32,
    /// Identifier of the user who owns the task. Every statement touching
    /// a task row is scoped by `id AND user_id`.
    pub user_id: i32,
    /// The title of the task.
    pub title: String,
    /// The current lifecycle state of the task.
    pub status: TaskStatus,
    /// Timestamp of when the task was created.
    pub created_at: DateTime<Utc>,
    /// Timestamp of the last update to the task.
    pub updated_at: DateTime<Utc>,
}

/// Row shape fetched from Postgres. Status arrives as text and is converted
/// into [`TaskStatus`], failing closed on values the enum does not know.
#[derive(Debug, FromRow)]
pub struct TaskRow {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(Task {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            status: row.status.parse()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_input_validation() {
        let valid_input = TaskInput {
            title: "Valid Task".to_string(),
        };
        assert!(valid_input.validate().is_ok());

        let invalid_input = TaskInput {
            title: "".to_string(), // Empty title
        };
        assert!(invalid_input.validate().is_err());

        let long_title = "a".repeat(201);
        let invalid_input = TaskInput { title: long_title };
        assert!(invalid_input.validate().is_err());
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("open".parse::<TaskStatus>().unwrap(), TaskStatus::Open);
        assert_eq!("done".parse::<TaskStatus>().unwrap(), TaskStatus::Done);
        assert_eq!(TaskStatus::Open.as_str(), "open");
        assert_eq!(TaskStatus::Done.as_str(), "done");
        assert!("cancelled".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Done).unwrap();
        assert_eq!(json, "\"done\"");
        let status: TaskStatus = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(status, TaskStatus::Open);
    }
}
