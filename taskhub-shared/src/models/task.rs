/// Task model
///
/// A task belongs to exactly one user and is only ever visible to that
/// user. Status is one of three fixed strings, enforced both here and by a
/// CHECK constraint.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     status TEXT NOT NULL DEFAULT 'pending'
///         CHECK (status IN ('pending', 'in progress', 'completed')),
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::user::USER_COLUMNS;
use crate::repository::entity::{Entity, RelationDef, RelationKind};
use crate::repository::query::{Record, Value};

pub(crate) const TASK_COLUMNS: &[&str] = &[
    "id",
    "title",
    "description",
    "status",
    "user_id",
    "created_at",
    "updated_at",
];

static TASK_RELATIONS: [RelationDef; 1] = [RelationDef {
    name: "user",
    table: "users",
    kind: RelationKind::BelongsTo,
    local_key: "user_id",
    foreign_key: "id",
    columns: USER_COLUMNS,
    hidden: &["password_hash"],
    relations: <super::user::User as Entity>::relations,
}];

/// Task lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "pending")]
    Pending,

    #[serde(rename = "in progress")]
    InProgress,

    #[serde(rename = "completed")]
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::InProgress,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in progress",
            TaskStatus::Completed => "completed",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Pending
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected status string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid task status '{0}'")]
pub struct InvalidStatus(pub String);

impl FromStr for TaskStatus {
    type Err = InvalidStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| InvalidStatus(s.to_string()))
    }
}

impl TryFrom<String> for TaskStatus {
    type Error = InvalidStatus;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<TaskStatus> for Value {
    fn from(status: TaskStatus) -> Self {
        Value::Text(status.as_str().to_string())
    }
}

/// A unit of work owned by a user
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,

    /// Short title (at most 255 characters)
    pub title: String,

    pub description: Option<String>,

    #[sqlx(try_from = "String")]
    pub status: TaskStatus,

    /// Owning user
    pub user_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = TASK_COLUMNS;

    fn relations() -> &'static [RelationDef] {
        &TASK_RELATIONS
    }
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub user_id: Uuid,
}

impl From<NewTask> for Record {
    fn from(task: NewTask) -> Self {
        Record::new()
            .with("title", task.title)
            .with("description", task.description)
            .with("status", task.status)
            .with("user_id", task.user_id)
    }
}

/// Partial update of a task
///
/// Only `Some` fields are written. `description: Some(None)` clears it.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
}

impl TaskChanges {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.status.is_none()
    }
}

impl From<TaskChanges> for Record {
    fn from(changes: TaskChanges) -> Self {
        let mut record = Record::new();
        if let Some(title) = changes.title {
            record.push("title", title);
        }
        if let Some(description) = changes.description {
            record.push("description", description);
        }
        if let Some(status) = changes.status {
            record.push("status", status);
        }
        record
    }
}
