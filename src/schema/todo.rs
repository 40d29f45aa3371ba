use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use super::coerce;
use super::{Row, Schema, ValidationError};

/// Column positions in the todo worksheet.
pub mod columns {
    pub const ID: usize = 0;
    pub const TITLE: usize = 1;
    pub const STATUS: usize = 2;
    pub const PRIORITY: usize = 3;
    pub const CREATED_AT: usize = 4;
    pub const COMPLETED_AT: usize = 5;

    pub const NUM_COLS: usize = 6;
}

const HEADERS: [&str; columns::NUM_COLS] = [
    "ID",
    "Title",
    "Status",
    "Priority",
    "Created At",
    "Completed At",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Pending,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Pending, Status::InProgress, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::InProgress => "in-progress",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ValidationError;

    /// Accepts the canonical names and the labels older sheets used
    /// (`Incomplete`, `In Progress`, `Completed`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "pending" | "incomplete" | "todo" => Ok(Status::Pending),
            "in-progress" => Ok(Status::InProgress),
            "done" | "completed" => Ok(Status::Done),
            _ => Err(ValidationError::InvalidValue {
                field: "status",
                value: s.to_string(),
                expected: "pending, in-progress or done",
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            _ => Err(ValidationError::InvalidValue {
                field: "priority",
                value: s.to_string(),
                expected: "low, medium or high",
            }),
        }
    }
}

/// One todo item. `id` is a stable key decoupled from the row position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub status: Status,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Fields a caller supplies when adding a todo; id and timestamp are generated.
#[derive(Debug, Clone, Default)]
pub struct TodoDraft {
    pub title: String,
    pub status: Status,
    pub priority: Priority,
}

impl TodoDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// `Some(None)` clears the completion date.
    pub completed_at: Option<Option<DateTime<Utc>>>,
}

impl TodoPatch {
    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TodoSchema;

impl Schema for TodoSchema {
    type Record = Todo;
    type Draft = TodoDraft;
    type Patch = TodoPatch;

    fn kind(&self) -> &'static str {
        "todo"
    }

    fn headers(&self) -> &'static [&'static str] {
        &HEADERS
    }

    fn validate(&self, raw: &[String]) -> Result<Todo, ValidationError> {
        Ok(Todo {
            id: coerce::required_text(raw, columns::ID, "id")?,
            title: coerce::required_text(raw, columns::TITLE, "title")?,
            status: coerce::required_text(raw, columns::STATUS, "status")?.parse()?,
            priority: coerce::required_text(raw, columns::PRIORITY, "priority")?.parse()?,
            created_at: coerce::timestamp(coerce::cell(raw, columns::CREATED_AT), "created_at")?,
            completed_at: coerce::optional_timestamp(
                coerce::cell(raw, columns::COMPLETED_AT),
                "completed_at",
            )?,
        })
    }

    fn serialize(&self, todo: &Todo) -> Row {
        vec![
            todo.id.clone(),
            todo.title.clone(),
            todo.status.to_string(),
            todo.priority.to_string(),
            coerce::format_timestamp(&todo.created_at),
            todo.completed_at
                .as_ref()
                .map(coerce::format_timestamp)
                .unwrap_or_default(),
        ]
    }

    fn build(&self, draft: TodoDraft) -> Result<Todo, ValidationError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField { field: "title" });
        }

        // Whole seconds, so the record equals what a later read parses back.
        Ok(Todo {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            status: draft.status,
            priority: draft.priority,
            created_at: Utc::now().trunc_subsecs(0),
            completed_at: None,
        })
    }

    fn merge(&self, todo: &mut Todo, patch: TodoPatch) {
        if let Some(title) = patch.title {
            todo.title = title;
        }
        if let Some(status) = patch.status {
            todo.status = status;
        }
        if let Some(priority) = patch.priority {
            todo.priority = priority;
        }
        if let Some(completed_at) = patch.completed_at {
            todo.completed_at = completed_at;
        }
    }

    fn key<'a>(&self, todo: &'a Todo) -> Option<&'a str> {
        Some(&todo.id)
    }
}
