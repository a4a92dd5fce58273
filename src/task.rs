use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TaskError;

/// Shown in place of an empty description. The stored value stays empty.
pub const DESCRIPTION_PLACEHOLDER: &str = "No description provided";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: Status,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn display_description(&self) -> &str {
        if self.description.trim().is_empty() {
            DESCRIPTION_PLACEHOLDER
        } else {
            &self.description
        }
    }

    /// Creation date for cards, e.g. `Oct 14, 2026`
    pub fn created_on(&self) -> String {
        self.created_at
            .with_timezone(&Local)
            .format("%b %-d, %Y")
            .to_string()
    }

    /// Fields a form would be populated with when editing this task
    pub fn fields(&self) -> TaskFields {
        TaskFields {
            title: self.title.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            priority: self.priority,
        }
    }
}

/// The user-editable part of a task
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFields {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
}

impl TaskFields {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        priority: Priority,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            category: category.into(),
            priority,
        }
    }
}

/// Board column a task sits in
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Review,
    Done,
}

impl Status {
    /// Board order, left to right
    pub const ALL: [Status; 4] = [Status::Todo, Status::InProgress, Status::Review, Status::Done];

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in-progress",
            Status::Review => "review",
            Status::Done => "done",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Status::Todo => "To Do",
            Status::InProgress => "In Progress",
            Status::Review => "Review",
            Status::Done => "Done",
        }
    }

    /// Text shown in a column with no cards
    pub fn empty_text(self) -> &'static str {
        match self {
            Status::Todo => "No tasks here yet",
            Status::InProgress => "No tasks in progress",
            Status::Review => "No tasks to review",
            Status::Done => "No tasks completed yet",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Status::Todo => 0,
            Status::InProgress => 1,
            Status::Review => 2,
            Status::Done => 3,
        }
    }

    /// Column to the right, staying put at the last column
    pub fn next(self) -> Status {
        Status::ALL[(self.index() + 1).min(Status::ALL.len() - 1)]
    }

    /// Column to the left, staying put at the first column
    pub fn prev(self) -> Status {
        Status::ALL[self.index().saturating_sub(1)]
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| TaskError::InvalidStatus(s.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    /// Cycles low -> medium -> high -> low
    pub fn next(self) -> Priority {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }

    pub fn prev(self) -> Priority {
        match self {
            Priority::Low => Priority::High,
            Priority::Medium => Priority::Low,
            Priority::High => Priority::Medium,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == wanted)
            .ok_or_else(|| TaskError::InvalidPriority(s.to_string()))
    }
}

/// Task counts for the header and column titles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub todo: usize,
    pub in_progress: usize,
    pub review: usize,
    pub done: usize,
}

impl Stats {
    pub fn count(&self, status: Status) -> usize {
        match status {
            Status::Todo => self.todo,
            Status::InProgress => self.in_progress,
            Status::Review => self.review,
            Status::Done => self.done,
        }
    }

    pub(crate) fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Todo => self.todo += 1,
            Status::InProgress => self.in_progress += 1,
            Status::Review => self.review += 1,
            Status::Done => self.done += 1,
        }
    }
}
