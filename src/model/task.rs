use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use super::catalog::Tag;

pub type TaskId = String;
pub type TagId = String;
pub type GroupId = String;

/// Task priority. Declaration order is sort order: `Urgent` is the greatest.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" | "med" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// A task or subtask.
///
/// `subtasks` is filled in by the store when it builds a snapshot and is
/// never persisted: the stored form is flat, linked through `parent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<GroupId>,
    /// Tag ids. Accepts ids, `{ "tag": {..} }` wrappers, or bare tag objects.
    #[serde(default, deserialize_with = "deserialize_tag_ids")]
    pub tags: BTreeSet<TagId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    #[serde(skip)]
    pub subtasks: Vec<Task>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Task {
            id: id.into(),
            title: title.into(),
            description: None,
            completed: false,
            priority: Priority::default(),
            start_date: None,
            due_date: None,
            group_id: None,
            tags: BTreeSet::new(),
            parent_id: None,
            subtasks: Vec::new(),
        }
    }

    pub fn is_subtask(&self) -> bool {
        self.parent_id.is_some()
    }

    pub fn dates(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            due: self.due_date,
        }
    }

    /// Copy of this task without its snapshot-populated subtree.
    pub fn detached(&self) -> Task {
        Task {
            subtasks: Vec::new(),
            ..self.clone()
        }
    }
}

/// Fields for a task that does not exist yet. The store assigns the id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default, deserialize_with = "deserialize_tag_ids")]
    pub tags: BTreeSet<TagId>,
    #[serde(default)]
    pub parent_id: Option<TaskId>,
}

impl NewTask {
    pub fn new(title: impl Into<String>) -> Self {
        NewTask {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn dates(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            due: self.due_date,
        }
    }

    pub fn with_dates(mut self, dates: DateRange) -> Self {
        self.start_date = dates.start;
        self.due_date = dates.due;
        self
    }

    pub fn into_task(self, id: TaskId) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            completed: false,
            priority: self.priority,
            start_date: self.start_date,
            due_date: self.due_date,
            group_id: self.group_id,
            tags: self.tags,
            parent_id: self.parent_id,
            subtasks: Vec::new(),
        }
    }
}

/// An optional start/due pair. An absent bound is unbounded in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(default, rename = "startDate", skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, rename = "dueDate", skip_serializing_if = "Option::is_none")]
    pub due: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, due: Option<NaiveDate>) -> Self {
        DateRange { start, due }
    }

    pub fn is_undated(&self) -> bool {
        self.start.is_none() && self.due.is_none()
    }

    /// True when both bounds are set and start falls after due.
    pub fn is_inverted(&self) -> bool {
        matches!((self.start, self.due), (Some(s), Some(d)) if s > d)
    }
}

/// The shapes a tag reference takes in incoming task JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagRef {
    Id(TagId),
    Wrapped { tag: Tag },
    Bare(Tag),
}

impl TagRef {
    fn into_id(self) -> TagId {
        match self {
            TagRef::Id(id) => id,
            TagRef::Wrapped { tag } | TagRef::Bare(tag) => tag.id,
        }
    }
}

fn deserialize_tag_ids<'de, D>(deserializer: D) -> Result<BTreeSet<TagId>, D::Error>
where
    D: Deserializer<'de>,
{
    let refs: Option<Vec<TagRef>> = Option::deserialize(deserializer)?;
    Ok(refs
        .unwrap_or_default()
        .into_iter()
        .map(TagRef::into_id)
        .collect())
}
