use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::model::catalog::{Group, Tag, is_hex_color};
use crate::model::field::{FieldError, FieldMap, apply_field};
use crate::model::task::{DateRange, NewTask, Task, TaskId};
use crate::ops::tree::{self, DEFAULT_MAX_DEPTH};

/// Error type for task store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("parent task not found: {0}")]
    ParentNotFound(String),
    #[error("cannot add subtask: maximum nesting depth ({0}) reached")]
    MaxDepthReached(usize),
    #[error("title cannot be empty")]
    EmptyTitle,
    #[error("task {0}: start date cannot be after due date")]
    InvalidDates(TaskId),
    #[error("unknown tag: {0}")]
    UnknownTag(String),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("{kind} already exists: {id}")]
    Duplicate { kind: &'static str, id: String },
    #[error("invalid color '{0}': expected #rrggbb")]
    InvalidColor(String),
    #[error(transparent)]
    Field(#[from] FieldError),
    #[error("could not read {path}: {source}")]
    ReadError { path: PathBuf, source: io::Error },
    #[error("could not write {path}: {source}")]
    WriteError { path: PathBuf, source: io::Error },
    #[error("could not parse task data: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// The task query, save, and parent-update collaborators.
///
/// Reads return owned snapshots; callers never mutate store data in place.
pub trait TaskStore {
    /// Top-level tasks with their subtasks nested.
    fn snapshot(&self) -> Vec<Task>;
    /// One task (top-level or subtask) with its subtree nested.
    fn get(&self, task_id: &str) -> Option<Task>;
    fn create_task(&mut self, new: NewTask) -> Result<Task, StoreError>;
    /// Apply a partial field map. `Empty` values clear the field.
    fn update_task(&mut self, task_id: &str, patch: &FieldMap) -> Result<Task, StoreError>;
    fn update_parent_dates(&mut self, task_id: &str, dates: DateRange)
    -> Result<Task, StoreError>;
    fn set_completed(&mut self, task_id: &str, completed: bool) -> Result<Task, StoreError>;
    /// Set the completion flag on several tasks as one write: either all of
    /// them change or none do.
    fn set_completed_many(&mut self, task_ids: &[TaskId], completed: bool)
    -> Result<(), StoreError>;
    /// Delete a task and everything below it. Returns the removed ids.
    fn delete_task(&mut self, task_id: &str) -> Result<Vec<TaskId>, StoreError>;
    fn tags(&self) -> Vec<Tag>;
    fn groups(&self) -> Vec<Group>;
    fn create_tag(&mut self, tag: Tag) -> Result<(), StoreError>;
    fn create_group(&mut self, group: Group) -> Result<(), StoreError>;
}

/// On-disk layout of `tasks.json`. Tasks are stored flat.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreData {
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub groups: Vec<Group>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// A [`TaskStore`] over data held in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    data: StoreData,
    max_depth: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::new(StoreData::default())
    }
}

impl MemoryStore {
    pub fn new(data: StoreData) -> Self {
        MemoryStore {
            data,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn data(&self) -> &StoreData {
        &self.data
    }

    /// All tasks, flat, in storage order.
    pub fn flat(&self) -> &[Task] {
        &self.data.tasks
    }

    fn index_of(&self, task_id: &str) -> Result<usize, StoreError> {
        self.data
            .tasks
            .iter()
            .position(|t| t.id == task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    fn check_task(&self, task: &Task) -> Result<(), StoreError> {
        if task.title.trim().is_empty() {
            return Err(StoreError::EmptyTitle);
        }
        if task.dates().is_inverted() {
            return Err(StoreError::InvalidDates(task.id.clone()));
        }
        if let Some(group) = &task.group_id {
            if !self.data.groups.iter().any(|g| &g.id == group) {
                return Err(StoreError::UnknownGroup(group.clone()));
            }
        }
        if let Some(tag) = task
            .tags
            .iter()
            .find(|id| !self.data.tags.iter().any(|t| &t.id == *id))
        {
            return Err(StoreError::UnknownTag(tag.clone()));
        }
        Ok(())
    }

    fn next_top_level_id(&self) -> TaskId {
        let max = self
            .data
            .tasks
            .iter()
            .filter_map(|t| t.id.strip_prefix("T-"))
            .filter_map(|rest| rest.split('.').next()?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        format!("T-{:03}", max + 1)
    }

    fn next_subtask_id(&self, parent_id: &str) -> TaskId {
        let prefix = format!("{}.", parent_id);
        let max = self
            .data
            .tasks
            .iter()
            .filter(|t| t.parent_id.as_deref() == Some(parent_id))
            .filter_map(|t| t.id.strip_prefix(&prefix)?.parse::<usize>().ok())
            .max()
            .unwrap_or(0);
        format!("{}{}", prefix, max + 1)
    }

    /// Replace the task at `idx` after validating the edited copy.
    fn replace(&mut self, idx: usize, edited: Task) -> Result<Task, StoreError> {
        self.check_task(&edited)?;
        self.data.tasks[idx] = edited.clone();
        Ok(edited)
    }
}

impl TaskStore for MemoryStore {
    fn snapshot(&self) -> Vec<Task> {
        tree::build_forest(&self.data.tasks, self.max_depth)
    }

    fn get(&self, task_id: &str) -> Option<Task> {
        tree::build_subtree(&self.data.tasks, task_id, self.max_depth)
    }

    fn create_task(&mut self, new: NewTask) -> Result<Task, StoreError> {
        let id = match new.parent_id.as_deref() {
            Some(parent_id) => {
                let depth = tree::depth_in(&self.data.tasks, parent_id)
                    .ok_or_else(|| StoreError::ParentNotFound(parent_id.to_string()))?;
                if depth >= self.max_depth {
                    return Err(StoreError::MaxDepthReached(self.max_depth + 1));
                }
                self.next_subtask_id(parent_id)
            }
            None => self.next_top_level_id(),
        };
        let task = new.into_task(id);
        self.check_task(&task)?;
        tracing::debug!(task_id = %task.id, parent = ?task.parent_id, "created task");
        self.data.tasks.push(task.clone());
        Ok(task)
    }

    fn update_task(&mut self, task_id: &str, patch: &FieldMap) -> Result<Task, StoreError> {
        let idx = self.index_of(task_id)?;
        let mut edited = self.data.tasks[idx].clone();
        for (field, value) in patch {
            apply_field(&mut edited, *field, value)?;
        }
        tracing::debug!(task_id, fields = patch.len(), "updated task");
        self.replace(idx, edited)
    }

    fn update_parent_dates(
        &mut self,
        task_id: &str,
        dates: DateRange,
    ) -> Result<Task, StoreError> {
        let idx = self.index_of(task_id)?;
        let mut edited = self.data.tasks[idx].clone();
        edited.start_date = dates.start;
        edited.due_date = dates.due;
        tracing::debug!(task_id, start = ?dates.start, due = ?dates.due, "updated parent dates");
        self.replace(idx, edited)
    }

    fn set_completed(&mut self, task_id: &str, completed: bool) -> Result<Task, StoreError> {
        let idx = self.index_of(task_id)?;
        self.data.tasks[idx].completed = completed;
        Ok(self.data.tasks[idx].clone())
    }

    fn set_completed_many(
        &mut self,
        task_ids: &[TaskId],
        completed: bool,
    ) -> Result<(), StoreError> {
        let idxs = task_ids
            .iter()
            .map(|id| self.index_of(id))
            .collect::<Result<Vec<_>, _>>()?;
        for idx in idxs {
            self.data.tasks[idx].completed = completed;
        }
        tracing::debug!(count = task_ids.len(), completed, "set completion");
        Ok(())
    }

    fn delete_task(&mut self, task_id: &str) -> Result<Vec<TaskId>, StoreError> {
        self.index_of(task_id)?;
        let doomed = tree::subtree_ids(&self.data.tasks, task_id);
        self.data.tasks.retain(|t| !doomed.contains(&t.id));
        tracing::debug!(task_id, removed = doomed.len(), "deleted task");
        Ok(doomed)
    }

    fn tags(&self) -> Vec<Tag> {
        self.data.tags.clone()
    }

    fn groups(&self) -> Vec<Group> {
        self.data.groups.clone()
    }

    fn create_tag(&mut self, tag: Tag) -> Result<(), StoreError> {
        if self.data.tags.iter().any(|t| t.id == tag.id) {
            return Err(StoreError::Duplicate {
                kind: "tag",
                id: tag.id,
            });
        }
        if !is_hex_color(&tag.color) {
            return Err(StoreError::InvalidColor(tag.color));
        }
        self.data.tags.push(tag);
        Ok(())
    }

    fn create_group(&mut self, group: Group) -> Result<(), StoreError> {
        if self.data.groups.iter().any(|g| g.id == group.id) {
            return Err(StoreError::Duplicate {
                kind: "group",
                id: group.id,
            });
        }
        if !is_hex_color(&group.color) {
            return Err(StoreError::InvalidColor(group.color));
        }
        self.data.groups.push(group);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON file store
// ---------------------------------------------------------------------------

/// A [`TaskStore`] persisted to a JSON file. Every successful write is
/// flushed to disk before returning; a failed flush rolls the in-memory
/// state back.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    inner: MemoryStore,
}

impl JsonStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path, max_depth: usize) -> Result<Self, StoreError> {
        let data = if path.exists() {
            let text = fs::read_to_string(path).map_err(|e| StoreError::ReadError {
                path: path.to_path_buf(),
                source: e,
            })?;
            if text.trim().is_empty() {
                StoreData::default()
            } else {
                serde_json::from_str(&text)?
            }
        } else {
            StoreData::default()
        };
        Ok(JsonStore {
            path: path.to_path_buf(),
            inner: MemoryStore::new(data).with_max_depth(max_depth),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn data(&self) -> &StoreData {
        self.inner.data()
    }

    /// Write the current state to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        let mut content = serde_json::to_string_pretty(self.inner.data())?;
        content.push('\n');
        atomic_write(&self.path, content.as_bytes()).map_err(|e| StoreError::WriteError {
            path: self.path.clone(),
            source: e,
        })
    }

    fn commit<T>(
        &mut self,
        f: impl FnOnce(&mut MemoryStore) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let before = self.inner.clone();
        let out = f(&mut self.inner)?;
        if let Err(e) = self.save() {
            tracing::warn!(path = %self.path.display(), error = %e, "write failed, rolling back");
            self.inner = before;
            return Err(e);
        }
        Ok(out)
    }
}

impl TaskStore for JsonStore {
    fn snapshot(&self) -> Vec<Task> {
        self.inner.snapshot()
    }

    fn get(&self, task_id: &str) -> Option<Task> {
        self.inner.get(task_id)
    }

    fn create_task(&mut self, new: NewTask) -> Result<Task, StoreError> {
        self.commit(|s| s.create_task(new))
    }

    fn update_task(&mut self, task_id: &str, patch: &FieldMap) -> Result<Task, StoreError> {
        self.commit(|s| s.update_task(task_id, patch))
    }

    fn update_parent_dates(
        &mut self,
        task_id: &str,
        dates: DateRange,
    ) -> Result<Task, StoreError> {
        self.commit(|s| s.update_parent_dates(task_id, dates))
    }

    fn set_completed(&mut self, task_id: &str, completed: bool) -> Result<Task, StoreError> {
        self.commit(|s| s.set_completed(task_id, completed))
    }

    fn set_completed_many(
        &mut self,
        task_ids: &[TaskId],
        completed: bool,
    ) -> Result<(), StoreError> {
        self.commit(|s| s.set_completed_many(task_ids, completed))
    }

    fn delete_task(&mut self, task_id: &str) -> Result<Vec<TaskId>, StoreError> {
        self.commit(|s| s.delete_task(task_id))
    }

    fn tags(&self) -> Vec<Tag> {
        self.inner.tags()
    }

    fn groups(&self) -> Vec<Group> {
        self.inner.groups()
    }

    fn create_tag(&mut self, tag: Tag) -> Result<(), StoreError> {
        self.commit(|s| s.create_tag(tag))
    }

    fn create_group(&mut self, group: Group) -> Result<(), StoreError> {
        self.commit(|s| s.create_group(group))
    }
}

/// Write `content` to `path` atomically using a temp file + rename.
pub fn atomic_write(path: &Path, content: &[u8]) -> io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
