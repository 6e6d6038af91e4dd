use serde::Serialize;

use crate::io::store::{StoreError, TaskStore};
use crate::model::field::{FieldMap, FieldName, FieldValue};
use crate::model::task::{DateRange, NewTask, Task, TaskId};
use crate::ops::conflict::{DateConflict, validate_date_conflict};

/// Error type for saving a subtask through conflict resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("task not found: {0}")]
    NotFound(String),
    #[error("{0} is not a subtask")]
    NotASubtask(String),
    #[error("failed to save, try again: {0}")]
    Store(#[from] StoreError),
    /// The parent was widened, then the subtask save failed.
    #[error(
        "failed to save subtask after widening parent {parent_id}: {source}{}",
        restore_note(.parent_restored)
    )]
    SaveAfterWiden {
        parent_id: TaskId,
        source: StoreError,
        parent_restored: bool,
    },
}

fn restore_note(restored: &bool) -> &'static str {
    if *restored {
        " (parent dates restored)"
    } else {
        " (parent dates NOT restored)"
    }
}

/// The two fixes for a date conflict, plus backing out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Resolution {
    /// Keep the subtask's dates and stretch the parent to cover them
    WidenParent,
    /// Pull the subtask's dates inside the parent's range
    ClampSubtask,
    Cancel,
}

/// The user confirmation surface: shown the conflict, picks a resolution.
pub trait ConflictPrompt {
    fn choose(&mut self, parent: &Task, conflict: &DateConflict) -> Resolution;
}

/// A prompt that always answers the same way (a command-line flag, tests).
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub Resolution);

impl ConflictPrompt for FixedChoice {
    fn choose(&mut self, _parent: &Task, _conflict: &DateConflict) -> Resolution {
        self.0
    }
}

/// What happened to one subtask save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubtaskOutcome {
    Saved {
        task: Task,
        /// The resolution applied, if the dates conflicted
        #[serde(skip_serializing_if = "Option::is_none")]
        resolution: Option<Resolution>,
        #[serde(skip_serializing_if = "Option::is_none")]
        conflict: Option<DateConflict>,
    },
    Cancelled {
        conflict: DateConflict,
    },
}

impl SubtaskOutcome {
    pub fn task(&self) -> Option<&Task> {
        match self {
            SubtaskOutcome::Saved { task, .. } => Some(task),
            SubtaskOutcome::Cancelled { .. } => None,
        }
    }
}

/// Create a subtask under `parent_id`, resolving any date conflict with the
/// parent through `prompt` first.
pub fn create_subtask(
    store: &mut dyn TaskStore,
    prompt: &mut dyn ConflictPrompt,
    parent_id: &str,
    draft: NewTask,
) -> Result<SubtaskOutcome, ResolveError> {
    let parent = store
        .get(parent_id)
        .ok_or_else(|| ResolveError::NotFound(parent_id.to_string()))?;
    let requested = draft.dates();
    let draft = NewTask {
        parent_id: Some(parent.id.clone()),
        ..draft
    };
    save_resolved(store, prompt, &parent, requested, move |store, dates| {
        store.create_task(draft.with_dates(dates))
    })
}

/// Create several subtasks one after another. Each save completes before
/// the next starts, and the parent is re-read in between so a widened
/// parent is seen by the following subtasks. Stops at the first error.
pub fn create_subtasks(
    store: &mut dyn TaskStore,
    prompt: &mut dyn ConflictPrompt,
    parent_id: &str,
    drafts: Vec<NewTask>,
) -> Result<Vec<SubtaskOutcome>, ResolveError> {
    let mut outcomes = Vec::with_capacity(drafts.len());
    for draft in drafts {
        outcomes.push(create_subtask(store, prompt, parent_id, draft)?);
    }
    Ok(outcomes)
}

/// Move an existing subtask to new dates, resolving any conflict with its
/// parent through `prompt` first.
pub fn reschedule_subtask(
    store: &mut dyn TaskStore,
    prompt: &mut dyn ConflictPrompt,
    subtask_id: &str,
    dates: DateRange,
) -> Result<SubtaskOutcome, ResolveError> {
    let subtask = store
        .get(subtask_id)
        .ok_or_else(|| ResolveError::NotFound(subtask_id.to_string()))?;
    let parent_id = subtask
        .parent_id
        .clone()
        .ok_or_else(|| ResolveError::NotASubtask(subtask_id.to_string()))?;
    let parent = store
        .get(&parent_id)
        .ok_or_else(|| ResolveError::NotFound(parent_id.clone()))?;
    let id = subtask.id;
    save_resolved(store, prompt, &parent, dates, move |store, dates| {
        store.update_task(&id, &date_patch(dates))
    })
}

/// A patch that sets both dates, clearing an absent bound.
fn date_patch(dates: DateRange) -> FieldMap {
    let mut patch = FieldMap::new();
    patch.insert(
        FieldName::StartDate,
        dates.start.map_or(FieldValue::Empty, FieldValue::Date),
    );
    patch.insert(
        FieldName::DueDate,
        dates.due.map_or(FieldValue::Empty, FieldValue::Date),
    );
    patch
}

/// Shared conflict flow: validate, ask, then save with the chosen dates.
fn save_resolved(
    store: &mut dyn TaskStore,
    prompt: &mut dyn ConflictPrompt,
    parent: &Task,
    requested: DateRange,
    save: impl FnOnce(&mut dyn TaskStore, DateRange) -> Result<Task, StoreError>,
) -> Result<SubtaskOutcome, ResolveError> {
    let conflict = validate_date_conflict(requested, parent.dates());
    if !conflict.has_conflict {
        let task = save(&mut *store, requested)?;
        return Ok(SubtaskOutcome::Saved {
            task,
            resolution: None,
            conflict: None,
        });
    }

    let resolution = prompt.choose(parent, &conflict);
    tracing::debug!(parent_id = %parent.id, ?resolution, conflict = ?conflict.conflict_type, "date conflict");
    match resolution {
        Resolution::Cancel => Ok(SubtaskOutcome::Cancelled { conflict }),
        Resolution::ClampSubtask => {
            let task = save(&mut *store, conflict.clamped_subtask(requested))?;
            Ok(SubtaskOutcome::Saved {
                task,
                resolution: Some(resolution),
                conflict: Some(conflict),
            })
        }
        Resolution::WidenParent => {
            let original = parent.dates();
            store.update_parent_dates(&parent.id, conflict.widened_parent(original))?;
            match save(&mut *store, requested) {
                Ok(task) => {
                    tracing::info!(parent_id = %parent.id, subtask_id = %task.id, "widened parent for subtask");
                    Ok(SubtaskOutcome::Saved {
                        task,
                        resolution: Some(resolution),
                        conflict: Some(conflict),
                    })
                }
                Err(source) => {
                    // Undo the parent write so a failed save leaves no partial change
                    let parent_restored = match store.update_parent_dates(&parent.id, original) {
                        Ok(_) => true,
                        Err(e) => {
                            tracing::error!(parent_id = %parent.id, error = %e, "could not restore parent dates");
                            false
                        }
                    };
                    tracing::warn!(parent_id = %parent.id, error = %source, parent_restored, "subtask save failed after widening parent");
                    Err(ResolveError::SaveAfterWiden {
                        parent_id: parent.id.clone(),
                        source,
                        parent_restored,
                    })
                }
            }
        }
    }
}
