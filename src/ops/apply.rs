use serde::Serialize;

use crate::io::store::{StoreError, TaskStore};
use crate::model::field::FieldMap;
use crate::model::task::TaskId;
use crate::ops::plan::BulkUpdatePlan;
use crate::ops::tree;

/// One task the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyFailure {
    pub task_id: TaskId,
    pub reason: String,
}

/// Outcome of handing a plan to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub updated: Vec<TaskId>,
    pub failed: Vec<ApplyFailure>,
}

impl ApplyReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    fn record(&mut self, task_id: &str, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.updated.push(task_id.to_string()),
            Err(e) => {
                tracing::warn!(task_id, error = %e, "bulk update rejected");
                self.failed.push(ApplyFailure {
                    task_id: task_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Send a plan to the store one task at a time: selected tasks in selection
/// order, then subtasks. A rejected task does not stop the rest; the plan
/// is only borrowed, so a failed run can be retried as-is.
pub fn apply_plan(store: &mut dyn TaskStore, plan: &BulkUpdatePlan) -> ApplyReport {
    let mut report = ApplyReport::default();
    for task_id in &plan.task_ids {
        let patch = plan.patch_for(task_id);
        if patch.is_empty() {
            continue;
        }
        report.record(task_id, send(store, task_id, &patch));
    }
    for (task_id, patch) in &plan.subtask_updates {
        if patch.is_empty() {
            continue;
        }
        report.record(task_id, send(store, task_id, patch));
    }
    tracing::info!(
        updated = report.updated.len(),
        failed = report.failed.len(),
        "applied bulk update"
    );
    report
}

fn send(store: &mut dyn TaskStore, task_id: &str, patch: &FieldMap) -> Result<(), StoreError> {
    store.update_task(task_id, patch).map(|_| ())
}

/// Mark a task and its subtree (down to `max_depth`) complete or open in
/// a single store write. Returns the ids that changed.
pub fn set_completed_cascade(
    store: &mut dyn TaskStore,
    task_id: &str,
    completed: bool,
    max_depth: usize,
) -> Result<Vec<TaskId>, StoreError> {
    let root = store
        .get(task_id)
        .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
    let mut ids = Vec::new();
    tree::walk(&root, max_depth, &mut |t, _| {
        if t.completed != completed {
            ids.push(t.id.clone());
        }
    });
    if !ids.is_empty() {
        store.set_completed_many(&ids, completed)?;
    }
    Ok(ids)
}
