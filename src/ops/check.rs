use serde::Serialize;

use crate::model::task::{Task, TaskId};
use crate::ops::conflict::{DateConflict, validate_date_conflict};

/// Structured result from `td check-dates`.
#[derive(Debug, Default, Serialize)]
pub struct DateCheck {
    pub valid: bool,
    pub issues: Vec<DateIssue>,
}

/// A subtask whose dates spill outside its parent's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateIssue {
    pub subtask_id: TaskId,
    pub parent_id: TaskId,
    pub conflict: DateConflict,
}

/// Compare every subtask in a forest against its direct parent, down to
/// `max_depth`. Issues come out in tree order.
pub fn check_dates(forest: &[Task], max_depth: usize) -> DateCheck {
    let mut issues = Vec::new();
    for task in forest {
        check_children(task, 0, max_depth, &mut issues);
    }
    DateCheck {
        valid: issues.is_empty(),
        issues,
    }
}

fn check_children(parent: &Task, depth: usize, max_depth: usize, issues: &mut Vec<DateIssue>) {
    if depth >= max_depth {
        return;
    }
    for sub in &parent.subtasks {
        let conflict = validate_date_conflict(sub.dates(), parent.dates());
        if conflict.has_conflict {
            issues.push(DateIssue {
                subtask_id: sub.id.clone(),
                parent_id: parent.id.clone(),
                conflict,
            });
        }
        check_children(sub, depth + 1, max_depth, issues);
    }
}
