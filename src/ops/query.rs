use std::cmp::Ordering;

use regex::Regex;

use crate::model::task::Task;

/// Which top-level tasks a listing shows. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub tag: Option<String>,
    pub group: Option<String>,
    pub completed: Option<bool>,
    /// Matched against title and description
    pub text: Option<Regex>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        if let Some(tag) = &self.tag {
            if !task.tags.contains(tag) {
                return false;
            }
        }
        if let Some(group) = &self.group {
            if task.group_id.as_deref() != Some(group.as_str()) {
                return false;
            }
        }
        if let Some(completed) = self.completed {
            if task.completed != completed {
                return false;
            }
        }
        if let Some(re) = &self.text {
            let in_description = task
                .description
                .as_deref()
                .is_some_and(|d| re.is_match(d));
            if !re.is_match(&task.title) && !in_description {
                return false;
            }
        }
        true
    }

    pub fn apply<'a>(&self, tasks: &'a [Task]) -> Vec<&'a Task> {
        tasks.iter().filter(|t| self.matches(t)).collect()
    }
}

/// Listing order: priority (urgent first), then due date (undated last),
/// then title.
pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.title.cmp(&b.title))
}

pub fn sort_tasks(tasks: &mut [&Task]) {
    tasks.sort_by(|a, b| compare_tasks(a, b));
}
