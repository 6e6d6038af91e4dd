use std::collections::{HashMap, HashSet};

use crate::model::task::{Task, TaskId};

/// Deepest subtask level when nothing else is configured (0 = top-level).
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Visit `task` and its subtree, depth-first, stopping below `max_depth`.
/// The callback receives each task with its depth relative to `task` (0).
pub fn walk<'a>(task: &'a Task, max_depth: usize, f: &mut dyn FnMut(&'a Task, usize)) {
    walk_at(task, 0, max_depth, f);
}

fn walk_at<'a>(task: &'a Task, depth: usize, max_depth: usize, f: &mut dyn FnMut(&'a Task, usize)) {
    f(task, depth);
    if depth >= max_depth {
        return;
    }
    for sub in &task.subtasks {
        walk_at(sub, depth + 1, max_depth, f);
    }
}

/// Visit every task in a forest (roots and their subtrees).
pub fn walk_all<'a>(tasks: &'a [Task], max_depth: usize, f: &mut dyn FnMut(&'a Task, usize)) {
    for task in tasks {
        walk(task, max_depth, f);
    }
}

/// All subtasks below `task` (not `task` itself), within `max_depth`.
pub fn descendants(task: &Task, max_depth: usize) -> Vec<&Task> {
    let mut out = Vec::new();
    walk(task, max_depth, &mut |t, depth| {
        if depth > 0 {
            out.push(t);
        }
    });
    out
}

/// Find a task by id anywhere in a forest.
pub fn find<'a>(tasks: &'a [Task], task_id: &str, max_depth: usize) -> Option<&'a Task> {
    let mut found = None;
    walk_all(tasks, max_depth, &mut |t, _| {
        if found.is_none() && t.id == task_id {
            found = Some(t);
        }
    });
    found
}

/// Nest a flat task list into a forest using `parent_id`.
///
/// Roots are tasks without a parent. Subtasks whose parent is missing are
/// left out, as is anything deeper than `max_depth`. Sibling order follows
/// the order of the flat list.
pub fn build_forest(flat: &[Task], max_depth: usize) -> Vec<Task> {
    let children = index_children(flat);
    let mut visiting = HashSet::new();
    flat.iter()
        .filter(|t| t.parent_id.is_none())
        .map(|root| attach(root, 0, max_depth, &children, &mut visiting))
        .collect()
}

/// One task from a flat list with its subtree nested below it.
pub fn build_subtree(flat: &[Task], task_id: &str, max_depth: usize) -> Option<Task> {
    let task = flat.iter().find(|t| t.id == task_id)?;
    let children = index_children(flat);
    let mut visiting = HashSet::new();
    Some(attach(task, 0, max_depth, &children, &mut visiting))
}

fn index_children(flat: &[Task]) -> HashMap<&str, Vec<&Task>> {
    let mut children: HashMap<&str, Vec<&Task>> = HashMap::new();
    for task in flat {
        if let Some(parent) = task.parent_id.as_deref() {
            children.entry(parent).or_default().push(task);
        }
    }
    children
}

fn attach<'a>(
    task: &'a Task,
    depth: usize,
    max_depth: usize,
    children: &HashMap<&str, Vec<&'a Task>>,
    visiting: &mut HashSet<&'a str>,
) -> Task {
    let mut node = task.detached();
    if depth < max_depth && visiting.insert(task.id.as_str()) {
        if let Some(kids) = children.get(task.id.as_str()) {
            node.subtasks = kids
                .iter()
                .map(|&k| attach(k, depth + 1, max_depth, children, visiting))
                .collect();
        }
        visiting.remove(task.id.as_str());
    }
    node
}

/// Depth of a task within a flat list (0 = top-level), following `parent_id`.
/// Returns `None` if the task or one of its ancestors is missing, or the
/// chain loops.
pub fn depth_in(flat: &[Task], task_id: &str) -> Option<usize> {
    let by_id: HashMap<&str, &Task> = flat.iter().map(|t| (t.id.as_str(), t)).collect();
    let mut current = *by_id.get(task_id)?;
    let mut depth = 0;
    while let Some(parent) = current.parent_id.as_deref() {
        depth += 1;
        if depth > flat.len() {
            return None;
        }
        current = by_id.get(parent)?;
    }
    Some(depth)
}

/// Ids of a task and every task below it in a flat list.
pub fn subtree_ids(flat: &[Task], task_id: &str) -> Vec<TaskId> {
    let mut out = vec![task_id.to_string()];
    let mut i = 0;
    while i < out.len() {
        let current = out[i].clone();
        for t in flat {
            if t.parent_id.as_deref() == Some(current.as_str()) && !out.contains(&t.id) {
                out.push(t.id.clone());
            }
        }
        i += 1;
    }
    out
}
