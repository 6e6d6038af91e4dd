use serde::Serialize;

use crate::model::catalog::{Group, Tag};
use crate::model::field::FieldMap;
use crate::model::task::{DateRange, Priority, Task};
use crate::ops::apply::ApplyReport;
use crate::ops::calendar::CalendarDay;
use crate::ops::check::DateCheck;
use crate::ops::conflict::DateConflict;
use crate::ops::plan::BulkUpdatePlan;
use crate::ops::reconcile::FieldAnalysis;
use crate::ops::resolve::{Resolution, SubtaskOutcome};
use crate::ops::similar::SimilarityReport;
use crate::ops::tree;
use crate::util::unicode::{pad_to_width, truncate_to_width};

const TITLE_WIDTH: usize = 60;
const FIELD_WIDTH: usize = 11;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

/// A task with its subtree, for `--json` listings.
#[derive(Serialize)]
pub struct TaskJson<'a> {
    #[serde(flatten)]
    pub task: &'a Task,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subtasks: Vec<TaskJson<'a>>,
}

pub fn task_to_json(task: &Task) -> TaskJson<'_> {
    TaskJson {
        task,
        subtasks: task.subtasks.iter().map(task_to_json).collect(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdsJson {
    pub ids: Vec<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJson<'a> {
    pub plan: &'a BulkUpdatePlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a ApplyReport>,
}

// ---------------------------------------------------------------------------
// Human-readable formatting
// ---------------------------------------------------------------------------

/// `start .. due`, with `?` for an open bound.
pub fn format_range(range: DateRange) -> String {
    let fmt = |d: Option<chrono::NaiveDate>| {
        d.map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "?".to_string())
    };
    if range.is_undated() {
        return "(undated)".to_string();
    }
    format!("{} .. {}", fmt(range.start), fmt(range.due))
}

/// One-line summary: checkbox, id, title, then whatever is set.
pub fn format_task_line(task: &Task) -> String {
    let check = if task.completed { 'x' } else { ' ' };
    let mut line = format!(
        "[{}] {} {}",
        check,
        task.id,
        truncate_to_width(&task.title, TITLE_WIDTH)
    );
    if task.priority != Priority::Medium {
        line.push_str(&format!(" !{}", task.priority.as_str().to_ascii_lowercase()));
    }
    if !task.dates().is_undated() {
        line.push_str(&format!(" ({})", format_range(task.dates())));
    }
    if let Some(group) = &task.group_id {
        line.push_str(&format!(" @{}", group));
    }
    for tag in &task.tags {
        line.push_str(&format!(" #{}", tag));
    }
    line
}

/// Format a task with its subtasks, indented
pub fn format_task_tree(task: &Task, indent: usize) -> Vec<String> {
    let mut lines = vec![format!("{}{}", "  ".repeat(indent), format_task_line(task))];
    for sub in &task.subtasks {
        lines.extend(format_task_tree(sub, indent + 1));
    }
    lines
}

/// Format detailed task view
pub fn format_task_detail(task: &Task) -> Vec<String> {
    let check = if task.completed { 'x' } else { ' ' };
    let mut lines = vec![format!("[{}] {} {}", check, task.id, task.title)];
    lines.push(format!("priority: {}", task.priority));
    if !task.dates().is_undated() {
        lines.push(format!("dates: {}", format_range(task.dates())));
    }
    if let Some(group) = &task.group_id {
        lines.push(format!("group: {}", group));
    }
    if !task.tags.is_empty() {
        let tags: Vec<String> = task.tags.iter().map(|t| format!("#{}", t)).collect();
        lines.push(format!("tags: {}", tags.join(" ")));
    }
    if let Some(parent) = &task.parent_id {
        lines.push(format!("parent: {}", parent));
    }
    if let Some(desc) = task.description.as_deref().filter(|d| !d.is_empty()) {
        lines.push("description:".to_string());
        lines.extend(desc.lines().map(|l| format!("  {}", l)));
    }
    if !task.subtasks.is_empty() {
        lines.push(String::new());
        lines.push("subtasks:".to_string());
        for sub in &task.subtasks {
            lines.extend(format_task_tree(sub, 1));
        }
    }
    lines
}

/// `field = value` for shared fields, `field ~ a | b` for divergent ones.
pub fn format_field_analysis(analysis: &[FieldAnalysis]) -> Vec<String> {
    analysis
        .iter()
        .map(|a| {
            let name = pad_to_width(a.field.as_str(), FIELD_WIDTH);
            match &a.common_value {
                Some(value) if a.has_common_value => format!("{} = {}", name, value),
                _ => {
                    let values: Vec<String> =
                        a.different_values.iter().map(|v| v.to_string()).collect();
                    format!("{} ~ {}", name, values.join(" | "))
                }
            }
        })
        .collect()
}

/// `priority=HIGH, title=First`
pub fn format_field_map(map: &FieldMap) -> String {
    map.iter()
        .map(|(field, value)| format!("{}={}", field, value))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn format_plan(plan: &BulkUpdatePlan) -> Vec<String> {
    let mut lines = vec![format!("tasks: {}", plan.task_ids.join(", "))];
    if !plan.common_updates.is_empty() {
        lines.push(format!("all: {}", format_field_map(&plan.common_updates)));
    }
    if !plan.cleared_fields.is_empty() {
        let cleared: Vec<&str> = plan.cleared_fields.iter().map(|f| f.as_str()).collect();
        lines.push(format!("clear: {}", cleared.join(", ")));
    }
    for (task_id, updates) in &plan.individual_updates {
        lines.push(format!("{}: {}", task_id, format_field_map(updates)));
    }
    for (task_id, updates) in &plan.subtask_updates {
        lines.push(format!("{} (subtask): {}", task_id, format_field_map(updates)));
    }
    lines
}

pub fn format_apply_report(report: &ApplyReport) -> Vec<String> {
    let mut lines = vec![format!("updated {} task(s)", report.updated.len())];
    for failure in &report.failed {
        lines.push(format!("failed {}: {}", failure.task_id, failure.reason));
    }
    lines
}

/// The conflict kind and the bounds each resolution would change.
pub fn format_conflict(conflict: &DateConflict) -> Vec<String> {
    let Some(kind) = conflict.conflict_type else {
        return vec!["no date conflict".to_string()];
    };
    let bounds = |start: Option<chrono::NaiveDate>, due: Option<chrono::NaiveDate>| {
        let mut parts = Vec::new();
        if let Some(s) = start {
            parts.push(format!("start {}", s));
        }
        if let Some(d) = due {
            parts.push(format!("due {}", d));
        }
        parts.join(", ")
    };
    vec![
        kind.describe().to_string(),
        format!(
            "  widen parent: {}",
            bounds(
                conflict.suggested_parent_start_date,
                conflict.suggested_parent_end_date
            )
        ),
        format!(
            "  clamp subtask: {}",
            bounds(
                conflict.suggested_subtask_start_date,
                conflict.suggested_subtask_end_date
            )
        ),
    ]
}

pub fn format_outcome(outcome: &SubtaskOutcome) -> String {
    match outcome {
        SubtaskOutcome::Saved {
            task,
            resolution: Some(Resolution::WidenParent),
            ..
        } => format!("{} (widened parent)", task.id),
        SubtaskOutcome::Saved {
            task,
            resolution: Some(Resolution::ClampSubtask),
            ..
        } => format!("{} (clamped to {})", task.id, format_range(task.dates())),
        SubtaskOutcome::Saved { task, .. } => task.id.clone(),
        SubtaskOutcome::Cancelled { conflict } => format!(
            "cancelled: {}",
            conflict
                .conflict_type
                .map(|t| t.describe())
                .unwrap_or("date conflict")
        ),
    }
}

pub fn format_similar(report: &SimilarityReport) -> Vec<String> {
    let mut lines: Vec<String> = report
        .clusters
        .iter()
        .map(|c| format!("{} ({}): {}", c.key, c.task_ids.len(), c.task_ids.join(", ")))
        .collect();
    if !report.unique.is_empty() {
        lines.push(format!("unique: {}", report.unique.join(", ")));
    }
    lines
}

/// Day headers, each followed by the tasks on that day.
pub fn format_calendar(days: &[CalendarDay], forest: &[Task], max_depth: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for day in days {
        lines.push(day.date.format("%a %Y-%m-%d").to_string());
        for id in &day.task_ids {
            let title = tree::find(forest, id, max_depth)
                .map(|t| truncate_to_width(&t.title, TITLE_WIDTH))
                .unwrap_or_default();
            lines.push(format!("  {} {}", id, title));
        }
    }
    lines
}

pub fn format_date_check(check: &DateCheck) -> Vec<String> {
    if check.valid {
        return vec!["no date conflicts".to_string()];
    }
    check
        .issues
        .iter()
        .map(|issue| {
            let kind = issue
                .conflict
                .conflict_type
                .map(|t| t.describe())
                .unwrap_or("date conflict");
            format!("{} (parent {}): {}", issue.subtask_id, issue.parent_id, kind)
        })
        .collect()
}

pub fn format_tag(tag: &Tag) -> String {
    format!("{} {} {}", tag.id, tag.name, tag.color)
}

pub fn format_group(group: &Group) -> String {
    match group.description.as_deref() {
        Some(desc) => format!("{} {} {} - {}", group.id, group.name, group.color, desc),
        None => format!("{} {} {}", group.id, group.name, group.color),
    }
}
