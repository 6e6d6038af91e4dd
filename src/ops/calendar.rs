use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::model::task::{Task, TaskId};
use crate::ops::tree;

/// Longest window the calendar view lays out.
pub const MAX_DAYS: u32 = 366;

/// One day of the calendar view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub task_ids: Vec<TaskId>,
}

/// Lay tasks out over `days` days starting at `from`.
///
/// A task covers every day of its `[start, due]` span; with only one date
/// set it covers that day alone. Undated tasks do not appear. Subtasks are
/// included down to `max_depth`.
pub fn calendar(tasks: &[Task], from: NaiveDate, days: u32, max_depth: usize) -> Vec<CalendarDay> {
    let mut out: Vec<CalendarDay> = (0..days)
        .filter_map(|offset| from.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| CalendarDay {
            date,
            task_ids: Vec::new(),
        })
        .collect();

    tree::walk_all(tasks, max_depth, &mut |task, _| {
        let Some((start, end)) = span(task) else {
            return;
        };
        for day in out.iter_mut() {
            if day.date >= start && day.date <= end {
                day.task_ids.push(task.id.clone());
            }
        }
    });
    out
}

fn span(task: &Task) -> Option<(NaiveDate, NaiveDate)> {
    match (task.start_date, task.due_date) {
        (Some(s), Some(d)) => Some((s.min(d), s.max(d))),
        (Some(s), None) => Some((s, s)),
        (None, Some(d)) => Some((d, d)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn dated(id: &str, start: Option<u32>, due: Option<u32>) -> Task {
        let mut t = Task::new(id, id);
        t.start_date = start.map(d);
        t.due_date = due.map(d);
        t
    }

    #[test]
    fn test_spans_and_single_days() {
        let mut parent = dated("a", Some(2), Some(4));
        let mut sub = dated("a.1", None, Some(3));
        sub.parent_id = Some("a".into());
        parent.subtasks.push(sub);
        let tasks = vec![parent, dated("b", Some(5), None), dated("c", None, None)];

        let cal = calendar(&tasks, d(1), 5, 2);
        let ids: Vec<Vec<&str>> = cal
            .iter()
            .map(|day| day.task_ids.iter().map(|s| s.as_str()).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec![],
                vec!["a"],
                vec!["a", "a.1"],
                vec!["a"],
                vec!["b"],
            ]
        );
        assert_eq!(cal[0].date, d(1));
        assert_eq!(cal[4].date, d(5));
    }

    #[test]
    fn test_zero_days() {
        assert!(calendar(&[dated("a", Some(1), None)], d(1), 0, 2).is_empty());
    }
}
