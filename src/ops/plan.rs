use std::collections::{BTreeMap, BTreeSet, HashSet};

use serde::Serialize;

use crate::model::field::{FieldMap, FieldName, FieldValue};
use crate::model::task::{Task, TaskId};
use crate::ops::tree::{self, DEFAULT_MAX_DEPTH};

/// A bulk-edit input problem. Shown to the user; never reaches the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("select at least one task")]
    NoTasksSelected,
    #[error("select at least one field")]
    NoFieldsSelected,
    #[error("start date cannot be after due date")]
    StartAfterDue {
        /// `None` for the shared (common) values
        task_id: Option<TaskId>,
    },
    #[error("{0} cannot be cleared")]
    NotClearable(FieldName),
}

impl ValidationError {
    /// The field the message should be attached to, if any.
    pub fn field(&self) -> Option<FieldName> {
        match self {
            ValidationError::StartAfterDue { .. } => Some(FieldName::StartDate),
            ValidationError::NotClearable(field) => Some(*field),
            ValidationError::NoTasksSelected | ValidationError::NoFieldsSelected => None,
        }
    }
}

/// How a selected field is edited across the selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldMode {
    /// One value for every selected task
    #[default]
    Common,
    /// A separate value per task
    Individual,
    /// Explicitly remove the value from every selected task
    Clear,
}

/// The edit buffers of one bulk-edit session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSession {
    pub fields_to_update: BTreeSet<FieldName>,
    pub modes: BTreeMap<FieldName, FieldMode>,
    pub common_values: FieldMap,
    pub individual_values: BTreeMap<TaskId, FieldMap>,
    /// Copy common priority/group/tag edits onto subtasks
    pub cascade_to_subtasks: bool,
    /// Deepest subtask level visited when cascading or collecting overrides
    pub max_depth: usize,
}

impl Default for EditSession {
    fn default() -> Self {
        EditSession {
            fields_to_update: BTreeSet::new(),
            modes: BTreeMap::new(),
            common_values: FieldMap::new(),
            individual_values: BTreeMap::new(),
            cascade_to_subtasks: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Select a field for a shared update. On a field already in
    /// individual mode the value becomes the default for tasks without
    /// their own override.
    pub fn set_common(&mut self, field: FieldName, value: FieldValue) -> &mut Self {
        self.fields_to_update.insert(field);
        if self.mode(field) != FieldMode::Individual {
            self.modes.insert(field, FieldMode::Common);
        }
        self.common_values.insert(field, value);
        self
    }

    /// Select a field for per-task updates and record one task's value.
    /// A common value already set for the field still applies to the
    /// tasks that get no override.
    pub fn set_individual(
        &mut self,
        task_id: impl Into<TaskId>,
        field: FieldName,
        value: FieldValue,
    ) -> &mut Self {
        self.fields_to_update.insert(field);
        self.modes.insert(field, FieldMode::Individual);
        self.individual_values
            .entry(task_id.into())
            .or_default()
            .insert(field, value);
        self
    }

    /// Select a field to be removed from every selected task.
    pub fn set_clear(&mut self, field: FieldName) -> &mut Self {
        self.fields_to_update.insert(field);
        self.modes.insert(field, FieldMode::Clear);
        self.common_values.remove(&field);
        self
    }

    pub fn mode(&self, field: FieldName) -> FieldMode {
        self.modes.get(&field).copied().unwrap_or_default()
    }
}

/// What to send to the store for one bulk edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdatePlan {
    /// The selected tasks, in selection order
    pub task_ids: Vec<TaskId>,
    pub common_updates: FieldMap,
    pub individual_updates: BTreeMap<TaskId, FieldMap>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub subtask_updates: BTreeMap<TaskId, FieldMap>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub cleared_fields: BTreeSet<FieldName>,
}

impl BulkUpdatePlan {
    /// True when applying the plan would write nothing.
    pub fn is_empty(&self) -> bool {
        self.common_updates.is_empty()
            && self.cleared_fields.is_empty()
            && self.individual_updates.values().all(|m| m.is_empty())
            && self.subtask_updates.values().all(|m| m.is_empty())
    }

    /// The merged patch for one selected task: cleared fields, then common
    /// values, then that task's own overrides.
    pub fn patch_for(&self, task_id: &str) -> FieldMap {
        let mut patch: FieldMap = self
            .cleared_fields
            .iter()
            .map(|&f| (f, FieldValue::Empty))
            .collect();
        patch.extend(
            self.common_updates
                .iter()
                .map(|(f, v)| (*f, v.clone())),
        );
        if let Some(own) = self.individual_updates.get(task_id) {
            patch.extend(own.iter().map(|(f, v)| (*f, v.clone())));
        }
        patch
    }
}

/// Assemble the update plan for a selection from the session's edit buffers.
///
/// Blank values (absent, `Empty`, empty string) are dropped rather than
/// written; removing a value takes an explicit [`FieldMode::Clear`].
pub fn build_update_plan(
    tasks: &[Task],
    session: &EditSession,
) -> Result<BulkUpdatePlan, ValidationError> {
    if tasks.is_empty() {
        return Err(ValidationError::NoTasksSelected);
    }
    if session.fields_to_update.is_empty() {
        return Err(ValidationError::NoFieldsSelected);
    }

    let selected: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    let subtasks: Vec<&Task> = tasks
        .iter()
        .flat_map(|t| tree::descendants(t, session.max_depth))
        .filter(|s| !selected.contains(s.id.as_str()))
        .collect();

    let mut plan = BulkUpdatePlan {
        task_ids: tasks.iter().map(|t| t.id.clone()).collect(),
        ..Default::default()
    };

    for &field in &session.fields_to_update {
        match session.mode(field) {
            FieldMode::Common => {
                let Some(value) = session.common_values.get(&field) else {
                    continue;
                };
                if value.is_blank() {
                    tracing::debug!(%field, "dropping blank common value");
                    continue;
                }
                plan.common_updates.insert(field, value.clone());
                if session.cascade_to_subtasks && field.cascades() {
                    for sub in &subtasks {
                        plan.subtask_updates
                            .entry(sub.id.clone())
                            .or_default()
                            .insert(field, value.clone());
                    }
                }
            }
            FieldMode::Individual => {
                let fallback = session.common_values.get(&field).filter(|v| !v.is_blank());
                for task in tasks {
                    if let Some(value) = individual_value(session, &task.id, field).or(fallback) {
                        plan.individual_updates
                            .entry(task.id.clone())
                            .or_default()
                            .insert(field, value.clone());
                    }
                }
                let sub_fallback =
                    fallback.filter(|_| session.cascade_to_subtasks && field.cascades());
                for sub in &subtasks {
                    if let Some(value) = individual_value(session, &sub.id, field).or(sub_fallback) {
                        plan.subtask_updates
                            .entry(sub.id.clone())
                            .or_default()
                            .insert(field, value.clone());
                    }
                }
            }
            FieldMode::Clear => {
                if matches!(field, FieldName::Title | FieldName::Priority) {
                    return Err(ValidationError::NotClearable(field));
                }
                plan.cleared_fields.insert(field);
            }
        }
    }

    check_date_order(&plan.common_updates, None)?;
    for task_id in &plan.task_ids {
        check_date_order(&plan.patch_for(task_id), Some(task_id))?;
    }
    for (task_id, updates) in &plan.subtask_updates {
        check_date_order(updates, Some(task_id))?;
    }

    Ok(plan)
}

fn individual_value<'s>(
    session: &'s EditSession,
    task_id: &str,
    field: FieldName,
) -> Option<&'s FieldValue> {
    session
        .individual_values
        .get(task_id)
        .and_then(|values| values.get(&field))
        .filter(|v| !v.is_blank())
}

/// Reject an update target whose own start and due dates are out of order.
fn check_date_order(updates: &FieldMap, task_id: Option<&TaskId>) -> Result<(), ValidationError> {
    let start = updates.get(&FieldName::StartDate).and_then(|v| v.as_date());
    let due = updates.get(&FieldName::DueDate).and_then(|v| v.as_date());
    if let (Some(start), Some(due)) = (start, due) {
        if start > due {
            return Err(ValidationError::StartAfterDue {
                task_id: task_id.cloned(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Priority;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn date(day: u32) -> FieldValue {
        FieldValue::Date(NaiveDate::from_ymd_opt(2024, 1, day).unwrap())
    }

    fn with_subtasks(id: &str, subs: &[&str]) -> Task {
        let mut t = Task::new(id, id);
        t.subtasks = subs
            .iter()
            .map(|s| {
                let mut sub = Task::new(*s, *s);
                sub.parent_id = Some(id.to_string());
                sub
            })
            .collect();
        t
    }

    fn two_tasks() -> Vec<Task> {
        vec![Task::new("a", "A"), Task::new("b", "B")]
    }

    #[test]
    fn test_empty_common_title_is_dropped() {
        let mut session = EditSession::new();
        session.set_common(FieldName::Title, FieldValue::Text(String::new()));
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert!(!plan.common_updates.contains_key(&FieldName::Title));
        assert!(plan.is_empty());
    }

    #[test]
    fn test_no_fields_selected() {
        let session = EditSession::new();
        let err = build_update_plan(&two_tasks(), &session).unwrap_err();
        assert_eq!(err, ValidationError::NoFieldsSelected);
        assert_eq!(err.to_string(), "select at least one field");
    }

    #[test]
    fn test_no_tasks_selected() {
        let mut session = EditSession::new();
        session.set_common(FieldName::Priority, FieldValue::Priority(Priority::Low));
        assert_eq!(
            build_update_plan(&[], &session),
            Err(ValidationError::NoTasksSelected)
        );
    }

    #[test]
    fn test_common_values_copied() {
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Priority, FieldValue::Priority(Priority::Urgent))
            .set_common(FieldName::DueDate, date(10));
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert_eq!(plan.task_ids, vec!["a".to_string(), "b".into()]);
        assert_eq!(
            plan.common_updates.get(&FieldName::Priority),
            Some(&FieldValue::Priority(Priority::Urgent))
        );
        assert_eq!(plan.common_updates.get(&FieldName::DueDate), Some(&date(10)));
        assert!(plan.individual_updates.is_empty());
    }

    #[test]
    fn test_selected_field_without_value_is_skipped() {
        let mut session = EditSession::new();
        session.fields_to_update.insert(FieldName::Group);
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert!(plan.is_empty());
    }

    #[test]
    fn test_individual_values_per_task() {
        let mut session = EditSession::new();
        session
            .set_individual("a", FieldName::Title, FieldValue::Text("A2".into()))
            .set_individual("b", FieldName::Title, FieldValue::Text(String::new()));
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert_eq!(
            plan.individual_updates.get("a").and_then(|m| m.get(&FieldName::Title)),
            Some(&FieldValue::Text("A2".into()))
        );
        // Blank override for b is dropped, so b gets no entry at all
        assert!(!plan.individual_updates.contains_key("b"));
        assert!(plan.common_updates.is_empty());
    }

    #[test]
    fn test_common_value_applies_where_no_override() {
        let high = FieldValue::Priority(Priority::High);
        let low = FieldValue::Priority(Priority::Low);
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Priority, high.clone())
            .set_individual("a", FieldName::Priority, low.clone());
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert_eq!(plan.patch_for("a").get(&FieldName::Priority), Some(&low));
        assert_eq!(plan.patch_for("b").get(&FieldName::Priority), Some(&high));

        // Same result when the override is recorded first
        let mut session = EditSession::new();
        session
            .set_individual("a", FieldName::Priority, low.clone())
            .set_common(FieldName::Priority, high.clone());
        assert_eq!(session.mode(FieldName::Priority), FieldMode::Individual);
        let reversed = build_update_plan(&two_tasks(), &session).unwrap();
        assert_eq!(reversed, plan);
    }

    #[test]
    fn test_common_value_under_overrides_cascades_only_when_asked() {
        let tasks = vec![with_subtasks("a", &["a.1"]), Task::new("b", "B")];
        let home = FieldValue::Group("home".into());
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Group, home.clone())
            .set_individual("b", FieldName::Group, FieldValue::Group("work".into()));
        let plan = build_update_plan(&tasks, &session).unwrap();
        assert!(plan.subtask_updates.is_empty());

        session.cascade_to_subtasks = true;
        let plan = build_update_plan(&tasks, &session).unwrap();
        assert_eq!(
            plan.subtask_updates.get("a.1").and_then(|m| m.get(&FieldName::Group)),
            Some(&home)
        );
    }

    #[test]
    fn test_common_and_override_dates_checked_together() {
        let mut session = EditSession::new();
        session
            .set_common(FieldName::StartDate, date(10))
            .set_individual("b", FieldName::DueDate, date(5));
        assert_eq!(
            build_update_plan(&two_tasks(), &session),
            Err(ValidationError::StartAfterDue {
                task_id: Some("b".into())
            })
        );
    }

    #[test]
    fn test_individual_values_for_unselected_tasks_ignored() {
        let mut session = EditSession::new();
        session.set_individual("zzz", FieldName::Title, FieldValue::Text("Z".into()));
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert!(plan.individual_updates.is_empty());
        assert!(plan.subtask_updates.is_empty());
    }

    #[test]
    fn test_individual_subtask_values_go_to_subtask_updates() {
        let tasks = vec![with_subtasks("a", &["a.1", "a.2"])];
        let mut session = EditSession::new();
        session
            .set_individual("a", FieldName::Priority, FieldValue::Priority(Priority::High))
            .set_individual("a.2", FieldName::Priority, FieldValue::Priority(Priority::Low));
        let plan = build_update_plan(&tasks, &session).unwrap();
        assert_eq!(plan.individual_updates.len(), 1);
        assert_eq!(
            plan.subtask_updates.get("a.2").and_then(|m| m.get(&FieldName::Priority)),
            Some(&FieldValue::Priority(Priority::Low))
        );
        assert!(!plan.subtask_updates.contains_key("a.1"));
    }

    #[test]
    fn test_cascade_copies_only_cascading_fields() {
        let tasks = vec![with_subtasks("a", &["a.1"])];
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Group, FieldValue::Group("home".into()))
            .set_common(FieldName::Title, FieldValue::Text("Renamed".into()));
        session.cascade_to_subtasks = true;
        let plan = build_update_plan(&tasks, &session).unwrap();
        let sub = plan.subtask_updates.get("a.1").unwrap();
        assert_eq!(sub.get(&FieldName::Group), Some(&FieldValue::Group("home".into())));
        assert!(!sub.contains_key(&FieldName::Title));
    }

    #[test]
    fn test_no_cascade_by_default() {
        let tasks = vec![with_subtasks("a", &["a.1"])];
        let mut session = EditSession::new();
        session.set_common(FieldName::Group, FieldValue::Group("home".into()));
        let plan = build_update_plan(&tasks, &session).unwrap();
        assert!(plan.subtask_updates.is_empty());
    }

    #[test]
    fn test_common_start_after_due_rejected() {
        let mut session = EditSession::new();
        session
            .set_common(FieldName::StartDate, date(10))
            .set_common(FieldName::DueDate, date(5));
        let err = build_update_plan(&two_tasks(), &session).unwrap_err();
        assert_eq!(err, ValidationError::StartAfterDue { task_id: None });
        assert_eq!(err.to_string(), "start date cannot be after due date");
        assert_eq!(err.field(), Some(FieldName::StartDate));
    }

    #[test]
    fn test_individual_start_after_due_rejected() {
        let mut session = EditSession::new();
        session
            .set_individual("b", FieldName::StartDate, date(9))
            .set_individual("b", FieldName::DueDate, date(2));
        assert_eq!(
            build_update_plan(&two_tasks(), &session),
            Err(ValidationError::StartAfterDue {
                task_id: Some("b".into())
            })
        );
    }

    #[test]
    fn test_equal_start_and_due_allowed() {
        let mut session = EditSession::new();
        session
            .set_common(FieldName::StartDate, date(5))
            .set_common(FieldName::DueDate, date(5));
        assert!(build_update_plan(&two_tasks(), &session).is_ok());
    }

    #[test]
    fn test_clear_mode() {
        let mut session = EditSession::new();
        session.set_clear(FieldName::DueDate);
        let plan = build_update_plan(&two_tasks(), &session).unwrap();
        assert!(plan.cleared_fields.contains(&FieldName::DueDate));
        assert!(plan.common_updates.is_empty());
        assert_eq!(plan.patch_for("a").get(&FieldName::DueDate), Some(&FieldValue::Empty));

        let mut session = EditSession::new();
        session.set_clear(FieldName::Title);
        assert_eq!(
            build_update_plan(&two_tasks(), &session),
            Err(ValidationError::NotClearable(FieldName::Title))
        );
    }

    #[test]
    fn test_patch_for_merges_common_and_individual() {
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Priority, FieldValue::Priority(Priority::High))
            .set_individual("b", FieldName::Title, FieldValue::Text("B2".into()));
        let plan = build_update_plan(&two_tasks(), &session).unwrap();

        let a = plan.patch_for("a");
        assert_eq!(a.len(), 1);
        let b = plan.patch_for("b");
        assert_eq!(b.get(&FieldName::Title), Some(&FieldValue::Text("B2".into())));
        assert_eq!(
            b.get(&FieldName::Priority),
            Some(&FieldValue::Priority(Priority::High))
        );
    }

    #[test]
    fn test_plan_never_contains_blank_values() {
        let tasks = vec![with_subtasks("a", &["a.1"]), Task::new("b", "B")];
        let mut session = EditSession::new();
        session
            .set_common(FieldName::Description, FieldValue::Text(String::new()))
            .set_common(FieldName::Group, FieldValue::Empty)
            .set_individual("a", FieldName::Title, FieldValue::Empty)
            .set_individual("a.1", FieldName::Title, FieldValue::Text(String::new()))
            .set_individual("b", FieldName::Title, FieldValue::Text("ok".into()));
        let plan = build_update_plan(&tasks, &session).unwrap();
        let all = plan
            .common_updates
            .values()
            .chain(plan.individual_updates.values().flat_map(|m| m.values()))
            .chain(plan.subtask_updates.values().flat_map(|m| m.values()));
        for value in all {
            assert!(!value.is_blank(), "blank value leaked: {:?}", value);
        }
    }
}
